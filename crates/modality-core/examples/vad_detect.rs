//! Resolve the default VAD provider and classify a tone vs. silence.
//!
//! Run with: `cargo run -p modality-core --example vad_detect`

use modality_core::capability::Capability;
use modality_core::payload::{Payload, ProcessOptions};
use modality_core::provider::ServiceRequest;
use modality_core::registry;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    modality_core::builtin::register()?;

    let request = ServiceRequest::default_for(Capability::Vad);
    let provider = registry::resolve(&request)?;
    println!("resolved provider: {}", provider.name());

    let mut backend = provider.create(&request)?;
    backend.initialize("")?;

    let silence = vec![0.0f32; 16000];
    let tone: Vec<f32> = (0..16000).map(|i| (i as f32 * 0.05).sin() * 0.3).collect();

    for (label, samples) in [("silence", silence), ("tone", tone)] {
        let verdict = backend.process(
            Payload::audio(samples, 16000),
            &ProcessOptions::default(),
        )?;
        println!("{}: {:?}", label, verdict);
    }

    Ok(())
}
