//! Audio utilities.
//!
//! The core deliberately implements no codecs; the only signal processing it
//! owns is the PCM resampling needed to feed engines their required sample
//! rate.

mod resample;

pub use resample::resample;
