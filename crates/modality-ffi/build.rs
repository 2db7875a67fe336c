//! Build script for modality-ffi
//!
//! Generates the C header (`include/modality.h`) using cbindgen.

use std::env;
use std::path::PathBuf;

fn main() {
    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let crate_path = PathBuf::from(&crate_dir);

    let include_dir = crate_path.join("include");
    std::fs::create_dir_all(&include_dir).expect("Failed to create include directory");

    let output_path = include_dir.join("modality.h");
    let config_path = crate_path.join("cbindgen.toml");

    let result = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(
            cbindgen::Config::from_file(&config_path).expect("Failed to read cbindgen.toml"),
        )
        .generate();

    match result {
        Ok(bindings) => {
            bindings.write_to_file(&output_path);
            println!("cargo:rerun-if-changed=src/lib.rs");
            println!("cargo:rerun-if-changed=cbindgen.toml");
        }
        Err(e) => {
            // Header generation is best-effort; a missing header must not
            // break library builds.
            eprintln!("Warning: cbindgen failed: {}", e);
            eprintln!("The C header will not be generated.");
        }
    }
}
