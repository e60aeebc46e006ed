//! Check encoder discovery and scratch storage.

use keyreel_capture_engine::ScratchStorage;
use keyreel_common::config::{config_file_path, AppConfig};
use keyreel_encode_engine::{is_executable, EncoderLocator};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("KeyReel System Check");
    println!("{}", "=".repeat(50));

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[OK] Config: defaults ({} not found)", path.display());
    }

    // Encoder, in lookup order
    let locator = EncoderLocator::from_config(&config.encoder);
    println!();
    println!("Encoder candidates:");
    for candidate in locator.candidates() {
        let mark = if is_executable(&candidate) { "OK" } else { "--" };
        println!("  [{mark}] {}", candidate.display());
    }
    let encoder_ok = match locator.locate() {
        Ok(found) => {
            println!("[OK] Encoder: {}", found.display());
            true
        }
        Err(e) => {
            println!("[WARN] {e}");
            false
        }
    };

    // Scratch storage
    let storage = ScratchStorage::from_config(&config.scratch);
    let scratch_ok = match storage.acquire() {
        Ok(mut dir) => {
            let scratch_path = dir.path().display().to_string();
            match storage.release(&mut dir) {
                Ok(()) => {
                    println!("[OK] Scratch storage: {}", storage.root().display());
                    true
                }
                Err(e) => {
                    println!("[WARN] Scratch storage: could not remove {scratch_path}: {e}");
                    false
                }
            }
        }
        Err(e) => {
            println!("[WARN] Scratch storage: {e}");
            false
        }
    };

    println!();
    if encoder_ok && scratch_ok {
        println!("Encoder and scratch storage are available. KeyReel is ready.");
    } else {
        println!("Some requirements are missing. See above for details.");
    }

    Ok(())
}
