//! Build script for storefront crate.
//!
//! Hashes static assets so templates can append `?v=<hash>` and let browsers
//! cache them until the content changes.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    let static_dir = manifest_dir.join("static");

    emit_hash("CSS_HASH", &[static_dir.join("css/main.css")]);
    emit_hash(
        "JS_HASH",
        &[static_dir.join("js/cart.js"), static_dir.join("js/checkout.js")],
    );
}

/// Hash the given files together and expose the first 8 hex chars as `name`.
///
/// Missing files hash as empty so a fresh checkout still builds.
fn emit_hash(name: &str, files: &[PathBuf]) {
    let mut hasher = Sha256::new();
    for path in files {
        println!("cargo:rerun-if-changed={}", path.display());
        match fs::read(path) {
            Ok(content) => hasher.update(&content),
            Err(e) => println!("cargo:warning=Could not read {}: {e}", display(path)),
        }
    }

    let hash = format!("{:x}", hasher.finalize());
    let short_hash = hash.get(..8).unwrap_or(&hash);
    println!("cargo:rustc-env={name}={short_hash}");
}

fn display(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
