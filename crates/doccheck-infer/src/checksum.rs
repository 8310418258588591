use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::InferError;

pub const CHECKSUMS_FILE: &str = "checksums.txt";

/// Writes `<sha256>  <file>` lines for every file into `model_root/checksums.txt`.
pub fn write_checksums(model_root: &Path, filenames: &[&str]) -> Result<(), InferError> {
    let mut output = File::create(model_root.join(CHECKSUMS_FILE))?;
    for filename in filenames {
        let checksum = sha256_file(model_root.join(filename))?;
        writeln!(output, "{checksum}  {filename}")?;
    }
    Ok(())
}

/// Checks model files against `checksums.txt` when the directory carries one.
///
/// Returns `Ok(false)` when there is no checksum file. Listed files that are
/// missing or whose digest differs are a `ModelUnavailable` error; files not in
/// `filenames` are ignored.
pub fn verify_checksums(model_root: &Path, filenames: &[&str]) -> Result<bool, InferError> {
    let checksum_path = model_root.join(CHECKSUMS_FILE);
    if !checksum_path.exists() {
        return Ok(false);
    }

    let file = File::open(&checksum_path)?;
    let mut seen = HashSet::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(expected), Some(filename)) = (parts.next(), parts.next()) else {
            return Err(InferError::ModelUnavailable(format!(
                "malformed line in {}: {line}",
                checksum_path.display()
            )));
        };

        if !filenames.contains(&filename) {
            continue;
        }

        let path = model_root.join(filename);
        if !path.exists() {
            return Err(InferError::ModelUnavailable(format!(
                "model file {} listed in {CHECKSUMS_FILE} is missing",
                path.display()
            )));
        }

        let actual = sha256_file(&path)?;
        if actual != expected {
            tracing::warn!(
                file = filename,
                model_dir = %model_root.display(),
                "checksum mismatch for model file"
            );
            return Err(InferError::ModelUnavailable(format!(
                "checksum mismatch for {}",
                path.display()
            )));
        }

        seen.insert(filename.to_owned());
    }

    tracing::debug!(
        verified = seen.len(),
        model_dir = %model_root.display(),
        "verified model checksums"
    );
    Ok(true)
}

fn sha256_file(path: impl AsRef<Path>) -> Result<String, InferError> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{digest:x}"))
}
