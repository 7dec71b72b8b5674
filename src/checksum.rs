//! SHA-256 verification of downloaded and installed objects.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::types::AgentError;

pub trait ChecksumVerifier: Send + Sync {
    /// `Ok(false)` on mismatch, `Err` only when the file cannot be read.
    fn verify(&self, path: &Path, expected: &str) -> Result<bool, AgentError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Checker;

impl ChecksumVerifier for Sha256Checker {
    fn verify(&self, path: &Path, expected: &str) -> Result<bool, AgentError> {
        let digest = sha256_file(path)?;
        Ok(digest.eq_ignore_ascii_case(expected.trim()))
    }
}

pub fn sha256_file(path: &Path) -> Result<String, AgentError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
