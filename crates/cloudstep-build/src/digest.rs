use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// `sha256:<hex>` digest of a file, read in chunks.
pub fn sha256_file(path: &Path) -> Result<String, DigestError> {
    let file = std::fs::File::open(path).map_err(|e| DigestError {
        path: path.to_path_buf(),
        source: e,
    })?;
    sha256_reader(file).map_err(|e| DigestError {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn sha256_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

#[derive(Debug, thiserror::Error)]
#[error("failed to digest {path}")]
pub struct DigestError {
    pub path: PathBuf,
    pub source: std::io::Error,
}
