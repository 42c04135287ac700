//! Provenance record written after an artifact is produced or published.

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// Location of the artifact (`gs://…`, resource name, or local path)
    pub uri: String,
    /// `sha256:<hex>` digest of the artifact bytes
    pub digest: String,
    pub is_build_artifact: bool,
}

impl Provenance {
    pub fn build_artifact(uri: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            digest: digest.into(),
            is_build_artifact: true,
        }
    }

    /// Write the record as JSON. Refuses to overwrite an existing file.
    pub fn write(&self, path: &Path) -> crate::Result<()> {
        let json =
            serde_json::to_vec(self).map_err(|e| crate::Error::ProvenanceEncode { source: e })?;

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    crate::Error::ProvenanceExists {
                        path: path.to_path_buf(),
                    }
                } else {
                    crate::Error::ProvenanceWrite {
                        path: path.to_path_buf(),
                        source: e,
                    }
                }
            })?;

        file.write_all(&json)
            .and_then(|()| file.sync_all())
            .map_err(|e| crate::Error::ProvenanceWrite {
                path: path.to_path_buf(),
                source: e,
            })?;

        tracing::info!(path = %path.display(), uri = %self.uri, "wrote provenance");
        Ok(())
    }
}
