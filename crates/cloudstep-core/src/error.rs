use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config at {path}: {field} must be at least 1")]
    ConfigOutOfRange { path: PathBuf, field: &'static str },

    // ── Manifest ──
    #[error("failed to read manifest {path}")]
    ManifestRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}")]
    ManifestParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("runtime is required")]
    RuntimeRequired,

    #[error("env {env:?} is not supported — use \"flex\" or \"flexible\"")]
    UnsupportedEnv { env: Option<String> },

    // ── Deploy request ──
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("malformed {kind} {entry:?} — expected key=value")]
    MalformedPair { kind: &'static str, entry: String },

    #[error("label key {key:?} uses the reserved prefix {prefix:?}")]
    ReservedLabel { key: String, prefix: String },

    #[error("source directory and container image are mutually exclusive")]
    SourceConflict,

    #[error("no source given — pass a source directory or a container image")]
    SourceMissing,

    #[error("source path {path} is not a directory")]
    SourceNotDirectory { path: PathBuf },

    #[error("malformed storage URI {uri:?} — expected gs://bucket/object")]
    MalformedStorageUri { uri: String },

    // ── Provenance ──
    #[error("provenance destination {path} already exists")]
    ProvenanceExists { path: PathBuf },

    #[error("failed to write provenance to {path}")]
    ProvenanceWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode provenance")]
    ProvenanceEncode { source: serde_json::Error },
}

impl Error {
    /// True for errors raised while validating input, before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::RuntimeRequired
                | Self::UnsupportedEnv { .. }
                | Self::MissingField { .. }
                | Self::MalformedPair { .. }
                | Self::ReservedLabel { .. }
                | Self::SourceConflict
                | Self::SourceMissing
                | Self::SourceNotDirectory { .. }
                | Self::MalformedStorageUri { .. }
        )
    }
}
