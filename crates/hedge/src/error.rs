use thiserror::Error;

#[derive(Debug, Error)]
pub enum HedgeError {
    #[error("failed to read filler manifest at {path}: {source}")]
    ManifestRead { path: String, source: std::io::Error },

    #[error("failed to parse filler manifest at {path}: {source}")]
    ManifestParse { path: String, source: serde_json::Error },

    #[error("failed to read filler audio file {path}: {source}")]
    AudioRead { path: String, source: hound::Error },

    #[error("filler index is empty; no fillers available to select from")]
    EmptyIndex,
}

pub type Result<T> = std::result::Result<T, HedgeError>;
