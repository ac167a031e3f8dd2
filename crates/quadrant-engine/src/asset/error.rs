use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to read or decode an asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset `{0}` not found")]
    NotFound(String),
    /// The path is empty, absolute, or climbs out of the store root.
    #[error("invalid asset path `{0}`")]
    InvalidPath(String),
    #[error("failed to read asset {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("asset `{path}` is not a decodable image")]
    Malformed {
        path: String,
        #[source]
        source: image::ImageError,
    },
}
