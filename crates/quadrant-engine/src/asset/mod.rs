//! Application asset access.
//!
//! The host supplies an [`AssetStore`] that resolves a path to bytes; decoding
//! to RGBA8 is done here. Two stores ship with the crate: a directory-backed
//! one and an in-memory one.

mod decode;
mod error;
mod store;

pub use decode::{decode_rgba8, DecodedImage};
pub use error::AssetError;
pub use store::{AssetStore, DirAssetStore, MemoryAssetStore};
