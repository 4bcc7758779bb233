//! Filesystem-backed session store.
//!
//! This crate provides:
//! - Session directory lookup and image enumeration
//! - Atomic persistence of the `results.json` sidecar
//! - Mask artifact paths under `masks/`

pub mod error;
pub mod session;

pub use error::{StorageError, StorageResult};
pub use session::{is_supported_image, mask_file_name, SessionStore, IMAGE_EXTENSIONS};
