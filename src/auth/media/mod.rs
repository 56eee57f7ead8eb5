//! Media hosting
//!
//! Images are staged on local disk by the HTTP layer and handed to a
//! [`MediaHost`], which returns a retrievable URL.

pub mod r#trait;
pub mod cloudinary;
pub mod memory;

pub use cloudinary::{storage_id_from_url, CloudinaryHost, StorageId};
pub use memory::MemoryMediaHost;
pub use r#trait::{MediaBlob, MediaError, MediaHost, UploadedMedia};
