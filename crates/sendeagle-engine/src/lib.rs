//! Local save + Eagle upload for generated image batches.

pub mod config;
pub mod eagle;
pub mod encode;
mod exif;
pub mod output;
pub mod pipeline;

pub use config::SendEagleConfig;
pub use eagle::{EagleClient, EagleTransport, FolderInfo, HttpTransport, UploadItem};
pub use encode::{encode_image, rgb_from_unit_floats, EmbeddedMetadata, EncodeOptions};
pub use pipeline::{BatchOutcome, SavedImage, SendEagle, UploadFailure};
