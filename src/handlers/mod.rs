//! HTTP handlers for the upload and configuration endpoints.

pub mod config;
pub mod upload;

pub use self::config::get_config;
pub use self::upload::{upload_audio, upload_resource};
