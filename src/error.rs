use std::path::PathBuf;
use thiserror::Error;

use crate::device::BUTTON_COUNT;

/// Errors raised by the panel core
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("invalid button number {0} (expected 1-{max})", max = BUTTON_COUNT)]
    InvalidButtonNumber(u8),

    #[error("invalid pixel buffer size: expected {expected} bytes, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },

    #[error("device I/O error: {0}")]
    DeviceIo(String),

    #[error("no device found with vendor 0x{vendor_id:04x} product 0x{product_id:04x}")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    #[error("failed to load image {path:?}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<hidapi::HidError> for PanelError {
    fn from(e: hidapi::HidError) -> Self {
        PanelError::DeviceIo(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PanelError>;
