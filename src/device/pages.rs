//! Key icon -> image page encoding.
//!
//! The device takes a 72x72 BGR bitmap whose rows run top-to-bottom and whose
//! pixels run right-to-left within each row (horizontal mirror). The transformed
//! stream is split across two output reports: page 1 carries the bitmap header
//! and the first [`PAGE1_PIXELS`] pixels, page 2 the remaining [`PAGE2_PIXELS`].

use crate::error::{PanelError, Result};

use super::protocol::*;

/// Channel layout of a caller-supplied pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 3 bytes per pixel
    Rgb,
    /// 4 bytes per pixel, alpha is dropped
    Rgba,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }

    /// Expected byte length of one key icon in this format
    pub fn buffer_len(self) -> usize {
        ICON_PIXELS * self.channels()
    }
}

/// The two output reports that make up one key image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePair {
    pub page1: Vec<u8>,
    pub page2: Vec<u8>,
}

/// Encode one key icon into its two image pages.
///
/// `raw_button` is the key number in wire order (see [`super::buttons`]).
pub fn encode_pages(buffer: &[u8], format: PixelFormat, raw_button: u8) -> Result<PagePair> {
    let expected = format.buffer_len();
    if buffer.len() != expected {
        return Err(PanelError::InvalidBufferSize {
            expected,
            actual: buffer.len(),
        });
    }

    let bgr = to_device_order(buffer, format.channels());
    let (first, second) = bgr.split_at(PAGE1_PIXELS * 3);

    let mut page1 = Vec::with_capacity(PAGE_PACKET_SIZE);
    page1.extend_from_slice(&page_header(1, raw_button));
    page1.extend_from_slice(&BMP_HEADER);
    page1.extend_from_slice(first);
    page1.resize(PAGE_PACKET_SIZE, 0);

    let mut page2 = Vec::with_capacity(PAGE_PACKET_SIZE);
    page2.extend_from_slice(&page_header(2, raw_button));
    page2.extend_from_slice(second);
    page2.resize(PAGE_PACKET_SIZE, 0);

    Ok(PagePair { page1, page2 })
}

/// Recover the RGB icon carried by a page pair.
///
/// Inverse of [`encode_pages`] for the pixel payload; headers are not checked.
pub fn decode_pages(pages: &PagePair) -> Vec<u8> {
    let page1_start = PAGE_HEADER_LEN + BMP_HEADER.len();
    let mut bgr = Vec::with_capacity(ICON_PIXELS * 3);
    bgr.extend_from_slice(&pages.page1[page1_start..page1_start + PAGE1_PIXELS * 3]);
    bgr.extend_from_slice(&pages.page2[PAGE_HEADER_LEN..PAGE_HEADER_LEN + PAGE2_PIXELS * 3]);

    // The mirror and the channel swap are both involutions
    to_device_order(&bgr, 3)
}

/// Mirror each row horizontally and reorder channels RGB(A) -> BGR
fn to_device_order(buffer: &[u8], channels: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(ICON_PIXELS * 3);
    for row in buffer.chunks_exact(ICON_SIZE * channels) {
        for pixel in row.chunks_exact(channels).rev() {
            out.extend_from_slice(&[pixel[2], pixel[1], pixel[0]]);
        }
    }
    out
}
