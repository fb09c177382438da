use image::{imageops::FilterType, RgbaImage};
use std::path::Path;
use tracing::debug;

use crate::device::ICON_SIZE;
use crate::error::{PanelError, Result};

/// Decode an image file into a key icon (72x72 RGBA)
pub fn load_icon(path: &Path) -> Result<Vec<u8>> {
    let source = image::open(path)
        .map_err(|source| PanelError::Image {
            path: path.to_path_buf(),
            source,
        })?
        .to_rgba8();
    debug!(
        "Decoded {:?} ({}x{})",
        path,
        source.width(),
        source.height()
    );
    Ok(contain_icon(&source))
}

/// Fit an image inside the key, keeping its aspect ratio, centered on black.
///
/// Alpha is flattened onto the black background; the result is fully opaque RGBA.
pub fn contain_icon(source: &RgbaImage) -> Vec<u8> {
    let size = ICON_SIZE as u32;
    let (width, height) = fit_within(source.width(), source.height(), size);

    let resized;
    let fitted = if source.width() == width && source.height() == height {
        source
    } else {
        resized = image::imageops::resize(source, width, height, FilterType::Triangle);
        &resized
    };

    let x_offset = ((size - width) / 2) as usize;
    let y_offset = ((size - height) / 2) as usize;
    let src_width = width as usize;
    let src_raw = fitted.as_raw();

    let mut out = vec![0u8; ICON_SIZE * ICON_SIZE * 4];
    for pixel in out.chunks_exact_mut(4) {
        pixel[3] = 0xff;
    }

    for sy in 0..height as usize {
        let src_row = sy * src_width * 4;
        let dst_row = (sy + y_offset) * ICON_SIZE * 4;
        for sx in 0..src_width {
            let src = src_row + sx * 4;
            let dst = dst_row + (sx + x_offset) * 4;
            let alpha = u16::from(src_raw[src + 3]);
            for c in 0..3 {
                out[dst + c] = (u16::from(src_raw[src + c]) * alpha / 255) as u8;
            }
        }
    }
    out
}

/// Largest size with the same aspect ratio that fits in a `bound` square
fn fit_within(width: u32, height: u32, bound: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    if width >= height {
        let h = (u64::from(height) * u64::from(bound) / u64::from(width)).max(1) as u32;
        (bound, h)
    } else {
        let w = (u64::from(width) * u64::from(bound) / u64::from(height)).max(1) as u32;
        (w, bound)
    }
}
