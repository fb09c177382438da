use crate::device::ICON_PIXELS;

/// Parse a `#RRGGBB` (or `RRGGBB`, `0xRRGGBB`) string to a packed 0xRRGGBB color
pub fn parse_hex_color(hex: &str) -> Option<u32> {
    let hex = hex.trim();
    let hex = hex
        .strip_prefix('#')
        .or_else(|| hex.strip_prefix("0x"))
        .unwrap_or(hex);
    if hex.len() != 6 {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

/// Uniform RGB icon of the given 0xRRGGBB color
pub fn solid_icon(color: u32) -> Vec<u8> {
    let [_, r, g, b] = color.to_be_bytes();
    [r, g, b].repeat(ICON_PIXELS)
}
