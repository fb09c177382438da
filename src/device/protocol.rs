//! Stream Deck (original 15-key model) device constants
//!
//! Layout: 5 columns x 3 rows, one 72x72 display per key.
//!
//! Channels:
//!   - Feature reports (17 bytes): reset, brightness
//!   - Output reports (8191 bytes): two image pages per key
//!   - Input report 0x01: one state byte per key, raw order

/// USB Vendor ID (Elgato Systems)
pub const VENDOR_ID: u16 = 0x0fd9;

/// USB Product ID for the original 15-key Stream Deck
pub const PRODUCT_ID: u16 = 0x0060;

/// Number of keys
pub const BUTTON_COUNT: u8 = 15;

/// Key icon edge length in pixels
pub const ICON_SIZE: usize = 72;

/// Pixels in one key icon
pub const ICON_PIXELS: usize = ICON_SIZE * ICON_SIZE;

/// Pixels carried by page 1 (the rest go to page 2)
pub const PAGE1_PIXELS: usize = 2583;

/// Pixels carried by page 2
pub const PAGE2_PIXELS: usize = ICON_PIXELS - PAGE1_PIXELS;

/// Size of every image output report
pub const PAGE_PACKET_SIZE: usize = 8191;

/// Size of the page header that precedes the payload
pub const PAGE_HEADER_LEN: usize = 16;

/// Report id for image output reports
pub const IMAGE_REPORT_ID: u8 = 0x02;

/// Report id for the key state input report
pub const BUTTON_STATE_REPORT_ID: u8 = 0x01;

/// Length of the key state input report (report id + 15 states + 1 unused)
pub const INPUT_REPORT_LEN: usize = 17;

/// Length of the control feature reports
pub const FEATURE_REPORT_LEN: usize = 17;

/// Feature report: clear all keys and show the idle wallpaper
pub const RESET_REPORT: [u8; FEATURE_REPORT_LEN] = [
    0x0b, 0x63, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Feature report prefix for brightness; byte 5 carries the percentage
pub const BRIGHTNESS_REPORT: [u8; FEATURE_REPORT_LEN] = [
    0x05, 0x55, 0xaa, 0xd1, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
];

/// Offset of the percentage byte in [`BRIGHTNESS_REPORT`]
pub const BRIGHTNESS_OFFSET: usize = 5;

/// Bitmap header sent at the start of page 1 (BITMAPFILEHEADER + BITMAPINFOHEADER,
/// 72x72, 24 bpp, 15552 bytes of pixel data)
pub const BMP_HEADER: [u8; 54] = [
    0x42, 0x4d, 0xf6, 0x3c, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x36, 0x00, 0x00, 0x00, 0x28,
    0x00, 0x00, 0x00, 0x48, 0x00, 0x00, 0x00, 0x48, 0x00, 0x00, 0x00, 0x01, 0x00, 0x18, 0x00,
    0x00, 0x00, 0x00, 0x00, 0xc0, 0x3c, 0x00, 0x00, 0xc4, 0x0e, 0x00, 0x00, 0xc4, 0x0e, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Build the brightness feature report. Values above 100 are clamped.
///
/// Hardware note: 7 and below reads as backlight off, 90 and above as maximum.
pub fn brightness_report(percent: u8) -> [u8; FEATURE_REPORT_LEN] {
    let mut report = BRIGHTNESS_REPORT;
    report[BRIGHTNESS_OFFSET] = percent.min(100);
    report
}

/// Build the 16-byte header for one image page.
///
/// Fields: report id, command, page number, reserved, last-page flag, raw key number.
pub fn page_header(page: u8, raw_button: u8) -> [u8; PAGE_HEADER_LEN] {
    let mut header = [0u8; PAGE_HEADER_LEN];
    header[0] = IMAGE_REPORT_ID;
    header[1] = 0x01;
    header[2] = page;
    header[4] = u8::from(page == 2);
    header[5] = raw_button;
    header
}
