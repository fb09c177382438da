mod cache;
mod color;
mod icon;

pub use cache::{ImageCache, DEFAULT_IMAGE_CACHE_CAPACITY};
pub use color::{parse_hex_color, solid_icon};
pub use icon::{contain_icon, load_icon};
