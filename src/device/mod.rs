mod buttons;
mod manager;
mod mock;
mod pages;
mod protocol;
mod transport;

pub use buttons::*;
pub use manager::{PanelController, PanelOptions};
pub use mock::MockTransport;
pub use pages::{decode_pages, encode_pages, PagePair, PixelFormat};
pub use protocol::*;
pub use transport::{list_devices, DeviceInfo, HidOptions, HidTransport, InputReceiver, Transport};
