use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{PanelError, Result};

use super::protocol::INPUT_REPORT_LEN;

/// Receiving end of the input report stream
pub type InputReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

/// Byte pipe to one panel.
///
/// Feature reports (control) and output reports (image pages) are separate
/// channels. Input reports are pushed into a channel handed out once by
/// [`Transport::take_input`]. Nothing here interprets the bytes and nothing retries.
pub trait Transport: Send + Sync + 'static {
    /// Write a feature report (reset, brightness)
    fn send_feature_report(&self, data: &[u8]) -> Result<()>;

    /// Write an output report (image page)
    fn write_report(&self, data: &[u8]) -> Result<()>;

    /// Write several output reports back to back, stopping at the first error
    fn write_reports(&self, reports: &[&[u8]]) -> Result<()> {
        reports.iter().try_for_each(|data| self.write_report(data))
    }

    /// Take the input report stream. Returns `None` once taken.
    fn take_input(&self) -> Option<InputReceiver>;

    /// Release the handle. Later writes fail with `DeviceIo`.
    fn close(&self);
}

/// HID device information
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    pub path: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: String,
    pub product: String,
    pub manufacturer: String,
}

/// List attached devices matching the given USB ids
pub fn list_devices(vendor_id: u16, product_id: u16) -> Result<Vec<DeviceInfo>> {
    let api = hidapi::HidApi::new()?;
    let devices = api
        .device_list()
        .filter(|d| d.vendor_id() == vendor_id && d.product_id() == product_id)
        .map(|d| DeviceInfo {
            path: d.path().to_string_lossy().into_owned(),
            vendor_id: d.vendor_id(),
            product_id: d.product_id(),
            serial_number: d.serial_number().unwrap_or_default().to_string(),
            product: d.product_string().unwrap_or_default().to_string(),
            manufacturer: d.manufacturer_string().unwrap_or_default().to_string(),
        })
        .collect();
    Ok(devices)
}

/// Options for opening a [`HidTransport`]
#[derive(Debug, Clone)]
pub struct HidOptions {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Pick a specific unit when several are attached
    pub serial: Option<String>,
    /// Read timeout of the reader thread. A write waits at most this long for
    /// the reader to hand over the device.
    pub read_timeout_ms: i32,
}

/// Counts writers waiting for the device so the reader steps aside for them
#[derive(Debug, Default)]
struct WriteGate {
    waiting: AtomicUsize,
}

impl WriteGate {
    fn enter(&self) -> WriteTicket<'_> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        WriteTicket { gate: self }
    }

    fn has_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst) > 0
    }
}

struct WriteTicket<'a> {
    gate: &'a WriteGate,
}

impl Drop for WriteTicket<'_> {
    fn drop(&mut self) {
        self.gate.waiting.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Reader back-off while a writer holds or waits for the device
const READER_BACKOFF: Duration = Duration::from_millis(1);

/// [`Transport`] over hidapi with a dedicated reader thread
pub struct HidTransport {
    device: Arc<Mutex<hidapi::HidDevice>>,
    writers: Arc<WriteGate>,
    input: Mutex<Option<InputReceiver>>,
    running: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl HidTransport {
    /// Find and open the device, then start reading input reports
    pub fn open(options: &HidOptions) -> Result<Self> {
        let api = hidapi::HidApi::new()?;

        let info = api
            .device_list()
            .filter(|d| d.vendor_id() == options.vendor_id && d.product_id() == options.product_id)
            .find(|d| match &options.serial {
                Some(serial) => d.serial_number() == Some(serial.as_str()),
                None => true,
            })
            .ok_or(PanelError::DeviceNotFound {
                vendor_id: options.vendor_id,
                product_id: options.product_id,
            })?;

        info!(
            "Opening device {:04x}:{:04x} serial {}",
            info.vendor_id(),
            info.product_id(),
            info.serial_number().unwrap_or("?")
        );
        let device = Arc::new(Mutex::new(info.open_device(&api)?));

        let (tx, rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));
        let writers = Arc::new(WriteGate::default());
        let reader = spawn_reader(
            device.clone(),
            writers.clone(),
            running.clone(),
            tx,
            options.read_timeout_ms,
        )?;

        Ok(Self {
            device,
            writers,
            input: Mutex::new(Some(rx)),
            running,
            reader: Mutex::new(Some(reader)),
        })
    }

    fn with_device<T>(&self, f: impl FnOnce(&hidapi::HidDevice) -> Result<T>) -> Result<T> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(PanelError::DeviceIo("transport closed".to_string()));
        }
        let _ticket = self.writers.enter();
        let device = self
            .device
            .lock()
            .map_err(|_| PanelError::DeviceIo("device handle lock poisoned".to_string()))?;
        f(&device)
    }
}

fn spawn_reader(
    device: Arc<Mutex<hidapi::HidDevice>>,
    writers: Arc<WriteGate>,
    running: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    timeout_ms: i32,
) -> Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("panel-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; INPUT_REPORT_LEN];
            while running.load(Ordering::SeqCst) {
                if writers.has_waiting() {
                    std::thread::sleep(READER_BACKOFF);
                    continue;
                }
                let read = match device.lock() {
                    Ok(device) => device.read_timeout(&mut buf, timeout_ms),
                    Err(_) => break,
                };
                match read {
                    Ok(0) => {}
                    Ok(len) => {
                        if tx.send(buf[..len].to_vec()).is_err() {
                            debug!("Input receiver dropped, stopping reader");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Error reading device input: {}", e);
                        break;
                    }
                }
            }
            debug!("Reader thread exiting");
        })
        .map_err(|e| PanelError::DeviceIo(format!("failed to spawn reader: {}", e)))
}

fn write_all(device: &hidapi::HidDevice, data: &[u8]) -> Result<()> {
    let written = device.write(data)?;
    if written != data.len() {
        return Err(PanelError::DeviceIo(format!(
            "short write: {} of {} bytes",
            written,
            data.len()
        )));
    }
    Ok(())
}

impl Transport for HidTransport {
    fn send_feature_report(&self, data: &[u8]) -> Result<()> {
        self.with_device(|d| Ok(d.send_feature_report(data)?))
    }

    fn write_report(&self, data: &[u8]) -> Result<()> {
        self.with_device(|d| write_all(d, data))
    }

    fn write_reports(&self, reports: &[&[u8]]) -> Result<()> {
        self.with_device(|d| reports.iter().try_for_each(|data| write_all(d, data)))
    }

    fn take_input(&self) -> Option<InputReceiver> {
        self.input.lock().ok().and_then(|mut rx| rx.take())
    }

    fn close(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let reader = self.reader.lock().ok().and_then(|mut r| r.take());
        if let Some(reader) = reader {
            if reader.join().is_err() {
                warn!("Reader thread panicked");
            }
        }
        info!("Device closed");
    }
}

impl Drop for HidTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_gate_tracks_waiting_writers() {
        let gate = WriteGate::default();
        assert!(!gate.has_waiting());

        let first = gate.enter();
        let second = gate.enter();
        assert!(gate.has_waiting());
        drop(first);
        assert!(gate.has_waiting());
        drop(second);
        assert!(!gate.has_waiting());
    }

    #[test]
    fn test_reader_waits_for_writer_to_finish() {
        let gate = Arc::new(WriteGate::default());
        let device = Arc::new(Mutex::new(Vec::<&str>::new()));

        let ticket = gate.enter();
        let reader = {
            let gate = gate.clone();
            let device = device.clone();
            std::thread::spawn(move || {
                while gate.has_waiting() {
                    std::thread::sleep(READER_BACKOFF);
                }
                device.lock().unwrap().push("read");
            })
        };

        // Both pages go out before the reader gets the device
        {
            let mut device = device.lock().unwrap();
            std::thread::sleep(Duration::from_millis(20));
            device.push("page1");
            device.push("page2");
        }
        drop(ticket);
        reader.join().unwrap();

        assert_eq!(*device.lock().unwrap(), vec!["page1", "page2", "read"]);
    }
}
