use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::{PanelError, Result};

use super::transport::{InputReceiver, Transport};

/// In-memory [`Transport`] that records every write.
///
/// Input reports are injected through [`MockTransport::input_sender`].
pub struct MockTransport {
    feature_reports: Mutex<Vec<Vec<u8>>>,
    output_reports: Mutex<Vec<Vec<u8>>>,
    fail_writes: AtomicBool,
    closed: AtomicBool,
    input_tx: mpsc::UnboundedSender<Vec<u8>>,
    input_rx: Mutex<Option<InputReceiver>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        Self {
            feature_reports: Mutex::new(Vec::new()),
            output_reports: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            input_tx,
            input_rx: Mutex::new(Some(input_rx)),
        }
    }

    /// Sender that plays the role of the device's input endpoint
    pub fn input_sender(&self) -> mpsc::UnboundedSender<Vec<u8>> {
        self.input_tx.clone()
    }

    /// Make every following write fail, as an unplugged device would
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn feature_reports(&self) -> Vec<Vec<u8>> {
        lock(&self.feature_reports).clone()
    }

    pub fn output_reports(&self) -> Vec<Vec<u8>> {
        lock(&self.output_reports).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<()> {
        if self.is_closed() {
            return Err(PanelError::DeviceIo("transport closed".to_string()));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PanelError::DeviceIo("device disconnected".to_string()));
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl Transport for MockTransport {
    fn send_feature_report(&self, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        lock(&self.feature_reports).push(data.to_vec());
        Ok(())
    }

    fn write_report(&self, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        lock(&self.output_reports).push(data.to_vec());
        Ok(())
    }

    fn take_input(&self) -> Option<InputReceiver> {
        lock(&self.input_rx).take()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
