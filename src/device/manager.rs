use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::display::{solid_icon, ImageCache, DEFAULT_IMAGE_CACHE_CAPACITY};
use crate::error::{PanelError, Result};
use crate::events::{EventDispatcher, PanelEvent, SubscriptionId, ThrottlePolicy, Topic};
use crate::input::{ButtonSnapshot, ButtonStateTracker};

use super::buttons::{logical_to_raw, validate_button};
use super::pages::{encode_pages, PixelFormat};
use super::protocol::{brightness_report, BRIGHTNESS_OFFSET, RESET_REPORT};
use super::transport::Transport;

/// Settings for a [`PanelController`]
#[derive(Debug, Clone)]
pub struct PanelOptions {
    /// Decoded icons kept by [`PanelController::draw_image_file`]
    pub image_cache_capacity: usize,
}

impl Default for PanelOptions {
    fn default() -> Self {
        Self {
            image_cache_capacity: DEFAULT_IMAGE_CACHE_CAPACITY,
        }
    }
}

/// Handle to one connected panel.
///
/// Image pages for a key are written as a pair under a single lock so that two
/// draws never interleave their pages. Key state reports are processed on a
/// background task (see [`PanelController::start_listening`]) independently of
/// in-flight draws.
pub struct PanelController {
    transport: Arc<dyn Transport>,
    write_lock: tokio::sync::Mutex<()>,
    tracker: Arc<Mutex<ButtonStateTracker>>,
    events: Arc<EventDispatcher>,
    images: ImageCache,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl PanelController {
    pub fn new(transport: Arc<dyn Transport>, options: PanelOptions) -> Self {
        Self {
            transport,
            write_lock: tokio::sync::Mutex::new(()),
            tracker: Arc::new(Mutex::new(ButtonStateTracker::new())),
            events: Arc::new(EventDispatcher::new()),
            images: ImageCache::new(options.image_cache_capacity),
            listener: Mutex::new(None),
        }
    }

    /// Run a blocking transport call off the async runtime
    async fn transport_io<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&dyn Transport) -> Result<()> + Send + 'static,
    {
        let transport = self.transport.clone();
        tokio::task::spawn_blocking(move || f(transport.as_ref()))
            .await
            .map_err(|e| PanelError::DeviceIo(format!("I/O task failed: {}", e)))?
    }

    /// Clear every key and show the idle wallpaper.
    ///
    /// The cached key state is left alone until the next state report.
    pub async fn reset(&self) -> Result<()> {
        debug!("Resetting device");
        self.transport_io(|t| t.send_feature_report(&RESET_REPORT))
            .await
    }

    /// Set backlight brightness (0-100). Larger values are clamped to 100.
    pub async fn set_brightness(&self, percent: u8) -> Result<()> {
        if percent > 100 {
            warn!("Brightness {}% out of range, clamping to 100%", percent);
        }
        let report = brightness_report(percent);
        debug!("Setting brightness to {}%", report[BRIGHTNESS_OFFSET]);
        self.transport_io(move |t| t.send_feature_report(&report))
            .await
    }

    /// Fill a key with a single 0xRRGGBB color
    pub async fn draw_color(&self, color: u32, button: u8) -> Result<()> {
        validate_button(button)?;
        self.draw_buffer(&solid_icon(color), button, PixelFormat::Rgb)
            .await
    }

    /// Fill a key with black
    pub async fn clear_button(&self, button: u8) -> Result<()> {
        self.draw_color(0x000000, button).await
    }

    /// Draw a 72x72 pixel buffer (origin top-left) to a logical key
    pub async fn draw_buffer(&self, buffer: &[u8], button: u8, format: PixelFormat) -> Result<()> {
        let raw = logical_to_raw(button)?;
        let pages = encode_pages(buffer, format, raw)?;

        let _guard = self.write_lock.lock().await;
        debug!("Writing image pages for button {} (raw {})", button, raw);
        self.transport_io(move |t| {
            t.write_reports(&[pages.page1.as_slice(), pages.page2.as_slice()])
        })
        .await
    }

    /// Draw an image file to a logical key, decoding it on first use
    pub async fn draw_image_file(&self, path: impl AsRef<Path>, button: u8) -> Result<()> {
        validate_button(button)?;
        let icon = self.images.load(path.as_ref()).await?;
        self.draw_buffer(&icon, button, PixelFormat::Rgba).await
    }

    /// Last known state of every key
    pub fn button_state(&self) -> ButtonSnapshot {
        lock(&self.tracker).snapshot().clone()
    }

    /// Subscribe to panel events
    pub fn on<F>(&self, topic: Topic, handler: F, policy: ThrottlePolicy) -> SubscriptionId
    where
        F: Fn(&PanelEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(topic, handler, policy)
    }

    /// Remove one listener
    pub fn off(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Remove every listener, e.g. when switching to another page of keys
    pub fn remove_all_listeners(&self) {
        self.events.unsubscribe_all();
    }

    /// Feed one input report: publish key edges, then the full state
    pub fn handle_input_report(&self, data: &[u8]) {
        process_report(&self.tracker, &self.events, data);
    }

    /// Start delivering input reports from the transport to listeners.
    ///
    /// Returns `false` if the input stream was already taken.
    pub fn start_listening(&self) -> bool {
        let Some(mut input) = self.transport.take_input() else {
            warn!("Input stream already taken");
            return false;
        };

        let tracker = self.tracker.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            while let Some(report) = input.recv().await {
                process_report(&tracker, &events, &report);
            }
            info!("Input stream ended");
        });

        *lock(&self.listener) = Some(task);
        true
    }

    /// Reset the device, then release it (see [`PanelController::close`]).
    ///
    /// Failures are logged; a half-written image is abandoned.
    pub async fn shutdown(&self) {
        info!("Shutting down panel...");

        if let Err(e) = self.reset().await {
            warn!("Reset on shutdown failed: {}", e);
        }
        self.close().await;
    }

    /// Stop listening, drop listeners and release the transport, leaving the
    /// keys as they are
    pub async fn close(&self) {
        if let Some(task) = lock(&self.listener).take() {
            task.abort();
        }
        self.remove_all_listeners();

        let transport = self.transport.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || transport.close()).await {
            warn!("Closing transport failed: {}", e);
        }
        info!("Panel released");
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn process_report(tracker: &Mutex<ButtonStateTracker>, events: &EventDispatcher, data: &[u8]) {
    // Release the tracker before running listeners
    let Some(update) = lock(tracker).on_raw_report(data) else {
        return;
    };

    for change in &update.changes {
        let event = if change.pressed {
            PanelEvent::Press(change.button)
        } else {
            PanelEvent::Release(change.button)
        };
        events.publish(&event);
    }
    events.publish(&PanelEvent::State(update.snapshot));
}
