pub mod config;
pub mod device;
pub mod display;
pub mod error;
pub mod events;
pub mod input;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use config::{ButtonConfig, Config};
use device::{HidTransport, PanelController};
use display::parse_hex_color;
use events::{EventKind, PanelEvent, ThrottlePolicy, Topic};

pub use error::{PanelError, Result as PanelResult};

/// Open the configured panel over HID
pub async fn connect(config: &Config) -> Result<PanelController> {
    let options = config.hid_options();
    let transport = tokio::task::spawn_blocking(move || HidTransport::open(&options))
        .await
        .context("Device open task failed")??;
    info!("Connected to device");
    Ok(PanelController::new(
        Arc::new(transport),
        config.panel_options(),
    ))
}

/// Main application struct
pub struct App {
    config: Config,
    panel: PanelController,
    events: mpsc::UnboundedReceiver<PanelEvent>,
}

impl App {
    /// Connect to the panel and subscribe to key events
    pub async fn new(config: Config) -> Result<Self> {
        let panel = connect(&config).await?;

        let (tx, events) = mpsc::unbounded_channel();
        let policy = config.events.throttle_policy();
        for kind in [EventKind::Press, EventKind::Release] {
            let tx = tx.clone();
            panel.on(
                Topic::Category(kind),
                move |event: &PanelEvent| {
                    // Receiver only goes away on shutdown
                    let _ = tx.send(event.clone());
                },
                policy,
            );
        }
        panel.on(
            Topic::Category(EventKind::State),
            |event: &PanelEvent| {
                if let PanelEvent::State(snapshot) = event {
                    debug!("Pressed keys: {:?}", snapshot.pressed());
                }
            },
            ThrottlePolicy::none(),
        );

        Ok(Self {
            config,
            panel,
            events,
        })
    }

    /// Run the main application loop
    pub async fn run(&mut self) -> Result<()> {
        // Reset device to accept new images, then wake up
        info!("Resetting device for new session...");
        self.panel.reset().await?;
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        self.panel
            .set_brightness(self.config.device.brightness)
            .await?;

        self.render_all().await;
        self.panel.start_listening();

        info!("Running - press keys on the panel");
        while let Some(event) = self.events.recv().await {
            self.handle_event(event).await;
        }
        Ok(())
    }

    /// Draw every configured key in its idle look
    async fn render_all(&self) {
        for button in &self.config.buttons {
            self.render_idle(button).await;
        }
        info!("Initial display render complete");
    }

    async fn render_idle(&self, button: &ButtonConfig) {
        let result = match (&button.image, &button.color) {
            (Some(image), _) => self.panel.draw_image_file(image, button.button).await,
            (None, Some(color)) => match parse_hex_color(color) {
                Some(color) => self.panel.draw_color(color, button.button).await,
                None => {
                    warn!("Invalid color '{}' for button {}", color, button.button);
                    return;
                }
            },
            (None, None) => self.panel.clear_button(button.button).await,
        };
        if let Err(e) = result {
            warn!("Failed to draw button {}: {}", button.button, e);
        }
    }

    fn button_config(&self, button: u8) -> Option<&ButtonConfig> {
        self.config.buttons.iter().find(|b| b.button == button)
    }

    async fn handle_event(&self, event: PanelEvent) {
        match event {
            PanelEvent::Press(button) => {
                info!("Button {} pressed", button);
                let color = self
                    .button_config(button)
                    .and_then(|b| b.pressed_color.as_deref())
                    .and_then(parse_hex_color);
                if let Some(color) = color {
                    if let Err(e) = self.panel.draw_color(color, button).await {
                        warn!("Failed to highlight button {}: {}", button, e);
                    }
                }
            }
            PanelEvent::Release(button) => {
                info!("Button {} released", button);
                if let Some(config) = self.button_config(button) {
                    if config.pressed_color.is_some() {
                        self.render_idle(config).await;
                    }
                }
            }
            PanelEvent::State(_) => {}
        }
    }

    /// Gracefully shutdown the application
    pub async fn shutdown(&mut self) {
        info!("Shutting down panel-deck...");
        self.panel.shutdown().await;
        info!("Shutdown complete");
    }
}
