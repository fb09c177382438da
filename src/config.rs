use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::device::{HidOptions, PanelOptions, PRODUCT_ID, VENDOR_ID};
use crate::display::DEFAULT_IMAGE_CACHE_CAPACITY;
use crate::events::ThrottlePolicy;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub events: EventsConfig,
    pub cache: CacheConfig,
    pub buttons: Vec<ButtonConfig>,
}

impl Config {
    /// Load configuration from file or create default
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            // Create default config
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: Config =
            toml::from_str(&contents).with_context(|| format!("Invalid config {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")?;
        Ok(PathBuf::from(home).join(".config/panel-deck/config.toml"))
    }

    pub fn hid_options(&self) -> HidOptions {
        HidOptions {
            vendor_id: self.device.vendor_id,
            product_id: self.device.product_id,
            serial: self.device.serial.clone(),
            read_timeout_ms: self.device.read_timeout_ms,
        }
    }

    pub fn panel_options(&self) -> PanelOptions {
        PanelOptions {
            image_cache_capacity: self.cache.image_capacity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Serial number, when several panels are attached
    pub serial: Option<String>,
    /// Brightness applied on startup (0-100)
    pub brightness: u8,
    /// Reader thread poll timeout in milliseconds
    pub read_timeout_ms: i32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            vendor_id: VENDOR_ID,
            product_id: PRODUCT_ID,
            serial: None,
            brightness: 80,
            read_timeout_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Minimum time between two runs of a listener
    pub throttle_ms: u64,
    /// Run the first event of a burst immediately
    pub leading: bool,
    /// Run the last suppressed event once the interval has passed
    pub trailing: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 200,
            leading: true,
            trailing: false,
        }
    }
}

impl EventsConfig {
    /// Throttle policy for key listeners; 0 ms disables throttling
    pub fn throttle_policy(&self) -> ThrottlePolicy {
        if self.throttle_ms == 0 {
            return ThrottlePolicy::none();
        }
        ThrottlePolicy::default()
            .with_interval(Duration::from_millis(self.throttle_ms))
            .with_leading(self.leading)
            .with_trailing(self.trailing)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Decoded icons kept in memory (0 disables the cache)
    pub image_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            image_capacity: DEFAULT_IMAGE_CACHE_CAPACITY,
        }
    }
}

/// What to show on one key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    /// Logical key number (1-15)
    pub button: u8,
    /// Idle color (hex)
    pub color: Option<String>,
    /// Idle image, drawn instead of `color`
    pub image: Option<PathBuf>,
    /// Color while held down (hex)
    pub pressed_color: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.device.vendor_id, VENDOR_ID);
        assert_eq!(config.device.product_id, PRODUCT_ID);
        assert_eq!(config.device.brightness, 80);
        assert_eq!(config.cache.image_capacity, DEFAULT_IMAGE_CACHE_CAPACITY);
        assert_eq!(config.events.throttle_policy(), ThrottlePolicy::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r##"
[device]
brightness = 55

[events]
throttle_ms = 0

[[buttons]]
button = 3
color = "#FF0000"
pressed_color = "#FFFFFF"
"##,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.device.brightness, 55);
        assert_eq!(config.device.vendor_id, VENDOR_ID);
        assert!(!config.events.throttle_policy().enabled);
        assert_eq!(config.buttons.len(), 1);
        assert_eq!(config.buttons[0].button, 3);
        assert_eq!(config.buttons[0].color.as_deref(), Some("#FF0000"));
        assert!(config.buttons[0].image.is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = Config::default();
        config.device.serial = Some("AL12345".to_string());
        config.events.trailing = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.device.serial.as_deref(), Some("AL12345"));
        assert!(loaded.events.throttle_policy().trailing);
    }
}
