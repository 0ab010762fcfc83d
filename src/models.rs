use ambassador::{delegatable_trait, Delegate};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// 8-bit RGB color as stored in the canonical state and sent to devices
pub type Color = palette::rgb::LinSrgb<u8>;

fn default_false() -> bool {
    false
}

fn default_hardware_led_count() -> u32 {
    32
}

fn default_mqtt_host() -> String {
    "localhost".to_owned()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_keep_alive() -> u64 {
    60
}

fn default_reconnect_time() -> u32 {
    5000
}

fn default_command_topic() -> String {
    "homeassistant/light/neopixel/set".to_owned()
}

fn default_state_topic() -> String {
    "homeassistant/light/neopixel/state".to_owned()
}

fn default_config_topic() -> String {
    "homeassistant/light/neopixel/config".to_owned()
}

/// MQTT broker connection and topic settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct MqttConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    /// Client id announced to the broker. Defaults to `neolight-<hostname>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Keep-alive interval, in seconds
    #[validate(range(min = 1))]
    pub keep_alive: u64,
    /// Delay before polling the broker again after a connection error, in ms
    #[validate(range(min = 100))]
    pub reconnect_time: u32,
    #[validate(length(min = 1))]
    pub command_topic: String,
    #[validate(length(min = 1))]
    pub state_topic: String,
    /// Topic for the retained Home Assistant discovery payload
    #[validate(length(min = 1))]
    pub config_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: None,
            username: None,
            password: None,
            keep_alive: default_keep_alive(),
            reconnect_time: default_reconnect_time(),
            command_topic: default_command_topic(),
            state_topic: default_state_topic(),
            config_topic: default_config_topic(),
        }
    }
}

/// Identity advertised in the Home Assistant discovery payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Identity {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub unique_id: String,
    #[validate(length(min = 1))]
    pub identifier: String,
    pub manufacturer: String,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            name: "NeoPixel HAT".to_owned(),
            unique_id: "neopixel_pi_light".to_owned(),
            identifier: "neopixel_pi".to_owned(),
            manufacturer: "Raspberry Pi".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorOrder {
    Rgb,
    Bgr,
    Rbg,
    Brg,
    Gbr,
    Grb,
}

impl ColorOrder {
    pub fn reorder_from_rgb(&self, color: Color) -> Color {
        let (r, g, b) = color.into_components();

        Color::from_components(match self {
            ColorOrder::Rgb => (r, g, b),
            ColorOrder::Bgr => (b, g, r),
            ColorOrder::Rbg => (r, b, g),
            ColorOrder::Brg => (b, r, g),
            ColorOrder::Gbr => (g, b, r),
            ColorOrder::Grb => (g, r, b),
        })
    }
}

impl Default for ColorOrder {
    fn default() -> Self {
        Self::Rgb
    }
}

#[delegatable_trait]
pub trait DeviceConfig: Sync + Send {
    fn hardware_led_count(&self) -> usize;

    fn rewrite_time(&self) -> Option<std::time::Duration> {
        None
    }
}

macro_rules! impl_device_config {
    ($t:ty) => {
        impl DeviceConfig for $t {
            fn hardware_led_count(&self) -> usize {
                self.hardware_led_count as _
            }

            fn rewrite_time(&self) -> Option<std::time::Duration> {
                if self.rewrite_time == 0 {
                    None
                } else {
                    Some(std::time::Duration::from_millis(self.rewrite_time as _))
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DummyDeviceMode {
    Text,
    Ansi,
}

impl Default for DummyDeviceMode {
    fn default() -> Self {
        Self::Text
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Dummy {
    #[validate(range(min = 1))]
    pub hardware_led_count: u32,
    pub rewrite_time: u32,
    pub mode: DummyDeviceMode,
}

impl_device_config!(Dummy);

impl Default for Dummy {
    fn default() -> Self {
        Self {
            hardware_led_count: default_hardware_led_count(),
            rewrite_time: 0,
            mode: Default::default(),
        }
    }
}

fn default_ws_spi_rate() -> i32 {
    3000000
}

fn default_ws_spi_rewrite_time() -> u32 {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Ws2812Spi {
    #[serde(default = "Default::default")]
    pub color_order: ColorOrder,
    #[serde(default = "default_hardware_led_count")]
    #[validate(range(min = 1))]
    pub hardware_led_count: u32,
    #[serde(default = "default_false")]
    pub invert: bool,
    pub output: String,
    #[serde(default = "default_ws_spi_rate")]
    pub rate: i32,
    #[serde(default = "default_ws_spi_rewrite_time")]
    pub rewrite_time: u32,
}

impl_device_config!(Ws2812Spi);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct File {
    #[serde(default = "default_hardware_led_count")]
    #[validate(range(min = 1))]
    pub hardware_led_count: u32,
    #[serde(default = "Default::default")]
    pub rewrite_time: u32,
    pub output: String,
    #[serde(default = "default_false")]
    pub print_time_stamp: bool,
}

impl_device_config!(File);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Delegate)]
#[serde(rename_all = "lowercase", tag = "type")]
#[delegate(DeviceConfig)]
pub enum Device {
    Dummy(Dummy),
    Ws2812Spi(Ws2812Spi),
    File(File),
}

impl Default for Device {
    fn default() -> Self {
        Self::Dummy(Dummy::default())
    }
}

impl Validate for Device {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Device::Dummy(device) => device.validate(),
            Device::Ws2812Spi(device) => device.validate(),
            Device::File(device) => device.validate(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Full daemon configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    #[validate(nested)]
    pub mqtt: MqttConfig,
    #[validate(nested)]
    pub identity: Identity,
    #[validate(nested)]
    pub device: Device,
}

impl Config {
    pub async fn load_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        use tokio::io::AsyncReadExt;

        let mut file = tokio::fs::File::open(path).await?;
        let mut full = String::new();
        file.read_to_string(&mut full).await?;

        Ok(toml::from_str(&full)?)
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        config.validate().unwrap();

        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.device.hardware_led_count(), 32);
        assert_eq!(config.device.rewrite_time(), None);
    }

    #[test]
    fn parse_ws2812spi_device() {
        let config: Config = toml::from_str(
            r#"
            [device]
            type = "ws2812spi"
            output = "/dev/spidev0.0"
            hardwareLedCount = 16
            "#,
        )
        .unwrap();

        config.validate().unwrap();
        assert_eq!(config.device.hardware_led_count(), 16);
        assert_eq!(
            config.device.rewrite_time(),
            Some(std::time::Duration::from_millis(1000))
        );

        match config.device {
            Device::Ws2812Spi(ref spi) => {
                assert_eq!(spi.output, "/dev/spidev0.0");
                assert_eq!(spi.rate, 3000000);
            }
            ref other => panic!("unexpected device: {:?}", other),
        }
    }

    #[test]
    fn reject_zero_led_count() {
        let config: Config = toml::from_str(
            r#"
            [device]
            type = "dummy"
            hardwareLedCount = 0
            "#,
        )
        .unwrap();

        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let serialized = config.to_string().unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config, parsed);
    }
}
