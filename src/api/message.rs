use serde::de::Error;
use serde_derive::{Deserialize, Serialize};
use strum_macros::{EnumString, IntoStaticStr};

use crate::engine::LightState;
use crate::models::{Color, Config};

/// Power token used on both the command and state topics.
///
/// Inbound parsing is case-insensitive ("on", "ON", "On" are all accepted);
/// any other token fails deserialization. Outbound, the token is always
/// uppercase, which is what Home Assistant expects from a JSON schema light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, IntoStaticStr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum PowerState {
    On,
    Off,
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on {
            Self::On
        } else {
            Self::Off
        }
    }
}

impl From<PowerState> for bool {
    fn from(state: PowerState) -> Self {
        state == PowerState::On
    }
}

impl serde::Serialize for PowerState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(<&'static str>::from(self))
    }
}

impl<'de> serde::Deserialize<'de> for PowerState {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = <String as serde::Deserialize>::deserialize(deserializer)?;
        token
            .parse()
            .map_err(|_| D::Error::unknown_variant(&token, &["ON", "OFF"]))
    }
}

/// Partial color in a command: absent channels keep their previous value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelUpdate {
    pub r: Option<u8>,
    pub g: Option<u8>,
    pub b: Option<u8>,
}

/// Inbound payload on the command topic.
///
/// Every field is optional; absent fields leave the corresponding canonical
/// state field unchanged. Channel and brightness values are typed `u8`, so
/// out-of-range or non-numeric values are rejected at decode time rather than
/// clamped. Unknown keys are ignored, as Home Assistant may attach fields for
/// capabilities this light does not advertise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct LightCommand {
    pub state: Option<PowerState>,
    pub color: Option<ChannelUpdate>,
    pub brightness: Option<u8>,
}

/// Full RGB triple as reported on the state topic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbValue {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl From<Color> for RgbValue {
    fn from(color: Color) -> Self {
        let (r, g, b) = color.into_components();
        Self { r, g, b }
    }
}

impl From<RgbValue> for Color {
    fn from(value: RgbValue) -> Self {
        Color::from_components((value.r, value.g, value.b))
    }
}

/// Outbound payload on the state topic.
///
/// Always built from the canonical state, never from the brightness-scaled
/// values written to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightStatus {
    pub state: PowerState,
    pub brightness: u8,
    pub color: RgbValue,
}

impl From<LightState> for LightStatus {
    fn from(state: LightState) -> Self {
        Self {
            state: state.on.into(),
            brightness: state.brightness,
            color: state.color.into(),
        }
    }
}

/// Device block of the Home Assistant discovery payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
}

/// Retained Home Assistant MQTT discovery payload.
///
/// Static for the lifetime of the process; published on every (re)connect so
/// a restarted broker re-learns the light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryPayload {
    pub name: String,
    pub schema: String,
    pub command_topic: String,
    pub state_topic: String,
    pub brightness: bool,
    pub rgb: bool,
    pub supported_color_modes: Vec<String>,
    pub unique_id: String,
    pub device: DeviceInfo,
}

impl DiscoveryPayload {
    pub fn new(config: &Config) -> Self {
        Self {
            name: config.identity.name.clone(),
            schema: "json".to_owned(),
            command_topic: config.mqtt.command_topic.clone(),
            state_topic: config.mqtt.state_topic.clone(),
            brightness: true,
            rgb: true,
            supported_color_modes: vec!["rgb".to_owned()],
            unique_id: config.identity.unique_id.clone(),
            device: DeviceInfo {
                identifiers: vec![config.identity.identifier.clone()],
                name: config.identity.name.clone(),
                manufacturer: config.identity.manufacturer.clone(),
            },
        }
    }
}
