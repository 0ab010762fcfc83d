//! Light-state merge-and-render engine
//!
//! This is the heart of the daemon: it owns the canonical light state, merges
//! partial updates into it, derives the physically-rendered color, writes it
//! to the device, and hands back the canonical state for publication.

use thiserror::Error;

use crate::{
    api::message::{ChannelUpdate, LightCommand},
    device::{Device, DeviceError},
    models::Color,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

/// Canonical light state, the single source of truth reported to observers.
///
/// `color` and `brightness` are retained independently of `on`: turning the
/// light off keeps the last-known look, so turning it back on restores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightState {
    pub on: bool,
    pub color: Color,
    pub brightness: u8,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            on: false,
            color: Color::new(255, 255, 255),
            brightness: 255,
        }
    }
}

impl LightState {
    /// Merge a partial update into this state, field by field.
    ///
    /// Pure overwrite semantics: present fields replace their counterpart,
    /// absent fields (including individual color channels) keep the previous
    /// value. Applying the same command twice gives the same state.
    pub fn merged(&self, command: &LightCommand) -> Self {
        let mut next = *self;

        if let Some(state) = command.state {
            next.on = state.into();
        }

        if let Some(ChannelUpdate { r, g, b }) = command.color {
            let (prev_r, prev_g, prev_b) = next.color.into_components();
            next.color = Color::from_components((
                r.unwrap_or(prev_r),
                g.unwrap_or(prev_g),
                b.unwrap_or(prev_b),
            ));
        }

        if let Some(brightness) = command.brightness {
            next.brightness = brightness;
        }

        next
    }

    /// Color physically written to the strip: brightness-scaled when on,
    /// black when off. The canonical color and brightness are not affected.
    pub fn rendered_color(&self) -> Color {
        if !self.on {
            return Color::new(0, 0, 0);
        }

        let (r, g, b) = self.color.into_components();
        Color::new(
            scale(r, self.brightness),
            scale(g, self.brightness),
            scale(b, self.brightness),
        )
    }
}

/// 8-bit brightness scaling with integer truncation
fn scale(channel: u8, brightness: u8) -> u8 {
    ((channel as u32 * brightness as u32) / 255) as u8
}

/// Owns the canonical state and the output device.
///
/// Not reentrant: the surrounding task must apply updates serially, so that
/// merge and render are atomic with respect to the canonical state. The MQTT
/// task owns the engine exclusively, which provides that discipline without
/// locks.
pub struct Engine {
    state: LightState,
    device: Device,
}

impl Engine {
    pub fn new(device: Device) -> Self {
        Self {
            state: LightState::default(),
            device,
        }
    }

    /// Snapshot of the canonical state
    pub fn state(&self) -> LightState {
        self.state
    }

    /// Apply a partial update: merge, render to the device, then commit.
    ///
    /// The device is written exactly once per call. If the write fails, the
    /// canonical state is left exactly as it was and the error is returned;
    /// there is no partial application.
    #[instrument(skip(self))]
    pub async fn apply_update(
        &mut self,
        command: &LightCommand,
    ) -> Result<LightState, EngineError> {
        let next = self.state.merged(command);
        self.device.fill(next.rendered_color()).await?;
        self.state = next;

        debug!(
            on = next.on,
            red = next.color.red,
            green = next.color.green,
            blue = next.color.blue,
            brightness = next.brightness,
            "applied update"
        );

        Ok(next)
    }

    /// Drive the device's periodic rewrite cycle
    pub async fn update(&mut self) -> Result<(), EngineError> {
        Ok(self.device.update().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::message::PowerState;
    use crate::models;

    async fn test_engine() -> Engine {
        let device = Device::new("test", models::Device::Dummy(models::Dummy::default()))
            .await
            .unwrap();
        Engine::new(device)
    }

    fn on_command() -> LightCommand {
        LightCommand {
            state: Some(PowerState::On),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let state = LightState::default();

        assert!(!state.on);
        assert_eq!(state.color, Color::new(255, 255, 255));
        assert_eq!(state.brightness, 255);
    }

    #[test]
    fn brightness_alone_changes_nothing_else() {
        let state = LightState::default();
        let next = state.merged(&LightCommand {
            brightness: Some(128),
            ..Default::default()
        });

        assert_eq!(next.on, state.on);
        assert_eq!(next.color, state.color);
        assert_eq!(next.brightness, 128);
    }

    #[test]
    fn partial_color_keeps_other_channels() {
        let state = LightState {
            on: true,
            color: Color::new(1, 2, 3),
            brightness: 255,
        };

        let next = state.merged(&LightCommand {
            color: Some(ChannelUpdate {
                g: Some(200),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert_eq!(next.color, Color::new(1, 200, 3));
    }

    #[test]
    fn merge_is_idempotent() {
        let state = LightState::default();
        let command = LightCommand {
            state: Some(PowerState::On),
            color: Some(ChannelUpdate {
                r: Some(10),
                g: None,
                b: Some(30),
            }),
            brightness: Some(100),
        };

        let once = state.merged(&command);
        let twice = once.merged(&command);

        assert_eq!(once, twice);
    }

    #[test]
    fn scaling_truncates() {
        let state = LightState {
            on: true,
            color: Color::new(200, 100, 50),
            brightness: 128,
        };

        assert_eq!(state.rendered_color(), Color::new(100, 50, 25));
    }

    #[test]
    fn full_brightness_is_identity() {
        for channel in 0..=255u8 {
            assert_eq!(scale(channel, 255), channel);
        }
    }

    lazy_static::lazy_static! {
        static ref BASE_COLORS: [Color; 8] = [
            Color::new(0, 0, 0),
            Color::new(255, 255, 255),
            Color::new(255, 0, 0),
            Color::new(0, 255, 0),
            Color::new(0, 0, 255),
            Color::new(255, 255, 0),
            Color::new(0, 255, 255),
            Color::new(255, 0, 255),
        ];
    }

    #[test]
    fn off_renders_black_for_any_color() {
        for &color in &*BASE_COLORS {
            let state = LightState {
                on: false,
                color,
                brightness: 255,
            };

            assert_eq!(state.rendered_color(), Color::new(0, 0, 0));
        }
    }

    #[test]
    fn on_at_full_brightness_renders_canonical_color() {
        for &color in &*BASE_COLORS {
            let state = LightState {
                on: true,
                color,
                brightness: 255,
            };

            assert_eq!(state.rendered_color(), color);
        }
    }

    #[test]
    fn off_renders_black_but_keeps_canonical_values() {
        let state = LightState {
            on: false,
            color: Color::new(200, 100, 50),
            brightness: 128,
        };

        assert_eq!(state.rendered_color(), Color::new(0, 0, 0));
        assert_eq!(state.color, Color::new(200, 100, 50));
        assert_eq!(state.brightness, 128);
    }

    #[tokio::test]
    async fn snapshot_reports_canonical_not_scaled() {
        let mut engine = test_engine().await;

        let snapshot = engine
            .apply_update(&LightCommand {
                state: Some(PowerState::On),
                color: Some(ChannelUpdate {
                    r: Some(200),
                    g: Some(100),
                    b: Some(50),
                }),
                brightness: Some(128),
            })
            .await
            .unwrap();

        // The half-brightness scaling stays in the device frame
        assert_eq!(snapshot.color, Color::new(200, 100, 50));
        assert_eq!(snapshot.brightness, 128);
    }

    #[tokio::test]
    async fn off_then_on_restores_look() {
        let mut engine = test_engine().await;

        engine
            .apply_update(&LightCommand {
                state: Some(PowerState::On),
                color: Some(ChannelUpdate {
                    r: Some(12),
                    g: Some(34),
                    b: Some(56),
                }),
                brightness: Some(78),
            })
            .await
            .unwrap();

        let off = engine
            .apply_update(&LightCommand {
                state: Some(PowerState::Off),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(!off.on);
        assert_eq!(off.color, Color::new(12, 34, 56));
        assert_eq!(off.brightness, 78);

        let on = engine.apply_update(&on_command()).await.unwrap();

        assert!(on.on);
        assert_eq!(on.color, Color::new(12, 34, 56));
        assert_eq!(on.brightness, 78);
    }

    #[tokio::test]
    async fn apply_update_is_idempotent() {
        let mut engine = test_engine().await;
        let command = LightCommand {
            state: Some(PowerState::On),
            brightness: Some(42),
            ..Default::default()
        };

        let first = engine.apply_update(&command).await.unwrap();
        let second = engine.apply_update(&command).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.state(), second);
    }
}
