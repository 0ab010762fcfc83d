use async_trait::async_trait;
use thiserror::Error;

use crate::models::{self, DeviceConfig};

mod common;

// Device implementation modules

mod dummy;
mod file;
mod ws2812spi;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("i/o error: {0}")]
    FuturesIo(#[from] futures_io::Error),
    #[error("format error: {0}")]
    FormatError(#[from] std::fmt::Error),
}

#[async_trait]
trait DeviceImpl: Send {
    /// Set the device implementation's view of the LED data to the given values
    ///
    /// # Panics
    ///
    /// Implementations are allowed to panic if led_data.len() != hardware_led_count. The [Device]
    /// wrapper is responsible for ensuring the given slice is the right size.
    async fn set_led_data(&mut self, led_data: &[models::Color]) -> Result<(), DeviceError>;

    /// Update the device implementation's temporal data. For devices that require regular rewrites
    /// (regardless of actual changes in the LED data), this should return a future that performs
    /// the required work.
    async fn update(&mut self) -> Result<(), DeviceError>;
}

/// Physical output for the light: a fixed-size strip of identical pixels.
///
/// The pixel count comes from the device configuration and never changes
/// after construction. This system has no per-pixel addressing, so the only
/// write primitive is [`Device::fill`], which broadcasts one color to the
/// whole strip and commits it in a single device write.
pub struct Device {
    name: String,
    inner: Box<dyn DeviceImpl>,
    led_data: Vec<models::Color>,
}

impl Device {
    fn build_inner(config: models::Device) -> Result<Box<dyn DeviceImpl>, DeviceError> {
        let inner: Box<dyn DeviceImpl>;
        match config {
            models::Device::Dummy(dummy) => {
                inner = Box::new(dummy::DummyDevice::new(dummy)?);
            }
            models::Device::Ws2812Spi(ws2812spi) => {
                inner = Box::new(ws2812spi::Ws2812SpiDevice::new(ws2812spi)?);
            }
            models::Device::File(file) => {
                inner = Box::new(file::FileDevice::new(file)?);
            }
        }

        Ok(inner)
    }

    #[instrument(skip(config))]
    pub async fn new(name: &str, config: models::Device) -> Result<Self, DeviceError> {
        let led_count = config.hardware_led_count();
        let inner = Self::build_inner(config)?;

        Ok(Self {
            name: name.to_owned(),
            inner,
            led_data: vec![Default::default(); led_count],
        })
    }

    /// Broadcast `color` to every pixel and commit the frame
    #[instrument]
    pub async fn fill(&mut self, color: models::Color) -> Result<(), DeviceError> {
        self.led_data.fill(color);
        self.inner.set_led_data(&self.led_data).await
    }

    /// Drive the device's periodic rewrite cycle, if it has one
    #[instrument]
    pub async fn update(&mut self) -> Result<(), DeviceError> {
        self.inner.update().await
    }

    pub fn led_count(&self) -> usize {
        self.led_data.len()
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Color;

    fn temp_output(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("neolight-{}-{}.txt", tag, std::process::id()))
    }

    #[tokio::test]
    async fn led_count_comes_from_config() {
        let device = Device::new(
            "test",
            models::Device::Dummy(models::Dummy {
                hardware_led_count: 7,
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert_eq!(device.led_count(), 7);
    }

    #[tokio::test]
    async fn fill_commits_every_pixel() {
        let path = temp_output("fill-commits");
        let _ = std::fs::remove_file(&path);

        let mut device = Device::new(
            "test",
            models::Device::File(models::File {
                hardware_led_count: 4,
                rewrite_time: 0,
                output: path.to_str().unwrap().to_owned(),
                print_time_stamp: false,
            }),
        )
        .await
        .unwrap();

        device.fill(Color::new(10, 20, 30)).await.unwrap();
        device.fill(Color::new(0, 0, 0)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], " [{10,20,30}{10,20,30}{10,20,30}{10,20,30}]");
        assert_eq!(lines[1], " [{0,0,0}{0,0,0}{0,0,0}{0,0,0}]");

        let _ = std::fs::remove_file(&path);
    }
}
