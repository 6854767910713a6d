//! DVP camera sensor abstraction

use embassy_time::Duration;

/// Sensor frame rates supported by the DVP sensor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Fps {
    /// 5 frames per second
    Fps5,
    /// 10 frames per second
    Fps10,
    /// 20 frames per second
    Fps20,
    /// 25 frames per second
    Fps25,
    /// 30 frames per second
    Fps30,
}

impl Fps {
    /// Frames per second as an integer.
    #[must_use]
    pub const fn hz(self) -> u32 {
        match self {
            Self::Fps5 => 5,
            Self::Fps10 => 10,
            Self::Fps20 => 20,
            Self::Fps25 => 25,
            Self::Fps30 => 30,
        }
    }

    /// Nominal time between two frames.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // Safety: hz() is never zero
    pub fn frame_interval(self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.hz()))
    }
}

/// Rejected frame-rate value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UnsupportedFps(pub u32);

impl TryFrom<u32> for Fps {
    type Error = UnsupportedFps;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            5 => Ok(Self::Fps5),
            10 => Ok(Self::Fps10),
            20 => Ok(Self::Fps20),
            25 => Ok(Self::Fps25),
            30 => Ok(Self::Fps30),
            other => Err(UnsupportedFps(other)),
        }
    }
}

/// Sensor output configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CameraConfig {
    /// Output width in pixels
    pub width: u16,
    /// Output height in pixels
    pub height: u16,
    /// Output frame rate
    pub fps: Fps,
}

impl CameraConfig {
    /// Parameter word for the sensor driver: height in the upper half,
    /// frame rate in the lower half.
    #[must_use]
    pub fn packed(&self) -> u32 {
        (u32::from(self.height) << 16) | self.fps.hz()
    }
}

/// Camera errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CameraError {
    /// Sensor did not acknowledge on the control bus
    NoAck,
    /// Sensor has no register table for the requested mode
    UnsupportedMode,
}

impl core::fmt::Display for CameraError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoAck => write!(f, "camera sensor not responding"),
            Self::UnsupportedMode => write!(f, "camera mode not supported"),
        }
    }
}

/// Camera sensor on the DVP port.
pub trait CameraSensor {
    /// Error type
    type Error: core::fmt::Debug + From<CameraError>;

    /// Program resolution and frame rate over SCCB/I2C
    fn set_config(&mut self, config: &CameraConfig) -> Result<(), Self::Error>;

    /// Start streaming into the DVP port
    fn start(&mut self) -> Result<(), Self::Error>;

    /// Stop streaming
    fn stop(&mut self) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_parse() {
        assert_eq!(Fps::try_from(25), Ok(Fps::Fps25));
        assert_eq!(Fps::try_from(15), Err(UnsupportedFps(15)));
    }

    #[test]
    fn test_packed_word() {
        let cfg = CameraConfig {
            width: 480,
            height: 272,
            fps: Fps::Fps20,
        };
        assert_eq!(cfg.packed(), (272 << 16) | 20);
    }

    #[test]
    fn test_frame_interval() {
        assert_eq!(Fps::Fps25.frame_interval(), Duration::from_millis(40));
    }
}
