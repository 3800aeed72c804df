//! Capability traits for the drivebase and sensors
//!
//! Each trait covers exactly one device capability so a primitive can ask
//! for the narrowest set it needs: heading control wants `DriveBase +
//! HeadingSource`, a line gate wants `DriveBase + ReflectanceSource`, and
//! so on. Every call returns [`crate::Result`] so driver failures propagate
//! instead of panicking mid-maneuver.
//!
//! Units throughout: millimeters, degrees, seconds.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Snapshot of a drivebase's motion settings
///
/// Saved before a temporary speed override and restored on every exit path
/// of the overriding primitive (save-modify-restore, never global mutation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSettings {
    /// Cruise speed for straight segments (mm/s)
    pub straight_speed: f64,
    /// Acceleration for straight segments (mm/s²)
    pub straight_accel: f64,
    /// Rotational speed for in-place turns (deg/s)
    pub turn_rate: f64,
    /// Rotational acceleration for in-place turns (deg/s²)
    pub turn_accel: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            straight_speed: 200.0,
            straight_accel: 400.0,
            turn_rate: 90.0,
            turn_accel: 180.0,
        }
    }
}

impl MotionSettings {
    /// Set the straight-segment cruise speed
    pub fn with_straight_speed(mut self, speed: f64) -> Self {
        self.straight_speed = speed;
        self
    }

    /// Set the straight-segment acceleration
    pub fn with_straight_accel(mut self, accel: f64) -> Self {
        self.straight_accel = accel;
        self
    }

    /// Set the in-place turn rate
    pub fn with_turn_rate(mut self, rate: f64) -> Self {
        self.turn_rate = rate;
        self
    }

    /// Set the in-place turn acceleration
    pub fn with_turn_accel(mut self, accel: f64) -> Self {
        self.turn_accel = accel;
        self
    }
}

/// Discrete color sample from a color sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    /// Nothing detectable under the sensor
    None,
    Black,
    White,
    Red,
    Yellow,
    Green,
    Blue,
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Black => write!(f, "black"),
            Self::White => write!(f, "white"),
            Self::Red => write!(f, "red"),
            Self::Yellow => write!(f, "yellow"),
            Self::Green => write!(f, "green"),
            Self::Blue => write!(f, "blue"),
        }
    }
}

/// A differential drivebase
///
/// The drivebase owns its own odometry and motor control; this crate only
/// consumes the interface.
pub trait DriveBase {
    /// Start driving at `speed` (mm/s) while rotating at `turn_rate`
    /// (deg/s, positive counter-clockwise). Non-blocking: the command
    /// persists until the next `drive` or [`stop`](Self::stop).
    fn drive(&mut self, speed: f64, turn_rate: f64) -> Result<()>;

    /// Stop both motors. Idempotent; safe to call repeatedly.
    fn stop(&mut self) -> Result<()>;

    /// Drive straight for `distance` mm and hold, returning when done.
    fn straight(&mut self, distance: f64) -> Result<()>;

    /// Turn in place by `angle` degrees relative to the current heading,
    /// returning when done.
    fn turn(&mut self, angle: f64) -> Result<()>;

    /// Drive an arc of the given radius (mm) through `angle` degrees,
    /// returning when done.
    fn curve(&mut self, radius: f64, angle: f64) -> Result<()>;

    /// Read the current motion settings.
    fn settings(&mut self) -> Result<MotionSettings>;

    /// Replace the motion settings.
    fn set_settings(&mut self, settings: MotionSettings) -> Result<()>;
}

/// A gyroscopic heading source
pub trait HeadingSource {
    /// Current heading in degrees. Continuous: keeps increasing or
    /// decreasing past ±360 rather than wrapping, unless explicitly reset.
    fn heading(&mut self) -> Result<f64>;

    /// Reset the heading to `value` degrees.
    fn reset_heading(&mut self, value: f64) -> Result<()>;
}

/// A roll/pitch tilt source
pub trait TiltSource {
    /// Current `(roll, pitch)` in degrees.
    fn tilt(&mut self) -> Result<(f64, f64)>;
}

/// A surface reflectance source
pub trait ReflectanceSource {
    /// Reflected light intensity, 0 (black) to 100 (white).
    fn reflection(&mut self) -> Result<f64>;
}

/// A discrete color source
pub trait ColorSource {
    /// Latest color sample.
    fn color(&mut self) -> Result<Color>;

    /// Configure the discrimination palette. One-time calibration, not part
    /// of the per-tick hot path; samples outside the palette read as
    /// [`Color::None`].
    fn set_detectable_colors(&mut self, colors: &[Color]) -> Result<()>;
}
