//! drivex-core: closed-loop maneuver primitives for differential-drive robots
//!
//! Drives a ground robot through short autonomous maneuvers by turning noisy,
//! discrete sensor samples (gyro heading, tilt, reflectance, color) into
//! continuous drive commands under an explicit convergence and timeout policy.
//!
//! # Modules
//!
//! - [`math`] - Angle wraparound arithmetic and sliding-window filters
//! - [`hardware`] - Drivebase and sensor capability traits
//! - [`control`] - Heading control, predicate-gated drives, timed drives
//! - [`sim`] - Kinematic drivebase simulation and scripted sensors for tests
//!
//! # Control model
//!
//! ```text
//! mission layer (out of scope)
//!       │ calls, one at a time
//!       ▼
//! ┌──────────────────────────────────────────────┐
//! │ primitive loop:                              │
//! │   read sensor → compute → drive() → sleep    │
//! │   until Converged / TimedOut / PredicateMet  │
//! └──────────────────────────────────────────────┘
//!       │ always
//!       ▼
//!    stop()
//! ```
//!
//! Every primitive is single-threaded and blocking: the fixed sleep between
//! polls is the only suspension point, and the drivebase and sensors are
//! exclusively borrowed for the duration of the call. Failure to converge is
//! reported as a tagged outcome in the primitive's report, never as an error;
//! `Err` is reserved for the driver layer (see [`Error`]).

#![warn(unused_must_use)]

pub mod control;
pub mod hardware;
pub mod math;
pub mod sim;

// Re-exports for convenience
pub use control::{
    drive_for_duration, drive_to_ramp_and_settle, drive_until, turn_to_heading_p,
    turn_to_heading_pd, BiasedPd, ColorMatch, GateConfig, GateOutcome, GateReport,
    ReflectanceBelow, SpeedOverride, StopProbe, TiltAxis, TiltSettled, TimedCommand, TimedReport,
    TurnCommand, TurnOutcome, TurnReport,
};
pub use hardware::{
    Color, ColorSource, DriveBase, HeadingSource, MotionSettings, ReflectanceSource, TiltSource,
};
pub use math::{
    normalize_degrees, relative_turn, shortest_error, Filter, LowPassFilter, MovingAverageFilter,
};
pub use sim::SimRobot;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error types for drivex-core
///
/// Only the driver layer produces errors: a sensor or drivebase call that
/// fails surfaces here and is propagated with `?`. Non-convergence and
/// unmet stop predicates are not errors; they are tagged outcomes carried
/// in the primitive's report (see [`control::TurnOutcome`] and
/// [`control::GateOutcome`]).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration parameter, including configurations whose exit
    /// condition is unreachable (e.g. a rate tolerance at or below the
    /// static bias).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hardware-level error from the drivebase or a sensor.
    /// Handle by: checking the device, ensuring a safe state before retry.
    #[error("Hardware error: {0}")]
    Hardware(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Hardware(format!("I/O error: {}", e))
    }
}

/// Result type alias for drivex-core operations
pub type Result<T> = std::result::Result<T, Error>;
