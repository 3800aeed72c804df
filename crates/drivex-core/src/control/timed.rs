//! Open-loop drive for a fixed wall-clock duration
//!
//! The fallback for maneuvers with no usable stop signal: push against the
//! wall for half a second, back out of the corner, and so on. Blind to
//! odometry drift, so only suitable for short, pre-tuned durations - prefer
//! a sensor-gated drive whenever one exists.
//!
//! A temporary speed override is scoped: the drivebase's [`MotionSettings`]
//! are snapshotted on entry and restored on every exit path, including a
//! mid-loop hardware error.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

use crate::hardware::{DriveBase, MotionSettings};
use crate::{Error, Result};

/// Partial override of [`MotionSettings`]
///
/// Only the fields set here change; the rest keep their snapshotted value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpeedOverride {
    pub straight_speed: Option<f64>,
    pub straight_accel: Option<f64>,
    pub turn_rate: Option<f64>,
    pub turn_accel: Option<f64>,
}

impl SpeedOverride {
    /// Override the straight-segment cruise speed
    pub fn with_straight_speed(mut self, speed: f64) -> Self {
        self.straight_speed = Some(speed);
        self
    }

    /// Override the straight-segment acceleration
    pub fn with_straight_accel(mut self, accel: f64) -> Self {
        self.straight_accel = Some(accel);
        self
    }

    /// Override the in-place turn rate
    pub fn with_turn_rate(mut self, rate: f64) -> Self {
        self.turn_rate = Some(rate);
        self
    }

    /// Override the in-place turn acceleration
    pub fn with_turn_accel(mut self, accel: f64) -> Self {
        self.turn_accel = Some(accel);
        self
    }

    /// Apply this override on top of a settings snapshot
    pub fn apply(&self, base: MotionSettings) -> MotionSettings {
        MotionSettings {
            straight_speed: self.straight_speed.unwrap_or(base.straight_speed),
            straight_accel: self.straight_accel.unwrap_or(base.straight_accel),
            turn_rate: self.turn_rate.unwrap_or(base.turn_rate),
            turn_accel: self.turn_accel.unwrap_or(base.turn_accel),
        }
    }
}

/// One timed drive, fully specified
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimedCommand {
    /// Forward speed (mm/s)
    pub speed: f64,
    /// Turn rate (deg/s)
    pub turn_rate: f64,
    /// How long to keep the command active
    pub duration: Duration,
    /// Re-issue period for the drive command
    pub tick: Duration,
    /// Temporary settings override, restored on exit
    pub speed_override: Option<SpeedOverride>,
}

impl TimedCommand {
    pub fn new(speed: f64, turn_rate: f64, duration: Duration) -> Self {
        Self {
            speed,
            turn_rate,
            duration,
            tick: Duration::from_millis(10),
            speed_override: None,
        }
    }

    /// Set the re-issue period
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Apply a temporary settings override for the duration of the drive
    pub fn with_speed_override(mut self, speed_override: SpeedOverride) -> Self {
        self.speed_override = Some(speed_override);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.tick.is_zero() {
            return Err(Error::Config("tick must be non-zero".into()));
        }
        Ok(())
    }
}

/// Result of a timed drive
#[derive(Debug, Clone, Copy)]
pub struct TimedReport {
    pub elapsed: Duration,
    /// Drive commands issued
    pub ticks: u64,
}

/// Drive open-loop for `cmd.duration`, then stop
///
/// Snapshots the motion settings, applies the override (if any), re-issues
/// the drive command every tick until the deadline, stops, and restores the
/// snapshot. Stop and restore both happen even when the loop fails mid-way;
/// the loop's error wins over any stop/restore error.
pub fn drive_for_duration<D: DriveBase>(drive: &mut D, cmd: &TimedCommand) -> Result<TimedReport> {
    cmd.validate()?;
    let saved = drive.settings()?;

    let looped = (|| {
        if let Some(speed_override) = &cmd.speed_override {
            drive.set_settings(speed_override.apply(saved))?;
        }
        timed_loop(&mut *drive, cmd)
    })();

    let stopped = drive.stop();
    let restored = drive.set_settings(saved);
    let report = looped?;
    stopped?;
    restored?;
    Ok(report)
}

fn timed_loop<D: DriveBase>(drive: &mut D, cmd: &TimedCommand) -> Result<TimedReport> {
    let start = Instant::now();
    let mut ticks = 0u64;
    while start.elapsed() < cmd.duration {
        drive.drive(cmd.speed, cmd.turn_rate)?;
        ticks += 1;
        let remaining = cmd.duration.saturating_sub(start.elapsed());
        thread::sleep(cmd.tick.min(remaining));
    }
    Ok(TimedReport {
        elapsed: start.elapsed(),
        ticks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRobot;

    #[test]
    fn test_speed_override_is_partial() {
        let base = MotionSettings::default();
        let adjusted = SpeedOverride::default().with_turn_rate(45.0).apply(base);
        assert_eq!(adjusted.turn_rate, 45.0);
        assert_eq!(adjusted.straight_speed, base.straight_speed);
        assert_eq!(adjusted.straight_accel, base.straight_accel);
        assert_eq!(adjusted.turn_accel, base.turn_accel);
    }

    #[test]
    fn test_drive_for_duration_runs_and_restores() {
        let robot = SimRobot::new();
        let snapshot = robot.settings();
        let cmd = TimedCommand::new(200.0, 0.0, Duration::from_millis(40))
            .with_tick(Duration::from_millis(5))
            .with_speed_override(SpeedOverride::default().with_straight_speed(500.0));

        let report = drive_for_duration(&mut robot.drivebase(), &cmd).unwrap();

        assert!(report.elapsed >= Duration::from_millis(40));
        assert!(report.ticks >= 1);
        assert!(!robot.is_driving());
        assert!(robot.stop_calls() >= 1);
        // The override is gone: exact pre-call snapshot restored.
        assert_eq!(robot.settings(), snapshot);
    }

    #[test]
    fn test_settings_restored_on_drive_fault() {
        let robot = SimRobot::new();
        let snapshot = robot.settings();
        robot.fail_next_drive();
        let cmd = TimedCommand::new(200.0, 0.0, Duration::from_millis(40))
            .with_speed_override(SpeedOverride::default().with_straight_speed(500.0));

        let result = drive_for_duration(&mut robot.drivebase(), &cmd);

        assert!(matches!(result, Err(Error::Hardware(_))));
        assert_eq!(robot.settings(), snapshot);
        assert!(!robot.is_driving());
        assert!(robot.stop_calls() >= 1);
    }

    #[test]
    fn test_rejects_zero_tick() {
        let robot = SimRobot::new();
        let cmd = TimedCommand::new(100.0, 0.0, Duration::from_millis(10))
            .with_tick(Duration::ZERO);
        assert!(matches!(
            drive_for_duration(&mut robot.drivebase(), &cmd),
            Err(Error::Config(_))
        ));
    }
}
