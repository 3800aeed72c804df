//! Open-loop drive gated on a polled stop predicate
//!
//! [`drive_until`] issues one drive command and then only watches a sensor:
//! sleep a poll interval, take a fresh sample, evaluate, repeat. The drive
//! command itself is never touched until the predicate fires (or the
//! optional timeout expires), at which point the drivebase is stopped.
//!
//! Probes implement [`StopProbe`]; each one owns exactly the sensor it
//! needs. [`TiltSettled`] is the only probe that accumulates state (a
//! sliding window) and the only one whose value is something other than the
//! triggering sample: it reports the window mean.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

use crate::hardware::{Color, ColorSource, DriveBase, ReflectanceSource, TiltSource};
use crate::math::{Filter, MovingAverageFilter};
use crate::{Error, Result};

/// A polled stop condition
///
/// `poll` takes one fresh sample and returns `Some(value)` when the
/// condition is satisfied. Implementations must sample on every call;
/// the gate loop guarantees exactly one poll per tick.
pub trait StopProbe {
    type Value;

    /// Take one fresh sample and evaluate the stop condition.
    fn poll(&mut self) -> Result<Option<Self::Value>>;

    /// Clear accumulated state (sliding windows), if any.
    fn reset(&mut self) {}
}

/// Loop options for a gated drive
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GateConfig {
    /// Sleep between predicate polls
    pub poll_interval: Duration,
    /// Give-up deadline. The default `None` waits forever, matching "drive
    /// until you physically reach the line" - but a missing or occluded
    /// sensor then blocks indefinitely, so set one for anything unattended.
    pub timeout: Option<Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            timeout: None,
        }
    }
}

impl GateConfig {
    /// Set the poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the give-up deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll_interval must be non-zero".into()));
        }
        Ok(())
    }
}

/// How a gated drive ended
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateOutcome<T> {
    /// The predicate fired; the value it produced.
    PredicateMet(T),
    /// The deadline expired without the predicate ever firing.
    PredicateNeverMet,
}

/// Result of a gated drive
#[derive(Debug, Clone, Copy)]
pub struct GateReport<T> {
    pub outcome: GateOutcome<T>,
    pub elapsed: Duration,
    /// Predicate polls performed
    pub polls: u64,
}

impl<T> GateReport<T> {
    /// Whether the predicate fired
    pub fn met(&self) -> bool {
        matches!(self.outcome, GateOutcome::PredicateMet(_))
    }

    /// The predicate's value, if it fired
    pub fn value(&self) -> Option<&T> {
        match &self.outcome {
            GateOutcome::PredicateMet(value) => Some(value),
            GateOutcome::PredicateNeverMet => None,
        }
    }
}

/// Fires when reflected light drops below a threshold (a dark line under
/// the sensor). Value: the triggering reading.
#[derive(Debug)]
pub struct ReflectanceBelow<R> {
    sensor: R,
    threshold: f64,
}

impl<R: ReflectanceSource> ReflectanceBelow<R> {
    pub fn new(sensor: R, threshold: f64) -> Self {
        Self { sensor, threshold }
    }
}

impl<R: ReflectanceSource> StopProbe for ReflectanceBelow<R> {
    type Value = f64;

    fn poll(&mut self) -> Result<Option<f64>> {
        let reading = self.sensor.reflection()?;
        Ok((reading < self.threshold).then_some(reading))
    }
}

/// Fires when the color sensor reports the target color. Value: the
/// matched color.
#[derive(Debug)]
pub struct ColorMatch<C> {
    sensor: C,
    target: Color,
}

impl<C: ColorSource> ColorMatch<C> {
    pub fn new(sensor: C, target: Color) -> Self {
        Self { sensor, target }
    }
}

impl<C: ColorSource> StopProbe for ColorMatch<C> {
    type Value = Color;

    fn poll(&mut self) -> Result<Option<Color>> {
        let sample = self.sensor.color()?;
        Ok((sample == self.target).then_some(sample))
    }
}

/// Which tilt axis a [`TiltSettled`] probe watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TiltAxis {
    Roll,
    /// Ramp settling is a pitch phenomenon; the default.
    Pitch,
}

/// Fires when the mean of the last `window` tilt samples is within
/// `tolerance` of level. Value: that mean, in degrees.
///
/// The probe never fires on a partial window, so the first few samples of
/// a bumpy ramp transition cannot end the maneuver early.
#[derive(Debug)]
pub struct TiltSettled<T> {
    sensor: T,
    window: MovingAverageFilter,
    tolerance: f64,
    axis: TiltAxis,
}

impl<T: TiltSource> TiltSettled<T> {
    pub fn new(sensor: T, window: usize, tolerance: f64) -> Result<Self> {
        if window == 0 {
            return Err(Error::Config("tilt window must be > 0".into()));
        }
        if !(tolerance > 0.0) {
            return Err(Error::Config("tilt tolerance must be positive".into()));
        }
        Ok(Self {
            sensor,
            window: MovingAverageFilter::new(window),
            tolerance,
            axis: TiltAxis::Pitch,
        })
    }

    /// Watch the other axis
    pub fn with_axis(mut self, axis: TiltAxis) -> Self {
        self.axis = axis;
        self
    }
}

impl<T: TiltSource> StopProbe for TiltSettled<T> {
    type Value = f64;

    fn poll(&mut self) -> Result<Option<f64>> {
        let (roll, pitch) = self.sensor.tilt()?;
        let sample = match self.axis {
            TiltAxis::Roll => roll,
            TiltAxis::Pitch => pitch,
        };
        let mean = self.window.update(sample);
        Ok((self.window.is_full() && mean.abs() <= self.tolerance).then_some(mean))
    }

    fn reset(&mut self) {
        self.window.reset();
    }
}

/// Drive open-loop until `probe` fires
///
/// Issues `drive(speed, turn_rate)` once, then polls. On satisfaction the
/// drivebase is stopped and the probe's value returned in the report; on
/// deadline expiry the drivebase is stopped and the report is tagged
/// [`GateOutcome::PredicateNeverMet`].
pub fn drive_until<D: DriveBase, P: StopProbe>(
    drive: &mut D,
    probe: &mut P,
    speed: f64,
    turn_rate: f64,
    cfg: &GateConfig,
) -> Result<GateReport<P::Value>> {
    run_gate(drive, probe, speed, turn_rate, cfg, true)
}

/// Drive to a colored landmark, then keep driving until the tilt window
/// settles
///
/// Two gates chained without an intervening stop: the approach phase ends
/// when `ramp_color` matches but deliberately leaves the drive command
/// active, then the same command is re-issued and the climb phase waits for
/// `settle` to report a level window. The report carries the settled tilt
/// mean. A phase-one deadline expiry stops and returns
/// [`GateOutcome::PredicateNeverMet`].
pub fn drive_to_ramp_and_settle<D: DriveBase, C: ColorSource, T: TiltSource>(
    drive: &mut D,
    ramp_color: &mut ColorMatch<C>,
    settle: &mut TiltSettled<T>,
    speed: f64,
    turn_rate: f64,
    cfg: &GateConfig,
) -> Result<GateReport<f64>> {
    let approach = run_gate(drive, ramp_color, speed, turn_rate, cfg, false)?;
    if !approach.met() {
        return Ok(GateReport {
            outcome: GateOutcome::PredicateNeverMet,
            elapsed: approach.elapsed,
            polls: approach.polls,
        });
    }

    settle.reset();
    let climb = run_gate(drive, settle, speed, turn_rate, cfg, true)?;
    Ok(GateReport {
        outcome: climb.outcome,
        elapsed: approach.elapsed + climb.elapsed,
        polls: approach.polls + climb.polls,
    })
}

fn run_gate<D: DriveBase, P: StopProbe>(
    drive: &mut D,
    probe: &mut P,
    speed: f64,
    turn_rate: f64,
    cfg: &GateConfig,
    stop_on_met: bool,
) -> Result<GateReport<P::Value>> {
    cfg.validate()?;
    let start = Instant::now();
    let mut polls = 0u64;

    if let Err(e) = drive.drive(speed, turn_rate) {
        let _ = drive.stop();
        return Err(e);
    }

    let outcome = loop {
        thread::sleep(cfg.poll_interval);
        polls += 1;
        match probe.poll() {
            Ok(Some(value)) => break GateOutcome::PredicateMet(value),
            Ok(None) => {}
            Err(e) => {
                let _ = drive.stop();
                return Err(e);
            }
        }
        if let Some(timeout) = cfg.timeout {
            if start.elapsed() >= timeout {
                break GateOutcome::PredicateNeverMet;
            }
        }
    };

    if let GateOutcome::PredicateNeverMet = outcome {
        tracing::warn!(
            "drive_until: stop condition never met, gave up after {:?}",
            start.elapsed()
        );
        drive.stop()?;
    } else if stop_on_met {
        drive.stop()?;
    }

    Ok(GateReport {
        outcome,
        elapsed: start.elapsed(),
        polls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRobot;
    use approx::assert_relative_eq;

    fn fast_cfg() -> GateConfig {
        GateConfig::default().with_poll_interval(Duration::from_millis(1))
    }

    #[test]
    fn test_reflectance_gate_stops_on_line() {
        let robot = SimRobot::new();
        robot.push_reflectance([80.0, 70.0, 40.0]);
        let mut probe = ReflectanceBelow::new(robot.reflectance_sensor(), 50.0);

        let report =
            drive_until(&mut robot.drivebase(), &mut probe, 150.0, 0.0, &fast_cfg()).unwrap();

        assert!(report.met());
        assert_eq!(report.polls, 3);
        assert_relative_eq!(*report.value().unwrap(), 40.0);
        assert!(!robot.is_driving());
        assert_eq!(robot.drive_calls(), 1);
        assert_eq!(robot.stop_calls(), 1);
    }

    #[test]
    fn test_gate_timeout_reports_never_met() {
        let robot = SimRobot::new();
        // Default reflectance holds at 100: the line never shows up.
        let mut probe = ReflectanceBelow::new(robot.reflectance_sensor(), 50.0);
        let cfg = fast_cfg().with_timeout(Duration::from_millis(30));

        let report = drive_until(&mut robot.drivebase(), &mut probe, 150.0, 0.0, &cfg).unwrap();

        assert!(!report.met());
        assert!(report.value().is_none());
        assert!(report.elapsed >= Duration::from_millis(30));
        assert!(!robot.is_driving());
    }

    #[test]
    fn test_color_gate() {
        let robot = SimRobot::new();
        robot.push_colors([Color::None, Color::Black, Color::Green]);
        let mut probe = ColorMatch::new(robot.color_sensor(), Color::Green);

        let report =
            drive_until(&mut robot.drivebase(), &mut probe, 100.0, 0.0, &fast_cfg()).unwrap();

        assert_eq!(report.outcome, GateOutcome::PredicateMet(Color::Green));
        assert_eq!(report.polls, 3);
    }

    #[test]
    fn test_tilt_probe_waits_for_full_window() {
        let robot = SimRobot::new();
        robot.push_tilt(std::iter::repeat((0.0, 5.0)).take(10));
        let mut probe = TiltSettled::new(robot.tilt_sensor(), 10, 6.0).unwrap();

        for i in 0..9 {
            assert!(probe.poll().unwrap().is_none(), "fired early at poll {}", i);
        }
        // Tenth sample fills the window; mean is exactly 5.0.
        assert_relative_eq!(probe.poll().unwrap().unwrap(), 5.0);
    }

    #[test]
    fn test_tilt_probe_respects_tolerance() {
        // A full window whose mean is outside tolerance never fires.
        let robot = SimRobot::new();
        robot.push_tilt(std::iter::repeat((0.0, 5.0)).take(15));
        let mut probe = TiltSettled::new(robot.tilt_sensor(), 10, 1.0).unwrap();

        for _ in 0..15 {
            assert!(probe.poll().unwrap().is_none());
        }
    }

    #[test]
    fn test_tilt_probe_roll_axis() {
        let robot = SimRobot::new();
        robot.push_tilt([(0.5, 90.0), (0.5, 90.0)]);
        let mut probe = TiltSettled::new(robot.tilt_sensor(), 2, 1.0)
            .unwrap()
            .with_axis(TiltAxis::Roll);

        assert!(probe.poll().unwrap().is_none());
        assert_relative_eq!(probe.poll().unwrap().unwrap(), 0.5);
    }

    #[test]
    fn test_tilt_probe_rejects_bad_config() {
        let robot = SimRobot::new();
        assert!(TiltSettled::new(robot.tilt_sensor(), 0, 1.0).is_err());
        assert!(TiltSettled::new(robot.tilt_sensor(), 5, 0.0).is_err());
    }

    #[test]
    fn test_ramp_and_settle_keeps_driving_between_phases() {
        let robot = SimRobot::new();
        robot.push_colors([Color::None, Color::None, Color::Red]);
        robot.push_tilt([(0.0, 8.0), (0.0, 6.0), (0.0, 2.0), (0.0, 1.0), (0.0, 0.0)]);
        let mut color = ColorMatch::new(robot.color_sensor(), Color::Red);
        let mut tilt = TiltSettled::new(robot.tilt_sensor(), 3, 2.0).unwrap();

        let report = drive_to_ramp_and_settle(
            &mut robot.drivebase(),
            &mut color,
            &mut tilt,
            120.0,
            0.0,
            &fast_cfg(),
        )
        .unwrap();

        assert!(report.met());
        // Settled mean of the last window (2, 1, 0).
        assert_relative_eq!(*report.value().unwrap(), 1.0);
        // The drive was re-issued for the climb but never stopped between
        // the phases: one stop at the very end.
        assert_eq!(robot.drive_calls(), 2);
        assert_eq!(robot.stop_calls(), 1);
        assert!(!robot.is_driving());
    }

    #[test]
    fn test_ramp_and_settle_phase_one_timeout() {
        let robot = SimRobot::new();
        // Color holds at None: the landmark never appears.
        let mut color = ColorMatch::new(robot.color_sensor(), Color::Red);
        let mut tilt = TiltSettled::new(robot.tilt_sensor(), 3, 2.0).unwrap();
        let cfg = fast_cfg().with_timeout(Duration::from_millis(25));

        let report = drive_to_ramp_and_settle(
            &mut robot.drivebase(),
            &mut color,
            &mut tilt,
            120.0,
            0.0,
            &cfg,
        )
        .unwrap();

        assert!(!report.met());
        assert!(!robot.is_driving());
        assert_eq!(robot.stop_calls(), 1);
    }

    #[test]
    fn test_gate_rejects_zero_poll_interval() {
        let robot = SimRobot::new();
        let mut probe = ReflectanceBelow::new(robot.reflectance_sensor(), 50.0);
        let cfg = GateConfig::default().with_poll_interval(Duration::ZERO);
        assert!(matches!(
            drive_until(&mut robot.drivebase(), &mut probe, 100.0, 0.0, &cfg),
            Err(Error::Config(_))
        ));
    }
}
