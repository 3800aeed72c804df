//! Closed-loop rotation to a target heading
//!
//! Two strategies over the same command type:
//!
//! - [`turn_to_heading_pd`] - proportional-derivative with a static-friction
//!   bias and a hard deadline. The recommended strategy.
//! - [`turn_to_heading_p`] - proportional with bias only, exiting on the
//!   angle condition alone. Simpler and more failure-prone; with
//!   `timeout: None` it reproduces the classic unguarded loop and relies on
//!   the caller to guarantee eventual convergence.
//!
//! Neither strategy treats a missed deadline as an error: the loop stops the
//! drivebase, logs the residual, and returns a [`TurnReport`] tagged
//! [`TurnOutcome::TimedOut`] so the mission can carry on with its best
//! effort.

use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

use crate::hardware::{DriveBase, HeadingSource};
use crate::math::{shortest_error, Filter, LowPassFilter};
use crate::{Error, Result};

/// Minimum dt fed to the derivative term (seconds). Two ticks landing on
/// the same timer count must not blow up `d_error/dt`.
const MIN_DT: f64 = 1e-3;

/// How a heading turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOutcome {
    /// Exit conditions held: the robot is on the target heading.
    Converged,
    /// The deadline expired first; the drivebase was stopped with the
    /// residual error still in the report.
    TimedOut,
}

/// Result of a heading turn
#[derive(Debug, Clone, Copy)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// Shortest-path error remaining at exit (degrees)
    pub final_error: f64,
    /// Wall-clock time spent in the control loop (excludes the settle hold)
    pub elapsed: Duration,
    /// Control ticks executed
    pub ticks: u64,
}

impl TurnReport {
    /// Whether the turn converged
    pub fn converged(&self) -> bool {
        self.outcome == TurnOutcome::Converged
    }
}

/// One heading turn, fully specified
///
/// Created per invocation and immutable for the call's lifetime. Gains are
/// data: store tuned sets with serde and pick one per maneuver.
///
/// # Example
/// ```
/// use drivex_core::control::TurnCommand;
/// use std::time::Duration;
///
/// let cmd = TurnCommand::to(90.0)
///     .with_gains(5.0, 0.6)
///     .with_static_bias(20.0)
///     .with_timeout(Duration::from_millis(1500));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TurnCommand {
    /// Target heading in degrees (absolute, same frame as the gyro)
    pub target: f64,
    /// Clamp on the commanded turn rate (deg/s), PD strategy only
    pub max_rate: f64,
    /// Proportional gain (deg/s per degree of error)
    pub kp: f64,
    /// Derivative gain, ignored by the P strategy
    pub kd: f64,
    /// Static-friction bias (deg/s) added after the PD sum, signed to match
    /// it; an exactly-zero sum biases positive
    pub static_bias: f64,
    /// Exit threshold on |error| (degrees)
    pub angle_tolerance: f64,
    /// Exit threshold on |commanded rate| (deg/s), PD strategy only. Must
    /// exceed `static_bias` or the exit is unreachable.
    pub rate_tolerance: f64,
    /// Deadline for the whole turn. `None` disables the guard (P strategy
    /// only; the PD strategy requires one).
    pub timeout: Option<Duration>,
    /// Sleep between control ticks
    pub tick: Duration,
    /// Hold after `stop()` so residual momentum decays before returning
    pub settle: Duration,
    /// Optional low-pass smoothing of the derivative term (0-1, lower =
    /// more smoothing). `None` uses the raw finite difference.
    pub derivative_alpha: Option<f64>,
}

impl Default for TurnCommand {
    fn default() -> Self {
        Self {
            target: 0.0,
            max_rate: 300.0,
            kp: 5.0,
            kd: 0.6,
            static_bias: 20.0,
            angle_tolerance: 0.5,
            rate_tolerance: 45.0,
            timeout: Some(Duration::from_millis(2500)),
            tick: Duration::from_millis(10),
            settle: Duration::from_millis(100),
            derivative_alpha: None,
        }
    }
}

impl TurnCommand {
    /// Command a turn to the given absolute heading with default tuning
    pub fn to(target: f64) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Set the proportional and derivative gains
    pub fn with_gains(mut self, kp: f64, kd: f64) -> Self {
        self.kp = kp;
        self.kd = kd;
        self
    }

    /// Set the static-friction bias
    pub fn with_static_bias(mut self, bias: f64) -> Self {
        self.static_bias = bias;
        self
    }

    /// Set the turn-rate clamp
    pub fn with_max_rate(mut self, max_rate: f64) -> Self {
        self.max_rate = max_rate;
        self
    }

    /// Set the exit tolerances
    pub fn with_tolerances(mut self, angle: f64, rate: f64) -> Self {
        self.angle_tolerance = angle;
        self.rate_tolerance = rate;
        self
    }

    /// Set the deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Remove the deadline (P strategy only)
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the control tick period
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Set the post-stop settle hold
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Enable low-pass smoothing of the derivative term
    pub fn with_derivative_alpha(mut self, alpha: f64) -> Self {
        self.derivative_alpha = Some(alpha);
        self
    }

    fn validate_common(&self) -> Result<()> {
        if !(self.angle_tolerance > 0.0) {
            return Err(Error::Config("angle_tolerance must be positive".into()));
        }
        if !(self.kp > 0.0) {
            return Err(Error::Config("kp must be positive".into()));
        }
        if self.static_bias < 0.0 {
            return Err(Error::Config("static_bias must not be negative".into()));
        }
        if self.tick.is_zero() {
            return Err(Error::Config("tick must be non-zero".into()));
        }
        Ok(())
    }

    fn validate_pd(&self) -> Result<()> {
        self.validate_common()?;
        if !(self.max_rate > 0.0) {
            return Err(Error::Config("max_rate must be positive".into()));
        }
        if self.kd < 0.0 {
            return Err(Error::Config("kd must not be negative".into()));
        }
        if self.rate_tolerance <= self.static_bias {
            // The biased command magnitude never falls below static_bias, so
            // this exit condition could never hold.
            return Err(Error::Config(
                "rate_tolerance must exceed static_bias".into(),
            ));
        }
        if self.timeout.is_none() {
            return Err(Error::Config("the PD strategy requires a timeout".into()));
        }
        if let Some(alpha) = self.derivative_alpha {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(Error::Config("derivative_alpha must be in [0, 1]".into()));
            }
        }
        Ok(())
    }
}

/// The per-tick turn-rate law: PD sum, signed static bias, clamp
///
/// Factored out of the polling loop so the numeric policy is testable and
/// benchable without hardware. The only state carried between ticks is the
/// previous error (for the derivative) and the optional derivative filter.
#[derive(Debug, Clone)]
pub struct BiasedPd {
    kp: f64,
    kd: f64,
    static_bias: f64,
    max_rate: f64,
    last_error: Option<f64>,
    d_filter: Option<LowPassFilter>,
}

impl BiasedPd {
    pub fn new(kp: f64, kd: f64, static_bias: f64, max_rate: f64) -> Self {
        Self {
            kp,
            kd,
            static_bias,
            max_rate,
            last_error: None,
            d_filter: None,
        }
    }

    /// Build the law from a turn command
    pub fn from_command(cmd: &TurnCommand) -> Self {
        Self {
            kp: cmd.kp,
            kd: cmd.kd,
            static_bias: cmd.static_bias,
            max_rate: cmd.max_rate,
            last_error: None,
            d_filter: cmd.derivative_alpha.map(LowPassFilter::new),
        }
    }

    /// Compute the turn rate for one tick
    ///
    /// `dt` is clamped to a strictly positive minimum before the derivative,
    /// and the first tick has no derivative at all. The bias is applied
    /// after the PD sum and before the clamp; a sum of exactly zero takes
    /// the positive branch.
    pub fn step(&mut self, error: f64, dt: f64) -> f64 {
        let dt = dt.max(MIN_DT);
        let raw_d = match self.last_error {
            Some(prev) => (error - prev) / dt,
            None => 0.0,
        };
        let d = match &mut self.d_filter {
            Some(lpf) => lpf.update(raw_d),
            None => raw_d,
        };
        self.last_error = Some(error);

        let pd = self.kp * error + self.kd * d;
        let biased = apply_bias(pd, self.static_bias);
        biased.clamp(-self.max_rate, self.max_rate)
    }

    /// Clear the carried state
    pub fn reset(&mut self) {
        self.last_error = None;
        if let Some(lpf) = &mut self.d_filter {
            lpf.reset();
        }
    }
}

/// Add the static-friction bias on the side the command already points to.
/// Zero counts as positive, so a dead-centered command still breaks loose.
#[inline]
fn apply_bias(rate: f64, bias: f64) -> f64 {
    if rate >= 0.0 {
        rate + bias
    } else {
        rate - bias
    }
}

/// Rotate in place to `cmd.target` with the PD+bias strategy
///
/// State machine: `Running -> {Converged, TimedOut}`. Converged requires
/// both `|error| < angle_tolerance` and `|rate| < rate_tolerance`, so the
/// loop does not declare victory while still sweeping through the target
/// at speed. On either exit the drivebase is stopped and held for
/// `cmd.settle` before control returns.
pub fn turn_to_heading_pd<D: DriveBase, H: HeadingSource>(
    drive: &mut D,
    gyro: &mut H,
    cmd: &TurnCommand,
) -> Result<TurnReport> {
    cmd.validate_pd()?;
    let start = Instant::now();
    let mut law = BiasedPd::from_command(cmd);
    let looped = turn_loop(
        drive,
        gyro,
        cmd,
        |error, dt| law.step(error, dt),
        |error, rate| error.abs() < cmd.angle_tolerance && rate.abs() < cmd.rate_tolerance,
    );
    finish(drive, cmd, start, looped, "pd")
}

/// Rotate in place to `cmd.target` with the P+bias strategy
///
/// The command rate is `kp * error` plus the signed bias, unclamped, and
/// the exit tests the angle condition alone. With `cmd.timeout` unset the
/// loop runs until the angle condition holds, which blocks indefinitely if
/// the heading never gets there; prefer the PD strategy unless the maneuver
/// is known to converge.
pub fn turn_to_heading_p<D: DriveBase, H: HeadingSource>(
    drive: &mut D,
    gyro: &mut H,
    cmd: &TurnCommand,
) -> Result<TurnReport> {
    cmd.validate_common()?;
    let start = Instant::now();
    let looped = turn_loop(
        drive,
        gyro,
        cmd,
        |error, _dt| apply_bias(cmd.kp * error, cmd.static_bias),
        |error, _rate| error.abs() < cmd.angle_tolerance,
    );
    finish(drive, cmd, start, looped, "p")
}

/// Shared polling loop: read heading, compute, test exits, issue, sleep.
/// Exactly one sensor read and at most one drive command per tick, in that
/// order; no stale command is ever issued against an old sample.
fn turn_loop<D: DriveBase, H: HeadingSource>(
    drive: &mut D,
    gyro: &mut H,
    cmd: &TurnCommand,
    mut law: impl FnMut(f64, f64) -> f64,
    exit: impl Fn(f64, f64) -> bool,
) -> Result<(TurnOutcome, f64, u64)> {
    let start = Instant::now();
    let mut last_time = start;
    let mut ticks = 0u64;
    loop {
        let heading = gyro.heading()?;
        let error = shortest_error(cmd.target, heading);

        let now = Instant::now();
        let dt = now.duration_since(last_time).as_secs_f64();
        last_time = now;
        let rate = law(error, dt);
        ticks += 1;

        if exit(error, rate) {
            return Ok((TurnOutcome::Converged, error, ticks));
        }
        if let Some(timeout) = cmd.timeout {
            if start.elapsed() >= timeout {
                return Ok((TurnOutcome::TimedOut, error, ticks));
            }
        }

        drive.drive(0.0, rate)?;
        thread::sleep(cmd.tick);
    }
}

fn finish<D: DriveBase>(
    drive: &mut D,
    cmd: &TurnCommand,
    start: Instant,
    looped: Result<(TurnOutcome, f64, u64)>,
    strategy: &str,
) -> Result<TurnReport> {
    // Stop on every exit path; a loop error still gets the stop attempt.
    let stopped = drive.stop();
    let (outcome, final_error, ticks) = looped?;
    stopped?;
    let elapsed = start.elapsed();
    if !cmd.settle.is_zero() {
        thread::sleep(cmd.settle);
    }
    match outcome {
        TurnOutcome::Converged => tracing::debug!(
            "turn_to_heading_{}: converged on {:.1}° with {:.2}° residual in {:?}",
            strategy,
            cmd.target,
            final_error,
            elapsed
        ),
        TurnOutcome::TimedOut => tracing::warn!(
            "turn_to_heading_{}: timed out after {:?} with {:.2}° residual",
            strategy,
            elapsed,
            final_error
        ),
    }
    Ok(TurnReport {
        outcome,
        final_error,
        elapsed,
        ticks,
    })
}
