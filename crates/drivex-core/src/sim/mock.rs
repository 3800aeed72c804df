//! Kinematic mock drivebase and scripted sensors

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::hardware::{
    Color, ColorSource, DriveBase, HeadingSource, MotionSettings, ReflectanceSource, TiltSource,
};
use crate::{Error, Result};

#[derive(Debug)]
struct SimState {
    /// Continuous heading in degrees (never wrapped, like a real gyro)
    heading: f64,
    speed_cmd: f64,
    turn_rate_cmd: f64,
    driving: bool,
    odometer: f64,
    settings: MotionSettings,
    last_update: Instant,
    drive_calls: u64,
    stop_calls: u64,
    fail_next_drive: bool,
    tilt_script: VecDeque<(f64, f64)>,
    tilt_hold: (f64, f64),
    reflect_script: VecDeque<f64>,
    reflect_hold: f64,
    color_script: VecDeque<Color>,
    color_hold: Color,
    palette: Vec<Color>,
}

impl SimState {
    fn new() -> Self {
        Self {
            heading: 0.0,
            speed_cmd: 0.0,
            turn_rate_cmd: 0.0,
            driving: false,
            odometer: 0.0,
            settings: MotionSettings::default(),
            last_update: Instant::now(),
            drive_calls: 0,
            stop_calls: 0,
            fail_next_drive: false,
            tilt_script: VecDeque::new(),
            tilt_hold: (0.0, 0.0),
            reflect_script: VecDeque::new(),
            reflect_hold: 100.0,
            color_script: VecDeque::new(),
            color_hold: Color::None,
            palette: Vec::new(),
        }
    }

    /// Integrate the active drive command over the real time elapsed since
    /// the last call. Runs before every command change and sensor read so
    /// the pose reflects the command that was actually in effect.
    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        if self.driving {
            self.heading += self.turn_rate_cmd * dt;
            self.odometer += self.speed_cmd.abs() * dt;
        }
    }
}

/// A simulated differential robot
///
/// Create one `SimRobot`, then pull per-device handles off it:
///
/// ```
/// use drivex_core::sim::SimRobot;
/// use drivex_core::hardware::DriveBase;
///
/// let robot = SimRobot::new();
/// let mut drive = robot.drivebase();
/// drive.drive(100.0, 45.0).unwrap();
/// assert!(robot.is_driving());
/// drive.stop().unwrap();
/// assert!(!robot.is_driving());
/// ```
#[derive(Debug, Clone)]
pub struct SimRobot {
    inner: Arc<Mutex<SimState>>,
}

impl SimRobot {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState::new())),
        }
    }

    /// Drivebase handle
    pub fn drivebase(&self) -> SimDriveBase {
        SimDriveBase {
            inner: self.inner.clone(),
        }
    }

    /// Gyro handle
    pub fn gyro(&self) -> SimGyro {
        SimGyro {
            inner: self.inner.clone(),
        }
    }

    /// Tilt sensor handle
    pub fn tilt_sensor(&self) -> SimTilt {
        SimTilt {
            inner: self.inner.clone(),
        }
    }

    /// Reflectance sensor handle
    pub fn reflectance_sensor(&self) -> SimReflectance {
        SimReflectance {
            inner: self.inner.clone(),
        }
    }

    /// Color sensor handle
    pub fn color_sensor(&self) -> SimColor {
        SimColor {
            inner: self.inner.clone(),
        }
    }

    // === Scripting ===

    /// Place the robot at a heading (degrees, continuous frame).
    pub fn set_heading(&self, heading: f64) {
        let mut s = self.inner.lock();
        s.advance();
        s.heading = heading;
    }

    /// Queue tilt samples; once the queue drains, the last queued sample
    /// is held.
    pub fn push_tilt(&self, samples: impl IntoIterator<Item = (f64, f64)>) {
        let mut s = self.inner.lock();
        for sample in samples {
            s.tilt_script.push_back(sample);
            s.tilt_hold = sample;
        }
    }

    /// Queue reflectance samples; the last queued sample is held after the
    /// queue drains.
    pub fn push_reflectance(&self, samples: impl IntoIterator<Item = f64>) {
        let mut s = self.inner.lock();
        for sample in samples {
            s.reflect_script.push_back(sample);
            s.reflect_hold = sample;
        }
    }

    /// Queue color samples; the last queued sample is held after the queue
    /// drains.
    pub fn push_colors(&self, samples: impl IntoIterator<Item = Color>) {
        let mut s = self.inner.lock();
        for sample in samples {
            s.color_script.push_back(sample);
            s.color_hold = sample;
        }
    }

    /// Make the next `drive()` call fail with a hardware error.
    pub fn fail_next_drive(&self) {
        self.inner.lock().fail_next_drive = true;
    }

    // === Inspection ===

    /// Current heading (degrees, continuous).
    pub fn heading(&self) -> f64 {
        let mut s = self.inner.lock();
        s.advance();
        s.heading
    }

    /// Whether a drive command is currently active.
    pub fn is_driving(&self) -> bool {
        self.inner.lock().driving
    }

    /// The last `(speed, turn_rate)` pair commanded.
    pub fn last_command(&self) -> (f64, f64) {
        let s = self.inner.lock();
        (s.speed_cmd, s.turn_rate_cmd)
    }

    /// Number of `drive()` calls accepted.
    pub fn drive_calls(&self) -> u64 {
        self.inner.lock().drive_calls
    }

    /// Number of `stop()` calls.
    pub fn stop_calls(&self) -> u64 {
        self.inner.lock().stop_calls
    }

    /// Current motion settings.
    pub fn settings(&self) -> MotionSettings {
        self.inner.lock().settings
    }

    /// Distance accumulated by drive/curve commands (mm).
    pub fn odometer(&self) -> f64 {
        let mut s = self.inner.lock();
        s.advance();
        s.odometer
    }
}

impl Default for SimRobot {
    fn default() -> Self {
        Self::new()
    }
}

/// Drivebase handle of a [`SimRobot`]
#[derive(Debug, Clone)]
pub struct SimDriveBase {
    inner: Arc<Mutex<SimState>>,
}

impl DriveBase for SimDriveBase {
    fn drive(&mut self, speed: f64, turn_rate: f64) -> Result<()> {
        let mut s = self.inner.lock();
        s.advance();
        if s.fail_next_drive {
            s.fail_next_drive = false;
            return Err(Error::Hardware("injected drive fault".into()));
        }
        s.speed_cmd = speed;
        s.turn_rate_cmd = turn_rate;
        s.driving = true;
        s.drive_calls += 1;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut s = self.inner.lock();
        s.advance();
        s.speed_cmd = 0.0;
        s.turn_rate_cmd = 0.0;
        s.driving = false;
        s.stop_calls += 1;
        Ok(())
    }

    fn straight(&mut self, distance: f64) -> Result<()> {
        let mut s = self.inner.lock();
        s.advance();
        s.odometer += distance.abs();
        Ok(())
    }

    fn turn(&mut self, angle: f64) -> Result<()> {
        let mut s = self.inner.lock();
        s.advance();
        s.heading += angle;
        Ok(())
    }

    fn curve(&mut self, radius: f64, angle: f64) -> Result<()> {
        let mut s = self.inner.lock();
        s.advance();
        s.heading += angle;
        s.odometer += (radius * angle.to_radians()).abs();
        Ok(())
    }

    fn settings(&mut self) -> Result<MotionSettings> {
        Ok(self.inner.lock().settings)
    }

    fn set_settings(&mut self, settings: MotionSettings) -> Result<()> {
        self.inner.lock().settings = settings;
        Ok(())
    }
}

/// Gyro handle of a [`SimRobot`]
#[derive(Debug, Clone)]
pub struct SimGyro {
    inner: Arc<Mutex<SimState>>,
}

impl HeadingSource for SimGyro {
    fn heading(&mut self) -> Result<f64> {
        let mut s = self.inner.lock();
        s.advance();
        Ok(s.heading)
    }

    fn reset_heading(&mut self, value: f64) -> Result<()> {
        let mut s = self.inner.lock();
        s.advance();
        s.heading = value;
        Ok(())
    }
}

/// Tilt sensor handle of a [`SimRobot`]
#[derive(Debug, Clone)]
pub struct SimTilt {
    inner: Arc<Mutex<SimState>>,
}

impl TiltSource for SimTilt {
    fn tilt(&mut self) -> Result<(f64, f64)> {
        let mut s = self.inner.lock();
        Ok(s.tilt_script.pop_front().unwrap_or(s.tilt_hold))
    }
}

/// Reflectance sensor handle of a [`SimRobot`]
#[derive(Debug, Clone)]
pub struct SimReflectance {
    inner: Arc<Mutex<SimState>>,
}

impl ReflectanceSource for SimReflectance {
    fn reflection(&mut self) -> Result<f64> {
        let mut s = self.inner.lock();
        Ok(s.reflect_script.pop_front().unwrap_or(s.reflect_hold))
    }
}

/// Color sensor handle of a [`SimRobot`]
#[derive(Debug, Clone)]
pub struct SimColor {
    inner: Arc<Mutex<SimState>>,
}

impl ColorSource for SimColor {
    fn color(&mut self) -> Result<Color> {
        let mut s = self.inner.lock();
        let sample = s.color_script.pop_front().unwrap_or(s.color_hold);
        if !s.palette.is_empty() && !s.palette.contains(&sample) {
            return Ok(Color::None);
        }
        Ok(sample)
    }

    fn set_detectable_colors(&mut self, colors: &[Color]) -> Result<()> {
        self.inner.lock().palette = colors.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_stop_is_idempotent() {
        let robot = SimRobot::new();
        let mut drive = robot.drivebase();
        drive.drive(100.0, 30.0).unwrap();
        drive.stop().unwrap();
        let after_first = (robot.is_driving(), robot.last_command());
        drive.stop().unwrap();
        assert_eq!((robot.is_driving(), robot.last_command()), after_first);
        assert_eq!(robot.last_command(), (0.0, 0.0));
        assert_eq!(robot.stop_calls(), 2);
    }

    #[test]
    fn test_heading_integrates_turn_rate() {
        let robot = SimRobot::new();
        let mut drive = robot.drivebase();
        drive.drive(0.0, 100.0).unwrap();
        thread::sleep(Duration::from_millis(50));
        drive.stop().unwrap();
        let heading = robot.heading();
        // ~5 degrees at 100 deg/s over 50 ms, with generous timing slack.
        assert!(heading > 2.0 && heading < 15.0, "heading was {}", heading);
        // Stopped: heading no longer moves.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(robot.heading(), heading);
    }

    #[test]
    fn test_scripted_sensors_hold_last_sample() {
        let robot = SimRobot::new();
        robot.push_reflectance([80.0, 40.0]);
        let mut refl = robot.reflectance_sensor();
        assert_eq!(refl.reflection().unwrap(), 80.0);
        assert_eq!(refl.reflection().unwrap(), 40.0);
        assert_eq!(refl.reflection().unwrap(), 40.0);
    }

    #[test]
    fn test_color_palette_filters_samples() {
        let robot = SimRobot::new();
        robot.push_colors([Color::Red, Color::Green]);
        let mut color = robot.color_sensor();
        color.set_detectable_colors(&[Color::Green]).unwrap();
        assert_eq!(color.color().unwrap(), Color::None);
        assert_eq!(color.color().unwrap(), Color::Green);
    }

    #[test]
    fn test_fail_next_drive() {
        let robot = SimRobot::new();
        let mut drive = robot.drivebase();
        robot.fail_next_drive();
        assert!(drive.drive(100.0, 0.0).is_err());
        // One-shot: the next call succeeds.
        assert!(drive.drive(100.0, 0.0).is_ok());
    }

    #[test]
    fn test_relative_moves_update_pose() {
        let robot = SimRobot::new();
        let mut drive = robot.drivebase();
        drive.turn(90.0).unwrap();
        assert_eq!(robot.heading(), 90.0);
        drive.straight(200.0).unwrap();
        assert_eq!(robot.odometer(), 200.0);
        drive.curve(100.0, -90.0).unwrap();
        assert_eq!(robot.heading(), 0.0);
        // Quarter circle of radius 100 adds ~157 mm of arc.
        assert!((robot.odometer() - 357.0).abs() < 1.0);
    }

    #[test]
    fn test_reset_heading() {
        let robot = SimRobot::new();
        let mut gyro = robot.gyro();
        gyro.reset_heading(170.0).unwrap();
        assert_eq!(gyro.heading().unwrap(), 170.0);
    }
}
