//! Drivebase and sensor simulation for testing maneuvers off-robot
//!
//! [`SimRobot`] is a kinematic stand-in for the real hardware: the drivebase
//! handle records every command and integrates the commanded angular rate
//! into a heading over real elapsed time, while the sensor handles replay
//! scripted sample sequences. All handles are cheap clones over one shared
//! state, so a test can hand them to a control primitive and still inspect
//! the state afterwards.

mod mock;

pub use mock::{SimColor, SimDriveBase, SimGyro, SimReflectance, SimRobot, SimTilt};
