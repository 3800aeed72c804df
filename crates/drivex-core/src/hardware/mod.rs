//! Hardware abstraction for the drivebase and sensors
//!
//! The control primitives never touch devices directly; they take these
//! capability traits as parameters, so the same maneuver code runs against
//! real drivers or against [`crate::sim`]. There are no process-wide
//! hardware handles anywhere in the crate.

mod traits;

pub use traits::{
    Color, ColorSource, DriveBase, HeadingSource, MotionSettings, ReflectanceSource, TiltSource,
};
