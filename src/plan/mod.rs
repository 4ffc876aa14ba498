//! Request planning.
//!
//! - split the overall range into bounded windows (`partition`)
//! - cross the windows with the indicator set into a worklist (`planner`)

pub mod partition;
pub mod planner;

pub use partition::*;
pub use planner::*;
