// ================================
// src/lib.rs
// ================================
pub mod config;
pub mod control;
pub mod decider;
pub mod environment;
pub mod error;
pub mod lidar;
pub mod node;
pub mod shared;
pub mod task;

pub use config::{Geometry, WallTrackingParams};
pub use decider::{Decision, Detection, Mode, NavigationDecider, OpenDirection};
pub use error::{Result, WallTrackingError};
pub use lidar::{RangeScan, ScanAnalyzer};
pub use node::WallTrackingNode;
pub use shared::SharedState;
pub use task::{
    CommandSink, GoalHandle, NavigationFeedback, NavigationGoal, NavigationResult, TaskRunner,
};
