#![allow(dead_code)]

use std::f32::consts::PI;
use std::sync::Mutex;
use wall_tracking::{
    control::VelocityCommand, CommandSink, Detection, NavigationFeedback, NavigationResult,
    RangeScan, Result, WallTrackingParams,
};

pub const PARAMS: &str = r#"
    max_linear_vel = 0.5
    max_angular_vel = 0.8
    min_angular_vel = -0.8
    distance_from_wall = 0.6
    distance_to_stop = 0.5
    sampling_rate = 0.1
    kp = 1.2
    ki = 0.1
    kd = 0.01
    start_deg_lateral = 30
    end_deg_lateral = 90
    stop_ray_th = 5.0
    wheel_separation = 0.4
    distance_to_skip = 0.3
    cmd_vel_topic_name = "cmd_vel"
    open_place_distance = 3.0
    avoid_settle_secs = 2.0
"#;

pub fn params() -> WallTrackingParams {
    WallTrackingParams::from_toml(PARAMS).unwrap()
}

/// One sample per degree from -180 to 179.
pub fn scan_from_fn(f: impl Fn(i32) -> f32) -> RangeScan {
    let ranges: Vec<f32> = (-180..180).map(f).collect();
    RangeScan::new(-PI, 1f32.to_radians(), 0.05, 10.0, &ranges, 0.0).unwrap()
}

pub fn open_scan() -> RangeScan {
    scan_from_fn(|_| 10.0)
}

pub fn blocked_scan() -> RangeScan {
    scan_from_fn(|d| if d.abs() <= 10 { 0.3 } else { 10.0 })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Velocity(VelocityCommand),
    Detection(Detection),
    Feedback(NavigationFeedback),
    Result(NavigationResult),
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn velocities(&self) -> Vec<VelocityCommand> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Velocity(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn detections(&self) -> Vec<Detection> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Detection(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn feedback_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Feedback(_)))
            .count()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl CommandSink for RecordingSink {
    fn publish_velocity(&self, command: VelocityCommand) -> Result<()> {
        self.push(Event::Velocity(command));
        Ok(())
    }

    fn publish_detection(&self, detection: Detection) -> Result<()> {
        self.push(Event::Detection(detection));
        Ok(())
    }

    fn publish_feedback(&self, feedback: NavigationFeedback) -> Result<()> {
        self.push(Event::Feedback(feedback));
        Ok(())
    }

    fn publish_result(&self, result: NavigationResult) -> Result<()> {
        self.push(Event::Result(result));
        Ok(())
    }
}
