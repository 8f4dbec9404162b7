// ================================
// src/config.rs - 파라미터와 파생 기하 값
// ================================
use crate::error::{Result, WallTrackingError};
use serde::Deserialize;
use std::{env, fs, path::Path, time::Duration};
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "./wall_tracking_param.toml";

/// TOML 파일에서 읽는 벽 추종 파라미터
#[derive(Deserialize, Debug, Clone)]
pub struct WallTrackingParams {
    // Velocity bounds
    pub max_linear_vel: f32,
    pub max_angular_vel: f32,
    pub min_angular_vel: f32,
    // Distances
    pub distance_from_wall: f32,
    pub distance_to_stop: f32,
    pub distance_to_skip: f32,
    pub open_place_distance: f32,
    // Lateral PID
    /// 제어 주기 (초)
    pub sampling_rate: f32,
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    #[serde(default)]
    pub integral_limit: Option<f32>,
    // Lateral measurement window (degrees, left side)
    pub start_deg_lateral: i32,
    pub end_deg_lateral: i32,
    // Front obstacle confirmation
    pub stop_ray_th: f32,
    #[serde(default = "default_avoid_settle_secs")]
    pub avoid_settle_secs: f32,
    // Vehicle physical parameters
    pub wheel_separation: f32,
    // Topic names
    pub cmd_vel_topic_name: String,
    #[serde(default = "default_scan_topic")]
    pub scan_topic: String,
    #[serde(default = "default_gnss_topic")]
    pub gnss_topic: String,
    // Debug options
    #[serde(default)]
    pub debug_mode: bool,
}

fn default_avoid_settle_secs() -> f32 {
    2.0
}

fn default_scan_topic() -> String {
    "scan".to_string()
}

fn default_gnss_topic() -> String {
    "gnss/fix".to_string()
}

impl WallTrackingParams {
    /// `CONFIG_PATH` 가 가리키는 파일에서 파라미터를 읽습니다
    pub fn load() -> Result<Self> {
        let config_path =
            env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        info!("Loading parameters from {}", config_path);
        Self::load_from(config_path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        let params: Self = toml::from_str(config_str)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(WallTrackingError::Config(msg.to_string()));

        if self.sampling_rate.is_nan() || self.sampling_rate <= 0.0 {
            return fail("sampling_rate must be positive");
        }
        if self.max_linear_vel < 0.0 {
            return fail("max_linear_vel must not be negative");
        }
        if self.min_angular_vel > self.max_angular_vel {
            return fail("min_angular_vel exceeds max_angular_vel");
        }
        if self.start_deg_lateral <= 0 || self.start_deg_lateral >= 180 {
            return fail("start_deg_lateral must lie in (0, 180)");
        }
        if self.start_deg_lateral > self.end_deg_lateral {
            return fail("start_deg_lateral exceeds end_deg_lateral");
        }
        if self.end_deg_lateral > 180 {
            return fail("end_deg_lateral must not pass 180");
        }
        if self.distance_from_wall <= 0.0
            || self.distance_to_stop <= 0.0
            || self.open_place_distance <= 0.0
            || self.wheel_separation <= 0.0
        {
            return fail("distances must be positive");
        }
        self.avoid_settle()?;
        if matches!(self.integral_limit, Some(limit) if limit < 0.0) {
            return fail("integral_limit must not be negative");
        }
        Ok(())
    }

    /// 전방 회피 후 판단을 멈추는 시간
    pub fn avoid_settle(&self) -> Result<Duration> {
        Duration::try_from_secs_f32(self.avoid_settle_secs).map_err(|e| {
            WallTrackingError::Config(format!(
                "avoid_settle_secs {} is not a usable duration: {}",
                self.avoid_settle_secs, e
            ))
        })
    }
}

/// 정적 파라미터에서 한 번 계산하는 방위들
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// 전방 정지 원뿔의 경계 (음수, 오른쪽)
    pub front_stop_deg: f32,
    /// 목표 거리로 추종할 때 전방 좌측 벽이 보여야 하는 대각선 방위
    pub front_left_wall_deg: f32,
}

impl Geometry {
    pub fn from_params(params: &WallTrackingParams) -> Self {
        let front_stop_deg = (-params.wheel_separation / 2.0)
            .atan2(params.distance_to_stop)
            .to_degrees();

        let y = params.distance_from_wall;
        let x = params.distance_to_skip
            + params.distance_from_wall / (params.start_deg_lateral as f32).to_radians().tan();
        let front_left_wall_deg = y.atan2(x).to_degrees();

        Self {
            front_stop_deg,
            front_left_wall_deg,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_params() -> WallTrackingParams {
    WallTrackingParams {
        max_linear_vel: 0.5,
        max_angular_vel: 0.8,
        min_angular_vel: -0.8,
        distance_from_wall: 0.6,
        distance_to_stop: 0.5,
        distance_to_skip: 0.3,
        open_place_distance: 3.0,
        sampling_rate: 0.1,
        kp: 1.2,
        ki: 0.0,
        kd: 0.01,
        integral_limit: None,
        start_deg_lateral: 30,
        end_deg_lateral: 90,
        stop_ray_th: 5.0,
        avoid_settle_secs: 2.0,
        wheel_separation: 0.4,
        cmd_vel_topic_name: "cmd_vel".to_string(),
        scan_topic: "scan".to_string(),
        gnss_topic: "gnss/fix".to_string(),
        debug_mode: false,
    }
}
