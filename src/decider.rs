// ================================
// src/decider.rs - 한 제어 주기의 모드 결정
// ================================
use crate::{
    config::{Geometry, WallTrackingParams},
    control::{LateralController, VelocityCommand},
    lidar::{RangeScan, ScanAnalyzer},
};
use std::fmt;

/// 전방 좌측 대각선이 열린 것으로 보는 보정 거리 (m)
pub const FRONT_LEFT_WALL_RANGE: f32 = 1.87;
/// 정면 벽을 피할 때의 회전 각속도 (도/초)
pub const AVOID_TURN_DEG: f32 = -45.0;
/// 이 점수보다 낮은 섹터는 개활지 방향 선택에서 제외합니다
pub const SECTOR_OPEN_THRESHOLD: f32 = 0.7;

const DISQUALIFIED: f32 = -1.0;
const GAP_END_DEG: f32 = 90.0;

/// 개활지 주행 후보 섹터. 동점이면 앞선 섹터가 이깁니다
const SECTORS: [(OpenDirection, f32, f32); 3] = [
    (OpenDirection::Front, -15.0, 15.0),
    (OpenDirection::Left, 15.0, 45.0),
    (OpenDirection::Right, -45.0, -15.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenDirection {
    Front,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mode {
    FrontAvoid,
    Skip,
    WallFollow { lateral_mean: f32 },
    Open(OpenDirection),
}

/// 검출 토픽으로 발행하는 라벨
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Indoor,
    Open(OpenDirection),
    NotOpenPlace,
}

impl Detection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Detection::Indoor => "Indoor",
            Detection::Open(OpenDirection::Front) => "Front",
            Detection::Open(OpenDirection::Left) => "Left",
            Detection::Open(OpenDirection::Right) => "Right",
            Detection::NotOpenPlace => "Not open place",
        }
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub mode: Mode,
    pub detection: Detection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleOutput {
    pub decision: Decision,
    pub command: VelocityCommand,
}

/// 자격을 갖춘 섹터 중 가장 좋은 방향을 고릅니다. 모두 탈락하면 `None`.
///
/// 점수는 `SECTORS` 순서(정면, 좌, 우)이고 동점이면 앞선 섹터를 고릅니다.
pub fn select_open_direction(scores: [f32; 3]) -> Option<OpenDirection> {
    let mut best = None;
    // the "none" option scores 0, so only qualified sectors can beat it
    let mut best_score = 0.0;

    for ((direction, _, _), score) in SECTORS.iter().zip(scores) {
        let eval = if score < SECTOR_OPEN_THRESHOLD {
            DISQUALIFIED
        } else {
            score
        };
        if eval > best_score {
            best_score = eval;
            best = Some(*direction);
        }
    }

    best
}

pub struct NavigationDecider {
    geometry: Geometry,
    controller: LateralController,
    max_linear_vel: f32,
    max_angular_vel: f32,
    min_angular_vel: f32,
    gap_threshold: f32,
    distance_to_stop: f32,
    stop_ray_th: f32,
    start_deg_lateral: f32,
    end_deg_lateral: f32,
    open_place_distance: f32,
}

impl NavigationDecider {
    pub fn new(params: &WallTrackingParams) -> Self {
        Self {
            geometry: Geometry::from_params(params),
            controller: LateralController::new(params),
            max_linear_vel: params.max_linear_vel,
            max_angular_vel: params.max_angular_vel,
            min_angular_vel: params.min_angular_vel,
            gap_threshold: params.distance_from_wall * 2.0,
            distance_to_stop: params.distance_to_stop,
            stop_ray_th: params.stop_ray_th,
            start_deg_lateral: params.start_deg_lateral as f32,
            end_deg_lateral: params.end_deg_lateral as f32,
            open_place_distance: params.open_place_distance,
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// 스캔 한 장에 대한 모드 결정. PID 상태는 건드리지 않습니다.
    pub fn decide(&self, scan: &RangeScan, outdoor: bool) -> Decision {
        let analyzer = ScanAnalyzer::new(scan);
        let flw = self.geometry.front_left_wall_deg;

        let front_block = analyzer
            .front_obstacle_score(self.geometry.front_stop_deg, self.distance_to_stop)
            >= self.stop_ray_th;

        // sectors are not scored behind a wall, so the label stays at Indoor
        if front_block {
            return Decision {
                mode: Mode::FrontAvoid,
                detection: Detection::Indoor,
            };
        }

        if outdoor {
            let scores = SECTORS.map(|(_, start, end)| {
                analyzer.open_area_score(start, end, self.open_place_distance)
            });
            if let Some(direction) = select_open_direction(scores) {
                return Decision {
                    mode: Mode::Open(direction),
                    detection: Detection::Open(direction),
                };
            }
        }

        let gap_start = analyzer.conflict_detected(self.start_deg_lateral, self.gap_threshold);
        let gap_end = analyzer.conflict_detected(GAP_END_DEG, self.gap_threshold);
        let front_left_wall = analyzer.threshold_crossed(flw, FRONT_LEFT_WALL_RANGE);

        let mode = if (gap_start || gap_end) && !front_left_wall && analyzer.is_stable_bearing(flw)
        {
            Mode::Skip
        } else {
            Mode::WallFollow {
                lateral_mean: analyzer.wall_distance(self.start_deg_lateral, self.end_deg_lateral),
            }
        };

        let detection = if outdoor {
            Detection::NotOpenPlace
        } else {
            Detection::Indoor
        };
        Decision { mode, detection }
    }

    /// 모드에 대한 제한 전 속도 명령. 벽 추종일 때만 PID 를 진행합니다.
    pub fn command_for(&mut self, mode: Mode) -> VelocityCommand {
        match mode {
            Mode::FrontAvoid => {
                VelocityCommand::new(self.max_linear_vel / 4.0, AVOID_TURN_DEG.to_radians())
            }
            Mode::Skip | Mode::Open(OpenDirection::Front) => {
                VelocityCommand::new(self.max_linear_vel, 0.0)
            }
            Mode::Open(OpenDirection::Left) => {
                VelocityCommand::new(self.max_linear_vel, self.max_angular_vel)
            }
            Mode::Open(OpenDirection::Right) => {
                VelocityCommand::new(self.max_linear_vel, self.min_angular_vel)
            }
            Mode::WallFollow { lateral_mean } => {
                VelocityCommand::new(self.max_linear_vel, self.controller.correct(lateral_mean))
            }
        }
    }

    pub fn cycle(&mut self, scan: &RangeScan, outdoor: bool) -> CycleOutput {
        let decision = self.decide(scan, outdoor);
        let command = self.command_for(decision.mode);
        CycleOutput { decision, command }
    }

    pub fn controller(&self) -> &LateralController {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_params;
    use crate::lidar::tests::scan_from_fn;
    use approx::assert_relative_eq;

    #[test]
    fn selection_floors_weak_sectors() {
        assert_eq!(
            select_open_direction([0.8, 0.5, 0.9]),
            Some(OpenDirection::Right)
        );
        assert_eq!(
            select_open_direction([0.9, 0.95, 0.6]),
            Some(OpenDirection::Left)
        );
        assert_eq!(select_open_direction([0.69, 0.1, 0.0]), None);
    }

    #[test]
    fn selection_tie_goes_to_first_sector() {
        assert_eq!(
            select_open_direction([0.8, 0.8, 0.8]),
            Some(OpenDirection::Front)
        );
    }

    #[test]
    fn labels() {
        assert_eq!(Detection::NotOpenPlace.to_string(), "Not open place");
        assert_eq!(Detection::Open(OpenDirection::Right).as_str(), "Right");
    }

    #[test]
    fn wall_ahead_triggers_avoidance_indoors_and_out() {
        let mut decider = NavigationDecider::new(&test_params());
        let scan = scan_from_fn(|d| if d.abs() <= 10 { 0.3 } else { 9.0 });

        let indoor = decider.cycle(&scan, false);
        assert_eq!(indoor.decision.mode, Mode::FrontAvoid);
        assert_eq!(indoor.decision.detection, Detection::Indoor);
        assert_relative_eq!(indoor.command.linear, 0.5 / 4.0);
        assert_relative_eq!(indoor.command.angular, (-45f32).to_radians());

        let outdoor = decider.cycle(&scan, true);
        assert_eq!(outdoor.decision.mode, Mode::FrontAvoid);
        assert_eq!(outdoor.decision.detection, Detection::Indoor);
        assert_eq!(outdoor.decision.detection.as_str(), "Indoor");
    }

    #[test]
    fn steady_wall_is_followed_with_pid() {
        let params = test_params();
        let mut decider = NavigationDecider::new(&params);
        // left wall beyond the gap threshold, so no skip
        let scan = scan_from_fn(|d| if (20..=100).contains(&d) { 1.5 } else { 9.0 });

        let out = decider.cycle(&scan, false);
        match out.decision.mode {
            Mode::WallFollow { lateral_mean } => assert_relative_eq!(lateral_mean, 1.5),
            other => panic!("unexpected mode {:?}", other),
        }
        let e = 1.5 - params.distance_from_wall;
        let expected = e * params.kp + (e * params.sampling_rate) * params.ki
            + (e / params.sampling_rate) * params.kd;
        assert_relative_eq!(out.command.angular, expected, epsilon = 1e-5);
        assert_relative_eq!(out.command.linear, params.max_linear_vel);
    }

    #[test]
    fn doorway_edge_is_skipped() {
        let decider = NavigationDecider::new(&test_params());
        let flw = decider.geometry().front_left_wall_deg.round() as i32;
        // close wall at 90 deg, front-left diagonal reads a steady 1.5 m
        let scan = scan_from_fn(|d| {
            if (85..=95).contains(&d) {
                0.6
            } else if (flw - 4..=flw + 4).contains(&d) {
                1.5
            } else {
                9.0
            }
        });
        assert_eq!(decider.decide(&scan, false).mode, Mode::Skip);
    }

    #[test]
    fn outdoor_open_area_right_wins() {
        let mut decider = NavigationDecider::new(&test_params());
        let scan = scan_from_fn(|d| if (-45..=15).contains(&d) { 9.0 } else { 1.0 });
        // front and right both fully open: front wins ties
        assert_eq!(
            decider.decide(&scan, true).mode,
            Mode::Open(OpenDirection::Front)
        );

        let scan = scan_from_fn(|d| if (-45..=-15).contains(&d) { 9.0 } else { 1.0 });
        let out = decider.cycle(&scan, true);
        assert_eq!(out.decision.detection.as_str(), "Right");
        assert_eq!(out.command, VelocityCommand::new(0.5, -0.8));
    }

    #[test]
    fn outdoor_without_open_sector_falls_back() {
        let decider = NavigationDecider::new(&test_params());
        let scan = scan_from_fn(|d| if (20..=100).contains(&d) { 1.5 } else { 2.0 });
        let decision = decider.decide(&scan, true);
        assert_eq!(decision.detection, Detection::NotOpenPlace);
        assert!(matches!(decision.mode, Mode::WallFollow { .. }));
    }
}
