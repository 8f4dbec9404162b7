// ================================
// src/environment.rs - 실내/실외 및 개활지 판정
// ================================

/// 개활지 도착으로 판정하는 점수
pub const OPEN_PLACE_ENTER: f32 = 0.7;
/// 도착 후 개활지에 머무르는 것으로 보는 점수
pub const OPEN_PLACE_STAY: f32 = 0.4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvironmentState {
    pub outdoor: bool,
    pub open_place: bool,
}

#[derive(Debug, Default)]
pub struct EnvironmentClassifier {
    state: EnvironmentState,
}

impl EnvironmentClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 공분산 유형을 모르는 GNSS 해는 쓸 수 없는 측위, 즉 실내로 봅니다
    pub fn update_outdoor(&mut self, position_quality_unknown: bool) {
        self.state.outdoor = !position_quality_unknown;
    }

    pub fn update_open_place(&mut self, score: f32) -> bool {
        self.state.open_place = if !self.state.outdoor {
            false
        } else if self.state.open_place {
            score >= OPEN_PLACE_STAY
        } else {
            score >= OPEN_PLACE_ENTER
        };
        self.state.open_place
    }

    pub fn outdoor(&self) -> bool {
        self.state.outdoor
    }

    pub fn open_place(&self) -> bool {
        self.state.open_place
    }

    pub fn state(&self) -> EnvironmentState {
        self.state
    }
}
