// ================================
// src/control.rs - 횡방향 PID 제어와 속도 제한
// ================================
use crate::config::WallTrackingParams;

/// 선속도 (m/s) 와 각속도 (rad/s) 명령
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityCommand {
    pub linear: f32,
    pub angular: f32,
}

impl VelocityCommand {
    pub const STOP: Self = Self {
        linear: 0.0,
        angular: 0.0,
    };

    pub fn new(linear: f32, angular: f32) -> Self {
        Self { linear, angular }
    }
}

// 속도 제한
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityLimits {
    pub max_linear: f32,
    pub min_angular: f32,
    pub max_angular: f32,
}

impl VelocityLimits {
    pub fn from_params(params: &WallTrackingParams) -> Self {
        Self {
            max_linear: params.max_linear_vel,
            min_angular: params.min_angular_vel,
            max_angular: params.max_angular_vel,
        }
    }

    /// 구동부로 나가기 전에 명령을 제한합니다
    pub fn clamp(&self, command: VelocityCommand) -> VelocityCommand {
        VelocityCommand {
            linear: command.linear.clamp(0.0, self.max_linear),
            angular: command.angular.clamp(self.min_angular, self.max_angular),
        }
    }
}

// 벽 거리 PID 제어
#[derive(Debug, Clone)]
pub struct LateralController {
    target: f32,
    kp: f32,
    ki: f32,
    kd: f32,
    period: f32,
    integral_limit: Option<f32>,
    integral: f32,
}

impl LateralController {
    pub fn new(params: &WallTrackingParams) -> Self {
        Self {
            target: params.distance_from_wall,
            kp: params.kp,
            ki: params.ki,
            kd: params.kd,
            period: params.sampling_rate,
            integral_limit: params.integral_limit,
            integral: 0.0,
        }
    }

    /// 측정한 벽 거리에 대한 각속도 보정값을 계산합니다
    ///
    /// 미분항은 오차 변화량이 아니라 원 오차를 주기로 나눈 `e / period` 입니다.
    /// 기존 게인 값들이 이 형태에 맞춰져 있습니다.
    pub fn correct(&mut self, measured_distance: f32) -> f32 {
        let e = measured_distance - self.target;

        self.integral += e * self.period;
        if let Some(limit) = self.integral_limit {
            self.integral = self.integral.clamp(-limit, limit);
        }

        let ed = e / self.period;
        e * self.kp + self.integral * self.ki + ed * self.kd
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_params;
    use approx::assert_relative_eq;

    fn controller(kp: f32, ki: f32, kd: f32) -> LateralController {
        let mut params = test_params();
        params.kp = kp;
        params.ki = ki;
        params.kd = kd;
        LateralController::new(&params)
    }

    #[test]
    fn output_matches_formula() {
        let mut pid = controller(1.2, 0.5, 0.01);
        // target 0.6, period 0.1
        let out = pid.correct(0.9);
        let e = 0.3f32;
        let i = e * 0.1;
        assert_relative_eq!(out, e * 1.2 + i * 0.5 + (e / 0.1) * 0.01, epsilon = 1e-6);

        let out = pid.correct(0.4);
        let e2 = -0.2f32;
        let i2 = i + e2 * 0.1;
        assert_relative_eq!(out, e2 * 1.2 + i2 * 0.5 + (e2 / 0.1) * 0.01, epsilon = 1e-6);
    }

    #[test]
    fn integral_accumulates_without_bound_by_default() {
        let mut pid = controller(0.0, 1.0, 0.0);
        for _ in 0..1000 {
            pid.correct(1.6);
        }
        assert_relative_eq!(pid.integral(), 100.0, epsilon = 1e-2);
    }

    #[test]
    fn integral_limit_caps_windup() {
        let mut params = test_params();
        params.integral_limit = Some(0.5);
        let mut pid = LateralController::new(&params);
        for _ in 0..100 {
            pid.correct(5.0);
        }
        assert_relative_eq!(pid.integral(), 0.5);

        for _ in 0..100 {
            pid.correct(-5.0);
        }
        assert_relative_eq!(pid.integral(), -0.5);
    }

    #[test]
    fn clamp_saturates_both_axes() {
        let limits = VelocityLimits::from_params(&test_params());
        let out = limits.clamp(VelocityCommand::new(0.5 + 10.0, 0.8 + 10.0));
        assert_eq!(out, VelocityCommand::new(0.5, 0.8));

        let out = limits.clamp(VelocityCommand::new(-1.0, -5.0));
        assert_eq!(out, VelocityCommand::new(0.0, -0.8));
    }
}
