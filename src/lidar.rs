// ================================
// src/lidar.rs - 스캔 스냅샷과 기하 질의
// ================================
use crate::error::{Result, WallTrackingError};
use std::f32::consts::TAU;

/// 방위 주변을 검사하는 반경 (도)
const NEIGHBOR_SPAN_DEG: f32 = 2.0;
/// 안정된 방위로 볼 수 있는 이웃 샘플 간 최대 차이 (m)
const NOISE_TOLERANCE: f32 = 0.1;
/// 창 경계에 놓인 샘플이 부동소수 오차로 빠지지 않도록 하는 여유 (도)
const EDGE_TOLERANCE_DEG: f32 = 1e-3;

/// 전처리된 스캔 한 장
#[derive(Debug, Clone)]
pub struct RangeScan {
    ranges: Vec<f32>,
    angle_min: f32,
    angle_increment: f32,
    stamp: f64,
}

impl RangeScan {
    pub fn new(
        angle_min: f32,
        angle_increment: f32,
        range_min: f32,
        range_max: f32,
        ranges: &[f32],
        stamp: f64,
    ) -> Result<Self> {
        if ranges.is_empty() {
            return Err(WallTrackingError::InvalidScanData(
                "scan has no samples".to_string(),
            ));
        }
        if !angle_increment.is_finite() || angle_increment <= 0.0 {
            return Err(WallTrackingError::InvalidScanData(format!(
                "angle increment {} is not usable",
                angle_increment
            )));
        }
        if !angle_min.is_finite() || !range_max.is_finite() || range_max <= 0.0 {
            return Err(WallTrackingError::InvalidScanData(format!(
                "bad scan bounds (angle_min {}, range_max {})",
                angle_min, range_max
            )));
        }

        let mut ranges = ranges.to_vec();
        Self::clean_invalid_ranges(&mut ranges, range_min, range_max);

        Ok(Self {
            ranges,
            angle_min,
            angle_increment,
            stamp,
        })
    }

    /// 무반사 및 측정 범위 밖 샘플은 빈 공간(range_max)으로 읽습니다.
    fn clean_invalid_ranges(ranges: &mut [f32], range_min: f32, range_max: f32) {
        for range in ranges.iter_mut() {
            if !range.is_finite() || *range > range_max || *range < range_min {
                *range = range_max;
            }
        }
    }

    /// `bearing_deg` 에 가장 가까운 샘플의 거리. 어떤 값이든 한 바퀴로 감아서 찾습니다.
    pub fn range_at(&self, bearing_deg: f32) -> f32 {
        self.ranges[self.nearest_index(bearing_deg)]
    }

    /// 헤더 타임스탬프 (초)
    pub fn stamp(&self) -> f64 {
        self.stamp
    }

    fn nearest_index(&self, bearing_deg: f32) -> usize {
        let len = self.ranges.len();
        let offset = (bearing_deg.to_radians() - self.angle_min).rem_euclid(TAU);
        let steps = (offset / self.angle_increment).round();
        let last = (len - 1) as f32;

        if steps <= last {
            return steps as usize;
        }
        // outside the scanned arc: snap to whichever end is closer
        let steps_per_turn = TAU / self.angle_increment;
        let past_end = steps - last;
        let before_start = steps_per_turn - steps;
        if before_start < past_end {
            0
        } else {
            len - 1
        }
    }

    /// 샘플 `index` 의 방위를 [-180, 180) 도로 정규화합니다.
    fn bearing_of(&self, index: usize) -> f32 {
        let deg = (self.angle_min + index as f32 * self.angle_increment).to_degrees();
        (deg + 180.0).rem_euclid(360.0) - 180.0
    }

    /// 방위가 `[lo, hi]` 안에 드는 샘플들의 (방위, 거리)
    fn samples_between(&self, lo: f32, hi: f32) -> impl Iterator<Item = (f32, f32)> + '_ {
        let (lo, hi) = (lo - EDGE_TOLERANCE_DEG, hi + EDGE_TOLERANCE_DEG);
        self.ranges.iter().enumerate().filter_map(move |(i, &range)| {
            let bearing = self.bearing_of(i);
            [bearing, bearing - 360.0, bearing + 360.0]
                .into_iter()
                .find(|b| (lo..=hi).contains(b))
                .map(|b| (b, range))
        })
    }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// 스냅샷 하나에 대한 상태 없는 기하 질의
pub struct ScanAnalyzer<'a> {
    scan: &'a RangeScan,
}

impl<'a> ScanAnalyzer<'a> {
    pub fn new(scan: &'a RangeScan) -> Self {
        Self { scan }
    }

    /// 창 안 샘플들의 평균 거리 (횡방향 벽 거리 측정값)
    ///
    /// 창이 샘플 간격보다 좁아 비어 있으면 창 중앙에 가장 가까운 샘플을 씁니다.
    pub fn wall_distance(&self, start_deg: f32, end_deg: f32) -> f32 {
        let (lo, hi) = ordered(start_deg, end_deg);
        let (sum, count) = self
            .scan
            .samples_between(lo, hi)
            .fold((0.0, 0usize), |(sum, count), (_, r)| (sum + r, count + 1));

        if count == 0 {
            self.scan.range_at((lo + hi) / 2.0)
        } else {
            sum / count as f32
        }
    }

    /// `[-|bearing|, |bearing|]` 원뿔 안에서 전방 투영 거리가
    /// `reference_distance` 이내인 샘플 수
    pub fn front_obstacle_score(&self, bearing_deg: f32, reference_distance: f32) -> f32 {
        let half = bearing_deg.abs();
        self.scan
            .samples_between(-half, half)
            .filter(|&(b, r)| r * b.to_radians().cos() <= reference_distance)
            .count() as f32
    }

    /// `bearing_deg` 부근에 `threshold` 보다 가까운 샘플이 있는지
    pub fn conflict_detected(&self, bearing_deg: f32, threshold: f32) -> bool {
        self.neighborhood(bearing_deg).any(|r| r < threshold)
    }

    pub fn threshold_crossed(&self, bearing_deg: f32, threshold: f32) -> bool {
        self.scan.range_at(bearing_deg) > threshold
    }

    /// 이웃 샘플이 중심 샘플과 일치하는지 (한 빔짜리 튐이 아닌지)
    pub fn is_stable_bearing(&self, bearing_deg: f32) -> bool {
        let center = self.scan.range_at(bearing_deg);
        self.neighborhood(bearing_deg)
            .all(|r| (r - center).abs() <= NOISE_TOLERANCE)
    }

    /// 섹터 샘플 중 `reference_distance` 보다 먼 샘플의 비율 [0, 1]
    pub fn open_area_score(&self, start_deg: f32, end_deg: f32, reference_distance: f32) -> f32 {
        let (lo, hi) = ordered(start_deg, end_deg);
        let (open, total) = self
            .scan
            .samples_between(lo, hi)
            .fold((0usize, 0usize), |(open, total), (_, r)| {
                (open + usize::from(r > reference_distance), total + 1)
            });

        if total == 0 {
            0.0
        } else {
            open as f32 / total as f32
        }
    }

    /// 가장 가까운 샘플과 ±NEIGHBOR_SPAN_DEG 안의 모든 샘플
    fn neighborhood(&self, bearing_deg: f32) -> impl Iterator<Item = f32> + '_ {
        std::iter::once(self.scan.range_at(bearing_deg)).chain(
            self.scan
                .samples_between(bearing_deg - NEIGHBOR_SPAN_DEG, bearing_deg + NEIGHBOR_SPAN_DEG)
                .map(|(_, r)| r),
        )
    }
}
