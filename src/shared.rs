// ================================
// src/shared.rs - 콜백과 태스크 루프가 공유하는 상태
// ================================
//! 구독 콜백이 쓰고 태스크 루프가 읽는 상태
//!
//! 스캔은 불변 `Arc<RangeScan>` 스냅샷으로 `watch` 채널을 통해 넘깁니다.
//! 루프는 절반만 쓰인 스캔을 보지 않고 콜백은 루프를 기다리지 않습니다.

use crate::{
    environment::{EnvironmentClassifier, EnvironmentState},
    lidar::{RangeScan, ScanAnalyzer},
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::info;

/// 개활지 도착 판정에 쓰는 섹터 (전방 반원)
const OPEN_PLACE_SECTOR_DEG: (f32, f32) = (-90.0, 90.0);

pub type ScanSnapshot = Option<Arc<RangeScan>>;

pub struct SharedState {
    scan_tx: watch::Sender<ScanSnapshot>,
    live_tx: watch::Sender<bool>,
    environment: Mutex<EnvironmentClassifier>,
    open_place_distance: f32,
}

impl SharedState {
    pub fn new(open_place_distance: f32) -> Self {
        let (scan_tx, _) = watch::channel(None);
        let (live_tx, _) = watch::channel(true);
        Self {
            scan_tx,
            live_tx,
            environment: Mutex::new(EnvironmentClassifier::new()),
            open_place_distance,
        }
    }

    /// 새 스냅샷을 게시하고 개활지 플래그를 갱신해 반환합니다
    pub fn on_scan(&self, scan: RangeScan) -> bool {
        let score = ScanAnalyzer::new(&scan).open_area_score(
            OPEN_PLACE_SECTOR_DEG.0,
            OPEN_PLACE_SECTOR_DEG.1,
            self.open_place_distance,
        );
        let open_place = self.classifier().update_open_place(score);

        let previous = self.scan_tx.send_replace(Some(Arc::new(scan)));
        if previous.is_none() {
            info!("initialized scan data");
        }
        open_place
    }

    pub fn on_position(&self, quality_unknown: bool) {
        self.classifier().update_outdoor(quality_unknown);
    }

    pub fn latest_scan(&self) -> ScanSnapshot {
        self.scan_tx.borrow().clone()
    }

    pub fn environment(&self) -> EnvironmentState {
        self.classifier().state()
    }

    pub fn is_live(&self) -> bool {
        *self.live_tx.borrow()
    }

    /// 프로세스 종료를 알립니다. 실행 중인 태스크는 성공으로 끝납니다
    pub fn shutdown(&self) {
        self.live_tx.send_replace(false);
    }

    pub(crate) fn subscribe_scans(&self) -> watch::Receiver<ScanSnapshot> {
        self.scan_tx.subscribe()
    }

    pub(crate) fn subscribe_live(&self) -> watch::Receiver<bool> {
        self.live_tx.subscribe()
    }

    fn classifier(&self) -> std::sync::MutexGuard<'_, EnvironmentClassifier> {
        self.environment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
