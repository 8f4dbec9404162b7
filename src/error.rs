// ================================
// src/error.rs - 에러 타입
// ================================
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WallTrackingError {
    /// 스냅샷으로 만들 수 없는 스캔 메시지
    #[error("Invalid scan data: {0}")]
    InvalidScanData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 미들웨어를 통한 발행/구독 실패
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<toml::de::Error> for WallTrackingError {
    fn from(e: toml::de::Error) -> Self {
        WallTrackingError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WallTrackingError>;
