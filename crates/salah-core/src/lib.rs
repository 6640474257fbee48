//! # Salah Core
//!
//! 核心資料模型與類型定義

use std::sync::Arc;

pub mod checkpoint;
pub mod clock_source;
pub mod config;
pub mod progress;
pub mod state;
pub mod timings;

// Re-export 主要類型
pub use checkpoint::{
    format_time_of_day, parse_time_of_day, Checkpoint, Schedule, SECONDS_PER_DAY,
};
pub use clock_source::{seconds_since_midnight, ClockSource, FixedClock, SystemClock};
pub use config::ClockConfig;
pub use progress::{ChapterId, ReadingProgress};
pub use state::{CheckpointStatus, ClockState, DayPhase};
pub use timings::PrayerTimings;

/// Salah 錯誤類型
///
/// 需要 `Clone`：同一次計算來源呼叫的錯誤會分發給所有等待者。
#[derive(Debug, Clone, thiserror::Error)]
pub enum SalahError {
    #[error("無效的排程: {0}")]
    InvalidSchedule(String),

    #[error("無效的時刻: {0} 秒（必須小於 86400）")]
    InvalidTime(u32),

    #[error("時間格式錯誤: {0}")]
    InvalidTimeFormat(String),

    #[error("配置錯誤: {0}")]
    InvalidConfig(String),

    #[error("計算來源失敗: {0}")]
    ProducerFailure(Arc<anyhow::Error>),

    #[error("找不到鍵值: {0}")]
    NotFound(String),
}

impl SalahError {
    /// 包裝計算來源的錯誤
    pub fn producer(err: anyhow::Error) -> Self {
        Self::ProducerFailure(Arc::new(err))
    }

    /// 是否可以由呼叫端重試
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProducerFailure(_) | Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, SalahError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_error_is_shared() {
        let err = SalahError::producer(anyhow::anyhow!("網路中斷"));
        let cloned = err.clone();

        match (&err, &cloned) {
            (SalahError::ProducerFailure(a), SalahError::ProducerFailure(b)) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => panic!("expected ProducerFailure"),
        }
        assert!(err.to_string().contains("網路中斷"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_invalid_schedule_not_retryable() {
        let err = SalahError::InvalidSchedule("只有一個時間點".to_string());
        assert!(!err.is_retryable());
    }
}
