//! 時鐘來源
//!
//! 排程時鐘本身不處理時區，由呼叫端提供「當地午夜起算秒數」。

use chrono::{FixedOffset, NaiveDate, NaiveTime, Offset, Timelike, Utc};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{ClockConfig, Result, SalahError, SECONDS_PER_DAY};

/// 時鐘來源
pub trait ClockSource: Send + Sync {
    /// 當地午夜起算秒數（0 ≤ t < 86400）
    fn now_seconds(&self) -> u32;

    /// 當地日期
    fn today(&self) -> NaiveDate;
}

/// `NaiveTime` 轉為午夜起算秒數
pub fn seconds_since_midnight(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight()
}

/// 系統時鐘（固定 UTC 偏移）
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// 創建 UTC 時鐘
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// 指定 UTC 偏移（秒）
    pub fn with_offset_seconds(offset_seconds: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(offset_seconds).ok_or_else(|| {
            SalahError::InvalidConfig(format!("無效的 UTC 偏移: {offset_seconds}"))
        })?;
        Ok(Self { offset })
    }

    /// 從配置創建
    pub fn from_config(config: &ClockConfig) -> Result<Self> {
        Self::with_offset_seconds(config.utc_offset_seconds)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl ClockSource for SystemClock {
    fn now_seconds(&self) -> u32 {
        seconds_since_midnight(Utc::now().with_timezone(&self.offset).time())
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// 固定時鐘（測試與回放用）
#[derive(Debug)]
pub struct FixedClock {
    seconds: AtomicU32,
    date: NaiveDate,
}

impl FixedClock {
    /// 創建固定時鐘
    pub fn new(seconds: u32, date: NaiveDate) -> Self {
        Self {
            seconds: AtomicU32::new(seconds % SECONDS_PER_DAY),
            date,
        }
    }

    /// 設置目前秒數
    pub fn set(&self, seconds: u32) {
        self.seconds.store(seconds % SECONDS_PER_DAY, Ordering::SeqCst);
    }

    /// 前進指定秒數（跨午夜會繞回，日期不變）
    pub fn advance(&self, seconds: u32) {
        let current = self.seconds.load(Ordering::SeqCst);
        self.set((current + seconds % SECONDS_PER_DAY) % SECONDS_PER_DAY);
    }
}

impl ClockSource for FixedClock {
    fn now_seconds(&self) -> u32 {
        self.seconds.load(Ordering::SeqCst)
    }

    fn today(&self) -> NaiveDate {
        self.date
    }
}
