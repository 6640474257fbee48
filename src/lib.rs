//! # Salah
//!
//! 每日禮拜進度時鐘與衍生值快取。
//!
//! - [`salah_core`]: 時間點、排程、狀態與配置
//! - [`salah_clock`]: 進度計算、倒數與定時刷新
//! - [`salah_cache`]: 單次計算快取、每日排程儲存、閱讀進度

pub use salah_cache;
pub use salah_clock;
pub use salah_core;

pub use salah_cache::{ChapterProgressCache, DerivedValueCache, ScheduleStore};
pub use salah_clock::{ClockTicker, Countdown, NextPrayerTicker, ScheduleClock};
pub use salah_core::{
    Checkpoint, ClockConfig, ClockSource, ClockState, DayPhase, Result, SalahError, Schedule,
};
