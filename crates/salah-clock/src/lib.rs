//! # Salah Clock
//!
//! 禮拜排程進度引擎：下一個時間點、進度比例、倒數與定時刷新

pub mod countdown;
pub mod schedule_clock;
pub mod ticker;

// Re-export 主要類型
pub use countdown::Countdown;
pub use schedule_clock::ScheduleClock;
pub use ticker::{ClockTicker, NextPrayerTicker};
