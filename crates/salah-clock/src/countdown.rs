//! 倒數顯示

use salah_core::{Result, Schedule};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::ScheduleClock;

/// 距離下一個時間點的倒數
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    /// 下一個時間點的標籤
    pub label: String,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Countdown {
    /// 從等待時間建立
    pub fn new(label: impl Into<String>, wait: Duration) -> Self {
        let total = wait.as_secs();
        Self {
            label: label.into(),
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    /// 目前時刻到下一個時間點的倒數
    pub fn until_next(schedule: &Schedule, now: u32) -> Result<Self> {
        let (next, wait) = ScheduleClock::next_checkpoint(schedule, now)?;
        Ok(Self::new(next.label.clone(), wait))
    }

    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds
        )
    }
}
