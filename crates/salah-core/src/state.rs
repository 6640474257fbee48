//! 排程進度狀態（每次評估重新計算，不持久化）

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 目前處於一天中的哪個階段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayPhase {
    /// 第一個時間點之前
    BeforeFirst,
    /// 介於 `index` 與 `index + 1` 兩個時間點之間
    Between { index: usize },
    /// 最後一個時間點之後，今日排程已結束
    Completed,
}

/// 單一時間點的分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointStatus {
    /// 已經過
    Passed,
    /// 下一個
    Next,
    /// 尚未到來
    Upcoming,
}

/// 排程進度狀態
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockState {
    /// 下一個時間點的標籤
    pub next_label: String,

    /// 進度（0.0 ~ 1.0），以時間點索引平均分段
    pub progress_fraction: f64,

    /// 已經過的時間點標籤
    pub passed: BTreeSet<String>,

    pub phase: DayPhase,
}

impl ClockState {
    /// 進度歸零的狀態（第一個時間點之前或今日已結束）
    pub fn reset(next_label: impl Into<String>, phase: DayPhase) -> Self {
        Self {
            next_label: next_label.into(),
            progress_fraction: 0.0,
            passed: BTreeSet::new(),
            phase,
        }
    }

    /// 檢查時間點是否已經過
    pub fn is_passed(&self, label: &str) -> bool {
        self.passed.contains(label)
    }

    /// 分類時間點
    pub fn status_of(&self, label: &str) -> CheckpointStatus {
        if self.is_passed(label) {
            CheckpointStatus::Passed
        } else if self.next_label == label {
            CheckpointStatus::Next
        } else {
            CheckpointStatus::Upcoming
        }
    }

    /// 今日排程是否已結束
    pub fn is_completed(&self) -> bool {
        self.phase == DayPhase::Completed
    }

    /// 進度百分比（0 ~ 100）
    pub fn percent(&self) -> f64 {
        self.progress_fraction * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_state() {
        let state = ClockState::reset("Fajr", DayPhase::Completed);

        assert_eq!(state.next_label, "Fajr");
        assert_eq!(state.progress_fraction, 0.0);
        assert!(state.passed.is_empty());
        assert!(state.is_completed());
        assert_eq!(state.status_of("Fajr"), CheckpointStatus::Next);
        assert_eq!(state.status_of("Isha"), CheckpointStatus::Upcoming);
    }

    #[test]
    fn test_status_of_passed() {
        let mut state = ClockState::reset("Asr", DayPhase::Between { index: 1 });
        state.passed.insert("Fajr".to_string());
        state.passed.insert("Dhuhr".to_string());
        state.progress_fraction = 0.25;

        assert_eq!(state.status_of("Fajr"), CheckpointStatus::Passed);
        assert_eq!(state.status_of("Asr"), CheckpointStatus::Next);
        assert_eq!(state.status_of("Maghrib"), CheckpointStatus::Upcoming);
        assert_eq!(state.percent(), 25.0);
        assert!(!state.is_completed());
    }
}
