//! 每日禮拜時間資料（排程來源回傳的格式）

use serde::{Deserialize, Serialize};

use crate::{parse_time_of_day, Checkpoint, Result, Schedule};

/// 一天的禮拜時間
///
/// 欄位為 `HH:MM` 字串，允許尾隨時區標記，如 `"05:00 (+03)"`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrayerTimings {
    pub fajr: String,
    pub sunrise: Option<String>,
    pub dhuhr: String,
    pub asr: String,
    pub maghrib: String,
    pub isha: String,
}

impl PrayerTimings {
    /// 轉換為排程
    ///
    /// `include_sunrise` 為 true 時日出也列為時間點（日出不是禮拜，
    /// 但部分畫面會顯示）。
    pub fn to_schedule(&self, include_sunrise: bool) -> Result<Schedule> {
        let mut checkpoints = vec![Checkpoint::new("Fajr", parse_timing(&self.fajr)?)];

        if include_sunrise {
            if let Some(sunrise) = &self.sunrise {
                checkpoints.push(Checkpoint::new("Sunrise", parse_timing(sunrise)?));
            }
        }

        checkpoints.push(Checkpoint::new("Dhuhr", parse_timing(&self.dhuhr)?));
        checkpoints.push(Checkpoint::new("Asr", parse_timing(&self.asr)?));
        checkpoints.push(Checkpoint::new("Maghrib", parse_timing(&self.maghrib)?));
        checkpoints.push(Checkpoint::new("Isha", parse_timing(&self.isha)?));

        Schedule::new(checkpoints)
    }
}

/// 去掉尾隨的時區標記後解析
fn parse_timing(raw: &str) -> Result<u32> {
    let time = raw.split_whitespace().next().unwrap_or_default();
    parse_time_of_day(time)
}
