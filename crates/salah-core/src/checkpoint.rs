//! 時間點與每日排程模型

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{seconds_since_midnight, Result, SalahError};

/// 一天的秒數
pub const SECONDS_PER_DAY: u32 = 86_400;

/// 時間點（一天中的某個有標籤的時刻）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// 標籤（同一排程內唯一，如 "Fajr"）
    pub label: String,

    /// 當地午夜起算的秒數（0 ≤ t < 86400）
    pub time_of_day: u32,
}

impl Checkpoint {
    /// 創建新的時間點
    pub fn new(label: impl Into<String>, time_of_day: u32) -> Self {
        Self {
            label: label.into(),
            time_of_day,
        }
    }

    /// 從 `HH:MM` 或 `HH:MM:SS` 字串創建
    pub fn parse(label: impl Into<String>, time: &str) -> Result<Self> {
        Ok(Self::new(label, parse_time_of_day(time)?))
    }
}

/// 每日排程
///
/// 依 `time_of_day` 嚴格遞增排序、標籤唯一、至少一個時間點。
/// 建構後不可變；每個日曆日（或地點變更）重新建構一次。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Checkpoint>", into = "Vec<Checkpoint>")]
pub struct Schedule {
    checkpoints: Vec<Checkpoint>,
}

impl Schedule {
    /// 創建排程（會先依時間排序再驗證）
    pub fn new(mut checkpoints: Vec<Checkpoint>) -> Result<Self> {
        if checkpoints.is_empty() {
            return Err(SalahError::InvalidSchedule("排程不可為空".to_string()));
        }

        checkpoints.sort_by_key(|cp| cp.time_of_day);

        let mut labels = HashSet::new();
        for cp in &checkpoints {
            if cp.time_of_day >= SECONDS_PER_DAY {
                return Err(SalahError::InvalidSchedule(format!(
                    "{} 的時刻 {} 超出一天範圍",
                    cp.label, cp.time_of_day
                )));
            }
            if !labels.insert(cp.label.as_str()) {
                return Err(SalahError::InvalidSchedule(format!(
                    "重複的標籤: {}",
                    cp.label
                )));
            }
        }

        // 相鄰時間點不可同一時刻，否則區間長度為零
        if let Some(pair) = checkpoints
            .windows(2)
            .find(|pair| pair[0].time_of_day == pair[1].time_of_day)
        {
            return Err(SalahError::InvalidSchedule(format!(
                "{} 與 {} 時刻相同",
                pair[0].label, pair[1].label
            )));
        }

        Ok(Self { checkpoints })
    }

    /// 時間點數量
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// 排程建構時保證非空，恆為 false
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// 第一個時間點
    pub fn first(&self) -> &Checkpoint {
        &self.checkpoints[0]
    }

    /// 最後一個時間點
    pub fn last(&self) -> &Checkpoint {
        &self.checkpoints[self.checkpoints.len() - 1]
    }

    /// 依索引取得時間點
    pub fn get(&self, index: usize) -> Option<&Checkpoint> {
        self.checkpoints.get(index)
    }

    /// 查詢標籤的位置
    pub fn position(&self, label: &str) -> Option<usize> {
        self.checkpoints.iter().position(|cp| cp.label == label)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Checkpoint> {
        self.checkpoints.iter()
    }

    pub fn as_slice(&self) -> &[Checkpoint] {
        &self.checkpoints
    }
}

impl TryFrom<Vec<Checkpoint>> for Schedule {
    type Error = SalahError;

    fn try_from(checkpoints: Vec<Checkpoint>) -> Result<Self> {
        Self::new(checkpoints)
    }
}

impl From<Schedule> for Vec<Checkpoint> {
    fn from(schedule: Schedule) -> Self {
        schedule.checkpoints
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a Checkpoint;
    type IntoIter = std::slice::Iter<'a, Checkpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.checkpoints.iter()
    }
}

/// 解析 `HH:MM` 或 `HH:MM:SS` 為午夜起算秒數
pub fn parse_time_of_day(text: &str) -> Result<u32> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map(seconds_since_midnight)
        .map_err(|_| SalahError::InvalidTimeFormat(text.to_string()))
}

/// 秒數格式化為 `HH:MM`（超過一天會取餘數）
pub fn format_time_of_day(seconds: u32) -> String {
    let seconds = seconds % SECONDS_PER_DAY;
    format!("{:02}:{:02}", seconds / 3600, (seconds % 3600) / 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn hm(h: u32, m: u32) -> u32 {
        h * 3600 + m * 60
    }

    #[test]
    fn test_create_schedule_sorts_checkpoints() {
        let schedule = Schedule::new(vec![
            Checkpoint::new("Isha", hm(19, 30)),
            Checkpoint::new("Fajr", hm(5, 0)),
            Checkpoint::new("Dhuhr", hm(12, 0)),
        ])
        .unwrap();

        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.first().label, "Fajr");
        assert_eq!(schedule.last().label, "Isha");
        assert_eq!(schedule.position("Dhuhr"), Some(1));
        assert_eq!(schedule.position("Asr"), None);
    }

    #[test]
    fn test_empty_schedule_rejected() {
        let err = Schedule::new(vec![]).unwrap_err();
        assert!(matches!(err, SalahError::InvalidSchedule(_)));
    }

    #[test]
    fn test_single_checkpoint_allowed() {
        // 建構允許單一時間點，評估時才會拒絕
        let schedule = Schedule::new(vec![Checkpoint::new("Fajr", hm(5, 0))]).unwrap();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.first(), schedule.last());
    }

    #[rstest]
    #[case::duplicate_label(vec![Checkpoint::new("Fajr", 100), Checkpoint::new("Fajr", 200)])]
    #[case::duplicate_time(vec![Checkpoint::new("Fajr", 100), Checkpoint::new("Dhuhr", 100)])]
    #[case::out_of_range(vec![Checkpoint::new("Fajr", 100), Checkpoint::new("Isha", SECONDS_PER_DAY)])]
    fn test_malformed_schedule_rejected(#[case] checkpoints: Vec<Checkpoint>) {
        let err = Schedule::new(checkpoints).unwrap_err();
        assert!(matches!(err, SalahError::InvalidSchedule(_)));
    }

    #[rstest]
    #[case("05:00", hm(5, 0))]
    #[case("19:30", hm(19, 30))]
    #[case(" 12:05 ", hm(12, 5))]
    #[case("00:00:30", 30)]
    #[case("23:59:59", SECONDS_PER_DAY - 1)]
    fn test_parse_time_of_day(#[case] text: &str, #[case] expected: u32) {
        assert_eq!(parse_time_of_day(text).unwrap(), expected);
    }

    #[rstest]
    #[case("25:00")]
    #[case("5 o'clock")]
    #[case("")]
    fn test_parse_time_of_day_rejects_garbage(#[case] text: &str) {
        assert!(matches!(
            parse_time_of_day(text),
            Err(SalahError::InvalidTimeFormat(_))
        ));
    }

    #[test]
    fn test_format_time_of_day() {
        assert_eq!(format_time_of_day(hm(5, 7)), "05:07");
        assert_eq!(format_time_of_day(hm(19, 30) + 59), "19:30");
        assert_eq!(format_time_of_day(SECONDS_PER_DAY + hm(1, 0)), "01:00");
    }

    #[test]
    fn test_schedule_deserialize_validates() {
        let json = r#"[{"label":"Dhuhr","time_of_day":43200},{"label":"Fajr","time_of_day":18000}]"#;
        let schedule: Schedule = serde_json::from_str(json).unwrap();
        assert_eq!(schedule.first().label, "Fajr");

        let bad = r#"[]"#;
        assert!(serde_json::from_str::<Schedule>(bad).is_err());
    }
}
