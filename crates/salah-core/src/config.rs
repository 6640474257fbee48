//! 排程時鐘配置

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Result, SalahError};

/// UTC 偏移量上限（±18 小時）
const MAX_UTC_OFFSET_SECONDS: i32 = 18 * 3600;

/// 排程時鐘配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// 進度動畫刷新間隔（預設 1 秒）
    #[serde(with = "duration_secs")]
    pub tick_interval: Duration,

    /// 「下一次禮拜」查詢間隔（預設 60 秒）
    #[serde(with = "duration_secs")]
    pub next_prayer_interval: Duration,

    /// 使用者時區的 UTC 偏移（秒）
    pub utc_offset_seconds: i32,
}

impl ClockConfig {
    /// 創建預設配置
    pub fn new() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            next_prayer_interval: Duration::from_secs(60),
            utc_offset_seconds: 0,
        }
    }

    /// 建構器模式：設置刷新間隔
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// 建構器模式：設置下一次禮拜查詢間隔
    pub fn with_next_prayer_interval(mut self, interval: Duration) -> Self {
        self.next_prayer_interval = interval;
        self
    }

    /// 建構器模式：設置 UTC 偏移
    pub fn with_utc_offset_seconds(mut self, offset: i32) -> Self {
        self.utc_offset_seconds = offset;
        self
    }

    /// 從 JSON 載入並驗證
    ///
    /// # 範例
    /// ```
    /// use salah_core::ClockConfig;
    ///
    /// let config = ClockConfig::from_json(r#"{"tick_interval": 2, "utc_offset_seconds": 10800}"#).unwrap();
    /// assert_eq!(config.tick_interval.as_secs(), 2);
    /// assert_eq!(config.next_prayer_interval.as_secs(), 60);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SalahError::InvalidConfig(format!("配置解析失敗: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 驗證配置
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() || self.next_prayer_interval.is_zero() {
            return Err(SalahError::InvalidConfig(
                "刷新間隔必須大於零".to_string(),
            ));
        }
        let allowed = -MAX_UTC_OFFSET_SECONDS..=MAX_UTC_OFFSET_SECONDS;
        if !allowed.contains(&self.utc_offset_seconds) {
            return Err(SalahError::InvalidConfig(format!(
                "UTC 偏移超出範圍: {}",
                self.utc_offset_seconds
            )));
        }
        Ok(())
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// `Duration` 以整數秒序列化
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
