//! 每日排程儲存
//!
//! 依（日期、地點）快取當日禮拜時間表，同一天同一地點只請求一次。

use async_trait::async_trait;
use chrono::NaiveDate;
use salah_core::{ClockSource, PrayerTimings, Result, Schedule};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::derived_value::{DerivedValueCache, EntryStatus};
use crate::producer::KeyedProducer;

/// 排程鍵
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleKey {
    pub date: NaiveDate,
    pub location: String,
}

impl ScheduleKey {
    pub fn new(date: NaiveDate, location: impl Into<String>) -> Self {
        Self {
            date,
            location: location.into(),
        }
    }
}

/// 禮拜時間來源（外部服務）
#[async_trait]
pub trait ScheduleSource: Send + Sync + 'static {
    async fn fetch_timings(&self, date: NaiveDate, location: &str)
        -> anyhow::Result<PrayerTimings>;
}

struct FetchTimings {
    source: Arc<dyn ScheduleSource>,
    include_sunrise: bool,
}

#[async_trait]
impl KeyedProducer<ScheduleKey, Arc<Schedule>> for FetchTimings {
    async fn produce(&self, key: &ScheduleKey) -> anyhow::Result<Arc<Schedule>> {
        let timings = self.source.fetch_timings(key.date, &key.location).await?;
        let schedule = timings.to_schedule(self.include_sunrise)?;
        Ok(Arc::new(schedule))
    }
}

/// 每日排程儲存
#[derive(Clone)]
pub struct ScheduleStore {
    cache: DerivedValueCache<ScheduleKey, Arc<Schedule>>,
}

impl ScheduleStore {
    /// 創建新的排程儲存（不含日出）
    pub fn new(source: Arc<dyn ScheduleSource>) -> Self {
        Self::with_sunrise(source, false)
    }

    /// 是否將日出列為時間點
    pub fn with_sunrise(source: Arc<dyn ScheduleSource>, include_sunrise: bool) -> Self {
        let producer = FetchTimings {
            source,
            include_sunrise,
        };
        Self {
            cache: DerivedValueCache::keyed("daily-schedule", producer),
        }
    }

    /// 指定日期與地點的排程
    pub async fn schedule_for(&self, date: NaiveDate, location: &str) -> Result<Arc<Schedule>> {
        self.cache
            .get_or_compute(&ScheduleKey::new(date, location))
            .await
    }

    /// 時鐘所在日期的排程
    pub async fn today(&self, clock: &dyn ClockSource, location: &str) -> Result<Arc<Schedule>> {
        self.schedule_for(clock.today(), location).await
    }

    pub fn status(&self, date: NaiveDate, location: &str) -> EntryStatus {
        self.cache.status(&ScheduleKey::new(date, location))
    }

    /// 重新取得某日排程（例如來源更正時間）
    pub fn invalidate(&self, date: NaiveDate, location: &str) {
        self.cache.invalidate(&ScheduleKey::new(date, location));
    }

    /// 移除指定日期之前的排程
    pub fn evict_before(&self, date: NaiveDate) {
        let before = self.cache.len();
        self.cache.retain(|key| key.date >= date);
        tracing::debug!(
            "移除 {} 之前的排程，剩餘 {}/{}",
            date,
            self.cache.len(),
            before
        );
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use salah_core::{FixedClock, SalahError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticTimings {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ScheduleSource for StaticTimings {
        async fn fetch_timings(
            &self,
            date: NaiveDate,
            location: &str,
        ) -> anyhow::Result<PrayerTimings> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if location == "Atlantis" {
                anyhow::bail!("未知地點: {location}");
            }
            // 以日期微調 Fajr，方便分辨不同日的排程
            let fajr = format!("05:{:02}", chrono::Datelike::day(&date) % 60);
            Ok(PrayerTimings {
                fajr,
                sunrise: Some("06:30".into()),
                dhuhr: "12:00".into(),
                asr: "15:30".into(),
                maghrib: "18:00".into(),
                isha: "19:30".into(),
            })
        }
    }

    fn store(include_sunrise: bool) -> (ScheduleStore, Arc<StaticTimings>) {
        let source = Arc::new(StaticTimings {
            calls: AtomicUsize::new(0),
        });
        (ScheduleStore::with_sunrise(source.clone(), include_sunrise), source)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_same_day_fetched_once() {
        let (store, source) = store(false);

        let (a, b) = tokio::join!(
            store.schedule_for(day(1), "Mecca"),
            store.schedule_for(day(1), "Mecca")
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 5);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        store.schedule_for(day(1), "Medina").await.unwrap();
        store.schedule_for(day(2), "Mecca").await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_sunrise_included() {
        let (store, _) = store(true);

        let schedule = store.schedule_for(day(1), "Mecca").await.unwrap();
        assert_eq!(schedule.len(), 6);
        assert_eq!(schedule.position("Sunrise"), Some(1));
    }

    #[tokio::test]
    async fn test_today_follows_clock() {
        let (store, _) = store(false);
        let clock = FixedClock::new(0, day(7));

        let schedule = store.today(&clock, "Mecca").await.unwrap();
        assert_eq!(schedule.first().time_of_day, 5 * 3600 + 7 * 60);
        assert_eq!(store.status(day(7), "Mecca"), EntryStatus::Ready);
    }

    #[tokio::test]
    async fn test_failed_location_is_isolated() {
        let (store, _) = store(false);

        let err = store.schedule_for(day(1), "Atlantis").await.unwrap_err();
        assert!(matches!(err, SalahError::ProducerFailure(_)));
        assert_eq!(store.status(day(1), "Atlantis"), EntryStatus::Failed);

        assert!(store.schedule_for(day(1), "Mecca").await.is_ok());
    }

    #[rstest]
    #[case::nothing_older(day(1), 4)]
    #[case::drops_two(day(3), 2)]
    #[case::drops_all(day(5), 0)]
    #[tokio::test]
    async fn test_evict_before(#[case] cutoff: NaiveDate, #[case] remaining: usize) {
        let (store, _) = store(false);
        for d in 1..=4 {
            store.schedule_for(day(d), "Mecca").await.unwrap();
        }

        store.evict_before(cutoff);

        assert_eq!(store.len(), remaining);
        assert_eq!(
            store.status(day(4), "Mecca") == EntryStatus::Ready,
            cutoff <= day(4)
        );
        if cutoff > day(1) {
            assert_eq!(store.status(day(1), "Mecca"), EntryStatus::Idle);
        }
    }

    #[tokio::test]
    async fn test_invalidate_refetches() {
        let (store, source) = store(false);

        store.schedule_for(day(1), "Mecca").await.unwrap();
        store.invalidate(day(1), "Mecca");
        store.schedule_for(day(1), "Mecca").await.unwrap();

        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }
}
