//! 定時刷新
//!
//! 以固定間隔重新評估排程，透過 watch channel 發布最新結果：
//! - [`ClockTicker`]：進度狀態，依 `tick_interval`（約 1 Hz）刷新
//! - [`NextPrayerTicker`]：下一次禮拜的倒數，依 `next_prayer_interval`（約每分鐘）刷新

use salah_core::{ClockConfig, ClockSource, ClockState, Result, Schedule};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{Countdown, ScheduleClock};

type Evaluate<T> = fn(&Schedule, u32) -> Result<T>;

/// 共用的刷新迴圈：排程替換時立即重新評估，結果有變化才發布
struct Refresher<T> {
    state: watch::Receiver<T>,
    schedule: watch::Sender<Arc<Schedule>>,
    task: JoinHandle<()>,
}

impl<T> Refresher<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn spawn(
        name: &'static str,
        schedule: Schedule,
        clock: Arc<dyn ClockSource>,
        interval: Duration,
        evaluate: Evaluate<T>,
    ) -> Result<Self> {
        let initial = evaluate(&schedule, clock.now_seconds())?;
        let (state_tx, state_rx) = watch::channel(initial);
        let (schedule_tx, mut schedule_rx) = watch::channel(Arc::new(schedule));

        tracing::info!("啟動{}，間隔 {:?}", name, interval);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = schedule_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        tracing::debug!("{}: 排程已更新，立即重新評估", name);
                    }
                }

                let schedule = schedule_rx.borrow_and_update().clone();
                match evaluate(&schedule, clock.now_seconds()) {
                    Ok(next) => {
                        state_tx.send_if_modified(|current| {
                            if *current == next {
                                return false;
                            }
                            *current = next;
                            true
                        });
                    }
                    // 保留上一個結果
                    Err(err) => tracing::warn!("{}: 排程評估失敗: {}", name, err),
                }
            }

            tracing::debug!("{}結束", name);
        });

        Ok(Self {
            state: state_rx,
            schedule: schedule_tx,
            task,
        })
    }

    fn set_schedule(&self, schedule: Schedule) -> Result<()> {
        ScheduleClock::check_schedule(&schedule)?;
        self.schedule.send_replace(Arc::new(schedule));
        Ok(())
    }
}

impl<T> Drop for Refresher<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 排程刷新器
///
/// 必須在 tokio runtime 內建立；drop 時停止背景任務。
pub struct ClockTicker {
    inner: Refresher<ClockState>,
}

impl ClockTicker {
    /// 啟動刷新器（建立時先同步評估一次，無效排程直接回傳錯誤）
    pub fn spawn(
        schedule: Schedule,
        clock: Arc<dyn ClockSource>,
        interval: Duration,
    ) -> Result<Self> {
        let inner = Refresher::spawn(
            "排程刷新器",
            schedule,
            clock,
            interval,
            ScheduleClock::evaluate,
        )?;
        Ok(Self { inner })
    }

    /// 依配置的刷新間隔啟動
    pub fn from_config(
        schedule: Schedule,
        clock: Arc<dyn ClockSource>,
        config: &ClockConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::spawn(schedule, clock, config.tick_interval)
    }

    /// 訂閱狀態變化
    pub fn subscribe(&self) -> watch::Receiver<ClockState> {
        self.inner.state.clone()
    }

    /// 最新狀態
    pub fn current(&self) -> ClockState {
        self.inner.state.borrow().clone()
    }

    /// 換日或換地點時替換排程
    pub fn set_schedule(&self, schedule: Schedule) -> Result<()> {
        self.inner.set_schedule(schedule)
    }

    /// 停止背景任務
    pub fn stop(&self) {
        self.inner.task.abort();
    }
}

/// 下一次禮拜倒數刷新器
///
/// 低頻查詢用（例如通知列、小工具），不需要逐秒的進度動畫。
pub struct NextPrayerTicker {
    inner: Refresher<Countdown>,
}

impl NextPrayerTicker {
    pub fn spawn(
        schedule: Schedule,
        clock: Arc<dyn ClockSource>,
        interval: Duration,
    ) -> Result<Self> {
        let inner = Refresher::spawn(
            "倒數刷新器",
            schedule,
            clock,
            interval,
            Countdown::until_next,
        )?;
        Ok(Self { inner })
    }

    /// 依 `next_prayer_interval` 啟動
    pub fn from_config(
        schedule: Schedule,
        clock: Arc<dyn ClockSource>,
        config: &ClockConfig,
    ) -> Result<Self> {
        config.validate()?;
        Self::spawn(schedule, clock, config.next_prayer_interval)
    }

    pub fn subscribe(&self) -> watch::Receiver<Countdown> {
        self.inner.state.clone()
    }

    /// 最新倒數
    pub fn current(&self) -> Countdown {
        self.inner.state.borrow().clone()
    }

    pub fn set_schedule(&self, schedule: Schedule) -> Result<()> {
        self.inner.set_schedule(schedule)
    }

    pub fn stop(&self) {
        self.inner.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use salah_core::{Checkpoint, DayPhase, FixedClock, SalahError};

    fn hm(h: u32, m: u32) -> u32 {
        h * 3600 + m * 60
    }

    fn daily() -> Schedule {
        Schedule::new(vec![
            Checkpoint::new("Fajr", hm(5, 0)),
            Checkpoint::new("Dhuhr", hm(12, 0)),
            Checkpoint::new("Asr", hm(15, 30)),
            Checkpoint::new("Maghrib", hm(18, 0)),
            Checkpoint::new("Isha", hm(19, 30)),
        ])
        .unwrap()
    }

    fn clock_at(seconds: u32) -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            seconds,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_publishes_changes() {
        let clock = clock_at(hm(13, 0));
        let ticker = ClockTicker::spawn(daily(), clock.clone(), Duration::from_secs(1)).unwrap();
        let mut rx = ticker.subscribe();

        assert_eq!(ticker.current().next_label, "Asr");

        clock.set(hm(19, 45));
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();

        assert!(rx.borrow().is_completed());
        assert_eq!(rx.borrow().next_label, "Fajr");
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_schedule_reevaluates() {
        let clock = clock_at(hm(13, 0));
        let ticker = ClockTicker::spawn(daily(), clock, Duration::from_secs(60)).unwrap();
        let mut rx = ticker.subscribe();

        let later = Schedule::new(vec![
            Checkpoint::new("Fajr", hm(14, 0)),
            Checkpoint::new("Isha", hm(20, 0)),
        ])
        .unwrap();
        ticker.set_schedule(later).unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rx.borrow().phase, DayPhase::BeforeFirst);
    }

    #[tokio::test]
    async fn test_invalid_schedule_rejected() {
        let single = Schedule::new(vec![Checkpoint::new("Fajr", hm(5, 0))]).unwrap();

        let spawned = ClockTicker::spawn(single.clone(), clock_at(0), Duration::from_secs(1));
        assert!(matches!(spawned, Err(SalahError::InvalidSchedule(_))));

        let ticker = ClockTicker::spawn(daily(), clock_at(0), Duration::from_secs(1)).unwrap();
        assert!(ticker.set_schedule(single).is_err());
        ticker.stop();
    }

    #[tokio::test]
    async fn test_from_config_validates() {
        let config = ClockConfig::new().with_tick_interval(Duration::ZERO);
        let result = ClockTicker::from_config(daily(), clock_at(0), &config);
        assert!(matches!(result, Err(SalahError::InvalidConfig(_))));

        let config = ClockConfig::new().with_next_prayer_interval(Duration::ZERO);
        let result = NextPrayerTicker::from_config(daily(), clock_at(0), &config);
        assert!(matches!(result, Err(SalahError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_prayer_follows_interval() {
        let clock = clock_at(hm(13, 0));
        let config = ClockConfig::new().with_next_prayer_interval(Duration::from_secs(60));
        let ticker = NextPrayerTicker::from_config(daily(), clock.clone(), &config).unwrap();
        let mut rx = ticker.subscribe();

        assert_eq!(ticker.current().label, "Asr");
        assert_eq!(ticker.current().to_string(), "02:30:00");

        // 先讓第一次（立即的）刷新跑完
        tokio::time::sleep(Duration::from_secs(1)).await;

        // 時鐘前進，但下一次刷新要等滿一個間隔
        clock.advance(3600);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ticker.current().to_string(), "02:30:00");

        tokio::time::timeout(Duration::from_secs(60), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rx.borrow().label, "Asr");
        assert_eq!(rx.borrow().to_string(), "01:30:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_prayer_wraps_after_last() {
        let clock = clock_at(hm(19, 0));
        let ticker =
            NextPrayerTicker::spawn(daily(), clock.clone(), Duration::from_secs(60)).unwrap();
        let mut rx = ticker.subscribe();
        assert_eq!(ticker.current().label, "Isha");

        clock.set(hm(19, 45));
        tokio::time::timeout(Duration::from_secs(120), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rx.borrow().label, "Fajr");
        assert_eq!(rx.borrow().total_seconds(), u64::from(hm(9, 15)));
        ticker.stop();
    }
}
