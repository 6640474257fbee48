//! 排程進度計算
//!
//! 純函數：給定當日排程與目前時刻，計算下一個時間點、進度比例與已經過的時間點。
//! 不做 I/O、不等待，可在高頻刷新路徑上直接呼叫。

use salah_core::{
    Checkpoint, CheckpointStatus, ClockState, DayPhase, Result, SalahError, Schedule,
    SECONDS_PER_DAY,
};
use std::time::Duration;

/// 排程時鐘
pub struct ScheduleClock;

impl ScheduleClock {
    /// 評估目前在當日排程中的位置
    ///
    /// - 最後一個時間點之後：今日排程結束，進度歸零，下一個為（隔天的）第一個時間點
    /// - 第一個時間點之前：進度歸零，下一個為第一個時間點
    /// - 其餘：進度依時間點索引平均分段，區間內線性插值
    ///
    /// 剛好等於某時間點時，該時間點視為已經過。
    pub fn evaluate(schedule: &Schedule, now: u32) -> Result<ClockState> {
        Self::check_inputs(schedule, now)?;

        let first = schedule.first();
        let last = schedule.last();

        if now >= last.time_of_day {
            return Ok(ClockState::reset(first.label.clone(), DayPhase::Completed));
        }

        if now < first.time_of_day {
            return Ok(ClockState::reset(first.label.clone(), DayPhase::BeforeFirst));
        }

        let checkpoints = schedule.as_slice();

        // now 介於第一個與最後一個之間，passed_count 必定在 [1, N-1]
        let passed_count = checkpoints.partition_point(|cp| cp.time_of_day <= now);
        let index = passed_count - 1;
        let from = &checkpoints[index];
        let to = &checkpoints[index + 1];

        let span = f64::from(to.time_of_day - from.time_of_day);
        let local_t = (f64::from(now - from.time_of_day) / span).clamp(0.0, 1.0);
        let segments = (checkpoints.len() - 1) as f64;
        let progress_fraction = ((index as f64 + local_t) / segments).clamp(0.0, 1.0);

        Ok(ClockState {
            next_label: to.label.clone(),
            progress_fraction,
            passed: checkpoints[..passed_count]
                .iter()
                .map(|cp| cp.label.clone())
                .collect(),
            phase: DayPhase::Between { index },
        })
    }

    /// 下一個時間點（不套用結束歸零的顯示規則）
    ///
    /// 今日已無剩餘時間點時，回傳隔天的第一個時間點。
    pub fn next_checkpoint(schedule: &Schedule, now: u32) -> Result<(&Checkpoint, Duration)> {
        Self::check_inputs(schedule, now)?;

        let next = match schedule.iter().find(|cp| cp.time_of_day > now) {
            Some(cp) => (cp, cp.time_of_day - now),
            None => {
                let first = schedule.first();
                (first, first.time_of_day + SECONDS_PER_DAY - now)
            }
        };

        Ok((next.0, Duration::from_secs(u64::from(next.1))))
    }

    /// 距離下一個時間點的時間
    pub fn time_until_next(schedule: &Schedule, now: u32) -> Result<Duration> {
        Self::next_checkpoint(schedule, now).map(|(_, wait)| wait)
    }

    /// 依排程順序分類每個時間點
    pub fn statuses(schedule: &Schedule, now: u32) -> Result<Vec<(String, CheckpointStatus)>> {
        let state = Self::evaluate(schedule, now)?;
        Ok(schedule
            .iter()
            .map(|cp| (cp.label.clone(), state.status_of(&cp.label)))
            .collect())
    }

    /// 少於兩個時間點無法定義進度區間
    pub fn check_schedule(schedule: &Schedule) -> Result<()> {
        if schedule.len() < 2 {
            return Err(SalahError::InvalidSchedule(format!(
                "至少需要 2 個時間點，目前 {} 個",
                schedule.len()
            )));
        }
        Ok(())
    }

    fn check_inputs(schedule: &Schedule, now: u32) -> Result<()> {
        Self::check_schedule(schedule)?;
        if now >= SECONDS_PER_DAY {
            return Err(SalahError::InvalidTime(now));
        }
        Ok(())
    }
}
