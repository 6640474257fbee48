//! 每日禮拜進度示例

use salah::salah_core::{format_time_of_day, FixedClock, PrayerTimings};
use salah::{ClockConfig, ClockSource, ClockTicker, Countdown, ScheduleClock};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== 每日禮拜進度示例 ===\n");

    let timings: PrayerTimings = serde_json::from_str(
        r#"{
            "Fajr": "05:00 (+03)",
            "Sunrise": "06:25 (+03)",
            "Dhuhr": "12:00 (+03)",
            "Asr": "15:30 (+03)",
            "Maghrib": "18:00 (+03)",
            "Isha": "19:30 (+03)"
        }"#,
    )?;
    let schedule = timings.to_schedule(false)?;

    println!("今日時間表:");
    for checkpoint in &schedule {
        println!(
            "  - {:<8} {}",
            checkpoint.label,
            format_time_of_day(checkpoint.time_of_day)
        );
    }

    // 一天中的幾個時刻
    println!("\n進度:");
    for now in [4 * 3600, 13 * 3600, 17 * 3600 + 10 * 60, 19 * 3600 + 45 * 60] {
        let state = ScheduleClock::evaluate(&schedule, now)?;
        let countdown = Countdown::until_next(&schedule, now)?;
        println!(
            "  {} → 下一個 {:<8} 倒數 {}  進度 {:>5.1}%  已過 {:?}",
            format_time_of_day(now),
            state.next_label,
            countdown,
            state.percent(),
            state.passed
        );
    }

    // 刷新器：模擬時鐘每秒前進十分鐘
    println!("\n刷新器:");
    let clock = Arc::new(FixedClock::new(
        11 * 3600 + 30 * 60,
        chrono::Local::now().date_naive(),
    ));
    let config = ClockConfig::new().with_tick_interval(Duration::from_millis(200));
    let ticker = ClockTicker::from_config(schedule, clock.clone(), &config)?;
    let mut updates = ticker.subscribe();

    for _ in 0..5 {
        clock.advance(10 * 60);
        if tokio::time::timeout(Duration::from_secs(1), updates.changed())
            .await
            .is_ok()
        {
            let state = updates.borrow_and_update().clone();
            println!(
                "  {} → {} ({:.1}%)",
                format_time_of_day(clock.now_seconds()),
                state.next_label,
                state.percent()
            );
        }
    }
    ticker.stop();

    Ok(())
}
