//! # Salah Cache
//!
//! 單次計算（single-flight）的衍生值快取，以及建立在其上的
//! 每日排程儲存與章節閱讀進度快取。

pub mod derived_value;
pub mod producer;
pub mod reading_progress;
pub mod schedule_store;

// Re-export 主要類型
pub use derived_value::{DerivedValueCache, EntryStatus};
pub use producer::{BulkFn, BulkProducer, KeyedFn, KeyedProducer};
pub use reading_progress::{ChapterProgressCache, ProgressSource};
pub use schedule_store::{ScheduleKey, ScheduleSource, ScheduleStore};
