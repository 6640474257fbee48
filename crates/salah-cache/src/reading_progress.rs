//! 章節閱讀進度快取
//!
//! 一次網路請求取得所有章節的進度，分發到各章節；
//! 使用者閱讀後（進度變動）立即失效對應章節。

use async_trait::async_trait;
use salah_core::{ChapterId, ReadingProgress, Result, SalahError};
use std::collections::HashMap;
use std::sync::Arc;

use crate::derived_value::{DerivedValueCache, EntryStatus};
use crate::producer::BulkProducer;

/// 閱讀進度來源（外部服務）
#[async_trait]
pub trait ProgressSource: Send + Sync + 'static {
    /// 取得所有章節的進度
    async fn fetch_all(&self) -> anyhow::Result<Vec<ReadingProgress>>;

    /// 記錄讀到某章第幾節
    async fn record(&self, chapter: ChapterId, verse: u32) -> anyhow::Result<()>;
}

struct FetchAll(Arc<dyn ProgressSource>);

#[async_trait]
impl BulkProducer<ChapterId, ReadingProgress> for FetchAll {
    async fn produce_all(&self) -> anyhow::Result<HashMap<ChapterId, ReadingProgress>> {
        let all = self.0.fetch_all().await?;
        Ok(all.into_iter().map(|p| (p.chapter, p)).collect())
    }
}

/// 章節閱讀進度快取
#[derive(Clone)]
pub struct ChapterProgressCache {
    source: Arc<dyn ProgressSource>,
    cache: DerivedValueCache<ChapterId, ReadingProgress>,
}

impl ChapterProgressCache {
    pub fn new(source: Arc<dyn ProgressSource>) -> Self {
        Self {
            cache: DerivedValueCache::bulk("reading-progress", FetchAll(Arc::clone(&source))),
            source,
        }
    }

    /// 章節進度
    pub async fn progress(&self, chapter: ChapterId) -> Result<ReadingProgress> {
        self.cache.get_or_compute(&chapter).await
    }

    /// 章節進度比例
    pub async fn fraction(&self, chapter: ChapterId) -> Result<f64> {
        self.progress(chapter).await.map(|p| p.fraction())
    }

    /// 已就緒的進度（不觸發請求）
    pub fn cached(&self, chapter: ChapterId) -> Option<ReadingProgress> {
        self.cache.peek(&chapter)
    }

    pub fn status(&self, chapter: ChapterId) -> EntryStatus {
        self.cache.status(&chapter)
    }

    /// 記錄閱讀並失效該章節
    pub async fn record_read(&self, chapter: ChapterId, verse: u32) -> Result<()> {
        self.source
            .record(chapter, verse)
            .await
            .map_err(SalahError::producer)?;
        self.cache.invalidate(&chapter);
        tracing::debug!("章節 {} 讀到第 {} 節，已失效快取", chapter, verse);
        Ok(())
    }

    /// 列表載入時預先取得所有章節
    pub async fn precompute(&self) -> Result<usize> {
        self.cache.precompute_all().await
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// 登出或切換帳號
    pub fn clear(&self) {
        self.cache.clear();
    }
}
