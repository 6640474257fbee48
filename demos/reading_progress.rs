//! 章節閱讀進度快取示例

use async_trait::async_trait;
use salah::salah_cache::ProgressSource;
use salah::salah_core::{ChapterId, ReadingProgress};
use salah::ChapterProgressCache;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 模擬遠端書籤服務（每次請求延遲 300 毫秒）
struct RemoteBookmarks {
    data: Mutex<HashMap<ChapterId, ReadingProgress>>,
}

#[async_trait]
impl ProgressSource for RemoteBookmarks {
    async fn fetch_all(&self) -> anyhow::Result<Vec<ReadingProgress>> {
        tracing::info!("請求所有章節進度");
        tokio::time::sleep(Duration::from_millis(300)).await;
        let data = self
            .data
            .lock()
            .map_err(|_| anyhow::anyhow!("書籤資料損毀"))?;
        Ok(data.values().copied().collect())
    }

    async fn record(&self, chapter: ChapterId, verse: u32) -> anyhow::Result<()> {
        let mut data = self
            .data
            .lock()
            .map_err(|_| anyhow::anyhow!("書籤資料損毀"))?;
        let progress = data
            .get_mut(&chapter)
            .ok_or_else(|| anyhow::anyhow!("未知章節 {chapter}"))?;
        *progress = progress.read_through(verse);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== 章節閱讀進度快取示例 ===\n");

    let data = HashMap::from([
        (1, ReadingProgress::new(1, 7, 7)),
        (18, ReadingProgress::new(18, 30, 110)),
        (36, ReadingProgress::unread(36, 83)),
        (67, ReadingProgress::new(67, 12, 30)),
    ]);
    let cache = ChapterProgressCache::new(Arc::new(RemoteBookmarks {
        data: Mutex::new(data),
    }));

    // 同時顯示四個章節，只會發出一次請求
    let chapters: [ChapterId; 4] = [1, 18, 36, 67];
    let mut handles = Vec::new();
    for chapter in chapters {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            (chapter, cache.fraction(chapter).await)
        }));
    }
    for handle in handles {
        let (chapter, fraction) = handle.await?;
        println!("  第 {:>3} 章: {:>5.1}%", chapter, fraction? * 100.0);
    }

    println!("\n讀到第 36 章第 50 節");
    cache.record_read(36, 50).await?;
    println!("  第  36 章: {:>5.1}%", cache.fraction(36).await? * 100.0);

    match cache.fraction(114).await {
        Ok(fraction) => println!("  第 114 章: {:>5.1}%", fraction * 100.0),
        Err(err) => println!("  第 114 章: {}", err),
    }

    Ok(())
}
