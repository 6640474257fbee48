//! 章節閱讀進度模型

use serde::{Deserialize, Serialize};

/// 章節編號（1 ~ 114）
pub type ChapterId = u16;

/// 單一章節的閱讀進度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    /// 章節編號
    pub chapter: ChapterId,

    /// 已讀節數
    pub verses_read: u32,

    /// 總節數
    pub total_verses: u32,
}

impl ReadingProgress {
    /// 創建新的閱讀進度（已讀節數不會超過總節數）
    pub fn new(chapter: ChapterId, verses_read: u32, total_verses: u32) -> Self {
        Self {
            chapter,
            verses_read: verses_read.min(total_verses),
            total_verses,
        }
    }

    /// 尚未開始閱讀
    pub fn unread(chapter: ChapterId, total_verses: u32) -> Self {
        Self::new(chapter, 0, total_verses)
    }

    /// 進度比例（0.0 ~ 1.0）
    pub fn fraction(&self) -> f64 {
        if self.total_verses == 0 {
            return 0.0;
        }
        (f64::from(self.verses_read) / f64::from(self.total_verses)).clamp(0.0, 1.0)
    }

    /// 是否已讀完
    pub fn is_complete(&self) -> bool {
        self.total_verses > 0 && self.verses_read >= self.total_verses
    }

    /// 記錄讀到第幾節（不會倒退）
    pub fn read_through(mut self, verse: u32) -> Self {
        self.verses_read = self.verses_read.max(verse.min(self.total_verses));
        self
    }
}
