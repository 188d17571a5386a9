//! 單據編號序列

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// 序列種類（每種單據獨立計數）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceKind {
    /// 批號
    Lot,
    /// 收貨單
    Receipt,
    /// 報廢單
    Scrap,
    /// 庫存移動單
    Movement,
}

impl SequenceKind {
    pub const ALL: [SequenceKind; 4] = [
        SequenceKind::Lot,
        SequenceKind::Receipt,
        SequenceKind::Scrap,
        SequenceKind::Movement,
    ];

    /// 編號前綴
    pub fn prefix(&self) -> &'static str {
        match self {
            SequenceKind::Lot => "BATCH",
            SequenceKind::Receipt => "RCV",
            SequenceKind::Scrap => "SCRAP",
            SequenceKind::Movement => "MOV",
        }
    }

    /// 格式化編號，例如 `BATCH-000001`
    pub fn format(&self, value: u64) -> String {
        format!("{}-{:06}", self.prefix(), value)
    }
}

/// 原子序列產生器
///
/// 取號不隨交易回滾，回滾後會留下空號，與資料庫序列行為一致。
#[derive(Debug)]
pub struct SequenceGenerator {
    counters: HashMap<SequenceKind, AtomicU64>,
}

impl SequenceGenerator {
    /// 創建新的序列產生器（所有序列從 1 開始）
    pub fn new() -> Self {
        let counters = SequenceKind::ALL
            .iter()
            .map(|kind| (*kind, AtomicU64::new(0)))
            .collect();
        Self { counters }
    }

    /// 建構器模式：設置某序列目前的最後值（例如從既有資料恢復）
    pub fn with_last_value(self, kind: SequenceKind, last: u64) -> Self {
        if let Some(counter) = self.counters.get(&kind) {
            counter.store(last, Ordering::SeqCst);
        }
        self
    }

    /// 取下一個號碼
    pub fn next(&self, kind: SequenceKind) -> u64 {
        match self.counters.get(&kind) {
            Some(counter) => counter.fetch_add(1, Ordering::SeqCst) + 1,
            None => 1,
        }
    }
}

impl Default for SequenceGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_sequences_are_scoped_per_kind() {
        let generator = SequenceGenerator::new();

        assert_eq!(generator.next(SequenceKind::Lot), 1);
        assert_eq!(generator.next(SequenceKind::Lot), 2);
        assert_eq!(generator.next(SequenceKind::Receipt), 1);
        assert_eq!(SequenceKind::Scrap.format(generator.next(SequenceKind::Scrap)), "SCRAP-000001");
    }

    #[test]
    fn test_resume_from_last_value() {
        let generator = SequenceGenerator::new().with_last_value(SequenceKind::Lot, 41);
        assert_eq!(SequenceKind::Lot.format(generator.next(SequenceKind::Lot)), "BATCH-000042");
    }

    #[test]
    fn test_concurrent_numbers_are_unique() {
        let generator = Arc::new(SequenceGenerator::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                thread::spawn(move || {
                    (0..100)
                        .map(|_| generator.next(SequenceKind::Movement))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();

        assert_eq!(all.len(), 800);
        assert_eq!(all.last(), Some(&800));
    }
}
