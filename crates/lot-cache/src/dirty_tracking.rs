//! 髒標記追蹤

use std::collections::BTreeSet;

/// 記錄一個 unit of work 內異動過的（物料, 地點）組合
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    dirty_pairs: BTreeSet<(String, String)>,
}

impl DirtyTracker {
    /// 創建新的追蹤器
    pub fn new() -> Self {
        Self::default()
    }

    /// 標記組合為髒
    pub fn mark_dirty(&mut self, item_id: &str, location_id: &str) {
        self.dirty_pairs
            .insert((item_id.to_string(), location_id.to_string()));
    }

    /// 檢查組合是否為髒
    pub fn is_dirty(&self, item_id: &str, location_id: &str) -> bool {
        self.dirty_pairs
            .contains(&(item_id.to_string(), location_id.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.dirty_pairs.is_empty()
    }

    /// 獲取所有髒組合（排序後）
    pub fn dirty_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dirty_pairs
            .iter()
            .map(|(item, location)| (item.as_str(), location.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_dirty_deduplicates_and_sorts() {
        let mut tracker = DirtyTracker::new();
        assert!(tracker.is_empty());

        tracker.mark_dirty("STEEL", "WH-B");
        tracker.mark_dirty("STEEL", "WH-A");
        tracker.mark_dirty("STEEL", "WH-A");

        assert!(tracker.is_dirty("STEEL", "WH-A"));
        assert!(!tracker.is_dirty("BOLT", "WH-A"));

        let pairs: Vec<_> = tracker.dirty_pairs().collect();
        assert_eq!(pairs, vec![("STEEL", "WH-A"), ("STEEL", "WH-B")]);
    }
}
