//! 數量緩存模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 每個（物料, 地點）的可用量合計
///
/// 僅為帳本的鏡像，真實來源永遠是批次可用量。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityCacheEntry {
    /// 物料ID
    pub item_id: String,

    /// 地點ID
    pub location_id: String,

    /// 緩存數量
    pub quantity: Decimal,

    pub updated_at: DateTime<Utc>,
}

impl QuantityCacheEntry {
    /// 創建新的緩存紀錄
    pub fn new(item_id: String, location_id: String, quantity: Decimal, updated_at: DateTime<Utc>) -> Self {
        Self {
            item_id,
            location_id,
            quantity,
            updated_at,
        }
    }

    /// 緩存鍵
    pub fn key(&self) -> (String, String) {
        (self.item_id.clone(), self.location_id.clone())
    }
}
