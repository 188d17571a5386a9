//! # Lot Core
//!
//! 批次（Lot）帳本的核心資料模型、錯誤類型與儲存介面

pub mod cache;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod lot;
pub mod production;
pub mod sequence;
pub mod store;
pub mod transaction;

// Re-export 主要類型
pub use cache::QuantityCacheEntry;
pub use catalog::{ItemCatalog, MemoryCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{EngineConfig, LotOptions, OperationContext, RoundingPolicy, TransferOptions};
pub use lot::{Lot, LotSource, LotStatus, OwnershipClass};
pub use production::{
    BillOfMaterials, BomLine, BomStatus, ComponentRequirement, ProductionConsumption,
    ProductionOrder, ProductionStatus, ScrapRecord,
};
pub use sequence::{SequenceGenerator, SequenceKind};
pub use store::{LotStore, MemorySession, MemoryStore, UnitOfWork};
pub use transaction::{LotTransaction, Reference, ReferenceType, TransactionType};

use rust_decimal::Decimal;
use std::time::Duration;

/// 儲存層錯誤
///
/// 與業務錯誤分開，呼叫端可據此決定重試整個操作，而不是告知使用者庫存不足。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("並發修改衝突: {0}")]
    Conflict(String),

    #[error("等待交易鎖逾時（{0:?}）")]
    Timeout(Duration),

    #[error("儲存層不可用: {0}")]
    Unavailable(String),
}

/// 批次帳本錯誤類型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LotError {
    #[error("庫存不足：物料 {item_id} 於 {location_id} 需要 {needed}, 可用 {available}")]
    InsufficientQuantity {
        item_id: String,
        location_id: String,
        needed: Decimal,
        available: Decimal,
    },

    #[error("無效的調撥: {0}")]
    InvalidTransfer(String),

    #[error("無效的數量: {0}")]
    InvalidQuantity(String),

    #[error("生產工單 {0} 既沒有 BOM 也沒有手動元件清單")]
    MissingComponentSpecification(String),

    #[error("找不到有效的 BOM: {0}")]
    InactiveBom(String),

    #[error("生產工單 {order_number} 狀態為 {status}，需要 {expected}")]
    StateConflict {
        order_number: String,
        status: ProductionStatus,
        expected: String,
    },

    #[error("找不到批次: {0}")]
    LotNotFound(String),

    #[error("找不到生產工單: {0}")]
    OrderNotFound(String),

    #[error("批號重複: {0}")]
    DuplicateLotNumber(String),

    #[error("分配計劃已過期，批次 {0} 的可用量已變動")]
    StaleAllocation(String),

    #[error("數量緩存不一致：物料 {item_id} 於 {location_id} 緩存 {cached}, 帳本 {ledger}")]
    CacheDivergence {
        item_id: String,
        location_id: String,
        cached: Decimal,
        ledger: Decimal,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LotError {
    /// 是否值得整個操作重試（僅限儲存層衝突或逾時）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LotError::Store(StoreError::Conflict(_)) | LotError::Store(StoreError::Timeout(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, LotError>;
