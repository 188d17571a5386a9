//! 引擎配置與操作參數

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::lot::{LotSource, OwnershipClass};
use crate::transaction::{Reference, ReferenceType};

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 選用批次時是否排除已過期批次
    pub exclude_expired: bool,

    /// BOM 用量乘以工單數量後的取整規則
    pub rounding: RoundingPolicy,

    /// 部分調撥產生新批號的後綴
    pub split_suffix: String,

    /// 調撥未指定單據時的參考類型
    pub default_reference_type: ReferenceType,

    /// 提交前核對本次異動涉及的（物料, 地點）緩存
    pub verify_cache_on_commit: bool,

    /// 開啟交易時等待鎖的上限（毫秒）
    pub lock_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            exclude_expired: true,
            rounding: RoundingPolicy::Truncate,
            split_suffix: "-SPLIT".to_string(),
            default_reference_type: ReferenceType::StockMovement,
            verify_cache_on_commit: true,
            lock_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    /// 創建預設配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 從 JSON 載入（缺少的欄位採用預設值）
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// 建構器模式：設置是否排除過期批次
    pub fn with_exclude_expired(mut self, exclude: bool) -> Self {
        self.exclude_expired = exclude;
        self
    }

    /// 建構器模式：設置取整規則
    pub fn with_rounding(mut self, rounding: RoundingPolicy) -> Self {
        self.rounding = rounding;
        self
    }

    /// 建構器模式：設置拆分後綴
    pub fn with_split_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.split_suffix = suffix.into();
        self
    }

    /// 建構器模式：設置是否在提交前核對緩存
    pub fn with_verify_cache_on_commit(mut self, verify: bool) -> Self {
        self.verify_cache_on_commit = verify;
        self
    }

    /// 建構器模式：設置鎖等待上限
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// BOM 需求量取整規則
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// 向零截斷（整數單位物料）
    Truncate,
    /// 無條件進位
    Ceil,
    /// 保留小數（秤重、長度類物料）
    Exact,
}

impl RoundingPolicy {
    /// 計算需求量 = 單位用量 × 工單數量，再依規則取整
    pub fn required_quantity(&self, quantity_per_unit: Decimal, quantity_ordered: Decimal) -> Decimal {
        let raw = quantity_per_unit * quantity_ordered;
        match self {
            RoundingPolicy::Truncate => raw.trunc(),
            RoundingPolicy::Ceil => raw.ceil(),
            RoundingPolicy::Exact => raw.normalize(),
        }
    }
}

/// 建立批次的選填欄位
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LotOptions {
    /// 指定批號，未指定則依序列產生
    pub lot_number: Option<String>,

    /// 單位成本，未指定則取物料標準成本，再無則為 0
    pub unit_cost: Option<Decimal>,

    /// 收貨時間，未指定則為當下
    pub received_at: Option<DateTime<Utc>>,

    pub expires_at: Option<DateTime<Utc>>,

    /// 預設為自有
    pub ownership: Option<OwnershipClass>,

    pub bin_location: Option<String>,

    pub supplier_lot_number: Option<String>,

    pub source: LotSource,

    pub notes: Option<String>,
}

impl LotOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lot_number(mut self, lot_number: impl Into<String>) -> Self {
        self.lot_number = Some(lot_number.into());
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.unit_cost = Some(unit_cost);
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = Some(received_at);
        self
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_ownership(mut self, ownership: OwnershipClass) -> Self {
        self.ownership = Some(ownership);
        self
    }

    pub fn with_bin_location(mut self, bin: impl Into<String>) -> Self {
        self.bin_location = Some(bin.into());
        self
    }

    pub fn with_supplier_lot_number(mut self, number: impl Into<String>) -> Self {
        self.supplier_lot_number = Some(number.into());
        self
    }

    pub fn with_source(mut self, source: LotSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// 調撥選填欄位
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// 目的地儲位
    pub to_bin_location: Option<String>,
}

impl TransferOptions {
    pub fn to_bin(bin: impl Into<String>) -> Self {
        Self {
            to_bin_location: Some(bin.into()),
        }
    }
}

/// 操作歸屬：誰、因為哪張單據、備註
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationContext {
    pub actor: Option<String>,
    pub reference: Option<Reference>,
    pub notes: Option<String>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 建構器模式：設置操作者
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// 建構器模式：設置單據參考
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
