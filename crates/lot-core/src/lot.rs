//! 批次模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 批次狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LotStatus {
    /// 可用
    Active,
    /// 已耗盡（可用量為 0）
    Depleted,
    /// 已過期
    Expired,
    /// 隔離中（不可被選用）
    Quarantine,
}

/// 所有權類別
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipClass {
    /// 自有
    Owned,
    /// 寄售（不計入庫存估值）
    Consignment,
    /// 代工料（Lohn，不計入庫存估值）
    Lohn,
}

impl OwnershipClass {
    /// 是否計入庫存估值
    pub fn is_valued(&self) -> bool {
        *self == OwnershipClass::Owned
    }
}

/// 批次來源連結
///
/// 各欄位可同時存在，但只有一個「主要」來源，依 [`LotSource::primary`] 的優先序決定。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotSource {
    /// 收貨單
    pub receipt_id: Option<String>,
    /// 採購單
    pub purchase_order_id: Option<String>,
    /// 生產工單號
    pub production_order_number: Option<String>,
    /// 外包加工單
    pub external_process_id: Option<String>,
}

impl LotSource {
    pub fn receipt(receipt_id: impl Into<String>) -> Self {
        Self {
            receipt_id: Some(receipt_id.into()),
            ..Self::default()
        }
    }

    pub fn purchase_order(purchase_order_id: impl Into<String>) -> Self {
        Self {
            purchase_order_id: Some(purchase_order_id.into()),
            ..Self::default()
        }
    }

    pub fn production_order(order_number: impl Into<String>) -> Self {
        Self {
            production_order_number: Some(order_number.into()),
            ..Self::default()
        }
    }

    /// 建構器模式：設置收貨單
    pub fn with_receipt_id(mut self, receipt_id: impl Into<String>) -> Self {
        self.receipt_id = Some(receipt_id.into());
        self
    }

    /// 主要來源描述：採購單 > 生產工單 > 外包加工 > 收貨單
    pub fn primary(&self) -> Option<String> {
        if let Some(po) = &self.purchase_order_id {
            return Some(format!("PO {po}"));
        }
        if let Some(order) = &self.production_order_number {
            return Some(format!("Production {order}"));
        }
        if let Some(process) = &self.external_process_id {
            return Some(format!("External Process {process}"));
        }
        self.receipt_id.as_ref().map(|r| format!("Receipt {r}"))
    }
}

/// 批次：某物料在某地點某時間收到的一筆數量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    /// 儲存層分配的內部序號（建立順序，作為 FIFO 的次要排序鍵）
    pub id: u64,

    /// 批號（唯一）
    pub lot_number: String,

    /// 物料ID
    pub item_id: String,

    /// 地點ID
    pub location_id: String,

    /// 儲位
    pub bin_location: Option<String>,

    /// 原始數量（建立後不變）
    pub quantity_original: Decimal,

    /// 可用數量（只減不增）
    pub quantity_available: Decimal,

    /// 收貨時間（FIFO 排序鍵，調撥後也不變）
    pub received_at: DateTime<Utc>,

    /// 到期時間
    pub expires_at: Option<DateTime<Utc>>,

    /// 單位成本（收貨時固定）
    pub unit_cost: Decimal,

    /// 所有權類別
    pub ownership: OwnershipClass,

    /// 狀態
    pub status: LotStatus,

    /// 來源連結
    pub source: LotSource,

    /// 供應商批號（不檢查唯一性）
    pub supplier_lot_number: Option<String>,

    /// 拆分來源批號
    pub split_from: Option<String>,

    pub notes: Option<String>,

    pub created_by: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Lot {
    /// 檢查在指定時間是否已過期（到期時間等於當下即視為過期）
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }

    /// 檢查是否已耗盡
    pub fn is_depleted(&self) -> bool {
        self.quantity_available <= Decimal::ZERO
    }

    /// 檢查是否可被 FIFO 選用（不考慮到期）
    pub fn is_available(&self) -> bool {
        self.status == LotStatus::Active && self.quantity_available > Decimal::ZERO
    }

    /// 已消耗數量
    pub fn quantity_consumed(&self) -> Decimal {
        self.quantity_original - self.quantity_available
    }

    /// 批次可用量的價值
    pub fn available_value(&self) -> Decimal {
        self.quantity_available * self.unit_cost
    }

    /// 從批次扣減數量，歸零時轉為已耗盡
    pub fn consume(&mut self, quantity: Decimal) -> crate::Result<()> {
        if quantity <= Decimal::ZERO {
            return Err(crate::LotError::InvalidQuantity(format!(
                "扣減數量必須大於 0，收到 {quantity}"
            )));
        }
        if quantity > self.quantity_available {
            return Err(crate::LotError::StaleAllocation(self.lot_number.clone()));
        }
        self.quantity_available -= quantity;
        if self.quantity_available == Decimal::ZERO {
            self.status = LotStatus::Depleted;
        }
        Ok(())
    }
}
