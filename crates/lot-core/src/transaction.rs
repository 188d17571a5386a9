//! 批次異動紀錄（稽核軌跡）

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 異動類型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// 收貨建立
    Receipt,
    /// 消耗（出貨、報廢、生產領料）
    Consumption,
    /// 整批調撥
    Transfer,
    /// 部分調撥：來源扣減
    TransferOut,
    /// 部分調撥：目的地新批次
    TransferIn,
    /// 盤點調整
    Adjustment,
    /// 生產完工入庫
    Production,
}

/// 觸發單據類型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Receipt,
    Shipment,
    Scrap,
    ProductionOrder,
    StockMovement,
    Adjustment,
    Other(String),
}

impl fmt::Display for ReferenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceType::Receipt => f.write_str("receipt"),
            ReferenceType::Shipment => f.write_str("shipment"),
            ReferenceType::Scrap => f.write_str("scrap"),
            ReferenceType::ProductionOrder => f.write_str("production_order"),
            ReferenceType::StockMovement => f.write_str("stock_movement"),
            ReferenceType::Adjustment => f.write_str("adjustment"),
            ReferenceType::Other(other) => f.write_str(other),
        }
    }
}

/// 觸發單據參考
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub reference_type: ReferenceType,
    pub reference_id: Option<String>,
}

impl Reference {
    pub fn new(reference_type: ReferenceType, reference_id: impl Into<String>) -> Self {
        Self {
            reference_type,
            reference_id: Some(reference_id.into()),
        }
    }

    /// 只有類型、沒有單據號的參考
    pub fn of_type(reference_type: ReferenceType) -> Self {
        Self {
            reference_type,
            reference_id: None,
        }
    }
}

/// 批次異動紀錄（只追加，不修改不刪除）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotTransaction {
    /// 儲存層分配的流水號
    pub id: u64,

    pub lot_id: u64,

    pub lot_number: String,

    pub transaction_type: TransactionType,

    /// 異動數量（絕對值）
    pub quantity: Decimal,

    /// 對該批次可用量的影響（有正負號；整批調撥為 0）
    pub delta: Decimal,

    pub reference: Option<Reference>,

    pub from_location_id: Option<String>,

    pub to_location_id: Option<String>,

    pub from_bin: Option<String>,

    pub to_bin: Option<String>,

    /// 操作者（僅供歸屬，不做授權）
    pub actor: Option<String>,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl LotTransaction {
    /// 創建新的異動紀錄（id 由儲存層於追加時分配）
    pub fn new(
        lot_id: u64,
        lot_number: String,
        transaction_type: TransactionType,
        delta: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            lot_id,
            lot_number,
            transaction_type,
            quantity: delta.abs(),
            delta,
            reference: None,
            from_location_id: None,
            to_location_id: None,
            from_bin: None,
            to_bin: None,
            actor: None,
            notes: None,
            created_at,
        }
    }

    /// 建構器模式：設置異動數量（與 delta 不同時使用，例如整批調撥）
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    /// 建構器模式：設置來源/目的地點
    pub fn with_locations(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.from_location_id = from;
        self.to_location_id = to;
        self
    }

    /// 建構器模式：設置來源/目的儲位
    pub fn with_bins(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.from_bin = from;
        self.to_bin = to;
        self
    }

    pub fn with_reference(mut self, reference: Option<Reference>) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_actor(mut self, actor: Option<String>) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// 是否為扣減紀錄
    pub fn is_outbound(&self) -> bool {
        self.delta < Decimal::ZERO
    }
}
