//! 生產工單、BOM 與領料紀錄模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 生產工單狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Draft,
    Released,
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProductionStatus::Draft => "draft",
            ProductionStatus::Released => "released",
            ProductionStatus::InProgress => "in_progress",
            ProductionStatus::Completed => "completed",
            ProductionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// 元件需求：每生產一單位成品需要多少元件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRequirement {
    /// 元件物料ID
    pub item_id: String,

    /// 單位用量
    pub quantity_per_unit: Decimal,
}

impl ComponentRequirement {
    pub fn new(item_id: String, quantity_per_unit: Decimal) -> Self {
        Self {
            item_id,
            quantity_per_unit,
        }
    }
}

/// BOM 狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BomStatus {
    Draft,
    Active,
    Obsolete,
}

/// BOM 行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomLine {
    /// 元件物料ID
    pub component_item_id: String,

    /// 每單位成品用量
    pub quantity: Decimal,

    /// 組裝順序
    pub sequence: u32,
}

impl BomLine {
    pub fn new(component_item_id: String, quantity: Decimal) -> Self {
        Self {
            component_item_id,
            quantity,
            sequence: 0,
        }
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }
}

/// 物料清單（BOM）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterials {
    pub bom_number: String,

    /// 成品物料ID
    pub finished_item_id: String,

    pub status: BomStatus,

    pub lines: Vec<BomLine>,
}

impl BillOfMaterials {
    /// 創建新的 BOM（草稿狀態）
    pub fn new(bom_number: String, finished_item_id: String) -> Self {
        Self {
            bom_number,
            finished_item_id,
            status: BomStatus::Draft,
            lines: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: BomStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_line(mut self, line: BomLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == BomStatus::Active
    }

    /// 依組裝順序轉為元件需求
    pub fn requirements(&self) -> Vec<ComponentRequirement> {
        let mut lines: Vec<&BomLine> = self.lines.iter().collect();
        lines.sort_by_key(|l| l.sequence);
        lines
            .into_iter()
            .map(|l| ComponentRequirement::new(l.component_item_id.clone(), l.quantity))
            .collect()
    }
}

/// 生產工單
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub order_number: String,

    /// 成品物料ID
    pub finished_item_id: String,

    /// 生產地點（元件從此領料，成品入庫於此）
    pub location_id: String,

    /// BOM 模式
    pub bom_number: Option<String>,

    /// 手動元件模式
    pub manual_components: Option<Vec<ComponentRequirement>>,

    pub quantity_ordered: Decimal,

    pub quantity_produced: Decimal,

    pub quantity_scrapped: Decimal,

    pub status: ProductionStatus,

    /// 依 FIFO 計算的材料成本
    pub material_cost: Decimal,

    pub actual_start_at: Option<DateTime<Utc>>,

    pub actual_completion_at: Option<DateTime<Utc>>,
}

impl ProductionOrder {
    /// 創建新的生產工單（草稿狀態）
    pub fn new(
        order_number: String,
        finished_item_id: String,
        location_id: String,
        quantity_ordered: Decimal,
    ) -> Self {
        Self {
            order_number,
            finished_item_id,
            location_id,
            bom_number: None,
            manual_components: None,
            quantity_ordered,
            quantity_produced: Decimal::ZERO,
            quantity_scrapped: Decimal::ZERO,
            status: ProductionStatus::Draft,
            material_cost: Decimal::ZERO,
            actual_start_at: None,
            actual_completion_at: None,
        }
    }

    /// 建構器模式：設置 BOM
    pub fn with_bom(mut self, bom_number: String) -> Self {
        self.bom_number = Some(bom_number);
        self
    }

    /// 建構器模式：設置手動元件清單
    pub fn with_manual_components(mut self, components: Vec<ComponentRequirement>) -> Self {
        self.manual_components = Some(components);
        self
    }

    /// 建構器模式：設置狀態
    pub fn with_status(mut self, status: ProductionStatus) -> Self {
        self.status = status;
        self
    }

    /// 是否可以開工
    pub fn can_start(&self) -> bool {
        matches!(
            self.status,
            ProductionStatus::Draft | ProductionStatus::Released
        )
    }

    /// 尚未完工或報廢的數量
    pub fn quantity_remaining(&self) -> Decimal {
        self.quantity_ordered - self.quantity_produced - self.quantity_scrapped
    }

    /// 完工百分比
    pub fn completion_percentage(&self) -> Decimal {
        if self.quantity_ordered == Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.quantity_produced / self.quantity_ordered * Decimal::ONE_HUNDRED
    }
}

/// 生產領料紀錄：某工單的某元件從某批次消耗了多少
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionConsumption {
    pub id: Uuid,

    pub order_number: String,

    pub component_item_id: String,

    pub lot_id: u64,

    pub lot_number: String,

    pub quantity_consumed: Decimal,

    /// 領料當時的批次單位成本
    pub unit_cost: Decimal,

    pub total_cost: Decimal,

    pub consumed_at: DateTime<Utc>,

    pub consumed_by: Option<String>,
}

impl ProductionConsumption {
    /// 創建新的領料紀錄（總成本 = 數量 × 單位成本）
    pub fn new(
        order_number: String,
        component_item_id: String,
        lot_id: u64,
        lot_number: String,
        quantity_consumed: Decimal,
        unit_cost: Decimal,
        consumed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_number,
            component_item_id,
            lot_id,
            lot_number,
            quantity_consumed,
            unit_cost,
            total_cost: quantity_consumed * unit_cost,
            consumed_at,
            consumed_by: None,
        }
    }

    pub fn with_consumed_by(mut self, actor: Option<String>) -> Self {
        self.consumed_by = actor;
        self
    }
}

/// 報廢紀錄（不建立批次）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapRecord {
    pub id: Uuid,

    pub scrap_number: String,

    pub item_id: String,

    pub location_id: String,

    pub quantity: Decimal,

    pub reason: String,

    /// 來源生產工單
    pub source_order_number: Option<String>,

    pub scrapped_by: Option<String>,

    pub scrapped_at: DateTime<Utc>,
}

impl ScrapRecord {
    pub fn new(
        scrap_number: String,
        item_id: String,
        location_id: String,
        quantity: Decimal,
        reason: String,
        scrapped_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            scrap_number,
            item_id,
            location_id,
            quantity,
            reason,
            source_order_number: None,
            scrapped_by: None,
            scrapped_at,
        }
    }

    pub fn with_source_order(mut self, order_number: String) -> Self {
        self.source_order_number = Some(order_number);
        self
    }

    pub fn with_scrapped_by(mut self, actor: Option<String>) -> Self {
        self.scrapped_by = actor;
        self
    }
}
