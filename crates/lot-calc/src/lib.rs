//! # Lot Calculation Engine
//!
//! FIFO 批次選用、扣減、調撥與生產領料引擎

pub mod allocator;
pub mod audit;
pub mod engine;
pub mod ledger;
pub mod mutator;
pub mod production;
pub mod session;

// Re-export 主要類型
pub use allocator::{AllocationLine, AllocationPlan, FifoAllocator};
pub use audit::AuditTrail;
pub use engine::LotEngine;
pub use ledger::{InventoryValuation, ItemValuation, LotLedger, LotSummary, UnvaluedStock};
pub use mutator::LotMutator;
pub use production::{
    ComponentConsumption, ComponentTrace, ConsumedLotTrace, ProductionCompletion,
    ProductionCoordinator, ProductionStart, RequirementLine, RequirementsReport, Traceability,
};
pub use session::Session;

use rust_decimal::Decimal;
use serde::Serialize;

/// FIFO 消耗結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionSummary {
    /// 消耗總數量
    pub total_quantity: Decimal,

    /// 總成本 = Σ 數量 × 批次單位成本
    pub total_cost: Decimal,

    /// 加權平均單位成本（總數量為 0 時為 0）
    pub average_unit_cost: Decimal,

    /// 各批次明細
    pub lines: Vec<AllocationLine>,
}

impl ConsumptionSummary {
    /// 由分配明細計算成本
    pub fn from_lines(lines: Vec<AllocationLine>) -> Self {
        let total_quantity: Decimal = lines.iter().map(|l| l.quantity).sum();
        let total_cost: Decimal = lines.iter().map(AllocationLine::line_cost).sum();
        let average_unit_cost = if total_quantity > Decimal::ZERO {
            total_cost / total_quantity
        } else {
            Decimal::ZERO
        };

        Self {
            total_quantity,
            total_cost,
            average_unit_cost,
            lines,
        }
    }

    /// 空的消耗結果
    pub fn empty() -> Self {
        Self::from_lines(Vec::new())
    }
}
