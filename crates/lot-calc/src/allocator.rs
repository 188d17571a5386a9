//! FIFO 批次分配器

use lot_core::{Lot, LotError};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{LotLedger, Session};

/// 分配明細：從某批次取用多少
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationLine {
    pub lot_id: u64,
    pub lot_number: String,
    pub quantity: Decimal,
    /// 批次單位成本
    pub unit_cost: Decimal,
}

impl AllocationLine {
    pub fn new(lot_id: u64, lot_number: String, quantity: Decimal, unit_cost: Decimal) -> Self {
        Self {
            lot_id,
            lot_number,
            quantity,
            unit_cost,
        }
    }

    pub fn line_cost(&self) -> Decimal {
        self.quantity * self.unit_cost
    }
}

/// 分配計劃
///
/// 只描述「要從哪些批次取多少」，不修改任何批次。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationPlan {
    pub item_id: String,
    pub location_id: String,
    pub quantity_needed: Decimal,
    /// FIFO 順序
    pub lines: Vec<AllocationLine>,
}

impl AllocationPlan {
    pub fn total_quantity(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn total_cost(&self) -> Decimal {
        self.lines.iter().map(AllocationLine::line_cost).sum()
    }

    /// 加權平均單位成本
    pub fn average_unit_cost(&self) -> Decimal {
        let total = self.total_quantity();
        if total > Decimal::ZERO {
            self.total_cost() / total
        } else {
            Decimal::ZERO
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// FIFO 分配器
pub struct FifoAllocator;

impl FifoAllocator {
    /// 依 FIFO 產生分配計劃
    ///
    /// 全有或全無：可用量不足時回傳 `InsufficientQuantity`，不產生部分計劃。
    pub fn allocate(
        session: &Session<'_>,
        item_id: &str,
        location_id: &str,
        quantity_needed: Decimal,
    ) -> lot_core::Result<AllocationPlan> {
        let lots = LotLedger::list_available(
            session,
            item_id,
            Some(location_id),
            session.config().exclude_expired,
        )?;
        Self::plan(&lots, item_id, location_id, quantity_needed)
    }

    /// 對已依 FIFO 排序的批次產生分配計劃
    pub fn plan(
        lots: &[Lot],
        item_id: &str,
        location_id: &str,
        quantity_needed: Decimal,
    ) -> lot_core::Result<AllocationPlan> {
        if quantity_needed < Decimal::ZERO {
            return Err(LotError::InvalidQuantity(format!(
                "需求數量不可為負，收到 {quantity_needed}"
            )));
        }

        let mut plan = AllocationPlan {
            item_id: item_id.to_string(),
            location_id: location_id.to_string(),
            quantity_needed,
            lines: Vec::new(),
        };
        if quantity_needed == Decimal::ZERO {
            return Ok(plan);
        }

        let mut remaining = quantity_needed;
        for lot in lots {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = remaining.min(lot.quantity_available);
            if take <= Decimal::ZERO {
                continue;
            }
            plan.lines.push(AllocationLine::new(
                lot.id,
                lot.lot_number.clone(),
                take,
                lot.unit_cost,
            ));
            remaining -= take;
        }

        if remaining > Decimal::ZERO {
            let available = quantity_needed - remaining;
            tracing::warn!(
                "庫存不足: 物料 {} 於 {} 需要 {}, 可用 {}",
                item_id,
                location_id,
                quantity_needed,
                available
            );
            return Err(LotError::InsufficientQuantity {
                item_id: item_id.to_string(),
                location_id: location_id.to_string(),
                needed: quantity_needed,
                available,
            });
        }

        tracing::debug!(
            "FIFO 分配 {}@{} 數量 {}: {} 個批次",
            item_id,
            location_id,
            quantity_needed,
            plan.lines.len()
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use lot_core::{
        EngineConfig, LotOptions, LotStore, MemoryCatalog, MemoryStore, OperationContext,
    };
    use rstest::rstest;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, d, 8, 0, 0).unwrap()
    }

    fn seed(session: &mut Session<'_>, quantity: i64, cost: Decimal, received: DateTime<Utc>) -> Lot {
        LotLedger::create_lot(
            session,
            "STEEL-001",
            "WH-A",
            Decimal::from(quantity),
            LotOptions::new().with_unit_cost(cost).with_received_at(received),
            &OperationContext::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_allocate_spans_lots_in_fifo_order() {
        let store = MemoryStore::new();
        let mut uow = store.begin(std::time::Duration::from_millis(100)).unwrap();
        let config = EngineConfig::default();
        let catalog = MemoryCatalog::new();
        let mut session = Session::new(&mut uow, &config, &catalog, day(10));

        // 後收的批次先建立，FIFO 仍以收貨時間為準
        seed(&mut session, 50, Decimal::new(600, 2), day(2));
        seed(&mut session, 100, Decimal::new(500, 2), day(1));

        let plan = FifoAllocator::allocate(&session, "STEEL-001", "WH-A", Decimal::from(120)).unwrap();

        assert_eq!(plan.lines.len(), 2);
        assert_eq!(plan.lines[0].lot_number, "BATCH-000002");
        assert_eq!(plan.lines[0].quantity, Decimal::from(100));
        assert_eq!(plan.lines[1].lot_number, "BATCH-000001");
        assert_eq!(plan.lines[1].quantity, Decimal::from(20));
        assert_eq!(plan.total_cost(), Decimal::from(620));
        assert_eq!(plan.average_unit_cost().round_dp(4), Decimal::new(51667, 4));
    }

    #[test]
    fn test_allocate_is_all_or_nothing() {
        let store = MemoryStore::new();
        let mut uow = store.begin(std::time::Duration::from_millis(100)).unwrap();
        let config = EngineConfig::default();
        let catalog = MemoryCatalog::new();
        let mut session = Session::new(&mut uow, &config, &catalog, day(10));

        seed(&mut session, 100, Decimal::from(5), day(1));
        seed(&mut session, 50, Decimal::from(6), day(2));

        let err = FifoAllocator::allocate(&session, "STEEL-001", "WH-A", Decimal::from(200)).unwrap_err();
        assert_eq!(
            err,
            LotError::InsufficientQuantity {
                item_id: "STEEL-001".to_string(),
                location_id: "WH-A".to_string(),
                needed: Decimal::from(200),
                available: Decimal::from(150),
            }
        );

        // 分配不修改批次
        let lots = LotLedger::list_available(&session, "STEEL-001", Some("WH-A"), true).unwrap();
        assert_eq!(lots[0].quantity_available, Decimal::from(100));
        assert_eq!(lots[1].quantity_available, Decimal::from(50));
    }

    #[test]
    fn test_allocate_skips_expired_lots_when_configured() {
        let store = MemoryStore::new();
        let mut uow = store.begin(std::time::Duration::from_millis(100)).unwrap();
        let config = EngineConfig::default();
        let catalog = MemoryCatalog::new();
        let now = day(10);
        let mut session = Session::new(&mut uow, &config, &catalog, now);

        LotLedger::create_lot(
            &mut session,
            "STEEL-001",
            "WH-A",
            Decimal::from(40),
            LotOptions::new()
                .with_received_at(day(1))
                .with_expires_at(now - Duration::days(1)),
            &OperationContext::new(),
        )
        .unwrap();
        seed(&mut session, 40, Decimal::ONE, day(2));

        let plan = FifoAllocator::allocate(&session, "STEEL-001", "WH-A", Decimal::from(30)).unwrap();
        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].lot_number, "BATCH-000002");
    }

    #[rstest]
    #[case(0, 0)]
    #[case(10, 1)]
    #[case(100, 1)]
    #[case(101, 2)]
    #[case(150, 2)]
    fn test_plan_line_count(#[case] needed: i64, #[case] expected_lines: usize) {
        let store = MemoryStore::new();
        let mut uow = store.begin(std::time::Duration::from_millis(100)).unwrap();
        let config = EngineConfig::default();
        let catalog = MemoryCatalog::new();
        let mut session = Session::new(&mut uow, &config, &catalog, day(10));

        let lots = vec![
            seed(&mut session, 100, Decimal::from(5), day(1)),
            seed(&mut session, 50, Decimal::from(6), day(2)),
        ];

        let plan = FifoAllocator::plan(&lots, "STEEL-001", "WH-A", Decimal::from(needed)).unwrap();
        assert_eq!(plan.lines.len(), expected_lines);
        assert_eq!(plan.total_quantity(), Decimal::from(needed));
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let err = FifoAllocator::plan(&[], "STEEL-001", "WH-A", Decimal::from(-1)).unwrap_err();
        assert!(matches!(err, LotError::InvalidQuantity(_)));
    }
}
