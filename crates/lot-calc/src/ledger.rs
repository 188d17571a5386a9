//! 批次帳本

use chrono::{DateTime, Utc};
use lot_core::{
    Lot, LotError, LotOptions, LotStatus, LotTransaction, OperationContext, OwnershipClass,
    Reference, ReferenceType, SequenceKind, TransactionType,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::{AuditTrail, Session};

/// 某物料（可選地點）的批次摘要
#[derive(Debug, Clone, Serialize)]
pub struct LotSummary {
    pub item_id: String,
    pub location_id: Option<String>,
    pub total_lots: usize,
    pub total_quantity: Decimal,
    pub oldest_received_at: Option<DateTime<Utc>>,
    pub newest_received_at: Option<DateTime<Utc>>,
    /// FIFO 順序
    pub lots: Vec<Lot>,
}

/// 單一物料的庫存估值
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemValuation {
    pub item_id: String,
    pub quantity: Decimal,
    pub value: Decimal,
}

/// 不計價的第三方物料數量
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnvaluedStock {
    pub item_id: String,
    pub ownership: OwnershipClass,
    pub quantity: Decimal,
}

/// 庫存估值（只計自有批次）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryValuation {
    pub items: Vec<ItemValuation>,
    pub total_value: Decimal,
    /// 寄售與代工料，只列數量
    pub unvalued: Vec<UnvaluedStock>,
}

/// 批次帳本
pub struct LotLedger;

impl LotLedger {
    /// 建立批次（收貨）
    ///
    /// 數量必須大於 0；單位成本未指定時取物料標準成本，再無則為 0。
    /// 會追加一筆收貨紀錄並同步數量緩存。
    pub fn create_lot(
        session: &mut Session<'_>,
        item_id: &str,
        location_id: &str,
        quantity: Decimal,
        options: LotOptions,
        ctx: &OperationContext,
    ) -> lot_core::Result<Lot> {
        Self::create_lot_as(
            session,
            item_id,
            location_id,
            quantity,
            options,
            ctx,
            TransactionType::Receipt,
        )
    }

    /// 以指定的建立類型建立批次（收貨或生產完工）
    pub(crate) fn create_lot_as(
        session: &mut Session<'_>,
        item_id: &str,
        location_id: &str,
        quantity: Decimal,
        options: LotOptions,
        ctx: &OperationContext,
        origin: TransactionType,
    ) -> lot_core::Result<Lot> {
        if quantity <= Decimal::ZERO {
            return Err(LotError::InvalidQuantity(format!(
                "批次數量必須大於 0，收到 {quantity}"
            )));
        }

        let unit_cost = options
            .unit_cost
            .or_else(|| session.catalog().standard_cost(item_id))
            .unwrap_or(Decimal::ZERO);
        if unit_cost < Decimal::ZERO {
            return Err(LotError::InvalidQuantity(format!(
                "單位成本不可為負，收到 {unit_cost}"
            )));
        }

        let lot_number = match options.lot_number {
            Some(number) if !number.trim().is_empty() => number,
            _ => Self::next_lot_number(session)?,
        };

        let now = session.now();
        let lot = Lot {
            id: 0,
            lot_number,
            item_id: item_id.to_string(),
            location_id: location_id.to_string(),
            bin_location: options.bin_location,
            quantity_original: quantity,
            quantity_available: quantity,
            received_at: options.received_at.unwrap_or(now),
            expires_at: options.expires_at,
            unit_cost,
            ownership: options.ownership.unwrap_or(OwnershipClass::Owned),
            status: LotStatus::Active,
            source: options.source,
            supplier_lot_number: options.supplier_lot_number,
            split_from: None,
            notes: options.notes,
            created_by: ctx.actor.clone(),
            created_at: now,
        };
        let lot = session.uow_mut().insert_lot(lot)?;

        let fallback = match origin {
            TransactionType::Production => lot
                .source
                .production_order_number
                .clone()
                .map(|order| Reference::new(ReferenceType::ProductionOrder, order)),
            _ => lot
                .source
                .receipt_id
                .clone()
                .map(|receipt| Reference::new(ReferenceType::Receipt, receipt)),
        };
        let record = AuditTrail::entry(session, &lot, origin, quantity, ctx, fallback)
            .with_locations(None, Some(lot.location_id.clone()))
            .with_bins(None, lot.bin_location.clone());
        AuditTrail::append(session, record)?;
        session.adjust_cache(item_id, location_id, quantity)?;

        tracing::info!(
            "建立批次 {}: 物料 {} 地點 {} 數量 {} 單位成本 {}",
            lot.lot_number,
            item_id,
            location_id,
            quantity,
            unit_cost
        );
        Ok(lot)
    }

    /// 依 FIFO 順序列出可用批次
    ///
    /// 只回傳狀態為有效且可用量大於 0 的批次，依收貨時間遞增、同時間依建立順序。
    /// 排除過期時只是篩掉，不會把批次轉為過期狀態。
    pub fn list_available(
        session: &Session<'_>,
        item_id: &str,
        location_id: Option<&str>,
        exclude_expired: bool,
    ) -> lot_core::Result<Vec<Lot>> {
        let now = session.now();
        let mut lots: Vec<Lot> = session
            .uow()
            .lots(Some(item_id), location_id)?
            .into_iter()
            .filter(Lot::is_available)
            .filter(|lot| !(exclude_expired && lot.is_expired_at(now)))
            .collect();

        lots.sort_by(|a, b| (a.received_at, a.id).cmp(&(b.received_at, b.id)));
        Ok(lots)
    }

    /// 依批號取得批次
    pub fn lot(session: &Session<'_>, lot_number: &str) -> lot_core::Result<Lot> {
        session
            .uow()
            .lot(lot_number)?
            .ok_or_else(|| LotError::LotNotFound(lot_number.to_string()))
    }

    /// 批次的異動紀錄
    pub fn history(session: &Session<'_>, lot_number: &str) -> lot_core::Result<Vec<LotTransaction>> {
        let lot = Self::lot(session, lot_number)?;
        session.uow().transactions(lot.id)
    }

    /// 批次摘要
    pub fn summary(
        session: &Session<'_>,
        item_id: &str,
        location_id: Option<&str>,
    ) -> lot_core::Result<LotSummary> {
        let lots = Self::list_available(session, item_id, location_id, false)?;

        Ok(LotSummary {
            item_id: item_id.to_string(),
            location_id: location_id.map(str::to_string),
            total_lots: lots.len(),
            total_quantity: lots.iter().map(|l| l.quantity_available).sum(),
            oldest_received_at: lots.first().map(|l| l.received_at),
            newest_received_at: lots.last().map(|l| l.received_at),
            lots,
        })
    }

    /// 庫存估值：有效的自有批次依 可用量 × 單位成本 計價
    pub fn valuation(session: &Session<'_>) -> lot_core::Result<InventoryValuation> {
        let mut valued: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
        let mut unvalued: BTreeMap<(String, OwnershipClass), Decimal> = BTreeMap::new();

        for lot in session.uow().lots(None, None)? {
            if lot.status != LotStatus::Active {
                continue;
            }
            if lot.ownership.is_valued() {
                let entry = valued.entry(lot.item_id.clone()).or_default();
                entry.0 += lot.quantity_available;
                entry.1 += lot.available_value();
            } else {
                *unvalued
                    .entry((lot.item_id.clone(), lot.ownership))
                    .or_default() += lot.quantity_available;
            }
        }

        let items: Vec<ItemValuation> = valued
            .into_iter()
            .map(|(item_id, (quantity, value))| ItemValuation {
                item_id,
                quantity,
                value,
            })
            .collect();
        let total_value = items.iter().map(|i| i.value).sum();

        Ok(InventoryValuation {
            items,
            total_value,
            unvalued: unvalued
                .into_iter()
                .map(|((item_id, ownership), quantity)| UnvaluedStock {
                    item_id,
                    ownership,
                    quantity,
                })
                .collect(),
        })
    }

    /// 下一個未被佔用的流水批號（跳過呼叫端自訂過的號碼）
    fn next_lot_number(session: &mut Session<'_>) -> lot_core::Result<String> {
        loop {
            let next = session.uow_mut().next_sequence(SequenceKind::Lot)?;
            let candidate = SequenceKind::Lot.format(next);
            if session.uow().lot(&candidate)?.is_none() {
                return Ok(candidate);
            }
            tracing::debug!("批號 {} 已被使用，取下一號", candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use lot_core::{EngineConfig, LotStore, MemoryCatalog, MemoryStore};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, d, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_create_lot_assigns_sequential_numbers() {
        let store = MemoryStore::new();
        let mut uow = store.begin(std::time::Duration::from_millis(100)).unwrap();
        let config = EngineConfig::default();
        let catalog = MemoryCatalog::new().with_standard_cost("STEEL", Decimal::new(475, 2));
        let mut session = Session::new(&mut uow, &config, &catalog, day(5));
        let ctx = OperationContext::new().with_actor("alice");

        let first = LotLedger::create_lot(&mut session, "STEEL", "WH-A", Decimal::from(100), LotOptions::new(), &ctx).unwrap();
        let second = LotLedger::create_lot(
            &mut session,
            "STEEL",
            "WH-A",
            Decimal::from(50),
            LotOptions::new().with_unit_cost(Decimal::from(6)).with_received_at(day(2)),
            &ctx,
        )
        .unwrap();

        assert_eq!(first.lot_number, "BATCH-000001");
        assert_eq!(second.lot_number, "BATCH-000002");
        // 未指定成本時取標準成本
        assert_eq!(first.unit_cost, Decimal::new(475, 2));
        assert_eq!(first.received_at, day(5));
        assert_eq!(second.received_at, day(2));
        assert_eq!(first.created_by.as_deref(), Some("alice"));

        let history = session.uow().transactions(first.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].transaction_type, TransactionType::Receipt);
        assert_eq!(history[0].delta, Decimal::from(100));

        let cache = session.uow().cache_entry("STEEL", "WH-A").unwrap().unwrap();
        assert_eq!(cache.quantity, Decimal::from(150));
    }

    #[test]
    fn test_sequential_numbers_skip_caller_supplied_ones() {
        let store = MemoryStore::new();
        let mut uow = store.begin(std::time::Duration::from_millis(100)).unwrap();
        let config = EngineConfig::default();
        let catalog = MemoryCatalog::new();
        let mut session = Session::new(&mut uow, &config, &catalog, day(5));
        let ctx = OperationContext::new();

        for number in ["BATCH-000001", "BATCH-000002"] {
            LotLedger::create_lot(
                &mut session,
                "STEEL",
                "WH-A",
                Decimal::from(10),
                LotOptions::new().with_lot_number(number),
                &ctx,
            )
            .unwrap();
        }
        let auto = LotLedger::create_lot(&mut session, "STEEL", "WH-A", Decimal::from(5), LotOptions::new(), &ctx).unwrap();
        let next = LotLedger::create_lot(&mut session, "STEEL", "WH-A", Decimal::from(5), LotOptions::new(), &ctx).unwrap();

        assert_eq!(auto.lot_number, "BATCH-000003");
        assert_eq!(next.lot_number, "BATCH-000004");
        assert_eq!(LotLedger::list_available(&session, "STEEL", None, true).unwrap().len(), 4);
    }

    #[test]
    fn test_create_lot_rejects_invalid_input() {
        let store = MemoryStore::new();
        let mut uow = store.begin(std::time::Duration::from_millis(100)).unwrap();
        let config = EngineConfig::default();
        let catalog = MemoryCatalog::new();
        let mut session = Session::new(&mut uow, &config, &catalog, day(1));
        let ctx = OperationContext::new();

        let zero = LotLedger::create_lot(&mut session, "STEEL", "WH-A", Decimal::ZERO, LotOptions::new(), &ctx);
        assert!(matches!(zero, Err(LotError::InvalidQuantity(_))));

        let negative_cost = LotLedger::create_lot(
            &mut session,
            "STEEL",
            "WH-A",
            Decimal::ONE,
            LotOptions::new().with_unit_cost(Decimal::from(-1)),
            &ctx,
        );
        assert!(matches!(negative_cost, Err(LotError::InvalidQuantity(_))));

        // 未指定成本也沒有標準成本時為 0
        let free = LotLedger::create_lot(&mut session, "STEEL", "WH-A", Decimal::ONE, LotOptions::new(), &ctx).unwrap();
        assert_eq!(free.unit_cost, Decimal::ZERO);
    }

    #[test]
    fn test_list_available_fifo_order_and_filters() {
        let store = MemoryStore::new();
        let mut uow = store.begin(std::time::Duration::from_millis(100)).unwrap();
        let config = EngineConfig::default();
        let catalog = MemoryCatalog::new();
        let now = day(10);
        let mut session = Session::new(&mut uow, &config, &catalog, now);
        let ctx = OperationContext::new();

        let create = |session: &mut Session<'_>, number: &str, received: DateTime<Utc>, options: LotOptions| {
            LotLedger::create_lot(
                session,
                "STEEL",
                "WH-A",
                Decimal::from(10),
                options.with_lot_number(number).with_received_at(received),
                &ctx,
            )
            .unwrap()
        };

        create(&mut session, "L-LATE", day(3), LotOptions::new());
        create(&mut session, "L-TIE-1", day(1), LotOptions::new());
        create(&mut session, "L-TIE-2", day(1), LotOptions::new());
        create(&mut session, "L-EXPIRED", day(2), LotOptions::new().with_expires_at(now - Duration::hours(1)));
        LotLedger::create_lot(
            &mut session,
            "STEEL",
            "WH-B",
            Decimal::from(10),
            LotOptions::new().with_lot_number("L-OTHER").with_received_at(day(1)),
            &ctx,
        )
        .unwrap();

        let numbers = |lots: Vec<Lot>| lots.into_iter().map(|l| l.lot_number).collect::<Vec<_>>();

        let fifo = LotLedger::list_available(&session, "STEEL", Some("WH-A"), true).unwrap();
        assert_eq!(numbers(fifo), vec!["L-TIE-1", "L-TIE-2", "L-LATE"]);

        let with_expired = LotLedger::list_available(&session, "STEEL", Some("WH-A"), false).unwrap();
        assert_eq!(numbers(with_expired), vec!["L-TIE-1", "L-TIE-2", "L-EXPIRED", "L-LATE"]);

        let everywhere = LotLedger::list_available(&session, "STEEL", None, true).unwrap();
        assert_eq!(everywhere.len(), 4);

        // 過期批次只被篩掉，狀態不變
        let expired = LotLedger::lot(&session, "L-EXPIRED").unwrap();
        assert_eq!(expired.status, LotStatus::Active);
    }

    #[test]
    fn test_summary_and_valuation() {
        let store = MemoryStore::new();
        let mut uow = store.begin(std::time::Duration::from_millis(100)).unwrap();
        let config = EngineConfig::default();
        let catalog = MemoryCatalog::new();
        let mut session = Session::new(&mut uow, &config, &catalog, day(10));
        let ctx = OperationContext::new();

        LotLedger::create_lot(
            &mut session,
            "RESIN",
            "WH-A",
            Decimal::from(100),
            LotOptions::new().with_unit_cost(Decimal::from(5)).with_received_at(day(1)),
            &ctx,
        )
        .unwrap();
        LotLedger::create_lot(
            &mut session,
            "RESIN",
            "WH-A",
            Decimal::from(50),
            LotOptions::new().with_unit_cost(Decimal::from(6)).with_received_at(day(2)),
            &ctx,
        )
        .unwrap();
        LotLedger::create_lot(
            &mut session,
            "RESIN",
            "WH-A",
            Decimal::from(30),
            LotOptions::new()
                .with_unit_cost(Decimal::from(9))
                .with_ownership(OwnershipClass::Consignment),
            &ctx,
        )
        .unwrap();

        let summary = LotLedger::summary(&session, "RESIN", Some("WH-A")).unwrap();
        assert_eq!(summary.total_lots, 3);
        assert_eq!(summary.total_quantity, Decimal::from(180));
        assert_eq!(summary.oldest_received_at, Some(day(1)));
        assert_eq!(summary.newest_received_at, Some(day(10)));

        let valuation = LotLedger::valuation(&session).unwrap();
        assert_eq!(valuation.total_value, Decimal::from(800));
        assert_eq!(valuation.items.len(), 1);
        assert_eq!(valuation.items[0].quantity, Decimal::from(150));
        assert_eq!(
            valuation.unvalued,
            vec![UnvaluedStock {
                item_id: "RESIN".to_string(),
                ownership: OwnershipClass::Consignment,
                quantity: Decimal::from(30),
            }]
        );
    }
}
