//! 數量緩存同步器

use chrono::{DateTime, Utc};
use lot_core::store::active_quantity;
use lot_core::{LotError, QuantityCacheEntry, UnitOfWork};
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::DirtyTracker;

/// 緩存與帳本核對結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub item_id: String,
    pub location_id: String,
    /// 緩存數量（沒有緩存列視為 0）
    pub cached: Decimal,
    /// 有效批次可用量合計
    pub ledger: Decimal,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.cached == self.ledger
    }

    /// 緩存減帳本
    pub fn difference(&self) -> Decimal {
        self.cached - self.ledger
    }
}

/// 數量緩存同步器
///
/// 每次批次建立、扣減、調撥都在同一個 unit of work 內呼叫 [`QuantityCacheSync::apply`]。
#[derive(Debug, Default)]
pub struct QuantityCacheSync {
    tracker: DirtyTracker,
}

impl QuantityCacheSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// 緩存[物料, 地點] += delta，沒有緩存列時以 delta 建立
    pub fn apply(
        &mut self,
        uow: &mut dyn UnitOfWork,
        item_id: &str,
        location_id: &str,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> lot_core::Result<Decimal> {
        if delta == Decimal::ZERO {
            return Ok(uow
                .cache_entry(item_id, location_id)?
                .map(|e| e.quantity)
                .unwrap_or(Decimal::ZERO));
        }

        let entry = match uow.cache_entry(item_id, location_id)? {
            Some(mut entry) => {
                entry.quantity += delta;
                entry.updated_at = now;
                entry
            }
            None => QuantityCacheEntry::new(item_id.to_string(), location_id.to_string(), delta, now),
        };
        let quantity = entry.quantity;
        uow.upsert_cache_entry(entry)?;
        self.tracker.mark_dirty(item_id, location_id);

        tracing::debug!("緩存 {}@{} 變動 {}, 現為 {}", item_id, location_id, delta, quantity);
        Ok(quantity)
    }

    /// 本次 unit of work 異動過的組合
    pub fn tracker(&self) -> &DirtyTracker {
        &self.tracker
    }

    /// 核對單一組合
    pub fn reconcile(
        uow: &dyn UnitOfWork,
        item_id: &str,
        location_id: &str,
    ) -> lot_core::Result<Reconciliation> {
        let cached = uow
            .cache_entry(item_id, location_id)?
            .map(|e| e.quantity)
            .unwrap_or(Decimal::ZERO);
        let lots = uow.lots(Some(item_id), Some(location_id))?;

        Ok(Reconciliation {
            item_id: item_id.to_string(),
            location_id: location_id.to_string(),
            cached,
            ledger: active_quantity(&lots),
        })
    }

    /// 核對本次異動過的所有組合，任一不一致即回傳 `CacheDivergence`
    pub fn verify_dirty(&self, uow: &dyn UnitOfWork) -> lot_core::Result<()> {
        for (item_id, location_id) in self.tracker.dirty_pairs() {
            let result = Self::reconcile(uow, item_id, location_id)?;
            if !result.is_consistent() {
                tracing::warn!(
                    "緩存不一致: {}@{} 緩存 {} 帳本 {} 差異 {}",
                    item_id,
                    location_id,
                    result.cached,
                    result.ledger,
                    result.difference()
                );
                return Err(LotError::CacheDivergence {
                    item_id: result.item_id,
                    location_id: result.location_id,
                    cached: result.cached,
                    ledger: result.ledger,
                });
            }
        }
        Ok(())
    }

    /// 核對所有出現在緩存或帳本中的組合（依物料、地點排序）
    pub fn reconcile_all(uow: &dyn UnitOfWork) -> lot_core::Result<Vec<Reconciliation>> {
        let cached: BTreeMap<(String, String), Decimal> = uow
            .cache_entries()?
            .into_iter()
            .map(|e| ((e.item_id, e.location_id), e.quantity))
            .collect();

        let mut grouped: BTreeMap<(String, String), Vec<lot_core::Lot>> = BTreeMap::new();
        for lot in uow.lots(None, None)? {
            grouped
                .entry((lot.item_id.clone(), lot.location_id.clone()))
                .or_default()
                .push(lot);
        }

        let keys: BTreeSet<&(String, String)> = cached.keys().chain(grouped.keys()).collect();
        let keys: Vec<&(String, String)> = keys.into_iter().collect();

        let results = keys
            .par_iter()
            .map(|key| Reconciliation {
                item_id: key.0.clone(),
                location_id: key.1.clone(),
                cached: cached.get(*key).copied().unwrap_or(Decimal::ZERO),
                ledger: grouped
                    .get(*key)
                    .map(|lots| active_quantity(lots))
                    .unwrap_or(Decimal::ZERO),
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lot_core::{Lot, LotSource, LotStatus, LotStore, MemoryStore, OwnershipClass};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_millis(200);

    fn lot(number: &str, location: &str, quantity: i64) -> Lot {
        let at = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap();
        Lot {
            id: 0,
            lot_number: number.to_string(),
            item_id: "BOLT".to_string(),
            location_id: location.to_string(),
            bin_location: None,
            quantity_original: Decimal::from(quantity),
            quantity_available: Decimal::from(quantity),
            received_at: at,
            expires_at: None,
            unit_cost: Decimal::ONE,
            ownership: OwnershipClass::Owned,
            status: LotStatus::Active,
            source: LotSource::default(),
            supplier_lot_number: None,
            split_from: None,
            notes: None,
            created_by: None,
            created_at: at,
        }
    }

    #[test]
    fn test_apply_creates_then_accumulates() {
        let store = MemoryStore::new();
        let mut session = store.begin(TIMEOUT).unwrap();
        let mut sync = QuantityCacheSync::new();
        let now = Utc::now();

        assert_eq!(
            sync.apply(&mut session, "BOLT", "WH-A", Decimal::from(40), now).unwrap(),
            Decimal::from(40)
        );
        assert_eq!(
            sync.apply(&mut session, "BOLT", "WH-A", Decimal::from(-15), now).unwrap(),
            Decimal::from(25)
        );
        assert!(sync.tracker().is_dirty("BOLT", "WH-A"));

        // 零變動不建立緩存列也不標記
        sync.apply(&mut session, "BOLT", "WH-B", Decimal::ZERO, now).unwrap();
        assert!(session.cache_entry("BOLT", "WH-B").unwrap().is_none());
        assert!(!sync.tracker().is_dirty("BOLT", "WH-B"));
    }

    #[test]
    fn test_verify_dirty_detects_divergence() {
        let store = MemoryStore::new();
        let mut session = store.begin(TIMEOUT).unwrap();
        let mut sync = QuantityCacheSync::new();

        session.insert_lot(lot("L-1", "WH-A", 30)).unwrap();
        sync.apply(&mut session, "BOLT", "WH-A", Decimal::from(30), Utc::now()).unwrap();
        assert!(sync.verify_dirty(&session).is_ok());

        // 緩存被多加了一次
        sync.apply(&mut session, "BOLT", "WH-A", Decimal::from(5), Utc::now()).unwrap();
        let err = sync.verify_dirty(&session).unwrap_err();
        assert!(matches!(err, LotError::CacheDivergence { .. }));
    }

    #[test]
    fn test_reconcile_all_covers_cache_and_ledger() {
        let store = MemoryStore::new();
        let mut session = store.begin(TIMEOUT).unwrap();
        let mut sync = QuantityCacheSync::new();
        let now = Utc::now();

        session.insert_lot(lot("L-1", "WH-A", 30)).unwrap();
        let mut quarantined = lot("L-2", "WH-A", 20);
        quarantined.status = LotStatus::Quarantine;
        session.insert_lot(quarantined).unwrap();
        sync.apply(&mut session, "BOLT", "WH-A", Decimal::from(30), now).unwrap();

        // 只有帳本沒有緩存
        session.insert_lot(lot("L-3", "WH-B", 7)).unwrap();
        // 只有緩存沒有帳本
        sync.apply(&mut session, "BOLT", "WH-C", Decimal::from(3), now).unwrap();

        let results = QuantityCacheSync::reconcile_all(&session).unwrap();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_consistent());
        assert_eq!(results[1].location_id, "WH-B");
        assert_eq!(results[1].difference(), Decimal::from(-7));
        assert_eq!(results[2].location_id, "WH-C");
        assert_eq!(results[2].difference(), Decimal::from(3));
    }
}
