//! 儲存介面與記憶體參考實作
//!
//! 引擎只透過 [`UnitOfWork`] 讀寫資料。一個 unit of work 就是一個 ACID 交易：
//! 呼叫 [`UnitOfWork::commit`] 才會生效，未提交即丟棄等同回滾。

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use crate::cache::QuantityCacheEntry;
use crate::lot::Lot;
use crate::production::{ProductionConsumption, ProductionOrder, ScrapRecord};
use crate::sequence::{SequenceGenerator, SequenceKind};
use crate::transaction::LotTransaction;
use crate::{LotError, Result, StoreError};

/// 單一交易內的儲存操作
pub trait UnitOfWork {
    /// 新增批次，分配內部序號；批號重複時失敗
    fn insert_lot(&mut self, lot: Lot) -> Result<Lot>;

    /// 更新既有批次
    fn update_lot(&mut self, lot: &Lot) -> Result<()>;

    /// 依批號取得批次
    fn lot(&self, lot_number: &str) -> Result<Option<Lot>>;

    /// 查詢批次（依建立順序），None 表示不篩選
    fn lots(&self, item_id: Option<&str>, location_id: Option<&str>) -> Result<Vec<Lot>>;

    /// 鎖定某（物料, 地點）的批次列直到交易結束
    ///
    /// SQL 實作對應 `SELECT ... FOR UPDATE`；確保「檢查後扣減」在同一物料地點上可序列化。
    fn lock_lots(&mut self, item_id: &str, location_id: &str) -> Result<()>;

    /// 追加異動紀錄，分配流水號
    fn append_transaction(&mut self, record: LotTransaction) -> Result<LotTransaction>;

    /// 某批次的異動紀錄（依追加順序）
    fn transactions(&self, lot_id: u64) -> Result<Vec<LotTransaction>>;

    fn cache_entry(&self, item_id: &str, location_id: &str) -> Result<Option<QuantityCacheEntry>>;

    fn upsert_cache_entry(&mut self, entry: QuantityCacheEntry) -> Result<()>;

    fn cache_entries(&self) -> Result<Vec<QuantityCacheEntry>>;

    fn insert_consumption(&mut self, record: ProductionConsumption) -> Result<()>;

    /// 某工單的領料紀錄（依寫入順序）
    fn consumptions(&self, order_number: &str) -> Result<Vec<ProductionConsumption>>;

    fn insert_scrap(&mut self, record: ScrapRecord) -> Result<()>;

    fn scraps(&self, order_number: &str) -> Result<Vec<ScrapRecord>>;

    fn production_order(&self, order_number: &str) -> Result<Option<ProductionOrder>>;

    fn save_production_order(&mut self, order: &ProductionOrder) -> Result<()>;

    /// 取下一個單據號（不隨交易回滾）
    fn next_sequence(&mut self, kind: SequenceKind) -> Result<u64>;

    /// 提交交易
    fn commit(self) -> Result<()>
    where
        Self: Sized;
}

/// 交易式儲存
pub trait LotStore: Send + Sync {
    type Session<'a>: UnitOfWork
    where
        Self: 'a;

    /// 開啟一個 unit of work，等待時間超過上限則回傳 `StoreError::Timeout`
    fn begin(&self, timeout: Duration) -> Result<Self::Session<'_>>;
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    lots: BTreeMap<u64, Lot>,
    lot_index: HashMap<String, u64>,
    next_lot_id: u64,
    transactions: Vec<LotTransaction>,
    next_transaction_id: u64,
    cache: BTreeMap<(String, String), QuantityCacheEntry>,
    consumptions: Vec<ProductionConsumption>,
    scraps: Vec<ScrapRecord>,
    orders: HashMap<String, ProductionOrder>,
}

/// 記憶體儲存
///
/// 整個儲存以一把鎖序列化：交易期間持有鎖，於工作副本上修改，提交時整份寫回。
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    sequences: SequenceGenerator,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 建構器模式：指定序列產生器
    pub fn with_sequences(mut self, sequences: SequenceGenerator) -> Self {
        self.sequences = sequences;
        self
    }

    fn acquire(&self, timeout: Duration) -> Result<MutexGuard<'_, StoreState>> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.state.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(StoreError::Unavailable("儲存鎖已損毀".to_string()).into());
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(StoreError::Timeout(timeout).into());
                    }
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }
}

impl LotStore for MemoryStore {
    type Session<'a> = MemorySession<'a>;

    fn begin(&self, timeout: Duration) -> Result<MemorySession<'_>> {
        let guard = self.acquire(timeout)?;
        let working = guard.clone();
        Ok(MemorySession {
            guard,
            working,
            sequences: &self.sequences,
        })
    }
}

/// 記憶體儲存的 unit of work
pub struct MemorySession<'a> {
    guard: MutexGuard<'a, StoreState>,
    working: StoreState,
    sequences: &'a SequenceGenerator,
}

impl UnitOfWork for MemorySession<'_> {
    fn insert_lot(&mut self, mut lot: Lot) -> Result<Lot> {
        if self.working.lot_index.contains_key(&lot.lot_number) {
            return Err(LotError::DuplicateLotNumber(lot.lot_number));
        }
        self.working.next_lot_id += 1;
        lot.id = self.working.next_lot_id;
        self.working.lot_index.insert(lot.lot_number.clone(), lot.id);
        self.working.lots.insert(lot.id, lot.clone());
        Ok(lot)
    }

    fn update_lot(&mut self, lot: &Lot) -> Result<()> {
        match self.working.lots.get_mut(&lot.id) {
            Some(existing) if existing.lot_number == lot.lot_number => {
                *existing = lot.clone();
                Ok(())
            }
            _ => Err(LotError::LotNotFound(lot.lot_number.clone())),
        }
    }

    fn lot(&self, lot_number: &str) -> Result<Option<Lot>> {
        Ok(self
            .working
            .lot_index
            .get(lot_number)
            .and_then(|id| self.working.lots.get(id))
            .cloned())
    }

    fn lots(&self, item_id: Option<&str>, location_id: Option<&str>) -> Result<Vec<Lot>> {
        Ok(self
            .working
            .lots
            .values()
            .filter(|lot| item_id.map_or(true, |item| lot.item_id == item))
            .filter(|lot| location_id.map_or(true, |loc| lot.location_id == loc))
            .cloned()
            .collect())
    }

    fn lock_lots(&mut self, _item_id: &str, _location_id: &str) -> Result<()> {
        // 整個儲存已在交易期間鎖定
        Ok(())
    }

    fn append_transaction(&mut self, mut record: LotTransaction) -> Result<LotTransaction> {
        self.working.next_transaction_id += 1;
        record.id = self.working.next_transaction_id;
        self.working.transactions.push(record.clone());
        Ok(record)
    }

    fn transactions(&self, lot_id: u64) -> Result<Vec<LotTransaction>> {
        Ok(self
            .working
            .transactions
            .iter()
            .filter(|t| t.lot_id == lot_id)
            .cloned()
            .collect())
    }

    fn cache_entry(&self, item_id: &str, location_id: &str) -> Result<Option<QuantityCacheEntry>> {
        Ok(self
            .working
            .cache
            .get(&(item_id.to_string(), location_id.to_string()))
            .cloned())
    }

    fn upsert_cache_entry(&mut self, entry: QuantityCacheEntry) -> Result<()> {
        self.working.cache.insert(entry.key(), entry);
        Ok(())
    }

    fn cache_entries(&self) -> Result<Vec<QuantityCacheEntry>> {
        Ok(self.working.cache.values().cloned().collect())
    }

    fn insert_consumption(&mut self, record: ProductionConsumption) -> Result<()> {
        self.working.consumptions.push(record);
        Ok(())
    }

    fn consumptions(&self, order_number: &str) -> Result<Vec<ProductionConsumption>> {
        Ok(self
            .working
            .consumptions
            .iter()
            .filter(|c| c.order_number == order_number)
            .cloned()
            .collect())
    }

    fn insert_scrap(&mut self, record: ScrapRecord) -> Result<()> {
        self.working.scraps.push(record);
        Ok(())
    }

    fn scraps(&self, order_number: &str) -> Result<Vec<ScrapRecord>> {
        Ok(self
            .working
            .scraps
            .iter()
            .filter(|s| s.source_order_number.as_deref() == Some(order_number))
            .cloned()
            .collect())
    }

    fn production_order(&self, order_number: &str) -> Result<Option<ProductionOrder>> {
        Ok(self.working.orders.get(order_number).cloned())
    }

    fn save_production_order(&mut self, order: &ProductionOrder) -> Result<()> {
        self.working
            .orders
            .insert(order.order_number.clone(), order.clone());
        Ok(())
    }

    fn next_sequence(&mut self, kind: SequenceKind) -> Result<u64> {
        Ok(self.sequences.next(kind))
    }

    fn commit(self) -> Result<()> {
        let MemorySession {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }
}

/// 某批次清單中有效批次的可用量合計
pub fn active_quantity(lots: &[Lot]) -> Decimal {
    lots.iter()
        .filter(|lot| lot.status == crate::lot::LotStatus::Active)
        .map(|lot| lot.quantity_available)
        .sum()
}
