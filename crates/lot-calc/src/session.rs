//! 顯式的交易工作階段

use chrono::{DateTime, Utc};
use lot_cache::QuantityCacheSync;
use lot_core::{EngineConfig, ItemCatalog, UnitOfWork};
use rust_decimal::Decimal;

/// 一個 unit of work 內引擎所需的一切
///
/// 所有元件都透過此物件讀寫，交易邊界是顯式參數而不是隱含的全域狀態。
pub struct Session<'a> {
    uow: &'a mut dyn UnitOfWork,
    config: &'a EngineConfig,
    catalog: &'a dyn ItemCatalog,
    now: DateTime<Utc>,
    cache: QuantityCacheSync,
}

impl<'a> Session<'a> {
    /// 創建新的工作階段
    pub fn new(
        uow: &'a mut dyn UnitOfWork,
        config: &'a EngineConfig,
        catalog: &'a dyn ItemCatalog,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uow,
            config,
            catalog,
            now,
            cache: QuantityCacheSync::new(),
        }
    }

    pub fn uow(&self) -> &(dyn UnitOfWork + 'a) {
        &*self.uow
    }

    pub fn uow_mut(&mut self) -> &mut (dyn UnitOfWork + 'a) {
        &mut *self.uow
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    pub fn catalog(&self) -> &dyn ItemCatalog {
        self.catalog
    }

    /// 本工作階段的「現在」（整個交易使用同一時間點）
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// 同步數量緩存
    pub fn adjust_cache(&mut self, item_id: &str, location_id: &str, delta: Decimal) -> lot_core::Result<Decimal> {
        self.cache
            .apply(&mut *self.uow, item_id, location_id, delta, self.now)
    }

    /// 核對本工作階段異動過的緩存
    pub fn verify_cache(&self) -> lot_core::Result<()> {
        self.cache.verify_dirty(&*self.uow)
    }
}
