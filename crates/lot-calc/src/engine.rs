//! 批次引擎門面

use lot_cache::{QuantityCacheSync, Reconciliation};
use lot_core::{
    Clock, EngineConfig, ItemCatalog, Lot, LotError, LotOptions, LotStore, LotTransaction,
    MemoryCatalog, OperationContext, ProductionOrder, SystemClock, TransferOptions, UnitOfWork,
};
use rust_decimal::Decimal;

use crate::{
    AllocationPlan, ConsumptionSummary, FifoAllocator, InventoryValuation, LotLedger, LotMutator,
    LotSummary, ProductionCompletion, ProductionCoordinator, ProductionStart, RequirementsReport,
    Session, Traceability,
};

/// 批次引擎
///
/// 每個寫入操作都在一個 unit of work 內完成：成功才提交，任何錯誤都整體回滾。
pub struct LotEngine<S, C = MemoryCatalog> {
    store: S,
    catalog: C,
    config: EngineConfig,
    clock: Box<dyn Clock>,
}

impl<S: LotStore, C: ItemCatalog> LotEngine<S, C> {
    /// 創建新的引擎（使用系統時鐘）
    pub fn new(store: S, catalog: C, config: EngineConfig) -> Self {
        Self {
            store,
            catalog,
            config,
            clock: Box::new(SystemClock),
        }
    }

    /// 建構器模式：設置時鐘
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// 在一個 unit of work 內執行並提交
    ///
    /// `f` 回傳錯誤時不提交；開啟 `verify_cache_on_commit` 時，提交前核對本次異動過的緩存。
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Session<'_>) -> lot_core::Result<T>,
    ) -> lot_core::Result<T> {
        let mut uow = self.store.begin(self.config.lock_timeout())?;
        let value = {
            let mut session = Session::new(&mut uow, &self.config, &self.catalog, self.clock.now());
            let value = f(&mut session)?;
            if self.config.verify_cache_on_commit {
                session.verify_cache()?;
            }
            value
        };
        uow.commit()?;
        Ok(value)
    }

    /// 唯讀執行（不提交）
    pub fn read<T>(&self, f: impl FnOnce(&Session<'_>) -> lot_core::Result<T>) -> lot_core::Result<T> {
        let mut uow = self.store.begin(self.config.lock_timeout())?;
        let session = Session::new(&mut uow, &self.config, &self.catalog, self.clock.now());
        f(&session)
    }

    /// 收貨建立批次
    pub fn create_lot(
        &self,
        item_id: &str,
        location_id: &str,
        quantity: Decimal,
        options: LotOptions,
        ctx: &OperationContext,
    ) -> lot_core::Result<Lot> {
        self.transaction(|session| {
            LotLedger::create_lot(session, item_id, location_id, quantity, options, ctx)
        })
    }

    /// FIFO 順序的可用批次
    pub fn list_available(
        &self,
        item_id: &str,
        location_id: Option<&str>,
        exclude_expired: bool,
    ) -> lot_core::Result<Vec<Lot>> {
        self.read(|session| LotLedger::list_available(session, item_id, location_id, exclude_expired))
    }

    /// 預覽分配計劃（不修改任何批次）
    pub fn allocate(
        &self,
        item_id: &str,
        location_id: &str,
        quantity: Decimal,
    ) -> lot_core::Result<AllocationPlan> {
        self.read(|session| FifoAllocator::allocate(session, item_id, location_id, quantity))
    }

    /// 在同一個 unit of work 內分配並消耗
    pub fn consume(
        &self,
        item_id: &str,
        location_id: &str,
        quantity: Decimal,
        ctx: &OperationContext,
    ) -> lot_core::Result<ConsumptionSummary> {
        tracing::info!("FIFO 消耗: 物料 {} 地點 {} 數量 {}", item_id, location_id, quantity);
        let start_time = std::time::Instant::now();

        let summary = self.transaction(|session| {
            session.uow_mut().lock_lots(item_id, location_id)?;
            let plan = FifoAllocator::allocate(session, item_id, location_id, quantity)?;
            LotMutator::consume(session, &plan, ctx)
        })?;

        tracing::info!(
            "FIFO 消耗完成，耗時 {:?}: {} 個批次, 成本 {}",
            start_time.elapsed(),
            summary.lines.len(),
            summary.total_cost
        );
        Ok(summary)
    }

    /// 套用先前預覽的計劃，批次已變動時回傳 `StaleAllocation`
    pub fn consume_plan(
        &self,
        plan: &AllocationPlan,
        ctx: &OperationContext,
    ) -> lot_core::Result<ConsumptionSummary> {
        self.transaction(|session| {
            session.uow_mut().lock_lots(&plan.item_id, &plan.location_id)?;
            LotMutator::consume(session, plan, ctx)
        })
    }

    /// 調撥批次
    pub fn transfer(
        &self,
        lot_number: &str,
        from_location_id: &str,
        to_location_id: &str,
        quantity: Decimal,
        options: &TransferOptions,
        ctx: &OperationContext,
    ) -> lot_core::Result<Lot> {
        tracing::info!(
            "調撥批次 {}: {} -> {} 數量 {}",
            lot_number,
            from_location_id,
            to_location_id,
            quantity
        );
        self.transaction(|session| {
            LotMutator::transfer(
                session,
                lot_number,
                from_location_id,
                to_location_id,
                quantity,
                options,
                ctx,
            )
        })
    }

    /// 依 FIFO 調撥某物料的數量，回傳目的地的批次（FIFO 順序）
    pub fn transfer_fifo(
        &self,
        item_id: &str,
        from_location_id: &str,
        to_location_id: &str,
        quantity: Decimal,
        options: &TransferOptions,
        ctx: &OperationContext,
    ) -> lot_core::Result<Vec<Lot>> {
        self.transaction(|session| {
            LotMutator::transfer_fifo(
                session,
                item_id,
                from_location_id,
                to_location_id,
                quantity,
                options,
                ctx,
            )
        })
    }

    /// 盤點向下調整
    pub fn adjust(&self, lot_number: &str, quantity: Decimal, ctx: &OperationContext) -> lot_core::Result<Lot> {
        self.transaction(|session| LotMutator::adjust(session, lot_number, quantity, ctx))
    }

    pub fn quarantine(&self, lot_number: &str, ctx: &OperationContext) -> lot_core::Result<Lot> {
        self.transaction(|session| LotMutator::quarantine(session, lot_number, ctx))
    }

    pub fn release(&self, lot_number: &str, ctx: &OperationContext) -> lot_core::Result<Lot> {
        self.transaction(|session| LotMutator::release(session, lot_number, ctx))
    }

    /// 新增或更新生產工單
    pub fn save_order(&self, order: ProductionOrder) -> lot_core::Result<ProductionOrder> {
        self.transaction(|session| {
            session.uow_mut().save_production_order(&order)?;
            Ok(order)
        })
    }

    pub fn order(&self, order_number: &str) -> lot_core::Result<ProductionOrder> {
        self.read(|session| {
            session
                .uow()
                .production_order(order_number)?
                .ok_or_else(|| LotError::OrderNotFound(order_number.to_string()))
        })
    }

    pub fn lot(&self, lot_number: &str) -> lot_core::Result<Lot> {
        self.read(|session| LotLedger::lot(session, lot_number))
    }

    /// 批次異動紀錄（依寫入順序）
    pub fn lot_history(&self, lot_number: &str) -> lot_core::Result<Vec<LotTransaction>> {
        self.read(|session| LotLedger::history(session, lot_number))
    }

    pub fn lot_summary(&self, item_id: &str, location_id: Option<&str>) -> lot_core::Result<LotSummary> {
        self.read(|session| LotLedger::summary(session, item_id, location_id))
    }

    pub fn valuation(&self) -> lot_core::Result<InventoryValuation> {
        self.read(LotLedger::valuation)
    }

    /// 開工領料
    pub fn start_production(&self, order_number: &str, ctx: &OperationContext) -> lot_core::Result<ProductionStart> {
        tracing::info!("開始工單領料: {}", order_number);
        let start_time = std::time::Instant::now();

        let started = self.transaction(|session| ProductionCoordinator::start(session, order_number, ctx))?;

        tracing::info!("工單領料完成，耗時 {:?}", start_time.elapsed());
        Ok(started)
    }

    /// 完工回報
    pub fn complete_production(
        &self,
        order_number: &str,
        quantity_good: Decimal,
        quantity_scrapped: Decimal,
        scrap_reason: Option<&str>,
        ctx: &OperationContext,
    ) -> lot_core::Result<ProductionCompletion> {
        self.transaction(|session| {
            ProductionCoordinator::complete(
                session,
                order_number,
                quantity_good,
                quantity_scrapped,
                scrap_reason,
                ctx,
            )
        })
    }

    pub fn traceability(&self, order_number: &str) -> lot_core::Result<Traceability> {
        self.read(|session| ProductionCoordinator::traceability(session, order_number))
    }

    pub fn requirements(&self, order_number: &str) -> lot_core::Result<RequirementsReport> {
        self.read(|session| ProductionCoordinator::requirements(session, order_number))
    }

    /// 核對單一（物料, 地點）的緩存與帳本
    pub fn reconcile(&self, item_id: &str, location_id: &str) -> lot_core::Result<Reconciliation> {
        self.read(|session| QuantityCacheSync::reconcile(session.uow(), item_id, location_id))
    }

    /// 核對所有組合
    pub fn reconcile_all(&self) -> lot_core::Result<Vec<Reconciliation>> {
        let start_time = std::time::Instant::now();
        let results = self.read(|session| QuantityCacheSync::reconcile_all(session.uow()))?;

        let diverged = results.iter().filter(|r| !r.is_consistent()).count();
        tracing::info!(
            "緩存核對完成，耗時 {:?}: {} 組, 不一致 {} 組",
            start_time.elapsed(),
            results.len(),
            diverged
        );
        Ok(results)
    }
}
