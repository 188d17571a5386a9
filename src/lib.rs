//! # Lot Engine
//!
//! FIFO 批次帳本引擎：收貨建批、先進先出扣減、調撥拆分、生產領料與成本追溯。
//!
//! ```no_run
//! use lot_engine::{EngineConfig, LotEngine, LotOptions, MemoryCatalog, MemoryStore, OperationContext};
//! use rust_decimal::Decimal;
//!
//! let engine = LotEngine::new(MemoryStore::new(), MemoryCatalog::new(), EngineConfig::default());
//! let ctx = OperationContext::new().with_actor("receiver");
//! engine.create_lot("STEEL-001", "WH-A", Decimal::from(100), LotOptions::new(), &ctx)?;
//! let summary = engine.consume("STEEL-001", "WH-A", Decimal::from(30), &ctx)?;
//! println!("成本 {}", summary.total_cost);
//! # Ok::<(), lot_engine::LotError>(())
//! ```

pub use lot_cache::{DirtyTracker, QuantityCacheSync, Reconciliation};
pub use lot_calc::{
    AllocationLine, AllocationPlan, AuditTrail, ComponentConsumption, ComponentTrace,
    ConsumedLotTrace, ConsumptionSummary, FifoAllocator, InventoryValuation, ItemValuation,
    LotEngine, LotLedger, LotMutator, LotSummary, ProductionCompletion, ProductionCoordinator,
    ProductionStart, RequirementLine, RequirementsReport, Session, Traceability, UnvaluedStock,
};
pub use lot_core::{
    BillOfMaterials, BomLine, BomStatus, Clock, ComponentRequirement, EngineConfig, FixedClock,
    ItemCatalog, Lot, LotError, LotOptions, LotSource, LotStatus, LotStore, LotTransaction,
    MemoryCatalog, MemorySession, MemoryStore, OperationContext, OwnershipClass,
    ProductionConsumption, ProductionOrder, ProductionStatus, QuantityCacheEntry, Reference,
    ReferenceType, Result, RoundingPolicy, ScrapRecord, SequenceGenerator, SequenceKind,
    StoreError, SystemClock, TransactionType, TransferOptions, UnitOfWork,
};
