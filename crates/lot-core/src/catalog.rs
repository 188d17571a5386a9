//! 物料主檔查詢（外部協作者）

use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::production::BillOfMaterials;

/// 物料主檔
///
/// 引擎只向外查詢：標準成本（收貨未指定成本時的後備值）與 BOM 元件清單。
pub trait ItemCatalog: Send + Sync {
    /// 物料標準成本
    fn standard_cost(&self, item_id: &str) -> Option<Decimal>;

    /// 依 BOM 編號取得 BOM
    fn bom(&self, bom_number: &str) -> Option<BillOfMaterials>;
}

/// 記憶體物料主檔
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    standard_costs: HashMap<String, Decimal>,
    boms: HashMap<String, BillOfMaterials>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 建構器模式：設置標準成本
    pub fn with_standard_cost(mut self, item_id: impl Into<String>, cost: Decimal) -> Self {
        self.standard_costs.insert(item_id.into(), cost);
        self
    }

    /// 建構器模式：加入 BOM
    pub fn with_bom(mut self, bom: BillOfMaterials) -> Self {
        self.add_bom(bom);
        self
    }

    /// 加入或取代 BOM
    pub fn add_bom(&mut self, bom: BillOfMaterials) {
        self.boms.insert(bom.bom_number.clone(), bom);
    }
}

impl ItemCatalog for MemoryCatalog {
    fn standard_cost(&self, item_id: &str) -> Option<Decimal> {
        self.standard_costs.get(item_id).copied()
    }

    fn bom(&self, bom_number: &str) -> Option<BillOfMaterials> {
        self.boms.get(bom_number).cloned()
    }
}
