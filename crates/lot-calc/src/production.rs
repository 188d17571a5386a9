//! 生產領料協調器

use lot_core::{
    ComponentRequirement, Lot, LotError, LotOptions, LotSource, OperationContext,
    ProductionConsumption, ProductionOrder, ProductionStatus, Reference, ReferenceType,
    ScrapRecord, SequenceKind, TransactionType,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    AllocationPlan, ConsumptionSummary, FifoAllocator, LotLedger, LotMutator, Session,
};

/// 報廢未指定原因時的預設值
const DEFAULT_SCRAP_REASON: &str = "production scrap";

/// 單一元件的領料結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentConsumption {
    pub item_id: String,
    pub required_quantity: Decimal,
    pub summary: ConsumptionSummary,
}

/// 開工結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionStart {
    pub order: ProductionOrder,
    pub components: Vec<ComponentConsumption>,
    pub total_material_cost: Decimal,
}

/// 完工結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductionCompletion {
    pub order: ProductionOrder,
    /// 良品數量為 0 時不建立批次
    pub lot: Option<Lot>,
    pub scrap: Option<ScrapRecord>,
    pub cost_per_unit: Decimal,
}

/// 從某批次領用的明細
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumedLotTrace {
    pub lot_id: u64,
    pub lot_number: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub total_cost: Decimal,
}

/// 單一元件的追溯
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentTrace {
    pub item_id: String,
    pub total_quantity: Decimal,
    pub total_cost: Decimal,
    pub lots: Vec<ConsumedLotTrace>,
}

/// 工單追溯：用了哪些原料批次、產出哪些成品批次
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Traceability {
    pub order_number: String,
    pub finished_item_id: String,
    pub components: Vec<ComponentTrace>,
    pub finished_lots: Vec<Lot>,
    pub scraps: Vec<ScrapRecord>,
}

/// 單一元件的需求檢查
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementLine {
    pub item_id: String,
    pub quantity_per_unit: Decimal,
    pub required: Decimal,
    /// 緩存中的可用量
    pub available: Decimal,
    pub shortage: Decimal,
    /// 可被選用的批次數
    pub lot_count: usize,
}

impl RequirementLine {
    pub fn is_sufficient(&self) -> bool {
        self.shortage == Decimal::ZERO
    }
}

/// 工單需求檢查報告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequirementsReport {
    pub order_number: String,
    pub lines: Vec<RequirementLine>,
    pub can_produce: bool,
}

/// 生產領料協調器
pub struct ProductionCoordinator;

impl ProductionCoordinator {
    /// 解析工單的元件清單
    ///
    /// 有 BOM 時以 BOM 為準，BOM 必須存在且為有效狀態；否則使用手動元件清單。
    pub fn resolve_components(
        session: &Session<'_>,
        order: &ProductionOrder,
    ) -> lot_core::Result<Vec<ComponentRequirement>> {
        if let Some(bom_number) = &order.bom_number {
            let bom = session
                .catalog()
                .bom(bom_number)
                .filter(|bom| bom.is_active())
                .ok_or_else(|| LotError::InactiveBom(bom_number.clone()))?;

            if order.manual_components.is_some() {
                tracing::warn!(
                    "工單 {} 同時有 BOM {} 與手動元件清單，以 BOM 為準",
                    order.order_number,
                    bom_number
                );
            }
            return Ok(bom.requirements());
        }

        match &order.manual_components {
            Some(components) if !components.is_empty() => Ok(components.clone()),
            _ => Err(LotError::MissingComponentSpecification(
                order.order_number.clone(),
            )),
        }
    }

    /// 開工：依 BOM 需求 FIFO 領料並累計材料成本
    ///
    /// 先為所有元件產生分配計劃，任何元件不足即回傳錯誤且不做任何修改。
    pub fn start(
        session: &mut Session<'_>,
        order_number: &str,
        ctx: &OperationContext,
    ) -> lot_core::Result<ProductionStart> {
        let mut order = Self::order(session, order_number)?;
        if !order.can_start() {
            return Err(LotError::StateConflict {
                order_number: order.order_number.clone(),
                status: order.status,
                expected: "draft|released".to_string(),
            });
        }

        let requirements = Self::scaled_requirements(session, &order)?;

        let mut plans: Vec<(Decimal, AllocationPlan)> = Vec::with_capacity(requirements.len());
        for (item_id, _, required) in &requirements {
            if *required <= Decimal::ZERO {
                continue;
            }
            session.uow_mut().lock_lots(item_id, &order.location_id)?;
            let plan = FifoAllocator::allocate(session, item_id, &order.location_id, *required)?;
            plans.push((*required, plan));
        }

        let ctx = Self::order_context(ctx, &order.order_number);
        let now = session.now();
        let mut components = Vec::with_capacity(plans.len());
        for (required, plan) in plans {
            let summary = LotMutator::consume(session, &plan, &ctx)?;
            for line in &summary.lines {
                let record = ProductionConsumption::new(
                    order.order_number.clone(),
                    plan.item_id.clone(),
                    line.lot_id,
                    line.lot_number.clone(),
                    line.quantity,
                    line.unit_cost,
                    now,
                )
                .with_consumed_by(ctx.actor.clone());
                session.uow_mut().insert_consumption(record)?;
            }

            tracing::debug!(
                "工單 {} 元件 {} 領料 {} 成本 {}",
                order.order_number,
                plan.item_id,
                required,
                summary.total_cost
            );
            components.push(ComponentConsumption {
                item_id: plan.item_id,
                required_quantity: required,
                summary,
            });
        }

        let total_material_cost: Decimal = components.iter().map(|c| c.summary.total_cost).sum();
        order.material_cost = total_material_cost;
        order.status = ProductionStatus::InProgress;
        order.actual_start_at = Some(now);
        session.uow_mut().save_production_order(&order)?;

        tracing::info!(
            "工單 {} 開工: {} 個元件, 材料成本 {}",
            order.order_number,
            components.len(),
            total_material_cost
        );
        Ok(ProductionStart {
            order,
            components,
            total_material_cost,
        })
    }

    /// 完工：良品建立成品批次，報廢另行記錄
    pub fn complete(
        session: &mut Session<'_>,
        order_number: &str,
        quantity_good: Decimal,
        quantity_scrapped: Decimal,
        scrap_reason: Option<&str>,
        ctx: &OperationContext,
    ) -> lot_core::Result<ProductionCompletion> {
        let mut order = Self::order(session, order_number)?;
        if order.status != ProductionStatus::InProgress {
            return Err(LotError::StateConflict {
                order_number: order.order_number.clone(),
                status: order.status,
                expected: "in_progress".to_string(),
            });
        }
        if quantity_good < Decimal::ZERO || quantity_scrapped < Decimal::ZERO {
            return Err(LotError::InvalidQuantity(format!(
                "完工數量不可為負：良品 {quantity_good}, 報廢 {quantity_scrapped}"
            )));
        }
        let reported = quantity_good + quantity_scrapped;
        if reported == Decimal::ZERO || reported > order.quantity_remaining() {
            return Err(LotError::InvalidQuantity(format!(
                "工單 {} 剩餘 {}，回報 {}",
                order.order_number,
                order.quantity_remaining(),
                reported
            )));
        }

        let cost_per_unit = if quantity_good > Decimal::ZERO {
            order.material_cost / quantity_good
        } else {
            Decimal::ZERO
        };
        let ctx = Self::order_context(ctx, &order.order_number);

        let lot = if quantity_good > Decimal::ZERO {
            let next = session.uow_mut().next_sequence(SequenceKind::Receipt)?;
            let receipt_number = SequenceKind::Receipt.format(next);
            let options = LotOptions::new()
                .with_unit_cost(cost_per_unit)
                .with_source(
                    LotSource::production_order(order.order_number.clone())
                        .with_receipt_id(receipt_number),
                )
                .with_notes(format!("工單 {} 完工", order.order_number));
            Some(LotLedger::create_lot_as(
                session,
                &order.finished_item_id,
                &order.location_id,
                quantity_good,
                options,
                &ctx,
                TransactionType::Production,
            )?)
        } else {
            None
        };

        let scrap = if quantity_scrapped > Decimal::ZERO {
            let next = session.uow_mut().next_sequence(SequenceKind::Scrap)?;
            let record = ScrapRecord::new(
                SequenceKind::Scrap.format(next),
                order.finished_item_id.clone(),
                order.location_id.clone(),
                quantity_scrapped,
                scrap_reason.unwrap_or(DEFAULT_SCRAP_REASON).to_string(),
                session.now(),
            )
            .with_source_order(order.order_number.clone())
            .with_scrapped_by(ctx.actor.clone());
            session.uow_mut().insert_scrap(record.clone())?;
            Some(record)
        } else {
            None
        };

        order.quantity_produced += quantity_good;
        order.quantity_scrapped += quantity_scrapped;
        if order.quantity_remaining() <= Decimal::ZERO {
            order.status = ProductionStatus::Completed;
            order.actual_completion_at = Some(session.now());
        }
        session.uow_mut().save_production_order(&order)?;

        tracing::info!(
            "工單 {} 完工回報: 良品 {} 報廢 {} 單位成本 {} 進度 {}% 狀態 {}",
            order.order_number,
            quantity_good,
            quantity_scrapped,
            cost_per_unit,
            order.completion_percentage().round_dp(2),
            order.status
        );
        Ok(ProductionCompletion {
            order,
            lot,
            scrap,
            cost_per_unit,
        })
    }

    /// 工單追溯（唯讀）
    pub fn traceability(session: &Session<'_>, order_number: &str) -> lot_core::Result<Traceability> {
        let order = Self::order(session, order_number)?;

        let mut components: Vec<ComponentTrace> = Vec::new();
        for record in session.uow().consumptions(order_number)? {
            let index = match components.iter().position(|c| c.item_id == record.component_item_id) {
                Some(index) => index,
                None => {
                    components.push(ComponentTrace {
                        item_id: record.component_item_id.clone(),
                        total_quantity: Decimal::ZERO,
                        total_cost: Decimal::ZERO,
                        lots: Vec::new(),
                    });
                    components.len() - 1
                }
            };
            let trace = &mut components[index];
            trace.total_quantity += record.quantity_consumed;
            trace.total_cost += record.total_cost;
            trace.lots.push(ConsumedLotTrace {
                lot_id: record.lot_id,
                lot_number: record.lot_number,
                quantity: record.quantity_consumed,
                unit_cost: record.unit_cost,
                total_cost: record.total_cost,
            });
        }

        let finished_lots = session
            .uow()
            .lots(Some(&order.finished_item_id), None)?
            .into_iter()
            .filter(|lot| lot.source.production_order_number.as_deref() == Some(order_number))
            .collect();

        Ok(Traceability {
            order_number: order.order_number,
            finished_item_id: order.finished_item_id,
            components,
            finished_lots,
            scraps: session.uow().scraps(order_number)?,
        })
    }

    /// 開工前的需求檢查（唯讀）
    pub fn requirements(session: &Session<'_>, order_number: &str) -> lot_core::Result<RequirementsReport> {
        let order = Self::order(session, order_number)?;

        let mut lines = Vec::new();
        for (item_id, quantity_per_unit, required) in Self::scaled_requirements(session, &order)? {
            let available = session
                .uow()
                .cache_entry(&item_id, &order.location_id)?
                .map(|e| e.quantity)
                .unwrap_or(Decimal::ZERO);
            let lot_count = LotLedger::list_available(
                session,
                &item_id,
                Some(&order.location_id),
                session.config().exclude_expired,
            )?
            .len();

            lines.push(RequirementLine {
                item_id,
                quantity_per_unit,
                required,
                available,
                shortage: (required - available).max(Decimal::ZERO),
                lot_count,
            });
        }

        let can_produce = lines.iter().all(RequirementLine::is_sufficient);
        Ok(RequirementsReport {
            order_number: order.order_number,
            lines,
            can_produce,
        })
    }

    fn order(session: &Session<'_>, order_number: &str) -> lot_core::Result<ProductionOrder> {
        session
            .uow()
            .production_order(order_number)?
            .ok_or_else(|| LotError::OrderNotFound(order_number.to_string()))
    }

    /// 依取整規則放大元件用量，同一元件合併（保留首次出現順序）
    fn scaled_requirements(
        session: &Session<'_>,
        order: &ProductionOrder,
    ) -> lot_core::Result<Vec<(String, Decimal, Decimal)>> {
        let rounding = session.config().rounding;
        let mut merged: Vec<(String, Decimal, Decimal)> = Vec::new();

        for component in Self::resolve_components(session, order)? {
            let required = rounding.required_quantity(component.quantity_per_unit, order.quantity_ordered);
            match merged.iter_mut().find(|(item, _, _)| *item == component.item_id) {
                Some(entry) => {
                    entry.1 += component.quantity_per_unit;
                    entry.2 += required;
                }
                None => merged.push((component.item_id, component.quantity_per_unit, required)),
            }
        }
        Ok(merged)
    }

    fn order_context(ctx: &OperationContext, order_number: &str) -> OperationContext {
        let mut ctx = ctx.clone();
        if ctx.reference.is_none() {
            ctx.reference = Some(Reference::new(ReferenceType::ProductionOrder, order_number));
        }
        ctx
    }
}
