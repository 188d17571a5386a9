//! 批次異動：消耗、調撥拆分、調整、隔離

use lot_core::{
    Lot, LotError, LotStatus, OperationContext, Reference, SequenceKind, TransactionType,
    TransferOptions,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::{AllocationPlan, AuditTrail, ConsumptionSummary, FifoAllocator, LotLedger, Session};

/// 批次異動器
pub struct LotMutator;

impl LotMutator {
    /// 套用分配計劃
    ///
    /// 先逐行核對計劃仍與批次一致，全部通過後才扣減，任何一行不符即回傳
    /// `StaleAllocation` 且不做任何修改。
    pub fn consume(
        session: &mut Session<'_>,
        plan: &AllocationPlan,
        ctx: &OperationContext,
    ) -> lot_core::Result<ConsumptionSummary> {
        let mut pending: HashMap<u64, Decimal> = HashMap::new();
        for line in &plan.lines {
            let lot = session
                .uow()
                .lot(&line.lot_number)?
                .filter(|lot| {
                    lot.id == line.lot_id
                        && lot.status == LotStatus::Active
                        && lot.item_id == plan.item_id
                        && lot.location_id == plan.location_id
                })
                .ok_or_else(|| LotError::StaleAllocation(line.lot_number.clone()))?;

            let taken = pending.entry(lot.id).or_default();
            *taken += line.quantity;
            if line.quantity <= Decimal::ZERO || *taken > lot.quantity_available {
                return Err(LotError::StaleAllocation(line.lot_number.clone()));
            }
        }

        for line in &plan.lines {
            let mut lot = LotLedger::lot(session, &line.lot_number)?;
            lot.consume(line.quantity)?;
            session.uow_mut().update_lot(&lot)?;

            let record = AuditTrail::entry(
                session,
                &lot,
                TransactionType::Consumption,
                -line.quantity,
                ctx,
                None,
            )
            .with_locations(Some(lot.location_id.clone()), None)
            .with_bins(lot.bin_location.clone(), None);
            AuditTrail::append(session, record)?;

            tracing::debug!(
                "消耗批次 {} 數量 {} 剩餘 {}",
                lot.lot_number,
                line.quantity,
                lot.quantity_available
            );
        }

        let summary = ConsumptionSummary::from_lines(plan.lines.clone());
        session.adjust_cache(&plan.item_id, &plan.location_id, -summary.total_quantity)?;
        Ok(summary)
    }

    /// 調撥批次
    ///
    /// 整批調撥時就地改地點；部分調撥時原批次扣減，並在目的地建立沿用原收貨時間的新批次。
    /// 回傳位於目的地的批次。
    pub fn transfer(
        session: &mut Session<'_>,
        lot_number: &str,
        from_location_id: &str,
        to_location_id: &str,
        quantity: Decimal,
        options: &TransferOptions,
        ctx: &OperationContext,
    ) -> lot_core::Result<Lot> {
        Self::check_transfer(quantity, from_location_id, to_location_id)?;

        let lot = Self::locked_lot(session, lot_number, &[from_location_id, to_location_id])?;
        if lot.location_id != from_location_id {
            return Err(LotError::InvalidTransfer(format!(
                "批次 {} 位於 {}，不在 {}",
                lot.lot_number, lot.location_id, from_location_id
            )));
        }
        if lot.status != LotStatus::Active {
            return Err(LotError::InvalidTransfer(format!(
                "批次 {} 狀態為 {:?}，無法調撥",
                lot.lot_number, lot.status
            )));
        }
        if quantity > lot.quantity_available {
            return Err(LotError::InvalidTransfer(format!(
                "批次 {} 可用量 {}，不足調撥 {}",
                lot.lot_number, lot.quantity_available, quantity
            )));
        }

        let fallback = Self::movement_reference(session, ctx)?;
        Self::move_lot(session, lot, to_location_id, quantity, options, ctx, fallback)
    }

    /// 依 FIFO 調撥某物料的數量
    ///
    /// 在來源地點按 FIFO 分配，逐批整批搬移或拆分，目的地的每個批次都保留原收貨時間與成本。
    /// 庫存不足時回傳 `InsufficientQuantity` 且不做任何修改。所有異動共用同一個參考單號。
    pub fn transfer_fifo(
        session: &mut Session<'_>,
        item_id: &str,
        from_location_id: &str,
        to_location_id: &str,
        quantity: Decimal,
        options: &TransferOptions,
        ctx: &OperationContext,
    ) -> lot_core::Result<Vec<Lot>> {
        Self::check_transfer(quantity, from_location_id, to_location_id)?;
        Self::lock_pairs(session, item_id, &[from_location_id, to_location_id])?;

        let plan = FifoAllocator::allocate(session, item_id, from_location_id, quantity)?;
        let fallback = Self::movement_reference(session, ctx)?;

        let mut moved = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let lot = LotLedger::lot(session, &line.lot_number)?;
            moved.push(Self::move_lot(
                session,
                lot,
                to_location_id,
                line.quantity,
                options,
                ctx,
                fallback.clone(),
            )?);
        }

        tracing::info!(
            "FIFO 調撥 {} 數量 {}: {} -> {}，涉及 {} 個批次",
            item_id,
            quantity,
            from_location_id,
            to_location_id,
            moved.len()
        );
        Ok(moved)
    }

    fn check_transfer(quantity: Decimal, from_location_id: &str, to_location_id: &str) -> lot_core::Result<()> {
        if quantity <= Decimal::ZERO {
            return Err(LotError::InvalidTransfer(format!(
                "調撥數量必須大於 0，收到 {quantity}"
            )));
        }
        if from_location_id == to_location_id {
            return Err(LotError::InvalidTransfer(format!(
                "來源與目的地點相同: {from_location_id}"
            )));
        }
        Ok(())
    }

    /// 沒有外部參考時配發 MOV 單號
    fn movement_reference(session: &mut Session<'_>, ctx: &OperationContext) -> lot_core::Result<Option<Reference>> {
        if ctx.reference.is_some() {
            return Ok(None);
        }
        let next = session.uow_mut().next_sequence(SequenceKind::Movement)?;
        Ok(Some(Reference::new(
            session.config().default_reference_type.clone(),
            SequenceKind::Movement.format(next),
        )))
    }

    /// 將已驗證的批次搬到目的地，同步兩端緩存
    ///
    /// 整批搬移時未指定目的儲位則保留原儲位；拆分出的新批次只使用指定的目的儲位。
    fn move_lot(
        session: &mut Session<'_>,
        mut lot: Lot,
        to_location_id: &str,
        quantity: Decimal,
        options: &TransferOptions,
        ctx: &OperationContext,
        fallback: Option<Reference>,
    ) -> lot_core::Result<Lot> {
        let from_location_id = lot.location_id.clone();
        let from_bin = lot.bin_location.clone();
        let to_bin = options.to_bin_location.clone();

        let destination = if quantity == lot.quantity_available {
            lot.location_id = to_location_id.to_string();
            lot.bin_location = to_bin.or_else(|| from_bin.clone());
            session.uow_mut().update_lot(&lot)?;

            let record = AuditTrail::entry(session, &lot, TransactionType::Transfer, Decimal::ZERO, ctx, fallback)
                .with_quantity(quantity)
                .with_locations(Some(from_location_id.clone()), Some(to_location_id.to_string()))
                .with_bins(from_bin, lot.bin_location.clone());
            AuditTrail::append(session, record)?;

            tracing::debug!("整批調撥 {} {} -> {}", lot.lot_number, from_location_id, to_location_id);
            lot
        } else {
            lot.quantity_available -= quantity;
            session.uow_mut().update_lot(&lot)?;

            let out = AuditTrail::entry(session, &lot, TransactionType::TransferOut, -quantity, ctx, fallback.clone())
                .with_locations(Some(from_location_id.clone()), Some(to_location_id.to_string()))
                .with_bins(from_bin.clone(), to_bin.clone());
            AuditTrail::append(session, out)?;

            let split_number = Self::split_number(session, &lot.lot_number)?;
            let split = Lot {
                id: 0,
                lot_number: split_number,
                location_id: to_location_id.to_string(),
                bin_location: to_bin.clone(),
                quantity_original: quantity,
                quantity_available: quantity,
                status: LotStatus::Active,
                split_from: Some(lot.lot_number.clone()),
                created_by: ctx.actor.clone(),
                created_at: session.now(),
                ..lot.clone()
            };
            let split = session.uow_mut().insert_lot(split)?;

            let inbound = AuditTrail::entry(session, &split, TransactionType::TransferIn, quantity, ctx, fallback)
                .with_locations(Some(from_location_id.clone()), Some(to_location_id.to_string()))
                .with_bins(from_bin, to_bin);
            AuditTrail::append(session, inbound)?;

            tracing::debug!(
                "部分調撥 {} 數量 {} -> 新批次 {} 於 {}",
                lot.lot_number,
                quantity,
                split.lot_number,
                to_location_id
            );
            split
        };

        session.adjust_cache(&destination.item_id, &from_location_id, -quantity)?;
        session.adjust_cache(&destination.item_id, to_location_id, quantity)?;
        Ok(destination)
    }

    /// 盤點向下調整（只減不增）
    pub fn adjust(
        session: &mut Session<'_>,
        lot_number: &str,
        quantity: Decimal,
        ctx: &OperationContext,
    ) -> lot_core::Result<Lot> {
        let mut lot = Self::locked_lot(session, lot_number, &[])?;
        if lot.status != LotStatus::Active {
            return Err(LotError::InvalidQuantity(format!(
                "批次 {} 狀態為 {:?}，無法調整",
                lot.lot_number, lot.status
            )));
        }
        if quantity <= Decimal::ZERO || quantity > lot.quantity_available {
            return Err(LotError::InvalidQuantity(format!(
                "調整數量需介於 0 與 {} 之間，收到 {}",
                lot.quantity_available, quantity
            )));
        }

        lot.consume(quantity)?;
        session.uow_mut().update_lot(&lot)?;

        let record = AuditTrail::entry(session, &lot, TransactionType::Adjustment, -quantity, ctx, None)
            .with_locations(Some(lot.location_id.clone()), None);
        AuditTrail::append(session, record)?;
        session.adjust_cache(&lot.item_id, &lot.location_id, -quantity)?;

        tracing::debug!("調整批次 {} 減少 {}", lot.lot_number, quantity);
        Ok(lot)
    }

    /// 隔離批次：不再參與選用，也不計入緩存
    pub fn quarantine(
        session: &mut Session<'_>,
        lot_number: &str,
        ctx: &OperationContext,
    ) -> lot_core::Result<Lot> {
        Self::set_status(session, lot_number, LotStatus::Active, LotStatus::Quarantine, ctx)
    }

    /// 解除隔離
    pub fn release(
        session: &mut Session<'_>,
        lot_number: &str,
        ctx: &OperationContext,
    ) -> lot_core::Result<Lot> {
        Self::set_status(session, lot_number, LotStatus::Quarantine, LotStatus::Active, ctx)
    }

    fn set_status(
        session: &mut Session<'_>,
        lot_number: &str,
        from: LotStatus,
        to: LotStatus,
        ctx: &OperationContext,
    ) -> lot_core::Result<Lot> {
        let mut lot = Self::locked_lot(session, lot_number, &[])?;
        if lot.status != from {
            return Err(LotError::InvalidQuantity(format!(
                "批次 {} 狀態為 {:?}，需要 {:?}",
                lot.lot_number, lot.status, from
            )));
        }

        lot.status = to;
        session.uow_mut().update_lot(&lot)?;

        let notes = ctx
            .notes
            .clone()
            .unwrap_or_else(|| format!("狀態 {from:?} -> {to:?}"));
        let record = AuditTrail::entry(session, &lot, TransactionType::Adjustment, Decimal::ZERO, ctx, None)
            .with_quantity(lot.quantity_available)
            .with_notes(Some(notes));
        AuditTrail::append(session, record)?;

        let delta = if to == LotStatus::Active {
            lot.quantity_available
        } else {
            -lot.quantity_available
        };
        session.adjust_cache(&lot.item_id, &lot.location_id, delta)?;

        tracing::info!("批次 {} 狀態 {:?} -> {:?}", lot.lot_number, from, to);
        Ok(lot)
    }

    /// 鎖定批次所在的（物料, 地點）及額外地點後重新讀取批次
    fn locked_lot(session: &mut Session<'_>, lot_number: &str, also: &[&str]) -> lot_core::Result<Lot> {
        let lot = LotLedger::lot(session, lot_number)?;
        let mut locations = vec![lot.location_id.as_str()];
        locations.extend_from_slice(also);
        Self::lock_pairs(session, &lot.item_id, &locations)?;
        LotLedger::lot(session, lot_number)
    }

    /// 依地點排序後逐一上鎖
    fn lock_pairs(session: &mut Session<'_>, item_id: &str, locations: &[&str]) -> lot_core::Result<()> {
        let mut locations = locations.to_vec();
        locations.sort_unstable();
        locations.dedup();
        for location_id in locations {
            session.uow_mut().lock_lots(item_id, location_id)?;
        }
        Ok(())
    }

    /// 產生不重複的拆分批號
    fn split_number(session: &Session<'_>, source: &str) -> lot_core::Result<String> {
        let base = format!("{source}{}", session.config().split_suffix);
        if session.uow().lot(&base)?.is_none() {
            return Ok(base);
        }
        let mut n = 2u32;
        loop {
            let candidate = format!("{base}-{n}");
            if session.uow().lot(&candidate)?.is_none() {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}
