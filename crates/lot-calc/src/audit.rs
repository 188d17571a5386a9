//! 稽核軌跡

use lot_core::{Lot, LotTransaction, OperationContext, Reference, TransactionType};
use rust_decimal::Decimal;

use crate::Session;

/// 稽核軌跡寫入器
///
/// 每一次批次異動都追加一筆不可變的紀錄，帶著觸發單據類型與編號以供追溯。
pub struct AuditTrail;

impl AuditTrail {
    /// 依批次與操作歸屬組出紀錄
    ///
    /// 操作未帶單據參考時使用 `fallback_reference`；未帶備註時使用該異動類型的預設說明。
    pub fn entry(
        session: &Session<'_>,
        lot: &Lot,
        transaction_type: TransactionType,
        delta: Decimal,
        ctx: &OperationContext,
        fallback_reference: Option<Reference>,
    ) -> LotTransaction {
        LotTransaction::new(
            lot.id,
            lot.lot_number.clone(),
            transaction_type,
            delta,
            session.now(),
        )
        .with_reference(ctx.reference.clone().or(fallback_reference))
        .with_actor(ctx.actor.clone())
        .with_notes(Some(
            ctx.notes
                .clone()
                .unwrap_or_else(|| Self::default_note(transaction_type).to_string()),
        ))
    }

    /// 追加紀錄
    pub fn append(session: &mut Session<'_>, record: LotTransaction) -> lot_core::Result<LotTransaction> {
        tracing::debug!(
            "稽核: 批次 {} {:?} 數量 {} 影響 {}",
            record.lot_number,
            record.transaction_type,
            record.quantity,
            record.delta
        );
        session.uow_mut().append_transaction(record)
    }

    fn default_note(transaction_type: TransactionType) -> &'static str {
        match transaction_type {
            TransactionType::Receipt => "收貨建立批次",
            TransactionType::Consumption => "FIFO 消耗",
            TransactionType::Transfer => "整批調撥",
            TransactionType::TransferOut => "部分調撥轉出",
            TransactionType::TransferIn => "部分調撥轉入",
            TransactionType::Adjustment => "盤點調整",
            TransactionType::Production => "生產完工入庫",
        }
    }
}
