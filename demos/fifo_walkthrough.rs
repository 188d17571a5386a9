//! FIFO 批次流程示例：收貨、消耗、調撥拆分、生產領料與追溯

use chrono::{TimeZone, Utc};
use lot_engine::{
    BillOfMaterials, BomLine, BomStatus, EngineConfig, LotEngine, LotOptions, MemoryCatalog,
    MemoryStore, OperationContext, ProductionOrder, TransferOptions,
};
use rust_decimal::Decimal;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== FIFO 批次流程示例 ===\n");

    // 物料主檔：椅子 = 木材 ×2 + 螺絲 ×8
    let catalog = MemoryCatalog::new()
        .with_standard_cost("SCREW", Decimal::new(10, 2))
        .with_bom(
            BillOfMaterials::new("BOM-CHAIR".to_string(), "CHAIR".to_string())
                .with_status(BomStatus::Active)
                .with_line(BomLine::new("WOOD".to_string(), Decimal::from(2)).with_sequence(10))
                .with_line(BomLine::new("SCREW".to_string(), Decimal::from(8)).with_sequence(20)),
        );
    let engine = LotEngine::new(MemoryStore::new(), catalog, EngineConfig::default());
    let ctx = OperationContext::new().with_actor("demo");

    // 收貨
    let day = |d: u32| Utc.with_ymd_and_hms(2025, 11, d, 8, 0, 0).single();
    let mut first = LotOptions::new().with_unit_cost(Decimal::from(5));
    if let Some(received) = day(1) {
        first = first.with_received_at(received);
    }
    let mut second = LotOptions::new().with_unit_cost(Decimal::from(6));
    if let Some(received) = day(2) {
        second = second.with_received_at(received);
    }
    engine.create_lot("WOOD", "PLANT-1", Decimal::from(100), first, &ctx)?;
    engine.create_lot("WOOD", "PLANT-1", Decimal::from(50), second, &ctx)?;
    engine.create_lot("SCREW", "PLANT-1", Decimal::from(500), LotOptions::new(), &ctx)?;

    println!("木材可用批次:");
    for lot in engine.list_available("WOOD", Some("PLANT-1"), true)? {
        println!(
            "  - {} 數量 {} 單位成本 {} 收貨 {}",
            lot.lot_number, lot.quantity_available, lot.unit_cost, lot.received_at
        );
    }

    // 預覽與消耗
    let plan = engine.allocate("WOOD", "PLANT-1", Decimal::from(120))?;
    println!("\n預覽 120: 平均成本 {}", plan.average_unit_cost().round_dp(4));
    match engine.allocate("WOOD", "PLANT-1", Decimal::from(200)) {
        Ok(_) => println!("預期庫存不足"),
        Err(e) => println!("預覽 200: {e}"),
    }
    let summary = engine.consume("WOOD", "PLANT-1", Decimal::from(20), &ctx)?;
    println!("消耗 20: 總成本 {}", summary.total_cost);

    // 部分調撥
    let split = engine.transfer(
        "BATCH-000001",
        "PLANT-1",
        "PLANT-2",
        Decimal::from(30),
        &TransferOptions::to_bin("R-01"),
        &ctx,
    )?;
    println!(
        "\n調撥 30 -> {} 於 {}，收貨時間 {}",
        split.lot_number, split.location_id, split.received_at
    );

    // 生產
    engine.save_order(
        ProductionOrder::new(
            "MO-0001".to_string(),
            "CHAIR".to_string(),
            "PLANT-1".to_string(),
            Decimal::from(10),
        )
        .with_bom("BOM-CHAIR".to_string()),
    )?;
    let report = engine.requirements("MO-0001")?;
    println!("\n工單需求（可生產: {}）:", report.can_produce);
    for line in &report.lines {
        println!("  - {} 需要 {} 可用 {} 短缺 {}", line.item_id, line.required, line.available, line.shortage);
    }

    let started = engine.start_production("MO-0001", &ctx)?;
    println!("開工材料成本: {}", started.total_material_cost);
    let completion = engine.complete_production("MO-0001", Decimal::from(9), Decimal::ONE, None, &ctx)?;
    println!(
        "完工: 單位成本 {} 狀態 {}",
        completion.cost_per_unit.round_dp(4),
        completion.order.status
    );

    let trace = engine.traceability("MO-0001")?;
    println!("\n追溯 {}:", trace.order_number);
    for component in &trace.components {
        for lot in &component.lots {
            println!("  - {} <- {} 數量 {} 成本 {}", component.item_id, lot.lot_number, lot.quantity, lot.total_cost);
        }
    }
    for lot in &trace.finished_lots {
        println!("  成品批次 {} 數量 {}", lot.lot_number, lot.quantity_available);
    }

    let valuation = engine.valuation()?;
    println!("\n庫存總值: {}", valuation.total_value.round_dp(2));

    let diverged = engine.reconcile_all()?.into_iter().filter(|r| !r.is_consistent()).count();
    println!("緩存不一致組數: {diverged}");

    Ok(())
}
