use super::*;

use chrono::{Duration, TimeZone};

use crate::{
    broker::TradeSide,
    ledger::TrackedPosition,
    testkit::{MockGateway, open_trade},
};

fn config(max_daily_loss: f64, max_heat: f64) -> RiskControllerConfig {
    RiskControllerConfig {
        default_risk: RiskPercent::new(0.015).unwrap(),
        min_units: 1,
        max_units: 100,
        max_daily_loss,
        max_portfolio_heat: BoundedRatio::new(max_heat).unwrap(),
    }
}

async fn controller_with(
    config: RiskControllerConfig,
    balance: f64,
) -> (RiskController, Arc<MockGateway>, Arc<Database>) {
    let gateway = Arc::new(MockGateway::new());
    gateway.set_balance(balance);
    let db = Database::connect_in_memory().await.unwrap();
    let controller = RiskController::restore(config, gateway.clone(), db.clone())
        .await
        .unwrap();

    (controller, gateway, db)
}

fn tracked_position(trade_id: &str, instrument: &str, current_stop_loss: f64) -> TrackedPosition {
    TrackedPosition {
        trade_id: trade_id.into(),
        instrument: instrument.to_string(),
        side: TradeSide::Long,
        strategy_name: "trend-follow".to_string(),
        entry_price: 2_000.0,
        units: 30,
        stop_loss: current_stop_loss,
        take_profit_1: 2_030.0,
        take_profit_2: 2_050.0,
        tp1_hit: false,
        best_price_seen: 2_000.0,
        current_stop_loss,
        open_time: Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
        reason: "test".to_string(),
    }
}

#[tokio::test]
async fn restore_seeds_state_from_live_balance_when_db_is_empty() {
    let (controller, _gateway, db) = controller_with(config(500.0, 0.06), 10_000.0).await;

    assert_eq!(controller.state().current_balance, 10_000.0);
    assert_eq!(controller.state().initial_balance, 10_000.0);
    assert_eq!(controller.state().daily_trade_count, 0);

    // Seed state must already be on disk.
    let row = db.risk_state.load().await.unwrap().unwrap();
    assert_eq!(row.current_balance, 10_000.0);
}

#[tokio::test]
async fn restore_prefers_persisted_state_over_live_balance() {
    let gateway = Arc::new(MockGateway::new());
    gateway.set_balance(99_999.0);
    let db = Database::connect_in_memory().await.unwrap();

    let saved = RiskState {
        current_balance: 9_400.0,
        initial_balance: 10_000.0,
        daily_pnl: -100.0,
        daily_trade_count: 2,
        win_count: 5,
        loss_count: 3,
        total_pnl: -600.0,
        last_reset_date: Utc::now().utc_date(),
    };
    db.risk_state.save(&RiskStateRow::from(&saved)).await.unwrap();

    let controller = RiskController::restore(config(500.0, 0.06), gateway, db)
        .await
        .unwrap();

    assert_eq!(controller.state(), &saved);
}

#[tokio::test]
async fn position_size_floors_the_risk_budget() {
    let (controller, _gateway, _db) = controller_with(config(500.0, 0.06), 10_000.0).await;

    // 10_000 * 0.015 / 20 = 7.5, floored.
    assert_eq!(controller.position_size(2_050.0, 2_030.0, None), 7);
}

#[tokio::test]
async fn position_size_zero_distance_yields_sentinel() {
    let (controller, _gateway, _db) = controller_with(config(500.0, 0.06), 10_000.0).await;

    assert_eq!(controller.position_size(2_050.0, 2_050.0, None), 0);
}

#[tokio::test]
async fn position_size_clamps_to_configured_bounds() {
    let mut narrow = config(500.0, 0.06);
    narrow.min_units = 10;
    narrow.max_units = 12;
    let (controller, _gateway, _db) = controller_with(narrow, 10_000.0).await;

    // Raw size 7 sits below the floor.
    assert_eq!(controller.position_size(2_050.0, 2_030.0, None), 10);
    // Raw size 150 sits above the ceiling.
    assert_eq!(controller.position_size(2_050.0, 2_049.0, None), 12);
}

#[tokio::test]
async fn position_size_below_one_unit_is_not_clamped_up() {
    let mut cfg = config(500.0, 0.06);
    cfg.min_units = 5;
    let (controller, _gateway, _db) = controller_with(cfg, 100.0).await;

    // Budget 1.5 over a 20-point stop rounds to zero units: cannot size.
    assert_eq!(controller.position_size(2_050.0, 2_030.0, None), 0);
}

#[tokio::test]
async fn position_size_honors_explicit_risk_override() {
    let (controller, _gateway, _db) = controller_with(config(500.0, 0.06), 10_000.0).await;

    let risk = RiskPercent::new(0.03).unwrap();
    assert_eq!(controller.position_size(2_050.0, 2_030.0, Some(risk)), 15);
}

#[tokio::test]
async fn daily_loss_limit_denies_new_trades() {
    let (mut controller, _gateway, db) = controller_with(config(500.0, 0.06), 10_000.0).await;
    controller.record_trade(-500.0).await.unwrap();

    let mut ledger = PositionLedger::new(db);
    ledger.restore().await.unwrap();

    let verdict = controller
        .can_open_trade(&ledger, 2_050.0, 2_030.0, 7)
        .await
        .unwrap();

    assert_eq!(verdict, RiskVerdict::Denied(DenyReason::DailyLossLimit));
}

#[tokio::test]
async fn portfolio_heat_counts_open_trades_and_the_proposed_trade() {
    let (mut controller, gateway, db) = controller_with(config(500.0, 0.06), 10_000.0).await;

    // Existing trade risks 30 units * 10 points = 300.
    let mut existing = open_trade("T1", "XAU_USD", 30, 2_000.0);
    existing.stop_loss = Some(1_990.0);
    gateway.set_open_trades(vec![existing]);

    let mut ledger = PositionLedger::new(db);
    ledger.restore().await.unwrap();

    // Proposed 20 units * 20 points = 400; 700 / 10_000 exceeds 6%.
    let verdict = controller
        .can_open_trade(&ledger, 2_050.0, 2_030.0, 20)
        .await
        .unwrap();
    assert_eq!(
        verdict,
        RiskVerdict::Denied(DenyReason::PortfolioHeatExceeded)
    );

    // Proposed 10 units * 20 points = 200; 500 / 10_000 fits.
    let verdict = controller
        .can_open_trade(&ledger, 2_050.0, 2_030.0, 10)
        .await
        .unwrap();
    assert_eq!(verdict, RiskVerdict::Allowed);
}

#[tokio::test]
async fn portfolio_heat_falls_back_to_tracked_stop_when_broker_has_none() {
    let (mut controller, gateway, db) = controller_with(config(500.0, 0.06), 10_000.0).await;

    // Broker reports no stop; the ledger knows it at 1_985 (risk 450).
    gateway.set_open_trades(vec![open_trade("T1", "XAU_USD", 30, 2_000.0)]);

    let mut ledger = PositionLedger::new(db);
    ledger.restore().await.unwrap();
    ledger
        .create(tracked_position("T1", "XAU_USD", 1_985.0))
        .await
        .unwrap();

    // 450 + 400 = 850 over 10_000 exceeds 6%.
    let verdict = controller
        .can_open_trade(&ledger, 2_050.0, 2_030.0, 20)
        .await
        .unwrap();
    assert_eq!(
        verdict,
        RiskVerdict::Denied(DenyReason::PortfolioHeatExceeded)
    );
}

#[tokio::test]
async fn can_open_trade_reserves_nothing() {
    let (mut controller, _gateway, db) = controller_with(config(500.0, 0.06), 10_000.0).await;
    let mut ledger = PositionLedger::new(db);
    ledger.restore().await.unwrap();

    let before = controller.state().clone();
    for _ in 0..3 {
        let verdict = controller
            .can_open_trade(&ledger, 2_050.0, 2_030.0, 7)
            .await
            .unwrap();
        assert_eq!(verdict, RiskVerdict::Allowed);
    }

    assert_eq!(controller.state(), &before);
}

#[tokio::test]
async fn record_trade_updates_counters_and_persists() {
    let (mut controller, _gateway, db) = controller_with(config(500.0, 0.06), 10_000.0).await;

    controller.record_trade(100.0).await.unwrap();
    controller.record_trade(-40.0).await.unwrap();

    let state = controller.state();
    assert_eq!(state.daily_pnl, 60.0);
    assert_eq!(state.total_pnl, 60.0);
    assert_eq!(state.daily_trade_count, 2);
    assert_eq!(state.win_count, 1);
    assert_eq!(state.loss_count, 1);
    assert_eq!(state.win_rate(), Some(50.0));

    let row = db.risk_state.load().await.unwrap().unwrap();
    assert_eq!(RiskState::from(row), *state);
}

#[tokio::test]
async fn daily_counters_reset_when_the_date_advances() {
    let gateway = Arc::new(MockGateway::new());
    gateway.set_balance(10_000.0);
    let db = Database::connect_in_memory().await.unwrap();

    let yesterday = Utc::now().utc_date() - Duration::days(1);
    let saved = RiskState {
        current_balance: 9_700.0,
        initial_balance: 10_000.0,
        daily_pnl: -300.0,
        daily_trade_count: 4,
        win_count: 1,
        loss_count: 3,
        total_pnl: -300.0,
        last_reset_date: yesterday,
    };
    db.risk_state.save(&RiskStateRow::from(&saved)).await.unwrap();

    let mut controller = RiskController::restore(config(500.0, 0.06), gateway, db.clone())
        .await
        .unwrap();

    assert!(controller.reset_daily_if_needed().await.unwrap());
    assert_eq!(controller.state().daily_pnl, 0.0);
    assert_eq!(controller.state().daily_trade_count, 0);
    // Lifetime counters survive the daily reset.
    assert_eq!(controller.state().total_pnl, -300.0);
    assert_eq!(controller.state().win_count, 1);

    // Second call on the same date is a no-op.
    assert!(!controller.reset_daily_if_needed().await.unwrap());

    let row = db.risk_state.load().await.unwrap().unwrap();
    assert_eq!(row.daily_pnl, 0.0);
    assert_eq!(row.last_reset_date, Utc::now().utc_date());
}

#[tokio::test]
async fn sync_balance_keeps_stale_value_on_broker_failure() {
    let (mut controller, gateway, _db) = controller_with(config(500.0, 0.06), 10_000.0).await;

    gateway.set_balance(10_500.0);
    assert_eq!(controller.sync_balance().await, 10_500.0);

    gateway.fail_balance(true);
    assert_eq!(controller.sync_balance().await, 10_500.0);
}

#[tokio::test]
async fn portfolio_summary_reports_live_heat() {
    let (mut controller, gateway, db) = controller_with(config(500.0, 0.06), 10_000.0).await;

    let mut existing = open_trade("T1", "XAU_USD", 30, 2_000.0);
    existing.stop_loss = Some(1_990.0);
    gateway.set_open_trades(vec![existing]);

    let mut ledger = PositionLedger::new(db);
    ledger.restore().await.unwrap();

    let summary = controller.portfolio_summary(&ledger).await.unwrap();
    assert_eq!(summary.balance, 10_000.0);
    assert_eq!(summary.open_positions, 1);
    assert!((summary.portfolio_heat - 0.03).abs() < 1e-12);
    assert_eq!(summary.win_rate, None);
}
