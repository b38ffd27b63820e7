//! Shared scripted doubles for unit tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{
    broker::{
        Candle, ClosedTradeDetail, OpenTrade, OrderFill, OrderGateway, Quote, TradeId,
        TradeModification,
        error::{BrokerError, Result},
    },
    notify::{Notifier, NotifyEvent},
    shared::Timeframe,
};

/// Installs a test-writer subscriber so `tracing` output lands in the captured
/// test output. Safe to call from any number of tests.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlacedOrder {
    pub instrument: String,
    pub units: i64,
    pub stop_loss: f64,
}

#[derive(Default)]
struct GatewayState {
    balance: f64,
    balance_fails: bool,
    open_trades: Vec<OpenTrade>,
    open_trades_fails: bool,
    quote: Option<Quote>,
    quote_fails: bool,
    candles: Vec<Candle>,
    closed_details: HashMap<String, ClosedTradeDetail>,
    fill_price: f64,
    partial_close_pl: f64,
    modify_failures_remaining: u32,
    next_trade_id: u64,
    placed: Vec<PlacedOrder>,
    partial_closes: Vec<(TradeId, i64)>,
    modifications: Vec<(TradeId, TradeModification)>,
}

/// Scripted in-memory [`OrderGateway`]. Every response is set up front by the
/// test; every order-side call is recorded for assertion.
#[derive(Default)]
pub(crate) struct MockGateway {
    state: Mutex<GatewayState>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, balance: f64) {
        self.state.lock().unwrap().balance = balance;
    }

    pub fn fail_balance(&self, fails: bool) {
        self.state.lock().unwrap().balance_fails = fails;
    }

    pub fn set_open_trades(&self, trades: Vec<OpenTrade>) {
        self.state.lock().unwrap().open_trades = trades;
    }

    pub fn fail_open_trades(&self, fails: bool) {
        self.state.lock().unwrap().open_trades_fails = fails;
    }

    pub fn set_quote(&self, quote: Quote) {
        self.state.lock().unwrap().quote = Some(quote);
    }

    pub fn fail_quote(&self, fails: bool) {
        self.state.lock().unwrap().quote_fails = fails;
    }

    pub fn set_candles(&self, candles: Vec<Candle>) {
        self.state.lock().unwrap().candles = candles;
    }

    pub fn set_closed_detail(&self, trade_id: &TradeId, detail: ClosedTradeDetail) {
        self.state
            .lock()
            .unwrap()
            .closed_details
            .insert(trade_id.as_str().to_string(), detail);
    }

    pub fn set_fill_price(&self, price: f64) {
        self.state.lock().unwrap().fill_price = price;
    }

    pub fn set_partial_close_pl(&self, pl: f64) {
        self.state.lock().unwrap().partial_close_pl = pl;
    }

    /// The next `count` calls to `modify_trade` fail with a transport error.
    pub fn fail_modifies(&self, count: u32) {
        self.state.lock().unwrap().modify_failures_remaining = count;
    }

    pub fn placed_orders(&self) -> Vec<PlacedOrder> {
        self.state.lock().unwrap().placed.clone()
    }

    pub fn partial_closes(&self) -> Vec<(TradeId, i64)> {
        self.state.lock().unwrap().partial_closes.clone()
    }

    pub fn modifications(&self) -> Vec<(TradeId, TradeModification)> {
        self.state.lock().unwrap().modifications.clone()
    }
}

#[async_trait]
impl OrderGateway for MockGateway {
    async fn get_open_trades(&self) -> Result<Vec<OpenTrade>> {
        let state = self.state.lock().unwrap();
        if state.open_trades_fails {
            return Err(BrokerError::Transport("scripted outage".to_string()));
        }

        Ok(state.open_trades.clone())
    }

    async fn place_market_order(
        &self,
        instrument: &str,
        units: i64,
        stop_loss: f64,
    ) -> Result<OrderFill> {
        let mut state = self.state.lock().unwrap();
        state.placed.push(PlacedOrder {
            instrument: instrument.to_string(),
            units,
            stop_loss,
        });
        state.next_trade_id += 1;
        let trade_id = TradeId::new(format!("T{}", state.next_trade_id));
        let price = state.fill_price;

        state.open_trades.push(OpenTrade {
            trade_id: trade_id.clone(),
            instrument: instrument.to_string(),
            units,
            price,
            stop_loss: Some(stop_loss),
            unrealized_pl: 0.0,
        });

        Ok(OrderFill {
            trade_id,
            order_id: None,
            price,
        })
    }

    async fn partial_close(&self, trade_id: &TradeId, units: i64) -> Result<f64> {
        let mut state = self.state.lock().unwrap();
        state.partial_closes.push((trade_id.clone(), units));
        if let Some(trade) = state
            .open_trades
            .iter_mut()
            .find(|t| &t.trade_id == trade_id)
        {
            trade.units -= units;
        }

        Ok(state.partial_close_pl)
    }

    async fn modify_trade(
        &self,
        trade_id: &TradeId,
        modification: TradeModification,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.modify_failures_remaining > 0 {
            state.modify_failures_remaining -= 1;
            return Err(BrokerError::Transport("scripted modify outage".to_string()));
        }

        if let Some(trade) = state
            .open_trades
            .iter_mut()
            .find(|t| &t.trade_id == trade_id)
        {
            if modification.stop_loss.is_some() {
                trade.stop_loss = modification.stop_loss;
            }
        }
        state.modifications.push((trade_id.clone(), modification));

        Ok(())
    }

    async fn get_price(&self, _instrument: &str) -> Result<Quote> {
        let state = self.state.lock().unwrap();
        if state.quote_fails {
            return Err(BrokerError::Transport("scripted quote outage".to_string()));
        }

        state
            .quote
            .clone()
            .ok_or_else(|| BrokerError::Transport("no quote scripted".to_string()))
    }

    async fn get_closed_trade_detail(&self, trade_id: &TradeId) -> Result<ClosedTradeDetail> {
        self.state
            .lock()
            .unwrap()
            .closed_details
            .get(trade_id.as_str())
            .cloned()
            .ok_or_else(|| BrokerError::Rejected {
                reason: format!("no closed detail for {trade_id}"),
            })
    }

    async fn get_candles(
        &self,
        _instrument: &str,
        _timeframe: Timeframe,
        count: u32,
    ) -> Result<Vec<Candle>> {
        let state = self.state.lock().unwrap();
        let candles = &state.candles;
        let skip = candles.len().saturating_sub(count as usize);

        Ok(candles[skip..].to_vec())
    }

    async fn get_account_balance(&self) -> Result<f64> {
        let state = self.state.lock().unwrap();
        if state.balance_fails {
            return Err(BrokerError::Transport("scripted balance outage".to_string()));
        }

        Ok(state.balance)
    }
}

/// Records every delivered event.
#[derive(Default)]
pub(crate) struct MockNotifier {
    events: Mutex<Vec<NotifyEvent>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotifyEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, event: &NotifyEvent) -> crate::notify::Result<()> {
        self.events.lock().unwrap().push(event.clone());

        Ok(())
    }
}

pub(crate) fn open_trade(trade_id: &str, instrument: &str, units: i64, price: f64) -> OpenTrade {
    OpenTrade {
        trade_id: TradeId::from(trade_id),
        instrument: instrument.to_string(),
        units,
        price,
        stop_loss: None,
        unrealized_pl: 0.0,
    }
}

pub(crate) fn quote(bid: f64, ask: f64) -> Quote {
    Quote {
        bid,
        ask,
        mid: (bid + ask) / 2.0,
    }
}

pub(crate) fn candle_at(time: DateTime<Utc>, close: f64, complete: bool) -> Candle {
    Candle {
        time,
        open: close,
        high: close,
        low: close,
        close,
        volume: 100,
        complete,
    }
}

/// `count` complete candles closing at `close`, one per timeframe step,
/// ending shortly before now.
pub(crate) fn complete_candles(count: usize, close: f64, timeframe: Timeframe) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| {
            let time = start + Duration::seconds(i as i64 * timeframe.as_seconds() as i64);
            candle_at(time, close, true)
        })
        .collect()
}
