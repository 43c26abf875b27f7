//! Offline replay of historical bars through a signal engine.
//!
//! Bars from every symbol are merged into one timeline. Each timestamp's
//! slice first marks the ledger, then goes to [`SignalEngine::on_data`];
//! the first timestamp of each calendar date also triggers
//! [`SignalEngine::on_schedule`] after it. Signals are applied to the
//! ledger as they are emitted, so the engine sees its own earlier decisions
//! on the next call. There are no fills, cash or fees.

use crate::domain::engine::SignalEngine;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::Signal;
use crate::ports::holdings_port::LedgerPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct ReplayResult {
    pub signals: Vec<Signal>,
    /// Timestamps handed to `on_data`.
    pub slices: usize,
    /// Calendar dates handed to `on_schedule`.
    pub schedules: usize,
}

/// Bars of every symbol keyed by timestamp, in time order.
pub fn group_by_time(bars_by_symbol: &BTreeMap<String, Vec<OhlcvBar>>) -> BTreeMap<NaiveDateTime, Vec<OhlcvBar>> {
    let mut slices: BTreeMap<NaiveDateTime, Vec<OhlcvBar>> = BTreeMap::new();
    for bars in bars_by_symbol.values() {
        for bar in bars {
            slices.entry(bar.time).or_default().push(bar.clone());
        }
    }
    slices
}

fn record<L: LedgerPort>(engine: &str, emitted: Vec<Signal>, ledger: &mut L, out: &mut Vec<Signal>) {
    for signal in emitted {
        debug!(
            engine,
            time = %signal.time,
            symbol = %signal.symbol,
            action = %signal.action,
            size = signal.size,
            reason = %signal.reason,
            "signal"
        );
        ledger.apply(&signal);
        out.push(signal);
    }
}

pub fn replay<L: LedgerPort>(
    engine: &mut dyn SignalEngine,
    bars_by_symbol: &BTreeMap<String, Vec<OhlcvBar>>,
    ledger: &mut L,
) -> ReplayResult {
    let name = engine.name();
    let mut result = ReplayResult::default();
    let mut current_date: Option<NaiveDate> = None;

    for (time, slice) in group_by_time(bars_by_symbol) {
        ledger.mark(&slice);
        let emitted = engine.on_data(time, &slice, &*ledger);
        record(name, emitted, ledger, &mut result.signals);
        result.slices += 1;

        if current_date != Some(time.date()) {
            current_date = Some(time.date());
            let emitted = engine.on_schedule(time, &*ledger);
            record(name, emitted, ledger, &mut result.signals);
            result.schedules += 1;
        }
    }

    info!(
        engine = name,
        slices = result.slices,
        days = result.schedules,
        signals = result.signals.len(),
        "replay complete"
    );
    result
}
