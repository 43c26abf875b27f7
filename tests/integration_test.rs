//! Replays synthetic bar histories through the engines end to end.

mod common;

use alphalab::adapters::paper_ledger::PaperLedger;
use alphalab::cli::load_bars;
use alphalab::domain::engine::sma_crossover::{SmaConfig, SmaCrossoverEngine};
use alphalab::domain::engine::vol_term_structure::{TermStructureConfig, TermStructureEngine};
use alphalab::domain::engine::{build_engine, EngineKind, SignalEngine};
use alphalab::domain::error::AlphaLabError;
use alphalab::domain::replay::replay;
use alphalab::domain::signal::{SignalAction, ALL_SYMBOLS};
use alphalab::adapters::file_config_adapter::FileConfigAdapter;
use approx::assert_abs_diff_eq;
use common::*;

mod engines {
    use super::*;

    #[test]
    fn sma_crossover_buys_the_rally_and_exits_the_drop() {
        let mut engine = SmaCrossoverEngine::new(SmaConfig {
            fast_period: 5,
            slow_period: 15,
            ..SmaConfig::default()
        });
        let bars = by_symbol(vec![daily_bars("SPY", date(2024, 1, 2), &swing_closes())]);
        let mut ledger = PaperLedger::new();

        let result = replay(&mut engine, &bars, &mut ledger);

        let actions: Vec<SignalAction> = result.signals.iter().map(|s| s.action).collect();
        assert_eq!(actions, vec![SignalAction::SetWeight, SignalAction::Liquidate]);
        assert!(result.signals[0].time < result.signals[1].time);
        assert_eq!(ledger.holdings().count(), 0);
        assert_eq!(result.schedules, swing_closes().len());
    }

    #[test]
    fn term_structure_sizes_by_regime() {
        let days = 81;
        let spy: Vec<f64> = vec![400.0; days];
        let mut vxx: Vec<f64> = vec![20.0; days];
        vxx[days - 1] = 14.0;
        let vixm: Vec<f64> = (0..days)
            .map(|i| 20.0 + 0.2 * ((i as f64) * 0.5).sin())
            .collect();
        let start = date(2024, 1, 2);
        let bars = by_symbol(vec![
            daily_bars("SPY", start, &spy),
            daily_bars("VXX", start, &vxx),
            daily_bars("VIXM", start, &vixm),
        ]);

        let mut engine = TermStructureEngine::new(TermStructureConfig::default());
        let mut ledger = PaperLedger::new();
        let result = replay(&mut engine, &bars, &mut ledger);

        let first = result.signals.first().unwrap();
        assert_eq!(first.action, SignalAction::SetWeight);
        assert_abs_diff_eq!(first.size, 0.6);

        let last = result.signals.last().unwrap();
        assert_eq!(last.time, bars["SPY"].last().unwrap().time);
        assert_abs_diff_eq!(last.size, 0.95);
        assert_abs_diff_eq!(ledger.gross_exposure(), 0.95);
    }

    #[test]
    fn crash_in_the_traded_symbol_trips_the_drawdown_stop() {
        let days = 82;
        let mut spy: Vec<f64> = vec![400.0; days];
        // 30% gap on the last day: equity 1 - 0.6 * 0.3 = 0.82
        spy[days - 1] = 280.0;
        let vxx: Vec<f64> = vec![20.0; days];
        let vixm: Vec<f64> = (0..days)
            .map(|i| 20.0 + 0.2 * ((i as f64) * 0.5).sin())
            .collect();
        let start = date(2024, 1, 2);
        let bars = by_symbol(vec![
            daily_bars("SPY", start, &spy),
            daily_bars("VXX", start, &vxx),
            daily_bars("VIXM", start, &vixm),
        ]);

        let mut engine = TermStructureEngine::new(TermStructureConfig::default());
        let mut ledger = PaperLedger::new();
        let result = replay(&mut engine, &bars, &mut ledger);

        let crash = bars["SPY"][days - 1].time;
        let stops: Vec<_> = result
            .signals
            .iter()
            .filter(|s| s.action == SignalAction::LiquidateAll)
            .collect();
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].time, crash);
        assert!(stops[0].reason.starts_with("drawdown"));
        assert_abs_diff_eq!(ledger.equity(), 0.82, epsilon = 1e-9);
    }

    #[test]
    fn every_engine_replays_noisy_history() {
        let config = FileConfigAdapter::from_string("").unwrap();
        for kind in EngineKind::ALL {
            let mut engine = build_engine(kind, &config);
            let symbols = engine.symbols();
            let series = symbols
                .iter()
                .enumerate()
                .map(|(i, s)| hourly_walk(s, date(2024, 1, 2), 60, 7 + i as u64, 50.0 + 10.0 * i as f64))
                .collect();
            let bars = by_symbol(series);
            let mut ledger = PaperLedger::new();

            let result = replay(engine.as_mut(), &bars, &mut ledger);

            assert_eq!(result.slices, 60 * 7, "{kind}");
            assert_eq!(result.schedules, 60, "{kind}");
            assert!(result.signals.windows(2).all(|w| w[0].time <= w[1].time), "{kind}");
            for signal in &result.signals {
                assert!(signal.size.is_finite(), "{kind}: {signal:?}");
                assert!(signal.size.abs() <= 1.0, "{kind}: {signal:?}");
                match signal.action {
                    SignalAction::LiquidateAll => assert_eq!(signal.symbol, ALL_SYMBOLS),
                    SignalAction::Reduce => assert!(signal.size > 0.0, "{kind}: {signal:?}"),
                    _ => assert!(symbols.contains(&signal.symbol), "{kind}: {signal:?}"),
                }
            }
            assert!(ledger.gross_exposure().is_finite());
            assert!(ledger.equity() >= 0.0, "{kind}");
            let _ = engine.summary();
        }
    }
}

mod loading {
    use super::*;

    #[test]
    fn load_bars_filters_dates_and_skips_failures() {
        let start = date(2024, 1, 2);
        let port = MockDataPort::new()
            .with_bars("SPY", daily_bars("SPY", start, &[1.0, 2.0, 3.0, 4.0]))
            .with_error("QQQ", "corrupt file");
        let symbols = vec!["SPY".to_string(), "QQQ".to_string(), "IWM".to_string()];

        let bars = load_bars(&port, &symbols, Some(date(2024, 1, 3)), Some(date(2024, 1, 4))).unwrap();

        assert_eq!(bars.len(), 1);
        let closes: Vec<f64> = bars["SPY"].iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![2.0, 3.0]);
    }

    #[test]
    fn load_bars_fails_without_any_data() {
        let port = MockDataPort::new().with_bars("SPY", Vec::new());
        let err = load_bars(&port, &["SPY".to_string()], None, None).unwrap_err();
        assert!(matches!(err, AlphaLabError::NoData { .. }));
    }

    #[test]
    fn replayed_engine_sees_all_loaded_symbols() {
        let start = date(2024, 1, 2);
        let port = MockDataPort::new()
            .with_bars("SPY", daily_bars("SPY", start, &swing_closes()));
        let config = FileConfigAdapter::from_string("[sma_crossover]\nfast_period = 5\nslow_period = 15\n").unwrap();
        let mut engine = build_engine(EngineKind::SmaCrossover, &config);
        let bars = load_bars(&port, &engine.symbols(), None, None).unwrap();

        let result = replay(engine.as_mut(), &bars, &mut PaperLedger::new());
        assert_eq!(result.signals.len(), 2);
        assert_eq!(engine.name(), "sma_crossover");
    }
}
