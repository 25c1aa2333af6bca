//! Property tests over random-walk series.

use chartpat::indicators::last_atr;
use chartpat::prelude::*;
use proptest::prelude::*;

/// (return, upper wick, lower wick, volume) per bar
type Step = (f64, f64, f64, f64);

fn walk(steps: &[Step]) -> Vec<Bar> {
    let mut price = 100.0;
    steps
        .iter()
        .enumerate()
        .map(|(i, &(ret, up, down, volume))| {
            let open = price;
            price *= 1.0 + ret;
            let high = open.max(price) * (1.0 + up);
            let low = open.min(price) * (1.0 - down);
            Bar::new(i as i64, open, high, low, price, volume)
        })
        .collect()
}

fn steps(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        (-0.03f64..0.03, 0.0f64..0.01, 0.0f64..0.01, 100.0f64..10_000.0),
        len,
    )
}

fn engine() -> PatternEngine {
    EngineBuilder::new()
        .context_provider(DefaultContextProvider {
            extrema_window: Period::new(5).unwrap(),
            ..DefaultContextProvider::default()
        })
        .with_all_defaults()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn confidence_stays_in_unit_interval(s in steps(50..200)) {
        let bars = walk(&s);
        for p in engine().analyze(&bars) {
            prop_assert!((0.0..=1.0).contains(&p.confidence), "{:?}", p);
        }
    }

    #[test]
    fn risk_reward_non_negative(s in steps(50..200)) {
        let bars = walk(&s);
        for p in engine().analyze(&bars) {
            if let Some(levels) = p.levels {
                prop_assert!(levels.risk_reward_ratio >= 0.0);
                if levels.stop_loss == levels.entry_price {
                    prop_assert_eq!(levels.risk_reward_ratio, 0.0);
                }
            }
        }
    }

    #[test]
    fn analysis_is_deterministic(s in steps(50..150)) {
        let bars = walk(&s);
        let engine = engine();
        prop_assert_eq!(engine.analyze(&bars), engine.analyze(&bars));
    }

    #[test]
    fn retest_is_idempotent(s in steps(50..150)) {
        let bars = walk(&s);
        let tracker = RetestTracker::default();
        for p in engine().analyze(&bars) {
            let mut again = p.clone();
            tracker.check(&mut again, &bars);
            prop_assert_eq!(&again, &p);
        }
    }

    #[test]
    fn validated_levels_keep_min_distance(
        s in steps(20..80),
        entry_off in -0.05f64..0.05,
        tp_off in -0.05f64..0.05,
        sl_off in -0.05f64..0.05,
        bullish in any::<bool>(),
        type_idx in 0usize..12,
    ) {
        let bars = walk(&s);
        let last = bars.last().map(|b| b.close).unwrap();
        let validator = PriceLevelValidator::default();
        let direction = if bullish { Direction::Bullish } else { Direction::Bearish };
        let entry = last * (1.0 + entry_off);

        let (e, tp, sl) = validator.validate(
            &bars,
            entry,
            last * (1.0 + tp_off),
            last * (1.0 + sl_off),
            PatternType::ALL[type_idx],
            direction,
        );

        prop_assert_eq!(e, entry);
        let atr = last_atr(&bars, 14).unwrap();
        let min = 0.5 * atr - 1e-9;
        prop_assert!((tp - e).abs() >= min, "tp {} entry {} atr {}", tp, e, atr);
        prop_assert!((sl - e).abs() >= min, "sl {} entry {} atr {}", sl, e, atr);
        if atr > 0.0 {
            prop_assert!((sl - e) * direction.sign() < 0.0, "stop {} on reward side of {}", sl, e);
        }
    }

    #[test]
    fn unimodal_series_has_one_maximum(len in 10usize..200, window in 1usize..20, frac in 0.0f64..1.0) {
        prop_assume!(2 * window < len);
        let span = len - 2 * window;
        let peak = window + ((span as f64 * frac) as usize).min(span - 1);
        let values: Vec<f64> = (0..len)
            .map(|i| 1000.0 - (i as f64 - peak as f64).abs())
            .collect();

        let set = find_extrema(&values, window);
        prop_assert_eq!(set.maxima, vec![peak]);
        prop_assert!(set.minima.is_empty());
    }
}
