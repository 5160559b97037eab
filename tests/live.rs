//! Live-polling scenarios: the append-once / revise-many protocol between
//! a quote collaborator and per-instrument bar series, with derived
//! filters riding the revisions.

use barflow::{
    Aggregator, Bar, DerivedFilter, FeedError, InsufficientData, Instrument, LiveFeed, Period,
    ScriptedQuotes, Window,
};

fn bar(ts: i64, period: Period, close: f64, volume: f64) -> Bar {
    Bar::new(ts, period, close, close + 0.5, close - 0.5, close, volume).expect("valid test bar")
}

struct Mean;

impl Aggregator<f64> for Mean {
    type Output = f64;

    fn calculate(&self, window: &Window<f64>) -> Result<f64, InsufficientData> {
        window.require_full()?;
        Ok(window.iter().sum::<f64>() / window.len() as f64)
    }
}

// ---------------------------------------------------------------------------
// A full live session: open, revise, roll over, revise, shutdown
// ---------------------------------------------------------------------------
#[test]
fn live_session_with_derived_mean_over_closes() {
    let p = Period::FiveMinute;
    let mut script = ScriptedQuotes::new();
    script.push("BTCUSDT", p, Some(bar(300, p, 100.0, 10.0)), false);
    script.push("BTCUSDT", p, Some(bar(300, p, 101.0, 12.0)), true);
    script.push("BTCUSDT", p, Some(bar(600, p, 102.0, 5.0)), false);
    script.push("BTCUSDT", p, Some(bar(600, p, 103.0, 9.0)), true);
    script.push("BTCUSDT", p, None, false);

    let mut feed = LiveFeed::new(script);
    feed.add_instrument(Instrument::new("BTCUSDT", &[p], 32));
    let mean = DerivedFilter::attach(
        "BTCUSDT.mean2",
        feed.instrument_mut("BTCUSDT")
            .unwrap()
            .series_mut(p)
            .unwrap()
            .close_series_mut(),
        2,
        Mean,
        32,
    );

    // Four polls with data, one without.
    for expected in [true, true, true, true, false] {
        assert_eq!(feed.step().unwrap(), expected);
    }

    let output = mean.output();
    {
        let output = output.borrow();
        // The first period committed at close 101; the second is open at
        // 103, so the open mean is (101 + 103) / 2.
        assert_eq!(output.open_point().and_then(|pt| pt.value), Some(102.0));
        assert_eq!(output.len(), 1);
        assert_eq!(output.get(-1).unwrap(), &None);
    }

    feed.finalize();
    mean.finalize();
    {
        let output = output.borrow();
        assert_eq!(output.len(), 2);
        assert_eq!(output.get(-1).unwrap(), &Some(102.0));
    }

    let inst = feed.instrument("BTCUSDT").unwrap();
    let bars = inst.series(p).unwrap().bars();
    assert_eq!(bars.len(), 2);
    assert_eq!(bars.get(0).map(|b| b.close).unwrap(), 101.0);
    assert_eq!(bars.get(1).map(|b| b.close).unwrap(), 103.0);
    assert_eq!(inst.last_price(), Some(103.0));
}

// ---------------------------------------------------------------------------
// Revisions keep every child series in lockstep
// ---------------------------------------------------------------------------
#[test]
fn children_absorb_unbounded_revisions() {
    let p = Period::Minute;
    let mut feed = LiveFeed::new(ScriptedQuotes::new());
    feed.add_instrument(Instrument::new("ETHUSDT", &[p], 8));

    // Drive the instrument directly: one open bar, many quote ticks.
    let inst = feed.instrument_mut("ETHUSDT").unwrap();
    inst.append(bar(60, p, 100.0, 1.0)).unwrap();
    for i in 1..=50 {
        inst.revise(bar(60, p, 100.0 + i as f64 * 0.1, 1.0 + i as f64))
            .unwrap();
    }

    let series = inst.series(p).unwrap();
    assert_eq!(series.len(), 0);
    assert_eq!(series.bars().open_point().map(|pt| pt.value.close), Some(105.0));
    assert_eq!(series.close_series().open_point().map(|pt| pt.value), Some(105.0));
    assert_eq!(series.volume_series().open_point().map(|pt| pt.value), Some(51.0));
}

// ---------------------------------------------------------------------------
// Protocol violations and benign repeats
// ---------------------------------------------------------------------------
#[test]
fn changed_bar_without_revision_flag_is_a_protocol_error() {
    let p = Period::FiveMinute;
    let mut script = ScriptedQuotes::new();
    script.push("BTCUSDT", p, Some(bar(300, p, 100.0, 1.0)), false);
    script.push("BTCUSDT", p, Some(bar(300, p, 100.0, 1.0)), false);
    script.push("BTCUSDT", p, Some(bar(300, p, 99.0, 1.0)), false);

    let mut feed = LiveFeed::new(script);
    feed.add_instrument(Instrument::new("BTCUSDT", &[p], 8));

    assert!(feed.step().unwrap());
    // Identical repeat: benign, nothing applied.
    assert!(!feed.step().unwrap());
    // Changed content, no flag: the collaborator broke the contract.
    let err = feed.step().unwrap_err();
    assert!(matches!(err, FeedError::InconsistentRevision { ts: 300, .. }));
}

// ---------------------------------------------------------------------------
// Periods are independent streams of the same instrument
// ---------------------------------------------------------------------------
#[test]
fn multi_period_instrument_keeps_streams_independent() {
    let m5 = Period::FiveMinute;
    let h1 = Period::Hour;
    let mut script = ScriptedQuotes::new();
    for i in 0..12 {
        let ts = 300 * (i + 1);
        script.push("BTCUSDT", m5, Some(bar(ts, m5, 100.0 + i as f64, 1.0)), false);
    }
    script.push("BTCUSDT", h1, Some(bar(3600, h1, 111.0, 12.0)), false);

    let mut feed = LiveFeed::new(script);
    feed.add_instrument(Instrument::new("BTCUSDT", &[m5, h1], 8));

    while feed.step().unwrap() {}
    feed.finalize();

    let inst = feed.instrument("BTCUSDT").unwrap();
    // Twelve 5-minute commits through a capacity-8 ring.
    assert_eq!(inst.series(m5).unwrap().len(), 8);
    assert_eq!(inst.series(h1).unwrap().len(), 1);
    assert_eq!(
        inst.series(h1).unwrap().bars().get(-1).map(|b| b.close).unwrap(),
        111.0
    );
}
