use partyrace::core::config::{DurationBucket, RaceConfig};
use partyrace::core::race::{RaceEngine, RaceStatus, WinSelection};
use partyrace::interfaces::presentation::RaceSnapshot;
use proptest::prelude::*;

const TICK_MS: f64 = 16.0;

fn ready_engine(names: &[&str], bucket: DurationBucket, seed: u64) -> RaceEngine {
    let mut engine = RaceEngine::with_seed(RaceConfig::default(), seed);
    for name in names {
        engine.register_entrant(name).unwrap();
    }
    engine.choose_duration(bucket.secs()).unwrap();
    engine
}

/// Runs the race to the end and hands every snapshot to `check`.
fn run<F: FnMut(&RaceSnapshot)>(engine: &mut RaceEngine, mut check: F) {
    engine.start_race(0.0).unwrap();
    let mut now = 0.0;
    while engine.is_running() {
        now += TICK_MS;
        let report = engine.tick(now).unwrap();
        check(&report.snapshot);
        assert!(now < 2.0 * engine.config().duration_ms, "race never ended");
    }
}

#[test]
fn every_bucket_ends_on_time() {
    for bucket in DurationBucket::ALL.iter() {
        let mut engine = ready_engine(&["A", "B", "C", "D"], *bucket, 11);
        engine.complete_setup().unwrap();
        run(&mut engine, |_| ());

        let result = engine.result().unwrap();
        assert_eq!(engine.status(), RaceStatus::Finished);
        assert!(result.elapsed_ms <= bucket.secs() as f64 * 1000.0 + TICK_MS);
        assert_eq!(result.full_ranking.len(), 4);
        assert_eq!(result.winners.len(), 1);
        assert_eq!(result.winners[0].place, 4);
        assert_eq!(result.winners[0].rank_label, "last place");
    }
}

#[test]
fn multi_selection_picks_first_and_last() {
    let mut engine = ready_engine(&["A", "B", "C", "D"], DurationBucket::Short, 3);
    engine
        .choose_win_selection(WinSelection::Multi { ranks: vec![1, 4] })
        .unwrap();
    engine.complete_setup().unwrap();
    run(&mut engine, |_| ());

    let result = engine.result().unwrap();
    let first = result.full_ranking[0].racer_id;
    let last = result.full_ranking[3].racer_id;
    assert_eq!(result.winner_ids(), vec![first, last]);
}

#[test]
fn reset_allows_a_second_race() {
    let mut engine = ready_engine(&["A", "B"], DurationBucket::Short, 5);
    engine.complete_setup().unwrap();
    run(&mut engine, |_| ());
    let first_session = engine.session_id();

    engine.reset();
    engine.register_entrant("C").unwrap();
    engine.register_entrant("D").unwrap();
    engine.complete_setup().unwrap();

    let mut seen_session = None;
    run(&mut engine, |snapshot| seen_session = Some(snapshot.session_id));
    assert_ne!(seen_session, Some(first_session));
    assert_eq!(engine.result().unwrap().session_id, engine.session_id());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn progress_stays_non_negative_for_whole_races(seed in 0u64..1_000_000, field in 2usize..=8) {
        let names: Vec<String> = (0..field).map(|i| format!("P{}", i)).collect();
        let names: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let mut engine = ready_engine(&names, DurationBucket::Short, seed);
        engine.complete_setup().unwrap();

        let mut ok = true;
        run(&mut engine, |snapshot| {
            ok &= snapshot.racers.iter().all(|r| r.progress >= 0.0);
            ok &= snapshot.racers.len() == field;
        });
        prop_assert!(ok);

        let result = engine.result().unwrap();
        prop_assert_eq!(result.full_ranking.len(), field);
        prop_assert!(engine.racers().iter().all(|r| r.is_finished()));
    }
}
