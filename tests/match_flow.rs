//! End-to-end match flow through the public stepping API

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};
use uuid::Uuid;

use duel_sim::config::Tuning;
use duel_sim::game::actor::{ActorId, StateTag};
use duel_sim::game::input::Edge;
use duel_sim::game::r#match::{RoundEndReason, RoundOutcome};
use duel_sim::game::{Match, MatchPhase};
use duel_sim::host::protocol::{Command, SimEvent};

const TABLE: &str = include_str!("../data/tuning.json");

fn tuning_with(edit: impl FnOnce(&mut Value)) -> Arc<Tuning> {
    let mut value: Value = serde_json::from_str(TABLE).expect("table json");
    edit(&mut value);
    Arc::new(Tuning::from_json(&value.to_string()).expect("valid tuning"))
}

/// Boss only ever blocks, fighters start in range, short rounds
fn sparring(value: &mut Value) {
    value["ai"]["weights"] = json!({ "attack": 0, "special": 0, "block": 1 });
    value["stage"]["player_spawn_x"] = json!(300.0);
    value["stage"]["boss_spawn_x"] = json!(360.0);
    value["round"]["seconds"] = json!(2);
}

fn run_until(m: &mut Match, phase: MatchPhase, max_ticks: u64) -> Vec<SimEvent> {
    let mut events = Vec::new();
    for _ in 0..max_ticks {
        events.extend(m.step());
        if m.phase() == phase {
            return events;
        }
    }
    panic!("never reached {phase:?}, stuck in {:?}", m.phase());
}

fn into_battle(m: &mut Match) {
    m.command(Command::Start);
    m.command(Command::Start);
    run_until(m, MatchPhase::Battle, 1_000);
}

fn round_end(events: &[SimEvent]) -> Option<(RoundOutcome, RoundEndReason)> {
    events.iter().find_map(|e| match e {
        SimEvent::RoundEnded {
            outcome, reason, ..
        } => Some((*outcome, *reason)),
        _ => None,
    })
}

#[test]
fn time_up_goes_to_the_healthier_fighter() {
    let mut m = Match::new(Uuid::new_v4(), 1, tuning_with(sparring)).expect("match");
    into_battle(&mut m);

    m.handle_key("KeyJ", Edge::Down);
    let events = run_until(&mut m, MatchPhase::Result, 500);

    assert_eq!(
        round_end(&events),
        Some((RoundOutcome::Win, RoundEndReason::TimeUp))
    );
    assert_eq!(m.roster().get(ActorId::Player).health, 100.0);
    assert_eq!(m.roster().get(ActorId::Boss).health, 95.0);
    assert_eq!(m.roster().get(ActorId::Player).state, StateTag::Victory);
    assert_eq!(m.roster().get(ActorId::Boss).state, StateTag::Death);

    // One-round level cleared: on to the next boss
    run_until(&mut m, MatchPhase::Setup, 500);
    assert_eq!(m.state().level, 1);
    assert_eq!(m.state().round, 1);
    assert_eq!(m.roster().get(ActorId::Boss).health, 100.0);
}

#[test]
fn knockout_gives_victory_to_the_survivor() {
    let tuning = tuning_with(|v| {
        sparring(v);
        v["actions"]["light_attack"]["damage"] = json!(100.0);
    });
    let mut m = Match::new(Uuid::new_v4(), 5, tuning).expect("match");
    into_battle(&mut m);

    m.handle_key("KeyJ", Edge::Down);
    let events = run_until(&mut m, MatchPhase::Result, 60);

    assert_eq!(
        round_end(&events),
        Some((RoundOutcome::Win, RoundEndReason::KnockOut))
    );
    assert_eq!(m.roster().get(ActorId::Boss).health, 0.0);
    assert_eq!(m.roster().get(ActorId::Boss).state, StateTag::Death);
    assert_eq!(m.roster().get(ActorId::Player).state, StateTag::Victory);
    assert_eq!(m.roster().get(ActorId::Player).health, 100.0);
}

#[test]
fn double_knockout_is_a_loss() {
    let tuning = tuning_with(|v| {
        sparring(v);
        v["actions"]["light_attack"]["damage"] = json!(100.0);
        v["ai"]["weights"] = json!({ "attack": 1, "special": 0, "block": 0 });
        v["ai"]["attacks"] = json!(["light_attack"]);
    });
    let mut m = Match::new(Uuid::new_v4(), 6, tuning).expect("match");
    into_battle(&mut m);

    // The boss swings on its first battle tick too
    m.handle_key("KeyJ", Edge::Down);
    let events = run_until(&mut m, MatchPhase::Result, 60);

    let hits = events
        .iter()
        .filter(|e| matches!(e, SimEvent::Hit { .. }))
        .count();
    assert_eq!(hits, 2);
    assert_eq!(
        round_end(&events),
        Some((RoundOutcome::Lose, RoundEndReason::KnockOut))
    );
    assert_eq!(m.roster().get(ActorId::Player).state, StateTag::Death);
    assert_eq!(m.roster().get(ActorId::Boss).state, StateTag::Death);
}

#[test]
fn tie_on_time_up_is_a_loss_and_the_round_replays() {
    let mut m = Match::new(Uuid::new_v4(), 2, tuning_with(sparring)).expect("match");
    into_battle(&mut m);

    let events = run_until(&mut m, MatchPhase::Result, 500);
    assert_eq!(
        round_end(&events),
        Some((RoundOutcome::Lose, RoundEndReason::TimeUp))
    );
    assert_eq!(m.roster().get(ActorId::Player).state, StateTag::Death);
    assert_eq!(m.roster().get(ActorId::Boss).state, StateTag::Victory);

    run_until(&mut m, MatchPhase::Setup, 500);
    assert_eq!(m.state().level, 0);
    assert_eq!(m.state().round, 1);
    assert_eq!(m.state().rounds_won, 0);
    assert_eq!(m.roster().get(ActorId::Player).state, StateTag::Idle);
}

#[test]
fn clearing_the_last_level_completes_the_match() {
    let tuning = tuning_with(|v| {
        sparring(v);
        v["levels"] = json!([{ "boss": "ronin", "rounds": 1 }]);
    });
    let mut m = Match::new(Uuid::new_v4(), 3, tuning).expect("match");
    into_battle(&mut m);

    m.handle_key("KeyJ", Edge::Down);
    run_until(&mut m, MatchPhase::Ending, 1_000);
    let events = run_until(&mut m, MatchPhase::Complete, 1_000);
    assert!(events
        .iter()
        .any(|e| matches!(e, SimEvent::MatchComplete { levels_cleared: 1 })));

    // Nothing moves after completion
    let tick = m.now();
    assert!(m.step().is_empty());
    assert_eq!(m.now(), tick + 1);
    assert_eq!(m.phase(), MatchPhase::Complete);
}

#[test]
fn round_end_stops_further_hits() {
    let mut m = Match::new(Uuid::new_v4(), 4, tuning_with(sparring)).expect("match");
    into_battle(&mut m);
    m.handle_key("KeyJ", Edge::Down);
    run_until(&mut m, MatchPhase::Result, 500);

    // Mash during the result screen
    for i in 0..100 {
        let edge = if i % 2 == 0 { Edge::Up } else { Edge::Down };
        m.handle_key("KeyK", edge);
        let events = m.step();
        assert!(!events.iter().any(|e| matches!(e, SimEvent::Hit { .. })));
    }
}

/// Random key mashing against the real AI never breaks the resource
/// bounds, and identical seeds and input give identical event streams
fn mash(seed: u64, ticks: u64) -> Vec<SimEvent> {
    let tuning = Arc::new(Tuning::builtin().expect("builtin tuning"));
    let mut m = Match::new(Uuid::nil(), seed, tuning).expect("match");
    let mut keys = ChaCha8Rng::seed_from_u64(seed ^ 0x5eed);
    let codes = ["ArrowLeft", "ArrowRight", "ArrowUp", "ArrowDown", "KeyJ", "KeyK", "KeyL", "KeyI"];

    let mut events = m.command(Command::Start);
    events.extend(m.command(Command::Start));
    for _ in 0..ticks {
        if keys.gen_bool(0.3) {
            let code = codes[keys.gen_range(0..codes.len())];
            let edge = if keys.gen_bool(0.5) { Edge::Down } else { Edge::Up };
            m.handle_key(code, edge);
        }
        events.extend(m.step());

        for actor in m.roster().iter() {
            assert!((0.0..=actor.max_health).contains(&actor.health));
            assert!((0.0..=actor.max_energy).contains(&actor.energy));
        }
    }
    events
}

#[test]
fn resources_stay_in_range_under_mashing() {
    let events = mash(11, 6_000);
    assert!(events.iter().any(|e| matches!(e, SimEvent::Hit { .. })));
}

#[test]
fn same_seed_same_match() {
    assert_eq!(mash(21, 3_000), mash(21, 3_000));
}
