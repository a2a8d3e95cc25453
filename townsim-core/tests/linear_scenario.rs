//! End-to-end runs over the three-location line and the sample village.

use std::sync::Arc;
use townsim_core::testing::{sample, MockEnricher, StaticContent};
use townsim_core::{
    ActorId, ClockTime, Location, LocationId, SimulationConfig, SimulationContext,
    SimulationSession,
};

fn t(s: &str) -> ClockTime {
    s.parse().unwrap()
}

fn loc(id: &str) -> LocationId {
    LocationId::from(id)
}

#[tokio::test]
async fn test_walker_crosses_the_line_with_observer_in_the_middle() {
    let mut session = SimulationSession::new(
        SimulationConfig::new(),
        Arc::new(MockEnricher::new()),
        Arc::new(StaticContent::linear()),
    )
    .with_clock(t("18:00"));
    session.start(None).await.unwrap();

    let walker = ActorId::from("walker");
    let lane = loc("b");
    let mut positions = Vec::new();
    let mut narration = Vec::new();

    for _ in 0..3 {
        let report = session.player_action(&lane).await.unwrap();
        narration.push(report.narration);
        positions.push(
            session
                .context()
                .actor(&walker)
                .unwrap()
                .current_location
                .to_string(),
        );
    }

    assert_eq!(positions, vec!["a", "b", "c"]);
    assert!(narration[0].is_empty());
    assert_eq!(
        narration[1],
        vec!["Wren arrives from Square, on the way to ring the mill bell."]
    );
    assert_eq!(
        narration[2],
        vec!["Wren heads east toward Mill, off to ring the mill bell."]
    );
    assert_eq!(session.clock(), t("18:15"));
}

#[test]
fn test_observer_at_far_end_hears_only_the_arrival() {
    let mut ctx = sample::linear_context();
    let mill = loc("c");

    let heard: Vec<String> = ["18:00", "18:05", "18:10"]
        .into_iter()
        .flat_map(|time| ctx.tick(t(time), &mill).narration)
        .collect();

    assert_eq!(
        heard,
        vec!["Wren arrives from Lane, on the way to ring the mill bell."]
    );
}

#[test]
fn test_walker_settles_at_target() {
    let mut ctx = sample::linear_context();
    let nowhere = loc("elsewhere");
    for time in ["18:05", "18:10", "18:15", "18:20"] {
        ctx.tick(t(time), &nowhere);
    }
    let report = ctx.tick(t("18:25"), &nowhere);

    assert!(report.moves.is_empty());
    assert_eq!(
        ctx.actor(&ActorId::from("walker")).unwrap().current_location,
        loc("c")
    );
}

#[test]
fn test_add_event_redirects_walker_mid_route() {
    let mut ctx = sample::linear_context();
    let walker = ActorId::from("walker");
    let nowhere = loc("elsewhere");

    ctx.tick(t("18:05"), &nowhere);
    assert_eq!(ctx.actor(&walker).unwrap().current_location, loc("b"));

    assert!(ctx.add_event(&walker, t("18:10"), "fetch the broom", loc("a")));
    let report = ctx.tick(t("18:10"), &loc("a"));

    assert_eq!(ctx.actor(&walker).unwrap().current_location, loc("a"));
    assert_eq!(
        report.narration,
        vec!["Wren arrives from Lane, on the way to fetch the broom."]
    );
    assert!(!ctx.add_event(&ActorId::from("ghost"), t("18:10"), "haunt", loc("a")));
}

#[test]
fn test_witnesses_remember_but_movers_do_not_remember_themselves() {
    let mut ctx = sample::linear_context();
    let nowhere = loc("elsewhere");
    for time in ["18:05", "18:10"] {
        ctx.tick(t(time), &nowhere);
    }

    let miller = ctx.memory().memories(&ActorId::from("sitter"));
    assert_eq!(miller.len(), 1);
    assert_eq!(miller[0].witnessed_actor_id, ActorId::from("walker"));
    assert_eq!(miller[0].time, t("18:10"));
    assert!(ctx.memory().memories(&ActorId::from("walker")).is_empty());
}

#[test]
fn test_village_paths_are_shortest() {
    let ctx = sample::village_context();
    let graph = ctx.graph();

    assert_eq!(
        graph.find_path(&loc("bakery"), &loc("mill")),
        vec![loc("square"), loc("lane"), loc("mill")]
    );
    assert_eq!(graph.travel_time(&loc("bakery"), &loc("mill")), 15);
    assert_eq!(
        graph.find_path(&loc("well"), &loc("tavern")),
        vec![loc("square"), loc("lane"), loc("tavern")]
    );
    assert!(graph.find_path(&loc("well"), &loc("well")).is_empty());
    assert!(graph.find_path(&loc("well"), &loc("moon")).is_empty());
    assert!(graph.exits(&loc("moon")).is_empty());

    let story = sample::village_story();
    let hops = hop_distances(&story.locations);
    let ids: Vec<&LocationId> = story.locations.iter().map(|l| &l.id).collect();
    for (i, from) in ids.iter().enumerate() {
        for (j, to) in ids.iter().enumerate() {
            let path = graph.find_path(from, to);
            assert_eq!(graph.next_step(from, to), path.first().cloned());
            assert_eq!(Some(path.len()), hops[i][j], "{from} -> {to}: {path:?}");

            let mut previous = *from;
            for hop in &path {
                assert!(graph.are_connected(previous, hop), "{previous} -> {hop}");
                previous = hop;
            }
        }
    }
}

/// All-pairs hop counts by Floyd-Warshall over the authored exits.
fn hop_distances(locations: &[Location]) -> Vec<Vec<Option<usize>>> {
    let n = locations.len();
    let index = |id: &LocationId| locations.iter().position(|l| &l.id == id);
    let mut dist = vec![vec![None; n]; n];
    for (i, location) in locations.iter().enumerate() {
        dist[i][i] = Some(0);
        for target in location.exits.values() {
            if let Some(j) = index(target).filter(|&j| j != i) {
                dist[i][j] = Some(1);
            }
        }
    }
    for k in 0..n {
        for i in 0..n {
            for j in 0..n {
                if let (Some(a), Some(b)) = (dist[i][k], dist[k][j]) {
                    if dist[i][j].map_or(true, |d| a + b < d) {
                        dist[i][j] = Some(a + b);
                    }
                }
            }
        }
    }
    dist
}

#[test]
fn test_village_morning_moves_everyone_one_hop_at_a_time() {
    let mut ctx = sample::village_context();
    let square = loc("square");
    let mut now = t("07:55");

    for _ in 0..12 {
        let before: Vec<(ActorId, LocationId)> = ctx
            .actors()
            .map(|a| (a.id.clone(), a.current_location.clone()))
            .collect();
        let report = ctx.tick(now, &square);

        for step in &report.moves {
            let (_, from) = before.iter().find(|(id, _)| *id == step.actor_id).unwrap();
            assert_eq!(*from, step.from);
            assert!(ctx.graph().are_connected(&step.from, &step.to));
        }
        now = now.advanced_by(5);
    }

    assert_eq!(
        ctx.actor(&ActorId::from("mara")).unwrap().current_location,
        square
    );
}

#[test]
fn test_contexts_do_not_share_actors() {
    let mut first = SimulationContext::offline(SimulationConfig::new());
    first.load_story(&sample::linear_story());
    first.load_roster(sample::linear_roster());
    first.load_schedules(sample::linear_schedules());
    let second = sample::linear_context();

    first.tick(t("18:05"), &loc("a"));

    let walker = ActorId::from("walker");
    assert_eq!(first.actor(&walker).unwrap().current_location, loc("b"));
    assert_eq!(second.actor(&walker).unwrap().current_location, loc("a"));
}
