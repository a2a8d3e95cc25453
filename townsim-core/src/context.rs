//! The simulation context.
//!
//! One [`SimulationContext`] holds a complete, independent world: the map,
//! the timetables, the actors and their memories. Ticks take it by mutable
//! reference, so two ticks on the same world can never interleave.

use crate::clock::ClockTime;
use crate::config::SimulationConfig;
use crate::enrich::{Enricher, OfflineEnricher};
use crate::graph::WorldGraph;
use crate::memory::MemoryWitnessSystem;
use crate::movement::{MovementCoordinator, TickReport};
use crate::schedule::{ScheduleEntry, ScheduleStore};
use crate::world::{Actor, ActorId, Location, LocationId, Story};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::warn;

/// A self-contained simulated world.
pub struct SimulationContext {
    pub(crate) graph: WorldGraph,
    pub(crate) schedules: ScheduleStore,
    pub(crate) actors: BTreeMap<ActorId, Actor>,
    pub(crate) memory: MemoryWitnessSystem,
    config: SimulationConfig,
}

impl SimulationContext {
    pub fn new(config: SimulationConfig, enricher: Arc<dyn Enricher>) -> Self {
        Self {
            graph: WorldGraph::new().with_step_minutes(config.step_minutes),
            schedules: ScheduleStore::new().with_bucket_minutes(config.step_minutes),
            actors: BTreeMap::new(),
            memory: MemoryWitnessSystem::new(enricher, &config),
            config,
        }
    }

    /// A context whose dialogue always uses the deterministic fallbacks.
    pub fn offline(config: SimulationConfig) -> Self {
        Self::new(config, Arc::new(OfflineEnricher))
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Replace the map with the story's locations.
    pub fn load_story(&mut self, story: &Story) {
        self.load_locations(story.locations.clone());
    }

    /// Replace the map.
    pub fn load_locations(&mut self, locations: Vec<Location>) {
        self.graph.initialize(locations);
        for exit in self.graph.one_way_exits() {
            warn!(
                from = %exit.from,
                direction = %exit.direction,
                to = %exit.to,
                "exit has no way back"
            );
        }
    }

    /// Replace the roster. Memories of actors seen before are kept.
    pub fn load_roster(&mut self, actors: Vec<Actor>) {
        self.actors = actors
            .into_iter()
            .map(|actor| (actor.id.clone(), actor))
            .collect();

        for actor in self.actors.values() {
            if !self.graph.contains(&actor.current_location) {
                warn!(actor = %actor.id, location = %actor.current_location, "actor starts at an unknown location");
            }
        }
        self.memory.set_roster(self.actors.values());
    }

    /// Replace every timetable.
    pub fn load_schedules(&mut self, schedules: HashMap<ActorId, Vec<ScheduleEntry>>) {
        self.schedules.set_all(schedules);
    }

    /// Replace one actor's timetable.
    pub fn set_schedule(&mut self, actor_id: ActorId, entries: Vec<ScheduleEntry>) {
        self.schedules.set_schedule(actor_id, entries);
    }

    /// Inject a spontaneous event into an actor's timetable.
    pub fn add_event(
        &mut self,
        actor_id: &ActorId,
        time: ClockTime,
        action: impl Into<String>,
        location: LocationId,
    ) -> bool {
        self.schedules.add_event(actor_id, time, action, location)
    }

    // ========================================================================
    // Simulation
    // ========================================================================

    /// Advance the world to `now` as seen from `observer_location`.
    pub fn tick(&mut self, now: ClockTime, observer_location: &LocationId) -> TickReport {
        MovementCoordinator::run_tick(self, now, observer_location)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn graph(&self) -> &WorldGraph {
        &self.graph
    }

    pub fn schedules(&self) -> &ScheduleStore {
        &self.schedules
    }

    pub fn memory(&self) -> &MemoryWitnessSystem {
        &self.memory
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn actor(&self, id: &ActorId) -> Option<&Actor> {
        self.actors.get(id)
    }

    /// Actors currently at `location`, in id order.
    pub fn actors_at(&self, location: &LocationId) -> Vec<&Actor> {
        self.actors
            .values()
            .filter(|actor| actor.current_location == *location)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::EnrichmentKind;
    use crate::testing::{sample, MockEnricher};

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    #[test]
    fn test_actors_at() {
        let ctx = sample::linear_context();
        let at_c: Vec<_> = ctx
            .actors_at(&LocationId::from("c"))
            .into_iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(at_c, vec!["sitter"]);
        assert!(ctx.actors_at(&LocationId::from("b")).is_empty());
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut first = sample::linear_context();
        let second = sample::linear_context();
        let nowhere = LocationId::from("elsewhere");

        first.tick(t("18:05"), &nowhere);

        let walker = ActorId::from("walker");
        assert_eq!(first.actor(&walker).unwrap().current_location, LocationId::from("b"));
        assert_eq!(second.actor(&walker).unwrap().current_location, LocationId::from("a"));
    }

    #[test]
    fn test_add_event_redirects_actor() {
        let mut ctx = sample::linear_context();
        let sitter = ActorId::from("sitter");
        let nowhere = LocationId::from("elsewhere");

        assert!(ctx.tick(t("18:30"), &nowhere).moves.iter().all(|m| m.actor_id != sitter));

        assert!(ctx.add_event(&sitter, t("18:35"), "fetch water", LocationId::from("a")));
        let report = ctx.tick(t("18:35"), &nowhere);
        assert!(report.moves.iter().any(|m| m.actor_id == sitter && m.to == LocationId::from("b")));
    }

    #[test]
    fn test_step_minutes_flow_from_config() {
        let ctx = SimulationContext::offline(SimulationConfig::new().with_step_minutes(10));
        assert_eq!(ctx.config().step_minutes, 10);
    }

    #[test]
    fn test_load_roster_registers_profiles() {
        let ctx = sample::linear_context();
        let profile = ctx.memory().profile(&ActorId::from("walker")).unwrap();
        assert_eq!(profile.name, "Wren");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reloaded_roster_stops_enriching_departed_actors() {
        let enricher = Arc::new(MockEnricher::new());
        let mut ctx = SimulationContext::new(SimulationConfig::new(), enricher.clone());
        ctx.load_story(&sample::linear_story());
        ctx.load_roster(sample::linear_roster());
        ctx.load_schedules(sample::linear_schedules());
        let nowhere = LocationId::from("elsewhere");
        ctx.tick(t("18:05"), &nowhere);
        ctx.tick(t("18:10"), &nowhere);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        ctx.load_roster(vec![Actor::new("newcomer", "Nell", "a")]);
        let before = enricher.calls_of(EnrichmentKind::TalkPool);

        assert_eq!(ctx.memory().prepare_all_responses().await, 1);
        assert_eq!(enricher.calls_of(EnrichmentKind::TalkPool), before + 1);

        let sitter = ActorId::from("sitter");
        assert!(ctx.memory().profile(&sitter).is_none());
        assert_eq!(ctx.memory().memory_count(&sitter), 1);
        assert_eq!(
            ctx.memory().talk_response(&sitter).await,
            "sitter looks at you but says nothing."
        );
        assert_eq!(enricher.calls_of(EnrichmentKind::TalkPool), before + 1);
    }
}
