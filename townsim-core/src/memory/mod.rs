//! Witnessed-event memory and dialogue.
//!
//! Whenever an actor does something in front of other actors, each onlooker
//! gets a [`MemoryEntry`]. Flavor text is layered on top in the background:
//! a personalized reaction per entry and a pool of ready conversation lines
//! per actor. The simulation never waits for either.
//!
//! Background work is coalesced. Refill requests for an actor that already
//! has one running join it instead of starting a second, and each actor has
//! a single lane so its enrichment calls never overlap.

mod coalesce;

pub use coalesce::{Coalescer, SharedJob};

use crate::clock::ClockTime;
use crate::config::SimulationConfig;
use crate::enrich::prompts::{reaction_prompt, talk_pool_prompt};
use crate::enrich::{parse_lines, EnrichError, EnrichmentKind, EnrichmentRequest, Enricher};
use crate::world::{Actor, ActorId, LocationId};
pub(crate) use coalesce::lock;
use futures::future::{join_all, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Something one actor saw another actor do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub time: ClockTime,
    pub location_id: LocationId,
    pub location_name: String,
    pub witnessed_actor_id: ActorId,
    pub witnessed_actor_name: String,
    pub action: String,
    #[serde(default)]
    pub cached_reaction: Option<String>,
}

/// An action performed somewhere, to be recorded by everyone else present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessedAction {
    pub actor_id: ActorId,
    pub actor_name: String,
    pub action: String,
    pub location_id: LocationId,
    pub location_name: String,
    pub time: ClockTime,
}

/// Name and personality used to build prompts and fallback lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorProfile {
    pub name: String,
    pub personality: String,
}

/// Everything the memory system keeps per actor.
#[derive(Debug, Clone, Default)]
pub struct ActorMemory {
    /// Witnessed events, oldest first. Append-only.
    pub log: Vec<MemoryEntry>,
    /// Ready-made conversation lines, served front first.
    pub response_pool: VecDeque<String>,
    /// True while the pool holds lines from a completed refill.
    pub responses_ready: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    profiles: HashMap<ActorId, ActorProfile>,
    actors: HashMap<ActorId, ActorMemory>,
}

struct Inner {
    enricher: Arc<dyn Enricher>,
    state: Mutex<MemoryState>,
    refills: Coalescer<ActorId, bool>,
    reactions: Coalescer<(ActorId, usize), Option<String>>,
    lanes: Mutex<HashMap<ActorId, Arc<tokio::sync::Mutex<()>>>>,
    talk_pool_size: usize,
    recent_memory_window: usize,
    timeout: Option<Duration>,
}

/// Records who saw what and serves dialogue built from it.
///
/// Cloning is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct MemoryWitnessSystem {
    inner: Arc<Inner>,
}

impl MemoryWitnessSystem {
    pub fn new(enricher: Arc<dyn Enricher>, config: &SimulationConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                enricher,
                state: Mutex::new(MemoryState::default()),
                refills: Coalescer::new(),
                reactions: Coalescer::new(),
                lanes: Mutex::new(HashMap::new()),
                talk_pool_size: config.talk_pool_size,
                recent_memory_window: config.recent_memory_window,
                timeout: config.enrichment_timeout,
            }),
        }
    }

    /// Make actors known so they can be prompted for and talked to.
    pub fn register_actors<'a>(&self, actors: impl IntoIterator<Item = &'a Actor>) {
        let mut state = lock(&self.inner.state);
        for actor in actors {
            state.profiles.insert(
                actor.id.clone(),
                ActorProfile {
                    name: actor.name.clone(),
                    personality: actor.personality.clone(),
                },
            );
            state.actors.entry(actor.id.clone()).or_default();
        }
    }

    /// Make `actors` the complete set of known actors.
    ///
    /// Actors missing from the new set lose their profile and any pooled
    /// lines, so they are no longer prompted for. Their memory logs stay.
    pub fn set_roster<'a>(&self, actors: impl IntoIterator<Item = &'a Actor>) {
        let actors: Vec<&Actor> = actors.into_iter().collect();
        {
            let mut state = lock(&self.inner.state);
            let MemoryState { profiles, actors: memories } = &mut *state;
            profiles.retain(|id, _| actors.iter().any(|a| &a.id == id));
            for (id, memory) in memories.iter_mut() {
                if !profiles.contains_key(id) {
                    memory.response_pool.clear();
                    memory.responses_ready = false;
                }
            }
        }
        self.register_actors(actors);
    }

    // ========================================================================
    // Witnessing
    // ========================================================================

    /// Record `action` in the memory of every other actor at its location.
    ///
    /// Returns the witnesses. Reactions and talk pool refills for them are
    /// started in the background on the current tokio runtime; without one
    /// only the memory entries are written.
    pub fn record_witnessed_event(
        &self,
        actors: &BTreeMap<ActorId, Actor>,
        action: &WitnessedAction,
    ) -> Vec<ActorId> {
        let witnesses: Vec<ActorId> = actors
            .values()
            .filter(|a| a.current_location == action.location_id && a.id != action.actor_id)
            .map(|a| a.id.clone())
            .collect();

        if witnesses.is_empty() {
            return witnesses;
        }

        let entry = MemoryEntry {
            time: action.time,
            location_id: action.location_id.clone(),
            location_name: action.location_name.clone(),
            witnessed_actor_id: action.actor_id.clone(),
            witnessed_actor_name: action.actor_name.clone(),
            action: action.action.clone(),
            cached_reaction: None,
        };

        let recorded: Vec<(ActorId, usize)> = {
            let mut state = lock(&self.inner.state);
            witnesses
                .iter()
                .map(|witness| {
                    let memory = state.actors.entry(witness.clone()).or_default();
                    memory.log.push(entry.clone());
                    (witness.clone(), memory.log.len() - 1)
                })
                .collect()
        };

        if tokio::runtime::Handle::try_current().is_err() {
            debug!("no async runtime; skipping enrichment for witnessed event");
            return witnesses;
        }

        for (witness, index) in recorded {
            self.start_reaction(&witness, index);
            self.start_refill(&witness);
        }
        witnesses
    }

    // ========================================================================
    // Dialogue
    // ========================================================================

    /// A line of conversation from `actor_id`. Never fails.
    ///
    /// Serves from the talk pool when it has lines, refilling it in the
    /// background once it runs dry. With an empty pool this waits for the
    /// refill already in flight, or starts one, and tries again once.
    pub async fn talk_response(&self, actor_id: &ActorId) -> String {
        if let Some(line) = self.pop_line(actor_id) {
            return line;
        }

        if self.profile(actor_id).is_some() {
            self.start_refill(actor_id).await;
            if let Some(line) = self.pop_line(actor_id) {
                return line;
            }
        }

        self.silent_line(actor_id)
    }

    /// What `actor_id` has to say about the memory at `entry_index`.
    ///
    /// Uses the cached reaction if there is one, otherwise generates and
    /// caches it. When generation fails the answer is a plain description of
    /// what was seen, and that is cached instead.
    pub async fn event_response(&self, actor_id: &ActorId, entry_index: usize) -> String {
        let Some(entry) = self.memory_entry(actor_id, entry_index) else {
            return self.silent_line(actor_id);
        };
        if let Some(reaction) = entry.cached_reaction.clone() {
            return reaction;
        }

        match self.start_reaction(actor_id, entry_index).await {
            Some(reaction) => reaction,
            None => {
                let fallback = self.fallback_reaction(actor_id, &entry);
                self.cache_fallback(actor_id, entry_index, &fallback);
                fallback
            }
        }
    }

    /// Start refilling every known actor's talk pool and wait for all of
    /// them. Returns how many pools were filled.
    pub async fn prepare_all_responses(&self) -> usize {
        let actor_ids: Vec<ActorId> = lock(&self.inner.state).profiles.keys().cloned().collect();
        let jobs = actor_ids.iter().map(|id| self.start_refill(id));
        join_all(jobs).await.into_iter().filter(|filled| *filled).count()
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Copy of an actor's memory log, oldest first.
    pub fn memories(&self, actor_id: &ActorId) -> Vec<MemoryEntry> {
        lock(&self.inner.state)
            .actors
            .get(actor_id)
            .map(|m| m.log.clone())
            .unwrap_or_default()
    }

    pub fn memory_entry(&self, actor_id: &ActorId, index: usize) -> Option<MemoryEntry> {
        lock(&self.inner.state)
            .actors
            .get(actor_id)?
            .log
            .get(index)
            .cloned()
    }

    pub fn memory_count(&self, actor_id: &ActorId) -> usize {
        lock(&self.inner.state)
            .actors
            .get(actor_id)
            .map_or(0, |m| m.log.len())
    }

    pub fn responses_ready(&self, actor_id: &ActorId) -> bool {
        lock(&self.inner.state)
            .actors
            .get(actor_id)
            .is_some_and(|m| m.responses_ready)
    }

    pub fn pool_len(&self, actor_id: &ActorId) -> usize {
        lock(&self.inner.state)
            .actors
            .get(actor_id)
            .map_or(0, |m| m.response_pool.len())
    }

    pub fn profile(&self, actor_id: &ActorId) -> Option<ActorProfile> {
        lock(&self.inner.state).profiles.get(actor_id).cloned()
    }

    /// True while a talk pool refill for the actor is running.
    pub fn refill_in_flight(&self, actor_id: &ActorId) -> bool {
        self.inner.refills.is_in_flight(actor_id)
    }

    // ========================================================================
    // Background jobs
    // ========================================================================

    fn start_refill(&self, actor_id: &ActorId) -> SharedJob<bool> {
        let system = self.clone();
        let id = actor_id.clone();
        let (job, started) = self
            .inner
            .refills
            .run(actor_id.clone(), move || async move { system.refill_pool(&id).await }.boxed());
        if started {
            debug!(actor = %actor_id, "talk pool refill started");
        }
        job
    }

    fn start_reaction(&self, actor_id: &ActorId, index: usize) -> SharedJob<Option<String>> {
        let system = self.clone();
        let id = actor_id.clone();
        let (job, _) = self.inner.reactions.run((actor_id.clone(), index), move || {
            async move { system.generate_reaction(&id, index).await }.boxed()
        });
        job
    }

    async fn refill_pool(&self, actor_id: &ActorId) -> bool {
        let prompt = {
            let state = lock(&self.inner.state);
            let Some(profile) = state.profiles.get(actor_id) else {
                return false;
            };
            let log = state.actors.get(actor_id).map(|m| m.log.as_slice()).unwrap_or(&[]);
            let recent = &log[log.len().saturating_sub(self.inner.recent_memory_window)..];
            talk_pool_prompt(profile, recent, self.inner.talk_pool_size)
        };

        let request = EnrichmentRequest {
            kind: EnrichmentKind::TalkPool,
            actor_id: actor_id.clone(),
            prompt,
        };

        let lines = match self.call_enricher(&request).await {
            Ok(text) => parse_lines(&text, self.inner.talk_pool_size),
            Err(e) => {
                warn!(actor = %actor_id, error = %e, "talk pool refill failed");
                return false;
            }
        };
        if lines.is_empty() {
            warn!(actor = %actor_id, "talk pool refill returned no usable lines");
            return false;
        }

        let mut state = lock(&self.inner.state);
        if !state.profiles.contains_key(actor_id) {
            debug!(actor = %actor_id, "dropping lines for an actor no longer on the roster");
            return false;
        }
        let memory = state.actors.entry(actor_id.clone()).or_default();
        memory.response_pool = lines.into();
        memory.responses_ready = true;
        true
    }

    async fn generate_reaction(&self, actor_id: &ActorId, index: usize) -> Option<String> {
        let prompt = {
            let state = lock(&self.inner.state);
            let entry = state.actors.get(actor_id)?.log.get(index)?;
            if let Some(reaction) = &entry.cached_reaction {
                return Some(reaction.clone());
            }
            let profile = state.profiles.get(actor_id)?;
            reaction_prompt(profile, entry)
        };

        let request = EnrichmentRequest {
            kind: EnrichmentKind::Reaction,
            actor_id: actor_id.clone(),
            prompt,
        };

        let reaction = match self.call_enricher(&request).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!(actor = %actor_id, "reaction came back empty");
                return None;
            }
            Err(e) => {
                warn!(actor = %actor_id, error = %e, "reaction generation failed");
                return None;
            }
        };

        let mut state = lock(&self.inner.state);
        if let Some(entry) = state
            .actors
            .get_mut(actor_id)
            .and_then(|m| m.log.get_mut(index))
        {
            entry.cached_reaction = Some(reaction.clone());
        }
        Some(reaction)
    }

    /// Run one enrichment call on the actor's lane.
    async fn call_enricher(&self, request: &EnrichmentRequest) -> Result<String, EnrichError> {
        let lane = self.lane(&request.actor_id);
        let _turn = lane.lock().await;

        let call = self.inner.enricher.enrich(request);
        match self.inner.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| EnrichError::Timeout(limit.as_millis() as u64))?,
            None => call.await,
        }
    }

    fn lane(&self, actor_id: &ActorId) -> Arc<tokio::sync::Mutex<()>> {
        let mut lanes = lock(&self.inner.lanes);
        Arc::clone(lanes.entry(actor_id.clone()).or_default())
    }

    fn pop_line(&self, actor_id: &ActorId) -> Option<String> {
        let (line, ran_dry) = {
            let mut state = lock(&self.inner.state);
            let memory = state.actors.get_mut(actor_id)?;
            let line = memory.response_pool.pop_front()?;
            let ran_dry = memory.response_pool.is_empty();
            if ran_dry {
                memory.responses_ready = false;
            }
            (line, ran_dry)
        };

        if ran_dry {
            self.start_refill(actor_id);
        }
        Some(line)
    }

    fn display_name(&self, actor_id: &ActorId) -> String {
        self.profile(actor_id)
            .map(|p| p.name)
            .unwrap_or_else(|| actor_id.to_string())
    }

    fn silent_line(&self, actor_id: &ActorId) -> String {
        format!("{} looks at you but says nothing.", self.display_name(actor_id))
    }

    fn cache_fallback(&self, actor_id: &ActorId, index: usize, text: &str) {
        let mut state = lock(&self.inner.state);
        if let Some(entry) = state
            .actors
            .get_mut(actor_id)
            .and_then(|m| m.log.get_mut(index))
        {
            entry.cached_reaction.get_or_insert_with(|| text.to_string());
        }
    }

    fn fallback_reaction(&self, actor_id: &ActorId, entry: &MemoryEntry) -> String {
        format!(
            "{} remembers seeing {} {} at {} around {}.",
            self.display_name(actor_id),
            entry.witnessed_actor_name,
            entry.action,
            entry.location_name,
            entry.time
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockEnricher;
    use std::time::Duration;

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    fn roster() -> BTreeMap<ActorId, Actor> {
        [
            Actor::new("mara", "Mara", "square").with_personality("Brisk baker."),
            Actor::new("tomas", "Tomas", "square"),
            Actor::new("ilse", "Ilse", "mill"),
        ]
        .into_iter()
        .map(|a| (a.id.clone(), a))
        .collect()
    }

    fn system(enricher: Arc<MockEnricher>) -> (MemoryWitnessSystem, BTreeMap<ActorId, Actor>) {
        let actors = roster();
        let system = MemoryWitnessSystem::new(enricher, &SimulationConfig::new());
        system.register_actors(actors.values());
        (system, actors)
    }

    fn mara_arrives() -> WitnessedAction {
        WitnessedAction {
            actor_id: ActorId::from("mara"),
            actor_name: "Mara".to_string(),
            action: "carry bread to the stall".to_string(),
            location_id: LocationId::from("square"),
            location_name: "Village Square".to_string(),
            time: t("08:05"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_roster_forgets_profiles_but_keeps_logs() {
        let enricher = Arc::new(MockEnricher::new());
        let (system, actors) = system(enricher.clone());
        system.record_witnessed_event(&actors, &mara_arrives());
        assert_eq!(system.prepare_all_responses().await, 3);

        let tomas = ActorId::from("tomas");
        system.set_roster(actors.values().filter(|a| a.id.as_str() == "ilse"));

        assert!(system.profile(&tomas).is_none());
        assert_eq!(system.memory_count(&tomas), 1);
        assert_eq!(system.pool_len(&tomas), 0);
        assert!(!system.responses_ready(&tomas));
        assert!(system.profile(&ActorId::from("ilse")).is_some());

        let talk_calls = enricher.calls_of(EnrichmentKind::TalkPool);
        assert_eq!(system.prepare_all_responses().await, 1);
        assert_eq!(enricher.calls_of(EnrichmentKind::TalkPool), talk_calls + 1);
    }

    #[test]
    fn test_record_without_runtime_still_writes_memories() {
        let (system, actors) = system(Arc::new(MockEnricher::new()));
        let witnesses = system.record_witnessed_event(&actors, &mara_arrives());

        assert_eq!(witnesses, vec![ActorId::from("tomas")]);
        assert_eq!(system.memory_count(&ActorId::from("tomas")), 1);
        assert_eq!(system.memory_count(&ActorId::from("mara")), 0);
        assert_eq!(system.memory_count(&ActorId::from("ilse")), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_never_witnesses_itself() {
        let enricher = Arc::new(MockEnricher::new());
        let (system, actors) = system(enricher.clone());

        system.record_witnessed_event(&actors, &mara_arrives());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(system.memories(&ActorId::from("mara")).is_empty());
        let tomas = system.memories(&ActorId::from("tomas"));
        assert_eq!(tomas.len(), 1);
        assert_eq!(tomas[0].witnessed_actor_name, "Mara");
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_enrichment_fills_reaction_and_pool() {
        let enricher = Arc::new(MockEnricher::new());
        let (system, actors) = system(enricher.clone());
        let tomas = ActorId::from("tomas");

        system.record_witnessed_event(&actors, &mara_arrives());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let entry = system.memory_entry(&tomas, 0).unwrap();
        assert!(entry.cached_reaction.is_some());
        assert!(system.responses_ready(&tomas));
        assert_eq!(enricher.calls_of(EnrichmentKind::Reaction), 1);
        assert_eq!(enricher.calls_of(EnrichmentKind::TalkPool), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_background_enrichment_leaves_entry_bare() {
        let enricher = Arc::new(MockEnricher::failing());
        let (system, actors) = system(enricher.clone());
        let tomas = ActorId::from("tomas");

        system.record_witnessed_event(&actors, &mara_arrives());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(system.memory_entry(&tomas, 0).unwrap().cached_reaction.is_none());
        assert!(!system.responses_ready(&tomas));

        let reply = system.event_response(&tomas, 0).await;
        assert_eq!(
            reply,
            "Tomas remembers seeing Mara carry bread to the stall at Village Square around 08:05."
        );
        assert_eq!(system.memory_entry(&tomas, 0).unwrap().cached_reaction, Some(reply));

        let calls = enricher.calls();
        system.event_response(&tomas, 0).await;
        assert_eq!(enricher.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_response_caches_generated_reaction() {
        let enricher = Arc::new(MockEnricher::new());
        let system = MemoryWitnessSystem::new(enricher.clone(), &SimulationConfig::new());
        let actors = roster();
        system.register_actors(actors.values());
        system.record_witnessed_event(&actors, &mara_arrives());

        let tomas = ActorId::from("tomas");
        let first = system.event_response(&tomas, 0).await;
        let second = system.event_response(&tomas, 0).await;

        assert_eq!(first, second);
        assert_eq!(enricher.calls_of(EnrichmentKind::Reaction), 1);
        assert_eq!(system.memory_entry(&tomas, 0).unwrap().cached_reaction, Some(first));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_talk_requests_share_one_refill() {
        let enricher = Arc::new(MockEnricher::new().with_latency(Duration::from_millis(50)));
        let (system, _) = system(enricher.clone());
        let mara = ActorId::from("mara");

        let (a, b) = tokio::join!(system.talk_response(&mara), system.talk_response(&mara));

        assert!(!a.is_empty());
        assert!(!b.is_empty());
        assert_ne!(a, b);
        assert_eq!(enricher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_talk_pool_refills_when_drained() {
        let enricher = Arc::new(MockEnricher::new().with_talk_lines(2));
        let (system, _) = system(enricher.clone());
        let mara = ActorId::from("mara");

        let first = system.talk_response(&mara).await;
        assert_eq!(system.pool_len(&mara), 1);
        let second = system.talk_response(&mara).await;
        assert_ne!(first, second);
        assert_eq!(system.pool_len(&mara), 0);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(system.pool_len(&mara), 2);
        assert_eq!(enricher.calls_of(EnrichmentKind::TalkPool), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_talk_falls_back_when_enricher_fails() {
        let enricher = Arc::new(MockEnricher::failing());
        let (system, _) = system(enricher);
        let reply = system.talk_response(&ActorId::from("ilse")).await;
        assert_eq!(reply, "Ilse looks at you but says nothing.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_actor_gets_silent_line() {
        let enricher = Arc::new(MockEnricher::new());
        let (system, _) = system(enricher.clone());
        let reply = system.talk_response(&ActorId::from("stranger")).await;
        assert_eq!(reply, "stranger looks at you but says nothing.");
        assert_eq!(
            system.event_response(&ActorId::from("mara"), 9).await,
            "Mara looks at you but says nothing."
        );
        assert_eq!(enricher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_all_responses() {
        let enricher = Arc::new(MockEnricher::new());
        let (system, actors) = system(enricher.clone());

        assert_eq!(system.prepare_all_responses().await, 3);
        for id in actors.keys() {
            assert!(system.responses_ready(id));
        }
        assert_eq!(enricher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_enricher_times_out_to_fallback() {
        let enricher = Arc::new(MockEnricher::new().with_latency(Duration::from_secs(5)));
        let config = SimulationConfig::new().with_enrichment_timeout(Some(Duration::from_secs(1)));
        let system = MemoryWitnessSystem::new(enricher, &config);
        let actors = roster();
        system.register_actors(actors.values());

        let reply = system.talk_response(&ActorId::from("tomas")).await;
        assert_eq!(reply, "Tomas looks at you but says nothing.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_actor_calls_never_overlap() {
        let enricher = Arc::new(MockEnricher::new().with_latency(Duration::from_millis(20)));
        let (system, actors) = system(enricher.clone());

        system.record_witnessed_event(&actors, &mara_arrives());
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(enricher.max_concurrent_for(&ActorId::from("tomas")), 1);
        assert_eq!(enricher.calls(), 2);
    }
}
