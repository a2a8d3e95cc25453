//! Testing utilities.
//!
//! This module provides tools for deterministic tests without API calls:
//! - `MockEnricher`, a scripted [`Enricher`] that counts its calls
//! - `StaticContent`, a [`ContentSource`] over fixed data
//! - `sample`, ready-made worlds

pub mod sample;

use crate::dispatch::{ContentError, ContentSource};
use crate::enrich::{EnrichError, EnrichmentKind, EnrichmentRequest, Enricher};
use crate::memory::lock;
use crate::schedule::ScheduleEntry;
use crate::world::{Actor, ActorId, Story};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// An enricher with scripted output.
///
/// Reactions come back as `"<actor> reacts (call N)"` and talk pools as
/// `talk_lines` numbered lines. Every request is recorded.
pub struct MockEnricher {
    latency: Duration,
    talk_lines: usize,
    failing: AtomicBool,
    calls: AtomicUsize,
    log: Mutex<MockLog>,
}

#[derive(Default)]
struct MockLog {
    requests: Vec<EnrichmentRequest>,
    active: HashMap<ActorId, usize>,
    peak: HashMap<ActorId, usize>,
}

impl MockEnricher {
    pub fn new() -> Self {
        Self {
            latency: Duration::ZERO,
            talk_lines: 4,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            log: Mutex::new(MockLog::default()),
        }
    }

    /// A mock that fails every request.
    pub fn failing() -> Self {
        let mock = Self::new();
        mock.set_failing(true);
        mock
    }

    /// Wait this long before answering each request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Number of lines returned for each talk pool request.
    pub fn with_talk_lines(mut self, lines: usize) -> Self {
        self.talk_lines = lines;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Total number of `enrich` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of calls of one kind.
    pub fn calls_of(&self, kind: EnrichmentKind) -> usize {
        lock(&self.log)
            .requests
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    pub fn requests(&self) -> Vec<EnrichmentRequest> {
        lock(&self.log).requests.clone()
    }

    /// The most calls for one actor that were ever running at once.
    pub fn max_concurrent_for(&self, actor_id: &ActorId) -> usize {
        lock(&self.log).peak.get(actor_id).copied().unwrap_or(0)
    }
}

impl Default for MockEnricher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Enricher for MockEnricher {
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<String, EnrichError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let _active = ActiveCall::enter(&self.log, request);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(EnrichError::Unavailable("mock enricher set to fail".to_string()));
        }

        let actor = &request.actor_id;
        Ok(match request.kind {
            EnrichmentKind::Reaction => format!("{actor} reacts (call {call})"),
            EnrichmentKind::TalkPool => (1..=self.talk_lines)
                .map(|line| format!("{actor} says line {line} of batch {call}"))
                .collect::<Vec<_>>()
                .join("\n"),
        })
    }
}

/// Counts a call as running until dropped, including when a timeout
/// cancels it.
struct ActiveCall<'a> {
    log: &'a Mutex<MockLog>,
    actor_id: ActorId,
}

impl<'a> ActiveCall<'a> {
    fn enter(log: &'a Mutex<MockLog>, request: &EnrichmentRequest) -> Self {
        let mut guard = lock(log);
        guard.requests.push(request.clone());
        let active = guard.active.entry(request.actor_id.clone()).or_default();
        *active += 1;
        let now = *active;
        let peak = guard.peak.entry(request.actor_id.clone()).or_default();
        *peak = (*peak).max(now);

        Self {
            log,
            actor_id: request.actor_id.clone(),
        }
    }
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        if let Some(active) = lock(self.log).active.get_mut(&self.actor_id) {
            *active = active.saturating_sub(1);
        }
    }
}

/// A content source that hands out fixed data.
#[derive(Debug, Clone, Default)]
pub struct StaticContent {
    story: Option<Story>,
    roster: Vec<Actor>,
    schedules: HashMap<ActorId, Vec<ScheduleEntry>>,
}

impl StaticContent {
    pub fn new(
        story: Story,
        roster: Vec<Actor>,
        schedules: HashMap<ActorId, Vec<ScheduleEntry>>,
    ) -> Self {
        Self {
            story: Some(story),
            roster,
            schedules,
        }
    }

    /// The three-location line from [`sample::linear_story`].
    pub fn linear() -> Self {
        Self::new(
            sample::linear_story(),
            sample::linear_roster(),
            sample::linear_schedules(),
        )
    }

    /// The village from [`sample::village_story`].
    pub fn village() -> Self {
        Self::new(
            sample::village_story(),
            sample::village_roster(),
            sample::village_schedules(),
        )
    }

    /// A source whose story fetch always fails.
    pub fn unavailable() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContentSource for StaticContent {
    async fn fetch_story(&self, _premise: Option<&str>) -> Result<Story, ContentError> {
        self.story
            .clone()
            .ok_or_else(|| ContentError::Unavailable("no story configured".to_string()))
    }

    async fn fetch_roster(&self, _story: &Story) -> Result<Vec<Actor>, ContentError> {
        Ok(self.roster.clone())
    }

    async fn fetch_schedules(
        &self,
        _story: &Story,
        _roster: &[Actor],
    ) -> Result<HashMap<ActorId, Vec<ScheduleEntry>>, ContentError> {
        Ok(self.schedules.clone())
    }
}
