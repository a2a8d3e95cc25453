//! SimulationSession - a turn-driven wrapper around one world.
//!
//! The session owns a [`SimulationContext`], a [`TaskDispatcher`], the clock
//! and the player's position. Each player action advances the clock by one
//! step after the world has moved.

use crate::clock::ClockTime;
use crate::config::SimulationConfig;
use crate::context::SimulationContext;
use crate::dispatch::{
    ContentSource, PipelineSummary, Task, TaskDispatcher, TaskEnvelope, TaskOutput, TaskStatus,
};
use crate::enrich::Enricher;
use crate::movement::TickReport;
use crate::world::{ActorId, LocationId};
use std::sync::Arc;
use thiserror::Error;

/// Errors from SimulationSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Task {task} failed: {message}")]
    TaskFailed { task: String, message: String },

    #[error("No handler wired for task {0}")]
    Unhandled(String),

    #[error("Unknown actor: {0}")]
    UnknownActor(ActorId),

    #[error("Unknown location: {0}")]
    UnknownLocation(LocationId),

    #[error("{0} has no memory at index {1}")]
    NoSuchMemory(ActorId, usize),
}

/// A running simulation seen from one player.
pub struct SimulationSession {
    ctx: SimulationContext,
    dispatcher: TaskDispatcher,
    clock: ClockTime,
    player_location: Option<LocationId>,
}

impl SimulationSession {
    /// Create a session over `content`, with dialogue from `enricher`.
    pub fn new(
        config: SimulationConfig,
        enricher: Arc<dyn Enricher>,
        content: Arc<dyn ContentSource>,
    ) -> Self {
        Self {
            ctx: SimulationContext::new(config, enricher),
            dispatcher: TaskDispatcher::standard(content),
            clock: ClockTime::MIDNIGHT,
            player_location: None,
        }
    }

    /// Set the starting time.
    pub fn with_clock(mut self, clock: ClockTime) -> Self {
        self.clock = clock;
        self
    }

    /// Fetch and load the world. Unless a location was already set, the
    /// player starts at the location with the lowest id.
    pub async fn start(&mut self, premise: Option<&str>) -> Result<PipelineSummary, SessionError> {
        let task = Task::StartPipeline {
            premise: premise.map(str::to_string),
        };
        let TaskOutput::Pipeline(summary) = self.run(task).await? else {
            return Err(SessionError::TaskFailed {
                task: "start-pipeline".to_string(),
                message: "unexpected output".to_string(),
            });
        };

        if self.player_location.is_none() {
            self.player_location = self.ctx.graph().locations().map(|l| l.id.clone()).min();
        }
        Ok(summary)
    }

    /// Let the world move while the player stands at `observer_location`,
    /// then advance the clock by one step.
    pub async fn player_action(
        &mut self,
        observer_location: &LocationId,
    ) -> Result<TickReport, SessionError> {
        let task = Task::Tick {
            time: self.clock,
            observer_location: observer_location.clone(),
        };
        let TaskOutput::Tick(report) = self.run(task).await? else {
            return Err(SessionError::TaskFailed {
                task: "tick".to_string(),
                message: "unexpected output".to_string(),
            });
        };
        self.clock = self.clock.advanced_by(self.ctx.config().step_minutes);
        Ok(report)
    }

    /// One turn from wherever the player currently stands.
    pub async fn wait(&mut self) -> Result<TickReport, SessionError> {
        let here = self
            .player_location
            .clone()
            .unwrap_or_else(|| LocationId::new(""));
        self.player_action(&here).await
    }

    /// Move the player. The location must exist.
    pub fn set_player_location(&mut self, location: LocationId) -> Result<(), SessionError> {
        if !self.ctx.graph().contains(&location) {
            return Err(SessionError::UnknownLocation(location));
        }
        self.player_location = Some(location);
        Ok(())
    }

    /// Take the exit labelled `direction` from the player's location.
    pub fn go(&mut self, direction: &str) -> Option<&LocationId> {
        let here = self.player_location.as_ref()?;
        let target = self.ctx.graph().exits(here).get(direction).cloned()?;
        self.player_location = Some(target);
        self.player_location.as_ref()
    }

    /// A line of conversation from `actor_id`.
    pub async fn talk_to(&self, actor_id: &ActorId) -> Result<String, SessionError> {
        if self.ctx.actor(actor_id).is_none() {
            return Err(SessionError::UnknownActor(actor_id.clone()));
        }
        Ok(self.ctx.memory().talk_response(actor_id).await)
    }

    /// What `actor_id` says about their most recent memory.
    pub async fn recall(&self, actor_id: &ActorId) -> Result<String, SessionError> {
        if self.ctx.actor(actor_id).is_none() {
            return Err(SessionError::UnknownActor(actor_id.clone()));
        }
        let count = self.ctx.memory().memory_count(actor_id);
        match count.checked_sub(1) {
            Some(latest) => self.recall_at(actor_id, latest).await,
            None => Err(SessionError::NoSuchMemory(actor_id.clone(), 0)),
        }
    }

    /// What `actor_id` says about the memory at `index`.
    pub async fn recall_at(&self, actor_id: &ActorId, index: usize) -> Result<String, SessionError> {
        if self.ctx.actor(actor_id).is_none() {
            return Err(SessionError::UnknownActor(actor_id.clone()));
        }
        if index >= self.ctx.memory().memory_count(actor_id) {
            return Err(SessionError::NoSuchMemory(actor_id.clone(), index));
        }
        Ok(self.ctx.memory().event_response(actor_id, index).await)
    }

    pub fn clock(&self) -> ClockTime {
        self.clock
    }

    pub fn player_location(&self) -> Option<&LocationId> {
        self.player_location.as_ref()
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SimulationContext {
        &mut self.ctx
    }

    async fn run(&mut self, task: Task) -> Result<TaskOutput, SessionError> {
        let mut envelope = TaskEnvelope::new(task);
        let output = self.dispatcher.dispatch(&mut self.ctx, &mut envelope).await;
        match (output, envelope.status) {
            (Some(output), _) => Ok(output),
            (None, TaskStatus::Failed(message)) => Err(SessionError::TaskFailed {
                task: envelope.task.kind().to_string(),
                message,
            }),
            (None, _) => Err(SessionError::Unhandled(envelope.task.kind().to_string())),
        }
    }
}
