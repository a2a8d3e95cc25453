//! Task routing.
//!
//! Work reaches the simulation as a [`TaskEnvelope`]. The dispatcher matches
//! on the task kind and hands it to whichever capability is wired in: a
//! [`TickHandler`] for ticks and a [`ContentSource`] for fetching story,
//! roster and schedules. A task whose capability is missing is reported as
//! unhandled rather than failing.

use crate::clock::ClockTime;
use crate::context::SimulationContext;
use crate::movement::{MovementCoordinator, TickReport};
use crate::schedule::ScheduleEntry;
use crate::world::{Actor, ActorId, LocationId, Story};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Errors from content collaborators.
#[derive(Debug, Clone, Error)]
pub enum ContentError {
    #[error("Content unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid content: {0}")]
    Invalid(String),
}

// ============================================================================
// Tasks
// ============================================================================

/// A unit of work for the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    /// Ask the story collaborator for the world's story and locations.
    FetchStory { premise: Option<String> },
    /// Ask the casting collaborator for the actors of a story.
    FetchRoster { story: Story },
    /// Ask the scheduling collaborator for every actor's timetable.
    FetchSchedule { story: Story, roster: Vec<Actor> },
    /// Advance the world by one step.
    Tick {
        time: ClockTime,
        observer_location: LocationId,
    },
    /// Fetch everything, load it into the context and warm up dialogue.
    StartPipeline { premise: Option<String> },
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::FetchStory { .. } => TaskKind::FetchStory,
            Task::FetchRoster { .. } => TaskKind::FetchRoster,
            Task::FetchSchedule { .. } => TaskKind::FetchSchedule,
            Task::Tick { .. } => TaskKind::Tick,
            Task::StartPipeline { .. } => TaskKind::StartPipeline,
        }
    }
}

/// The tag of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    FetchStory,
    FetchRoster,
    FetchSchedule,
    Tick,
    StartPipeline,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::FetchStory => "fetch-story",
            TaskKind::FetchRoster => "fetch-roster",
            TaskKind::FetchSchedule => "fetch-schedule",
            TaskKind::Tick => "tick",
            TaskKind::StartPipeline => "start-pipeline",
        };
        f.write_str(name)
    }
}

/// Where a task is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
    /// No capability for this task kind is wired in.
    Unhandled,
}

/// A task plus its id and status.
#[derive(Debug, Clone)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub task: Task,
    pub status: TaskStatus,
}

impl TaskEnvelope {
    pub fn new(task: Task) -> Self {
        Self {
            id: Uuid::new_v4(),
            task,
            status: TaskStatus::Pending,
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.task.kind()
    }
}

/// What a completed task produced.
#[derive(Debug, Clone)]
pub enum TaskOutput {
    Story(Story),
    Roster(Vec<Actor>),
    Schedules(HashMap<ActorId, Vec<ScheduleEntry>>),
    Tick(TickReport),
    Pipeline(PipelineSummary),
}

/// Result of a full start-up pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    pub title: String,
    pub locations: usize,
    pub actors: usize,
    pub scheduled_actors: usize,
    pub prepared_pools: usize,
}

// ============================================================================
// Capabilities
// ============================================================================

/// Advances the world by one tick.
pub trait TickHandler: Send + Sync {
    fn on_tick(
        &self,
        ctx: &mut SimulationContext,
        time: ClockTime,
        observer_location: &LocationId,
    ) -> TickReport;
}

/// Supplies world content: story and locations, roster, and schedules.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_story(&self, premise: Option<&str>) -> Result<Story, ContentError>;

    async fn fetch_roster(&self, story: &Story) -> Result<Vec<Actor>, ContentError>;

    async fn fetch_schedules(
        &self,
        story: &Story,
        roster: &[Actor],
    ) -> Result<HashMap<ActorId, Vec<ScheduleEntry>>, ContentError>;
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes tasks to the wired capabilities.
#[derive(Default)]
pub struct TaskDispatcher {
    tick: Option<Box<dyn TickHandler>>,
    content: Option<Arc<dyn ContentSource>>,
}

impl TaskDispatcher {
    /// A dispatcher with nothing wired in. Every task is unhandled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Movement ticks plus the given content source.
    pub fn standard(content: Arc<dyn ContentSource>) -> Self {
        Self::new()
            .with_tick_handler(MovementCoordinator)
            .with_content_source(content)
    }

    pub fn with_tick_handler(mut self, handler: impl TickHandler + 'static) -> Self {
        self.tick = Some(Box::new(handler));
        self
    }

    pub fn with_content_source(mut self, content: Arc<dyn ContentSource>) -> Self {
        self.content = Some(content);
        self
    }

    /// Whether a task of `kind` would be handled.
    pub fn handles(&self, kind: TaskKind) -> bool {
        match kind {
            TaskKind::Tick => self.tick.is_some(),
            TaskKind::FetchStory
            | TaskKind::FetchRoster
            | TaskKind::FetchSchedule
            | TaskKind::StartPipeline => self.content.is_some(),
        }
    }

    /// Run the envelope's task and record the outcome in its status.
    ///
    /// Returns the output on success. Unhandled and failed tasks return
    /// `None`; failures are logged and their message kept in the status.
    pub async fn dispatch(
        &self,
        ctx: &mut SimulationContext,
        envelope: &mut TaskEnvelope,
    ) -> Option<TaskOutput> {
        envelope.status = TaskStatus::Running;

        let result = match &envelope.task {
            Task::Tick {
                time,
                observer_location,
            } => self
                .tick
                .as_ref()
                .map(|handler| Ok(TaskOutput::Tick(handler.on_tick(ctx, *time, observer_location)))),
            Task::FetchStory { premise } => match &self.content {
                Some(content) => Some(
                    content
                        .fetch_story(premise.as_deref())
                        .await
                        .map(TaskOutput::Story),
                ),
                None => None,
            },
            Task::FetchRoster { story } => match &self.content {
                Some(content) => Some(content.fetch_roster(story).await.map(TaskOutput::Roster)),
                None => None,
            },
            Task::FetchSchedule { story, roster } => match &self.content {
                Some(content) => Some(
                    content
                        .fetch_schedules(story, roster)
                        .await
                        .map(TaskOutput::Schedules),
                ),
                None => None,
            },
            Task::StartPipeline { premise } => match &self.content {
                Some(content) => Some(
                    run_pipeline(ctx, content.as_ref(), premise.as_deref())
                        .await
                        .map(TaskOutput::Pipeline),
                ),
                None => None,
            },
        };

        match result {
            None => {
                envelope.status = TaskStatus::Unhandled;
                None
            }
            Some(Ok(output)) => {
                envelope.status = TaskStatus::Completed;
                Some(output)
            }
            Some(Err(e)) => {
                warn!(task = %envelope.kind(), id = %envelope.id, error = %e, "task failed");
                envelope.status = TaskStatus::Failed(e.to_string());
                None
            }
        }
    }
}

async fn run_pipeline(
    ctx: &mut SimulationContext,
    content: &dyn ContentSource,
    premise: Option<&str>,
) -> Result<PipelineSummary, ContentError> {
    let story = content.fetch_story(premise).await?;
    if story.locations.is_empty() {
        return Err(ContentError::Invalid("story has no locations".to_string()));
    }
    ctx.load_story(&story);
    info!(title = %story.title, locations = story.locations.len(), "world loaded");

    let roster = content.fetch_roster(&story).await?;
    ctx.load_roster(roster.clone());
    info!(actors = roster.len(), "roster loaded");

    let schedules = content.fetch_schedules(&story, &roster).await?;
    let scheduled_actors = schedules.len();
    ctx.load_schedules(schedules);
    info!(scheduled = scheduled_actors, "schedules loaded");

    let prepared_pools = ctx.memory().prepare_all_responses().await;
    info!(prepared = prepared_pools, "dialogue prepared");

    Ok(PipelineSummary {
        title: story.title,
        locations: story.locations.len(),
        actors: roster.len(),
        scheduled_actors,
        prepared_pools,
    })
}
