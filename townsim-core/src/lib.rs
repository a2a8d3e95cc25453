//! Tick-driven town simulation with witnessed-event memory.
//!
//! This crate provides:
//! - A location graph with shortest-path stepping
//! - Per-actor timetables resolved against a 24-hour clock
//! - A tick loop that moves actors one hop at a time and narrates it
//! - Memory of witnessed events, with dialogue enriched in the background
//! - Task routing for ticks and world-content fetches
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use townsim_core::testing::StaticContent;
//! use townsim_core::{ClaudeEnricher, SimulationConfig, SimulationSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let enricher = Arc::new(ClaudeEnricher::from_env()?);
//!     let mut session = SimulationSession::new(
//!         SimulationConfig::new(),
//!         enricher,
//!         Arc::new(StaticContent::village()),
//!     );
//!     session.start(None).await?;
//!
//!     let report = session.wait().await?;
//!     for line in report.narration {
//!         println!("{line}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod enrich;
pub mod graph;
pub mod memory;
pub mod movement;
pub mod schedule;
pub mod session;
pub mod testing;
pub mod world;

// Primary public API
pub use clock::{ClockParseError, ClockTime};
pub use config::SimulationConfig;
pub use context::SimulationContext;
pub use dispatch::{
    ContentError, ContentSource, PipelineSummary, Task, TaskDispatcher, TaskEnvelope, TaskKind,
    TaskOutput, TaskStatus, TickHandler,
};
pub use enrich::{ClaudeEnricher, EnrichError, Enricher, EnrichmentKind, EnrichmentRequest, OfflineEnricher};
pub use graph::WorldGraph;
pub use memory::{MemoryEntry, MemoryWitnessSystem};
pub use movement::{ActorMove, MovementCoordinator, TickReport};
pub use schedule::{MovementIntent, ScheduleEntry, ScheduleStore};
pub use session::{SessionError, SimulationSession};
pub use world::{Actor, ActorId, Location, LocationId, Story};
