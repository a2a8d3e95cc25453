//! Tick execution.
//!
//! Every tick, each actor whose timetable puts it somewhere else moves one
//! hop along a shortest path. The observing player only hears about moves
//! into or out of the location they are standing in. Everyone already at
//! the new location witnesses the arrival.

use crate::clock::ClockTime;
use crate::context::SimulationContext;
use crate::dispatch::TickHandler;
use crate::memory::WitnessedAction;
use crate::world::{ActorId, LocationId};

/// One hop taken by one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorMove {
    pub actor_id: ActorId,
    pub from: LocationId,
    pub to: LocationId,
    /// True when this hop reached the scheduled location.
    pub arrived: bool,
}

/// What happened during a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub time: ClockTime,
    /// Lines for the observing player, in the order the moves happened.
    pub narration: Vec<String>,
    pub moves: Vec<ActorMove>,
}

/// Moves actors along their schedules, one hop per tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementCoordinator;

impl MovementCoordinator {
    pub fn run_tick(
        ctx: &mut SimulationContext,
        now: ClockTime,
        observer_location: &LocationId,
    ) -> TickReport {
        let mut report = TickReport {
            time: now,
            ..TickReport::default()
        };

        for intent in ctx.schedules.tick(now, &ctx.actors) {
            let Some(next) = ctx.graph.next_step(&intent.from, &intent.to) else {
                continue;
            };
            let Some(actor) = ctx.actors.get_mut(&intent.actor_id) else {
                continue;
            };
            actor.current_location = next.clone();
            let name = actor.name.clone();

            let action = ctx.schedules.scheduled_action(&intent.actor_id, now);
            let next_name = ctx.graph.location_name(&next).to_string();

            if *observer_location == intent.from {
                let direction = ctx.graph.direction(&intent.from, &next);
                report
                    .narration
                    .push(leaving_line(&name, direction, &next_name, action));
            } else if *observer_location == next {
                let origin = ctx.graph.location_name(&intent.from);
                report.narration.push(arriving_line(&name, origin, action));
            }

            let witnessed = WitnessedAction {
                actor_id: intent.actor_id.clone(),
                actor_name: name,
                action: action
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("arrive at {next_name}")),
                location_id: next.clone(),
                location_name: next_name,
                time: now,
            };
            ctx.memory.record_witnessed_event(&ctx.actors, &witnessed);

            report.moves.push(ActorMove {
                arrived: next == intent.to,
                actor_id: intent.actor_id,
                from: intent.from,
                to: next,
            });
        }

        report
    }
}

impl TickHandler for MovementCoordinator {
    fn on_tick(
        &self,
        ctx: &mut SimulationContext,
        time: ClockTime,
        observer_location: &LocationId,
    ) -> TickReport {
        Self::run_tick(ctx, time, observer_location)
    }
}

fn leaving_line(name: &str, direction: Option<&str>, destination: &str, action: Option<&str>) -> String {
    let heading = match direction {
        Some(direction) => format!("{name} heads {direction} toward {destination}"),
        None => format!("{name} leaves for {destination}"),
    };
    match action {
        Some(action) => format!("{heading}, off to {action}."),
        None => format!("{heading}."),
    }
}

fn arriving_line(name: &str, origin: &str, action: Option<&str>) -> String {
    match action {
        Some(action) => format!("{name} arrives from {origin}, on the way to {action}."),
        None => format!("{name} arrives from {origin}."),
    }
}
