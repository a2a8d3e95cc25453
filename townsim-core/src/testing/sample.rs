//! Ready-made worlds for tests and demos.

use crate::clock::ClockTime;
use crate::config::SimulationConfig;
use crate::context::SimulationContext;
use crate::schedule::ScheduleEntry;
use crate::world::{Actor, ActorId, Location, Story};
use std::collections::HashMap;

fn at(hour: u8, minute: u8) -> ClockTime {
    ClockTime::new(hour, minute).unwrap_or_default()
}

// ============================================================================
// Linear: a - b - c
// ============================================================================

/// Three locations in a row: Square, Lane, Mill.
pub fn linear_story() -> Story {
    Story {
        title: "The Bell at Dusk".to_string(),
        synopsis: "A bell-ringer hurries to the mill before nightfall.".to_string(),
        locations: vec![
            Location::new("a", "Square").with_exit("east", "b"),
            Location::new("b", "Lane")
                .with_exit("west", "a")
                .with_exit("east", "c"),
            Location::new("c", "Mill").with_exit("west", "b"),
        ],
    }
}

/// `walker` starts at the square, `sitter` stays at the mill.
pub fn linear_roster() -> Vec<Actor> {
    vec![
        Actor::new("walker", "Wren", "a").with_personality("Restless bell-ringer."),
        Actor::new("sitter", "Odo", "c").with_personality("Sleepy miller."),
    ]
}

/// The walker sweeps the square at 18:00 and leaves for the mill at 18:05.
pub fn linear_schedules() -> HashMap<ActorId, Vec<ScheduleEntry>> {
    HashMap::from([
        (
            ActorId::from("walker"),
            vec![
                ScheduleEntry::new(at(18, 0), "sweep the square", "a"),
                ScheduleEntry::new(at(18, 5), "ring the mill bell", "c"),
            ],
        ),
        (
            ActorId::from("sitter"),
            vec![ScheduleEntry::new(at(6, 0), "mind the mill", "c")],
        ),
    ])
}

/// An offline context loaded with the linear world.
pub fn linear_context() -> SimulationContext {
    let mut ctx = SimulationContext::offline(SimulationConfig::new());
    ctx.load_story(&linear_story());
    ctx.load_roster(linear_roster());
    ctx.load_schedules(linear_schedules());
    ctx
}

// ============================================================================
// Village
// ============================================================================

/// A small village around a square.
///
/// ```text
///            chapel      tavern
///              |           |
///   bakery - square ---- lane ---- mill
///              |
///            well
/// ```
pub fn village_story() -> Story {
    Story {
        title: "Harvest Eve in Thornbury".to_string(),
        synopsis: "The village readies itself for the harvest feast while the miller frets over a missing sack of grain.".to_string(),
        locations: vec![
            Location::new("square", "Village Square")
                .with_description("Cobblestones around a weathered stone cross.")
                .with_exit("north", "chapel")
                .with_exit("east", "lane")
                .with_exit("south", "well")
                .with_exit("west", "bakery"),
            Location::new("bakery", "Bakery")
                .with_description("Warm air and the smell of rye.")
                .with_exit("east", "square"),
            Location::new("chapel", "Chapel")
                .with_description("A narrow nave lit by a single window.")
                .with_exit("south", "square"),
            Location::new("well", "Old Well")
                .with_description("A mossy well with a creaking windlass.")
                .with_exit("north", "square"),
            Location::new("lane", "Mill Lane")
                .with_description("A rutted track between hedgerows.")
                .with_exit("west", "square")
                .with_exit("east", "mill")
                .with_exit("north", "tavern"),
            Location::new("mill", "Watermill")
                .with_description("The wheel turns slowly in the brown stream.")
                .with_exit("west", "lane"),
            Location::new("tavern", "The Crooked Ox")
                .with_description("Low beams and a fire that never quite goes out.")
                .with_exit("south", "lane"),
        ],
    }
}

pub fn village_roster() -> Vec<Actor> {
    vec![
        Actor::new("mara", "Mara", "bakery")
            .with_personality("Brisk baker who knows everyone's business."),
        Actor::new("tomas", "Tomas", "tavern")
            .with_personality("Jovial innkeeper, fond of tall tales."),
        Actor::new("ilse", "Ilse", "mill").with_personality("Anxious miller, counts everything twice."),
        Actor::new("odo", "Brother Odo", "chapel")
            .with_personality("Soft-spoken monk with a sharp memory."),
    ]
}

pub fn village_schedules() -> HashMap<ActorId, Vec<ScheduleEntry>> {
    HashMap::from([
        (
            ActorId::from("mara"),
            vec![
                ScheduleEntry::new(at(6, 0), "bake the morning loaves", "bakery"),
                ScheduleEntry::new(at(8, 0), "sell bread at the square", "square"),
                ScheduleEntry::new(at(11, 0), "fetch water", "well"),
                ScheduleEntry::new(at(12, 0), "bake pies for the feast", "bakery"),
                ScheduleEntry::new(at(19, 0), "join the feast", "tavern"),
            ],
        ),
        (
            ActorId::from("tomas"),
            vec![
                ScheduleEntry::new(at(7, 0), "sweep out the tavern", "tavern"),
                ScheduleEntry::new(at(9, 0), "buy flour", "mill"),
                ScheduleEntry::new(at(10, 0), "roll out the ale casks", "tavern"),
            ],
        ),
        (
            ActorId::from("ilse"),
            vec![
                ScheduleEntry::new(at(5, 0), "open the sluice", "mill"),
                ScheduleEntry::new(at(8, 30), "ask about the missing sack", "square"),
                ScheduleEntry::new(at(10, 0), "pray for a good harvest", "chapel"),
                ScheduleEntry::new(at(11, 0), "grind the last of the barley", "mill"),
            ],
        ),
        (
            ActorId::from("odo"),
            vec![
                ScheduleEntry::new(at(6, 0), "say the morning office", "chapel"),
                ScheduleEntry::new(at(9, 0), "bless the well", "well"),
                ScheduleEntry::new(at(10, 0), "hear confessions", "chapel"),
                ScheduleEntry::new(at(18, 0), "bless the feast", "tavern"),
            ],
        ),
    ])
}

/// An offline context loaded with the village.
pub fn village_context() -> SimulationContext {
    let mut ctx = SimulationContext::offline(SimulationConfig::new());
    ctx.load_story(&village_story());
    ctx.load_roster(village_roster());
    ctx.load_schedules(village_schedules());
    ctx
}
