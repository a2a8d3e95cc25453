//! Text front end for a running session.
//!
//! Scripted mode keeps the player in the village square and prints what
//! happens there. Interactive mode reads one command per line from stdin.

use std::io::{self, BufRead, Write};
use townsim_core::{ActorId, SimulationSession, TickReport};

/// Where the player stands in scripted mode.
const SCRIPTED_POST: &str = "square";

/// Talk to whoever is around every this many turns.
const CHAT_EVERY: usize = 6;

pub async fn run_scripted(session: &mut SimulationSession, turns: usize) -> anyhow::Result<()> {
    session.set_player_location(SCRIPTED_POST.into())?;
    describe_here(session);

    for turn in 1..=turns {
        let report = session.wait().await?;
        print_report(&report);

        if turn % CHAT_EVERY == 0 {
            chat_with_everyone_here(session).await?;
        }
    }

    println!();
    println!("=== What the village remembers ===");
    let residents: Vec<ActorId> = session.context().actors().map(|a| a.id.clone()).collect();
    for id in residents {
        let count = session.context().memory().memory_count(&id);
        let name = display_name(session, &id);
        if count == 0 {
            println!("{name} saw nothing worth mentioning.");
            continue;
        }
        println!("{name} ({count} memories): {}", session.recall(&id).await?);
    }
    Ok(())
}

pub async fn run_interactive(session: &mut SimulationSession) -> anyhow::Result<()> {
    println!("Commands:");
    println!("  look             - Describe where you are");
    println!("  go <direction>   - Take an exit");
    println!("  wait [turns]     - Let time pass");
    println!("  talk <actor>     - Chat with someone");
    println!("  recall <actor>   - Ask someone what they last saw");
    println!("  quit             - Exit");
    println!();
    describe_here(session);

    let stdin = io::stdin();
    prompt(session);
    for line in stdin.lock().lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();

        match parts.as_slice() {
            [] => {}
            ["quit"] | ["exit"] => break,
            ["look"] => describe_here(session),
            ["go", direction] => {
                if session.go(direction).is_some() {
                    print_report(&session.wait().await?);
                    describe_here(session);
                } else {
                    println!("You can't go {direction} from here.");
                }
            }
            ["wait"] => print_report(&session.wait().await?),
            ["wait", count] => match count.parse::<usize>() {
                Ok(count) => {
                    for _ in 0..count {
                        print_report(&session.wait().await?);
                    }
                }
                Err(_) => println!("[ERROR] Usage: wait [turns]"),
            },
            ["talk", actor] => match session.talk_to(&ActorId::from(*actor)).await {
                Ok(line) => println!("{line}"),
                Err(e) => println!("[ERROR] {e}"),
            },
            ["recall", actor] => match session.recall(&ActorId::from(*actor)).await {
                Ok(line) => println!("{line}"),
                Err(e) => println!("[ERROR] {e}"),
            },
            _ => println!("[ERROR] Unknown command: {}", line.trim()),
        }
        prompt(session);
    }

    println!("Goodbye!");
    Ok(())
}

fn prompt(session: &SimulationSession) {
    print!("[{}] > ", session.clock());
    let _ = io::stdout().flush();
}

fn print_report(report: &TickReport) {
    for line in &report.narration {
        println!("[{}] {line}", report.time);
    }
}

fn describe_here(session: &SimulationSession) {
    let ctx = session.context();
    let Some(here) = session.player_location() else {
        return;
    };
    let Some(location) = ctx.graph().location(here) else {
        return;
    };

    println!("== {} ({}) ==", location.name, session.clock());
    if !location.description.is_empty() {
        println!("{}", location.description);
    }
    let exits: Vec<String> = location
        .exits
        .iter()
        .map(|(direction, target)| format!("{direction} to {}", ctx.graph().location_name(target)))
        .collect();
    if !exits.is_empty() {
        println!("Exits: {}", exits.join(", "));
    }
    let present: Vec<String> = ctx
        .actors_at(here)
        .into_iter()
        .map(|a| format!("{} [{}]", a.name, a.id))
        .collect();
    if !present.is_empty() {
        println!("Here: {}", present.join(", "));
    }
}

async fn chat_with_everyone_here(session: &SimulationSession) -> anyhow::Result<()> {
    let Some(here) = session.player_location() else {
        return Ok(());
    };
    let present: Vec<ActorId> = session
        .context()
        .actors_at(here)
        .into_iter()
        .map(|a| a.id.clone())
        .collect();

    for id in present {
        let line = session.talk_to(&id).await?;
        println!("  {}: \"{line}\"", display_name(session, &id));
    }
    Ok(())
}

fn display_name(session: &SimulationSession, id: &ActorId) -> String {
    session
        .context()
        .actor(id)
        .map(|a| a.name.clone())
        .unwrap_or_else(|| id.to_string())
}
