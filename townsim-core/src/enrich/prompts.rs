//! Prompt text for enrichment requests.

use crate::memory::{ActorProfile, MemoryEntry};

/// Prompt for an actor's reaction to one thing they saw.
pub fn reaction_prompt(witness: &ActorProfile, entry: &MemoryEntry) -> String {
    format!(
        r#"You are {name}, a character in a small village. {personality}

Around {time} at {location}, you saw {other} {action}.

Reply with ONE short line of dialogue (under 25 words) that {name} might say to a visitor who asks about it. No quotation marks, no stage directions."#,
        name = witness.name,
        personality = personality_line(witness),
        time = entry.time,
        location = entry.location_name,
        other = entry.witnessed_actor_name,
        action = entry.action,
    )
}

/// Prompt for a batch of general conversation lines.
pub fn talk_pool_prompt(actor: &ActorProfile, recent: &[MemoryEntry], count: usize) -> String {
    let mut prompt = format!(
        "You are {}, a character in a small village. {}\n\n",
        actor.name,
        personality_line(actor)
    );

    if !recent.is_empty() {
        prompt.push_str("Things you noticed recently:\n");
        for entry in recent {
            prompt.push_str(&format!(
                "- {} at {}: {} was {}\n",
                entry.time, entry.location_name, entry.witnessed_actor_name, entry.action
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Write {count} different short lines {} might say when a visitor starts a conversation. \
         One line each, under 25 words, no numbering, no quotation marks.",
        actor.name
    ));
    prompt
}

fn personality_line(actor: &ActorProfile) -> String {
    if actor.personality.trim().is_empty() {
        String::new()
    } else {
        format!("Personality: {}", actor.personality.trim())
    }
}
