//! Flavor-text enrichment.
//!
//! The simulation never depends on enrichment succeeding. Anything that
//! produces text for a prompt can implement [`Enricher`]; the memory system
//! decides when to call it and what to do when it fails.

mod claude;
pub mod prompts;

pub use claude::ClaudeEnricher;

use crate::world::ActorId;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from an enrichment backend.
#[derive(Debug, Clone, Error)]
pub enum EnrichError {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Enrichment produced no text")]
    Empty,

    #[error("Enrichment timed out after {0} ms")]
    Timeout(u64),

    #[error("Enrichment unavailable: {0}")]
    Unavailable(String),
}

/// What a piece of generated text is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentKind {
    /// A one-off reaction to a single witnessed event.
    Reaction,
    /// A batch of general conversation lines, one per line of output.
    TalkPool,
}

/// A single request to an enrichment backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentRequest {
    pub kind: EnrichmentKind,
    pub actor_id: ActorId,
    pub prompt: String,
}

/// Produces flavor text from a prompt.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, request: &EnrichmentRequest) -> Result<String, EnrichError>;
}

/// An enricher that is never available. Every caller falls back to its
/// deterministic text.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineEnricher;

#[async_trait]
impl Enricher for OfflineEnricher {
    async fn enrich(&self, _request: &EnrichmentRequest) -> Result<String, EnrichError> {
        Err(EnrichError::Unavailable("offline".to_string()))
    }
}

/// Split a talk-pool completion into individual lines.
///
/// Blank lines are dropped, and list markers and wrapping quotes are
/// stripped. At most `limit` lines are kept.
pub fn parse_lines(text: &str, limit: usize) -> Vec<String> {
    text.lines()
        .map(|line| {
            strip_list_marker(line.trim())
                .trim()
                .trim_matches('"')
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(limit)
        .collect()
}

/// Remove a leading `-`, `*`, `•`, `1.` or `1)` marker. The marker only
/// counts when whitespace or the end of the line follows it.
fn strip_list_marker(line: &str) -> &str {
    let rest = match line.strip_prefix(|c: char| matches!(c, '-' | '*' | '•')) {
        Some(rest) => rest,
        None => {
            let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits == 0 {
                return line;
            }
            match line[digits..].strip_prefix(|c: char| matches!(c, '.' | ')')) {
                Some(rest) => rest,
                None => return line,
            }
        }
    };

    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        rest
    } else {
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lines_strips_markers() {
        let text = "1. \"Lovely morning.\"\n\n- Have you seen the miller?\n* Off with you now.\n";
        assert_eq!(
            parse_lines(text, 5),
            vec!["Lovely morning.", "Have you seen the miller?", "Off with you now."]
        );
    }

    #[test]
    fn test_parse_lines_keeps_leading_numbers() {
        let text = "3 loaves left, and it's barely 8.\n10 o'clock already?\n2) \"Mind the step.\"";
        assert_eq!(
            parse_lines(text, 5),
            vec![
                "3 loaves left, and it's barely 8.",
                "10 o'clock already?",
                "Mind the step.",
            ]
        );
        assert_eq!(
            parse_lines("-5 degrees out\n1.5 pints, please", 5),
            vec!["-5 degrees out", "1.5 pints, please"]
        );
    }

    #[test]
    fn test_parse_lines_respects_limit() {
        assert_eq!(parse_lines("a\nb\nc\nd", 2), vec!["a", "b"]);
        assert!(parse_lines("   \n\n", 3).is_empty());
    }

    #[tokio::test]
    async fn test_offline_enricher_always_fails() {
        let request = EnrichmentRequest {
            kind: EnrichmentKind::Reaction,
            actor_id: ActorId::from("mara"),
            prompt: "anything".to_string(),
        };
        assert!(matches!(
            OfflineEnricher.enrich(&request).await,
            Err(EnrichError::Unavailable(_))
        ));
    }
}
