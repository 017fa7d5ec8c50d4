//! Summaries for the part of a conversation that no longer fits the context
//! window.
//!
//! Two ways to produce the summary text:
//!
//! - **Extractive**: one line per collapsed turn, built locally and always
//!   available.
//! - **Provider**: a summarization request built by [`summary_request`] and
//!   sent through the router; the caller falls back to the extractive form
//!   when that call fails.
//!
//! Either way the text ends up in a single turn made by [`summary_turn`].

use crate::providers::{Role, Turn};
use crate::utils::string::{preview, squash_whitespace};

/// Header that marks a summary turn.
pub const SUMMARY_HEADER: &str = "[Conversation Summary]";

/// Longest excerpt of one turn in an extractive summary.
const LINE_CHARS: usize = 160;

fn speaker(turn: &Turn) -> String {
    match (turn.role, turn.tool_name.as_deref()) {
        (Role::Tool, Some(name)) if turn.is_tool_request() => format!("tool call {}", name),
        (Role::Tool, Some(name)) => format!("tool {}", name),
        (role, _) => role.to_string(),
    }
}

fn line_for(turn: &Turn) -> String {
    let body = match (&turn.arguments, turn.content.trim().is_empty()) {
        (Some(args), true) => args.clone(),
        _ => turn.content.clone(),
    };
    format!(
        "- {}: {}",
        speaker(turn),
        preview(&squash_whitespace(&body), LINE_CHARS)
    )
}

/// Build a summary locally from the collapsed turns.
///
/// Keeps the most recent lines when the whole transcript does not fit in
/// `max_chars` and notes how many earlier turns were omitted.
///
/// # Examples
/// ```
/// use arborclaw::agent::compaction::extractive_summary;
/// use arborclaw::providers::Turn;
///
/// let turns = vec![Turn::user("What is Rust?"), Turn::assistant("A systems language.")];
/// let summary = extractive_summary(&turns, 500);
/// assert!(summary.contains("user: What is Rust?"));
/// assert!(summary.contains("assistant: A systems language."));
/// ```
pub fn extractive_summary(turns: &[Turn], max_chars: usize) -> String {
    let lines: Vec<String> = turns.iter().map(line_for).collect();

    // Walk backwards from the newest line; `start` is the first kept index.
    let mut start = lines.len();
    let mut used = 0usize;
    while start > 0 {
        let cost = lines[start - 1].chars().count() + 1;
        let header = omitted_note(start - 1).chars().count();
        if used + cost + header > max_chars && start < lines.len() {
            break;
        }
        used += cost;
        start -= 1;
    }

    let mut summary = omitted_note(start);
    summary.push_str(&lines[start..].join("\n"));
    preview(&summary, max_chars)
}

fn omitted_note(omitted: usize) -> String {
    if omitted == 0 {
        String::new()
    } else {
        format!("({} earlier turns omitted)\n", omitted)
    }
}

/// Turns asking a provider to summarize `turns` in at most `max_chars`.
pub fn summary_request(turns: &[Turn], max_chars: usize) -> Vec<Turn> {
    let transcript = turns.iter().map(line_for).collect::<Vec<_>>().join("\n");
    vec![
        Turn::system(&format!(
            "You condense conversations. Summarize the transcript below in at most {} \
             characters. Keep decisions, facts, open questions and tool outcomes. \
             Reply with the summary only.",
            max_chars
        )),
        Turn::user(&transcript),
    ]
}

/// The single turn that stands in for every collapsed turn.
pub fn summary_turn(summary_text: &str) -> Turn {
    Turn::assistant(&format!("{}\n{}", SUMMARY_HEADER, summary_text.trim()))
}
