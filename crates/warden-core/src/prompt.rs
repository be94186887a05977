//! Grounded prompt construction.

use std::fmt::Write as _;

use chrono::NaiveDate;
use warden_memory::RetrievalResult;

/// Reply used when nothing visible to the caller's role matched the query.
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "I don't have enough information to answer that from the documents available to you.";

/// System instruction carrying the grounding rules.
#[must_use]
pub fn system_prompt(assistant_name: &str, today: NaiveDate) -> String {
    format!(
        "You are {assistant_name}, an internal knowledge assistant.\n\
         - Answer strictly based on the provided context.\n\
         - Cite sources using [1][2] notation matching the numbered context blocks.\n\
         - If the context does not contain the answer, say \"I don't have enough information\".\n\
         - Maintain a professional tone.\n\
         - Current date: {}",
        today.format("%Y-%m-%d")
    )
}

/// User turn embedding the numbered context blocks followed by the question.
#[must_use]
pub fn user_turn(query: &str, context: &[RetrievalResult]) -> String {
    let mut out = String::from("Context:\n");
    for (i, result) in context.iter().enumerate() {
        let _ = writeln!(out, "[{}] (source: {})", i + 1, result.source_id);
        out.push_str(result.text.trim());
        out.push_str("\n\n");
    }
    let _ = write!(out, "Question:\n{}", query.trim());
    out
}
