//! Rendering of ranked chunks into the prompt-context string.

use paperchat_schema::RankedChunk;

pub const CONTEXT_INTRO: &str = "The most relevant context from uploaded files:\n\n";
pub const EMPTY_CONTEXT_FALLBACK: &str = "No relevant context found in the uploaded files.";

/// Render the ranked chunks into one human-readable context block, in rank
/// order, each labeled with its source filename. Nothing is dropped here;
/// any truncation already happened in top-k selection.
pub fn compose_context(ranked: &[RankedChunk]) -> String {
    if ranked.is_empty() {
        return EMPTY_CONTEXT_FALLBACK.to_string();
    }

    let mut out = String::from(CONTEXT_INTRO);
    for chunk in ranked {
        out.push_str(&format!(
            "📄 **File:** {}\n---\n{}\n\n",
            chunk.source_file, chunk.text
        ));
    }
    out
}
