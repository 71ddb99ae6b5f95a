//! Text processing utilities.

/// Check if content has any non-whitespace text at all. Whitespace-only
/// windows produced by chunking are dropped rather than indexed.
pub fn has_meaningful_content(content: &str) -> bool {
    content.chars().any(|c| !c.is_whitespace())
}
