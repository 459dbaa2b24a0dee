//! Splitting long answers into messenger-sized chunks.

/// A line break only becomes a cut point past this fraction of the limit.
const LINE_BREAK_THRESHOLD: f64 = 0.6;

/// Split `text` into chunks of at most `limit` characters.
///
/// The text is trimmed first. When it does not fit, each chunk is cut at the
/// last `'\n'` inside the window if that line break sits past `0.6 * limit`;
/// otherwise the cut falls exactly at `limit` characters, possibly mid-word.
/// The line break at a cut and any whitespace after it are dropped.
///
/// Always returns at least one element (`[""]` for blank input).
///
/// # Panics
///
/// Panics if `limit` is zero.
pub fn segment(text: &str, limit: usize) -> Vec<String> {
    assert!(limit > 0, "segment limit must be positive");

    let text = text.trim();
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let threshold = limit as f64 * LINE_BREAK_THRESHOLD;
    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let mut chunk = &rest[..window_end];

        if let Some(cut) = chunk.rfind('\n') {
            let cut_pos = chunk[..cut].chars().count();
            if cut_pos as f64 > threshold {
                chunk = &chunk[..cut];
            }
        }

        chunks.push(chunk.to_string());
        rest = rest[chunk.len()..].trim_start();
    }

    chunks
}
