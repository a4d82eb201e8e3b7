//! sanitize.rs
//! Cleans facility names coming from the portal so they can be displayed
//! and compared: invisible and bidi control characters are removed and
//! whitespace is normalised.

/// Zero-width, soft hyphen, invisible operators, bidi marks/embeddings/
/// isolates, interlinear annotation marks, line/paragraph separators.
fn is_invisible(c: char) -> bool {
    matches!(c,
        '\u{200B}'..='\u{200F}'
        | '\u{FEFF}'
        | '\u{00AD}'
        | '\u{2060}'..='\u{2064}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2066}'..='\u{2069}'
        | '\u{FFF9}'..='\u{FFFB}'
        | '\u{2028}'
        | '\u{2029}'
    )
}

/// Display-safe form of a raw zone name. Empty input gives an empty string.
/// Idempotent.
pub fn sanitize(raw: &str) -> String {
    let visible: String = raw.chars().filter(|&c| !is_invisible(c)).collect();
    visible.split_whitespace().collect::<Vec<_>>().join(" ")
}
