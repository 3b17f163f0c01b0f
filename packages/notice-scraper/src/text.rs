//! Text hygiene shared by the detail extractor and the contact classifier.

/// Caption the site prints on every detail page.
pub const PRINTABLE_CAPTION: &str = "Printable Version";

/// Footer sentences that are never field values.
const DISCLAIMERS: &[&str] = &["philgeps team is not responsible"];

/// Label keywords; a value mentioning three or more of them is a captured
/// row or label block, not a value.
const STRUCTURAL_LABELS: &[&str] = &[
    "procuring entity",
    "title",
    "area of delivery",
    "solicitation number",
];

const STRUCTURAL_LABEL_LIMIT: usize = 3;

/// Captions shorter than this are treated as the bare caption.
const CAPTION_MAX_LEN: usize = 30;

/// True when the text is boilerplate rather than a field value.
pub fn is_junk_text(value: &str) -> bool {
    if value.is_empty() {
        return false;
    }
    let lower = value.to_lowercase();

    if DISCLAIMERS.iter().any(|d| lower.contains(d)) {
        return true;
    }
    if lower.contains(&PRINTABLE_CAPTION.to_lowercase()) && value.chars().count() < CAPTION_MAX_LEN
    {
        return true;
    }
    STRUCTURAL_LABELS
        .iter()
        .filter(|k| lower.contains(*k))
        .count()
        >= STRUCTURAL_LABEL_LIMIT
}

/// Trim, drop junk, and strip the printable caption. Empty results are `None`.
pub fn clean_value(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || is_junk_text(value) {
        return None;
    }
    let cleaned = value.replace(PRINTABLE_CAPTION, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn squash_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
