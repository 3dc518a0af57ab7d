use unicode_general_category::{GeneralCategory, get_general_category};
use unicode_normalization::UnicodeNormalization;

const SMART_QUOTES: [char; 5] = ['"', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

/// Normalizes review text so it can be embedded in a quoted prompt and
/// echoed back inside a JSON reply.
pub fn clean_review_text(text: &str) -> String {
    let normalized: String = text
        .nfkd()
        .filter(|c| matches!(c, '\n' | '\r' | '\t') || !is_other_category(*c))
        .map(|c| if SMART_QUOTES.contains(&c) { '\'' } else { c })
        .collect();

    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unicode general category C*: controls, format characters, surrogates,
/// private use and unassigned code points.
fn is_other_category(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::Control
            | GeneralCategory::Format
            | GeneralCategory::Surrogate
            | GeneralCategory::PrivateUse
            | GeneralCategory::Unassigned
    )
}

pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
