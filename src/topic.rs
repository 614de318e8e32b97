use std::sync::LazyLock;

use regex::Regex;

static UNSAFE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]").unwrap());
static UNDERSCORES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_+").unwrap());

pub const PREFIX: &str = "tbl_";
const MAX_LEN: usize = 64;

/// Turn a topic label into the SQL table id its questions are stored under.
///
/// Total and deterministic: the same label always maps to the same table.
pub fn normalize(topic: &str) -> String {
    let replaced = UNSAFE_RE.replace_all(topic, "_");
    let collapsed = UNDERSCORES_RE.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');

    let starts_alpha = trimmed.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let mut id = if starts_alpha {
        trimmed.to_string()
    } else {
        format!("{}{}", PREFIX, trimmed)
    };

    // ASCII only past this point, so byte truncation is char-safe
    if id.len() > MAX_LEN {
        id.truncate(MAX_LEN);
        let kept = id.trim_end_matches('_').len();
        id.truncate(kept);
    }

    id.to_ascii_lowercase()
}

/// Best-effort label for a table that has no stored topic name.
pub fn display_name(table_id: &str) -> String {
    table_id
        .split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
