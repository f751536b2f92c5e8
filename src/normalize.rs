//! Header and alias canonicalization.
//!
//! Every comparison performed by the matcher goes through [`normalize`], so
//! `"Reg_No"`, `"reg-no"` and `"  REG / NO "` all compare as `"reg no"`.

use std::sync::OnceLock;

use regex::Regex;

use crate::data::CellValue;

static SEPARATORS: OnceLock<Regex> = OnceLock::new();
static SPACES: OnceLock<Regex> = OnceLock::new();

fn separators() -> &'static Regex {
    SEPARATORS.get_or_init(|| Regex::new(r"[_\-\s/&]+").expect("separator pattern compiles"))
}

fn spaces() -> &'static Regex {
    SPACES.get_or_init(|| Regex::new(r"\s+").expect("space pattern compiles"))
}

/// Lower-cases, trims, and folds the separator set `_ - / &` and whitespace
/// into single spaces.
pub fn normalize(value: &str) -> String {
    let lowered = value.to_lowercase();
    let folded = separators().replace_all(lowered.trim(), " ");
    let collapsed = spaces().replace_all(&folded, " ");
    collapsed.trim().to_string()
}

/// Normalizes a raw cell, treating blanks as the empty string.
pub fn normalize_cell(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        other => normalize(&other.as_display()),
    }
}
