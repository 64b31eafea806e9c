//! Deterministic on-disk names for sources.
//!
//! A source folder is named `{Author}{Year}_{Title}`: the first author's
//! surname with spaces removed, the year (or `nd`), and the first 30
//! characters of the title with filesystem-hostile characters stripped and
//! spaces replaced by underscores.

use crate::defaults;

/// Characters that are never allowed in a folder name component.
const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Remove forbidden and control characters.
pub fn strip_forbidden(s: &str) -> String {
    s.chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c) && !c.is_control())
        .collect()
}

/// Title component of a folder name.
pub fn title_component(title: &str) -> String {
    let head: String = title.chars().take(defaults::FOLDER_TITLE_CHARS).collect();
    let head = if head.trim().is_empty() {
        defaults::UNTITLED.to_string()
    } else {
        head
    };
    strip_forbidden(&head).replace(' ', "_")
}

/// Author component of a folder name.
pub fn author_component(first_author: &str) -> String {
    strip_forbidden(first_author).replace(' ', "")
}

/// Build a folder name from its parts.
///
/// # Example
///
/// ```
/// use folio_core::naming::folder_name;
///
/// assert_eq!(folder_name("Smith", Some(2024), "Understanding AI"), "Smith2024_Understanding_AI");
/// assert_eq!(folder_name("van Dijk", None, ""), "vanDijknd_Untitled");
/// ```
pub fn folder_name(first_author: &str, year: Option<i32>, title: &str) -> String {
    let year = year
        .map(|y| y.to_string())
        .unwrap_or_else(|| defaults::UNKNOWN_YEAR.to_string());
    format!(
        "{}{}_{}",
        author_component(first_author),
        year,
        title_component(title)
    )
}

/// Sanitize an arbitrary filename (artifact copies).
///
/// Path separators and forbidden characters become `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if FORBIDDEN_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}
