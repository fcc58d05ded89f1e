//! Snake-case naming convention for destination identifiers.
//!
//! Used as the default column projection for property names and to derive
//! table names from database titles.

use once_cell::sync::Lazy;
use regex::Regex;

static CAMEL_BOUNDARY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\p{Ll}\p{N}])(\p{Lu})").unwrap()
});

// Letters and digits of any script survive; everything else is a separator.
static NON_ALPHANUMERIC_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\p{L}\p{N}]+").unwrap()
});

/// Normalize an arbitrary name into a `snake_case` identifier.
///
/// `"Due Date"` → `"due_date"`, `"createdAt"` → `"created_at"`,
/// `"2024 Budget"` → `"_2024_budget"`, `"Priorität"` → `"priorität"`. Names with
/// no letter or digit map to `"_"`.
pub fn normalize_identifier(name: &str) -> String {
    let split = CAMEL_BOUNDARY_REGEX.replace_all(name.trim(), "${1}_${2}");
    let lowered = split.to_lowercase();
    let collapsed = NON_ALPHANUMERIC_REGEX.replace_all(&lowered, "_");
    let trimmed = collapsed.trim_matches('_');

    if trimmed.is_empty() {
        return String::from("_");
    }

    if trimmed.starts_with(char::is_numeric) {
        format!("_{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_names() {
        assert_eq!(normalize_identifier("Name"), "name");
        assert_eq!(normalize_identifier("Status"), "status");
        assert_eq!(normalize_identifier("  Due Date "), "due_date");
    }

    #[test]
    fn test_punctuation_collapses() {
        assert_eq!(normalize_identifier("Owner / Team"), "owner_team");
        assert_eq!(normalize_identifier("due-date"), "due_date");
        assert_eq!(normalize_identifier("Cost ($)"), "cost");
    }

    #[test]
    fn test_camel_case_splits() {
        assert_eq!(normalize_identifier("createdAt"), "created_at");
        assert_eq!(normalize_identifier("lastEditedBy"), "last_edited_by");
    }

    #[test]
    fn test_leading_digit_and_empty() {
        assert_eq!(normalize_identifier("2024 Budget"), "_2024_budget");
        assert_eq!(normalize_identifier("🚀"), "_");
    }

    #[test]
    fn test_non_ascii_letters_are_kept() {
        assert_eq!(normalize_identifier("Café"), "café");
        assert_eq!(normalize_identifier("Priorität"), "priorität");
        assert_eq!(normalize_identifier("Größe (cm)"), "größe_cm");
        assert_eq!(normalize_identifier("名前"), "名前");
        assert_eq!(normalize_identifier("状態"), "状態");
        assert_eq!(normalize_identifier("Статус задачи"), "статус_задачи");
        assert_eq!(normalize_identifier("fechaDeEntrega"), "fecha_de_entrega");
        assert_eq!(normalize_identifier("éTat"), "é_tat");
    }

    #[test]
    fn test_distinct_names_can_collide() {
        assert_eq!(normalize_identifier("Due Date"), normalize_identifier("due_date"));
    }
}
