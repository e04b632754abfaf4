//! Formatted output helpers for CLI commands.

use std::collections::BTreeMap;

/// Underlines a title with a double rule of the same width.
#[must_use]
pub fn heading(title: &str) -> String {
    let rule = "\u{2550}".repeat(title.chars().count());
    format!("{title}\n{rule}")
}

/// Formats a count with a naive English plural (e.g., "3 units").
#[must_use]
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Renders the selected attributes as `  key=value` pairs, in `keys` order.
#[must_use]
pub fn summarize_attributes(attributes: &BTreeMap<String, String>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| attributes.get(*key).map(|value| format!("  {key}={value}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_rule_matches_title_width() {
        assert_eq!(heading("plan"), "plan\n\u{2550}\u{2550}\u{2550}\u{2550}");
    }

    #[test]
    fn plural_handles_one_and_many() {
        assert_eq!(plural(1, "unit"), "1 unit");
        assert_eq!(plural(0, "unit"), "0 units");
        assert_eq!(plural(3, "handle"), "3 handles");
    }

    #[test]
    fn summarize_keeps_requested_order() {
        let attributes = BTreeMap::from([
            ("port".to_string(), "5432".to_string()),
            ("cidr".to_string(), "10.0.0.0/16".to_string()),
            ("id".to_string(), "dev-shop-vpc".to_string()),
        ]);
        assert_eq!(
            summarize_attributes(&attributes, &["port", "cidr"]),
            "  port=5432  cidr=10.0.0.0/16"
        );
        assert_eq!(summarize_attributes(&attributes, &["capacity"]), "");
    }
}
