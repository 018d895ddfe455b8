//! Identifier conventions for generated FK columns.

/// Convert a display name to snake_case: `userProfile` -> `user_profile`,
/// `Order Items` -> `order_items`.
pub fn to_snake(s: &str) -> String {
    let mut spaced = String::with_capacity(s.len() + 4);
    for ch in s.trim().chars() {
        if ch.is_ascii_uppercase() {
            spaced.push('_');
            spaced.push(ch);
        } else if ch.is_whitespace() || ch == '-' {
            spaced.push('_');
        } else {
            spaced.push(ch);
        }
    }

    let mut out = String::with_capacity(spaced.len());
    for ch in spaced.chars() {
        if ch == '_' && out.ends_with('_') {
            continue;
        }
        out.push(ch);
    }

    out.trim_matches('_').to_lowercase()
}

/// Name of the FK column that stores keys of `parent_table.parent_column`.
pub fn fk_column_name(parent_table: &str, parent_column: &str) -> String {
    format!("{}_{}", to_snake(parent_table), to_snake(parent_column))
}
