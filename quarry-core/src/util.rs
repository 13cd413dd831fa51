use crate::ValueMap;

/// Join aliases that may prefix a column name without changing its meaning.
pub const JOIN_ALIASES: [&str; 3] = ["me.", "self.", "foreign."];

/// `me.name`, `self.name` and `foreign.name` all become `name`.
pub fn strip_alias(key: &str) -> &str {
    JOIN_ALIASES
        .iter()
        .find_map(|alias| key.strip_prefix(alias))
        .unwrap_or(key)
}

pub fn strip_aliases(data: ValueMap) -> ValueMap {
    data.into_iter()
        .map(|(k, v)| match strip_alias(&k) {
            stripped if stripped.len() != k.len() => (stripped.to_string(), v),
            _ => (k, v),
        })
        .collect()
}

/// Qualify `key` with `alias` unless it is already qualified by another alias.
///
/// `me.` counts as unqualified: it refers to the source being pivoted away from.
pub fn qualify(alias: &str, key: &str) -> String {
    if let Some(column) = key.strip_prefix("me.") {
        format!("{alias}.{column}")
    } else if key.contains('.') {
        key.to_string()
    } else {
        format!("{alias}.{key}")
    }
}

/// Splits `alias.column` into its parts, `None` for bare columns.
pub fn split_qualified(key: &str) -> Option<(&str, &str)> {
    key.split_once('.')
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}",
            &$query[..$query
                .char_indices()
                .map(|(i, _)| i)
                .nth(497)
                .unwrap_or($query.len())]
                .trim_end(),
            if $query.chars().count() > 497 { "..." } else { "" },
        )
    };
}
