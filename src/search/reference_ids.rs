use std::collections::BTreeSet;

/// Parse a loosely formatted list of document ids.
///
/// Everything except ASCII digits and `,` is discarded before splitting, so
/// `"12, 7a, -3, ,8"` yields `{3, 7, 8, 12}`. Empty tokens and values that do
/// not fit in a `u64` are dropped. Never fails; an input with no usable ids
/// gives an empty set.
pub fn parse_reference_ids(raw: &str) -> BTreeSet<u64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();

    cleaned
        .split(',')
        .filter(|token| !token.is_empty())
        .filter_map(|token| token.parse::<u64>().ok())
        .collect()
}
