use std::fmt::Display;

/// Cell text shown when a node has no ETX value.
pub const ETX_PLACEHOLDER: &str = "\u{2014}";

/// Renders an ETX cell. The metric is shown exactly as received; only a
/// missing value maps to the placeholder, so `Some(0)` stays `"0"`.
pub fn format_etx<N: Display>(value: Option<N>) -> String {
    value.map_or_else(|| ETX_PLACEHOLDER.to_string(), |metric| metric.to_string())
}

pub fn format_count(value: usize) -> String {
    if value == 0 {
        "-".to_string()
    } else {
        value.to_string()
    }
}
