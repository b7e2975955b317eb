/// Parses a currency-ish cell text like `"$1,234.50"` into a number.
/// Unparsable input becomes 0 rather than an error; weekly exports are
/// messy and a bad cell must not abort the whole report.
pub fn parse_currency(text: &str) -> f64 {
    let cleaned: String = text.chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned.trim().parse().unwrap_or(0.0)
}

/// Parses a percentage cell text like `"60 %"` into a number (`60.0`).
/// Unparsable input becomes 0.
pub fn parse_percentage(text: &str) -> f64 {
    let cleaned: String = text.chars().filter(|c| *c != '%' && !c.is_whitespace()).collect();
    cleaned.parse().unwrap_or(0.0)
}
