/// Rendered for a cell with no contributing observation.
pub const PLACEHOLDER: &str = "–";

/// Round half away from zero, then group thousands with commas.
pub fn format_value(value: f64) -> String {
    let rounded = value.round();
    // -0.4 rounds to -0; render it as plain zero
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    group_thousands(rounded as i64)
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Cell text for an optional value.
pub fn format_cell(value: Option<f64>) -> String {
    value.map(format_value).unwrap_or_else(|| PLACEHOLDER.to_string())
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
