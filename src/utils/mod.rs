//! Utility functions and helpers.

use std::path::{Path, PathBuf};

/// Escape text for HTML element content and quoted attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Format an amount with thousands separators; fractions keep two digits.
pub fn format_amount(amount: f64) -> String {
    let negative = amount < 0.0;
    let amount = amount.abs();
    let (whole, fraction) = if amount.fract() == 0.0 {
        (format!("{amount:.0}"), String::new())
    } else {
        let fixed = format!("{amount:.2}");
        match fixed.split_once('.') {
            Some((w, f)) => (w.to_string(), format!(".{f}")),
            None => (fixed, String::new()),
        }
    };

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}{}", if negative { "-" } else { "" }, grouped, fraction)
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_path(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom & Jerry's"</b>"#),
            "&lt;b&gt;&quot;Tom &amp; Jerry&#39;s&quot;&lt;/b&gt;"
        );
        assert_eq!(escape_html("范五老街"), "范五老街");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(36000.0), "36,000");
        assert_eq!(format_amount(3600000.0), "3,600,000");
        assert_eq!(format_amount(500.0), "500");
        assert_eq!(format_amount(0.28), "0.28");
        assert_eq!(format_amount(1234.5), "1,234.50");
        assert_eq!(format_amount(-1000.0), "-1,000");
    }

    #[test]
    fn test_resolve_path() {
        let base = Path::new("storage");
        assert_eq!(resolve_path(base, "dist"), PathBuf::from("storage/dist"));
        assert_eq!(resolve_path(base, "/tmp/x"), PathBuf::from("/tmp/x"));
    }
}
