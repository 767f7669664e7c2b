//! Helpers for embedding values into R expressions.

use once_cell::sync::Lazy;
use regex::Regex;

/// CRAN package names: letters, digits and dots, starting with a letter,
/// not ending with a dot, at least two characters.
static PACKAGE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9.]*[A-Za-z0-9]$").unwrap());

/// Quote a value as a single-quoted R string literal.
pub fn r_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => {}
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Check that a name is a syntactically valid R package name.
pub fn is_valid_package_name(name: &str) -> bool {
    PACKAGE_NAME_RE.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_literal() {
        assert_eq!(r_string_literal("forecast"), "'forecast'");
        assert_eq!(
            r_string_literal("0b8f5e6a-1c2d.data"),
            "'0b8f5e6a-1c2d.data'"
        );
    }

    #[test]
    fn test_escapes_quotes_and_backslashes() {
        assert_eq!(r_string_literal("it's"), r"'it\'s'");
        assert_eq!(r_string_literal(r"C:\tmp"), r"'C:\\tmp'");
        assert_eq!(r_string_literal("a\nb"), r"'a\nb'");
    }

    #[test]
    fn test_injection_stays_inside_literal() {
        let lit = r_string_literal("x'); system('rm -rf /'); ('");
        assert!(lit.starts_with('\''));
        assert!(lit.ends_with('\''));
        // every inner quote is escaped
        let inner = &lit[1..lit.len() - 1];
        assert!(!inner.replace("\\'", "").contains('\''));
    }

    #[test]
    fn test_package_names() {
        assert!(is_valid_package_name("forecast"));
        assert!(is_valid_package_name("data.table"));
        assert!(is_valid_package_name("R6"));
        assert!(!is_valid_package_name("f"));
        assert!(!is_valid_package_name("1abc"));
        assert!(!is_valid_package_name("abc."));
        assert!(!is_valid_package_name("for'cast"));
        assert!(!is_valid_package_name(""));
    }
}
