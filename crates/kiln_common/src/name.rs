//! Identifier rules shared by plan validation and reference scanning.
//!
//! Target names are identifier-like so that a scan of a command's text can
//! find them: letters, digits, `_` and `.`, not starting with a digit.

/// Returns `true` if `c` may start an identifier.
pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

/// Returns `true` if `c` may continue an identifier.
pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Returns `true` if `name` is a valid target name.
pub fn is_valid_target_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(is_ident_char),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(is_valid_target_name("data"));
        assert!(is_valid_target_name("model_16"));
        assert!(is_valid_target_name("_private"));
        assert!(is_valid_target_name("fit.v2"));
    }

    #[test]
    fn invalid_names() {
        assert!(!is_valid_target_name(""));
        assert!(!is_valid_target_name("16model"));
        assert!(!is_valid_target_name("has space"));
        assert!(!is_valid_target_name("dash-ed"));
    }
}
