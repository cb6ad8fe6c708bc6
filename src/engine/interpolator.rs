//! Variable interpolation.
//!
//! Expands `${...}` tokens against the variable store. A token is the
//! shortest brace-balanced span; its inner text is itself interpolated once
//! before lookup (single-pass substitution — the looked-up value is never
//! re-expanded). Missing names substitute the empty string; the engine's own
//! lookup path is where undefined-variable errors surface.
//!
//! Supports the `${name:-default}` form: the default is used when the lookup
//! is missing or empty.

use crate::services::variable::VariableService;

/// Expands all `${...}` tokens in `input` against the variable store.
pub fn interpolate(input: &str, vars: &VariableService) -> String {
    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];

        match find_balanced_close(after_open) {
            Some(end) => {
                let inner = &after_open[..end];
                // Inner braces expand first so `${user_${n}}` resolves the
                // index before the outer lookup.
                let token = interpolate(inner, vars);
                result.push_str(&resolve(&token, vars));
                rest = &after_open[end + 1..];
            }
            None => {
                // Unbalanced token: keep the text literally.
                result.push_str("${");
                rest = after_open;
            }
        }
    }

    result.push_str(rest);
    result
}

/// Finds the index of the `}` closing the token, accounting for nested `${`.
fn find_balanced_close(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'$' && i + 1 < bytes.len() && bytes[i + 1] == b'{' {
            depth += 1;
            i += 2;
            continue;
        }
        if bytes[i] == b'}' {
            if depth == 0 {
                return Some(i);
            }
            depth -= 1;
        }
        i += 1;
    }

    None
}

/// Resolves one token to its substitution text.
fn resolve(token: &str, vars: &VariableService) -> String {
    let (name, default) = match token.split_once(":-") {
        Some((name, default)) => (name, Some(default)),
        None => (token, None),
    };

    let value = vars.get(name).unwrap_or_default();
    if value.is_empty() {
        if let Some(default) = default {
            return default.to_string();
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::variable::VariableService;

    fn store(pairs: &[(&str, &str)]) -> VariableService {
        let vars = VariableService::new();
        for (k, v) in pairs {
            vars.set_system_variable(k, v).unwrap();
        }
        vars
    }

    #[test]
    fn test_plain_text_unchanged() {
        let vars = store(&[]);
        assert_eq!(interpolate("no tokens here", &vars), "no tokens here");
    }

    #[test]
    fn test_single_substitution() {
        let vars = store(&[("name", "world")]);
        assert_eq!(interpolate("hello ${name}", &vars), "hello world");
    }

    #[test]
    fn test_missing_name_becomes_empty() {
        let vars = store(&[]);
        assert_eq!(interpolate("[${missing}]", &vars), "[]");
    }

    #[test]
    fn test_multiple_tokens() {
        let vars = store(&[("a", "1"), ("b", "2")]);
        assert_eq!(interpolate("${a}+${b}=${c}", &vars), "1+2=");
    }

    #[test]
    fn test_interpolate_equals_get() {
        let vars = store(&[("n", "value")]);
        assert_eq!(interpolate("${n}", &vars), vars.get("n").unwrap());
    }

    #[test]
    fn test_nested_token_resolves_inner_first() {
        let vars = store(&[("idx", "2"), ("user_2", "alice")]);
        assert_eq!(interpolate("${user_${idx}}", &vars), "alice");
    }

    #[test]
    fn test_value_is_not_re_expanded() {
        // Single-pass: a value containing ${...} stays literal.
        let vars = store(&[("tricky", "${other}"), ("other", "nope")]);
        assert_eq!(interpolate("${tricky}", &vars), "${other}");
    }

    #[test]
    fn test_unbalanced_token_kept_literal() {
        let vars = store(&[("a", "1")]);
        assert_eq!(interpolate("${unclosed", &vars), "${unclosed");
        assert_eq!(interpolate("x ${a} ${", &vars), "x 1 ${");
    }

    #[test]
    fn test_default_used_when_missing() {
        let vars = store(&[]);
        assert_eq!(interpolate("${missing:-fallback}", &vars), "fallback");
    }

    #[test]
    fn test_default_used_when_empty() {
        let vars = store(&[("empty", "")]);
        assert_eq!(interpolate("${empty:-fallback}", &vars), "fallback");
    }

    #[test]
    fn test_default_ignored_when_set() {
        let vars = store(&[("set", "value")]);
        assert_eq!(interpolate("${set:-fallback}", &vars), "value");
    }

    #[test]
    fn test_no_embedded_braces_persist() {
        let vars = store(&[("a", "1")]);
        let out = interpolate("x${a}y${missing}z", &vars);
        assert!(!out.contains("${"));
        assert_eq!(out, "x1yz");
    }
}
