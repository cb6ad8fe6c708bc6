//! Command-line parsing.
//!
//! Splits an interpolated command line into `(name, options, input)` according
//! to the command's declared parse mode. Handles:
//! - Bracket option blocks: `\set[name=value, other="quoted, value"]`
//! - Quoted values with escape sequences
//! - Escaped commas in bare values
//! - Nested arrays in WithOptions mode: `keywords=[\get,\set]`

use std::collections::HashMap;

use crate::error::{NeuroError, Result};

/// How the text after a command name is split into options and input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// No options; the remainder is input verbatim.
    Raw,
    /// Optional `[key=value, ...]` block; the rest is input.
    KeyValue,
    /// Like KeyValue, plus nested `[a,b,c]` array values.
    WithOptions,
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Command name without the leading backslash.
    pub name: String,
    /// Parsed option block (empty for Raw mode or when absent).
    pub options: HashMap<String, String>,
    /// Everything after the option block (or after the name).
    pub input: String,
}

/// Extracts the command name from a raw line: the text between the leading
/// backslash and the first `[` or whitespace. Returns `None` for lines that
/// do not start with a backslash or have no name.
pub fn command_name(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('\\')?;
    let end = rest
        .find(|c: char| c == '[' || c.is_whitespace())
        .unwrap_or(rest.len());
    let name = &rest[..end];
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Parses a full command line according to the given parse mode.
///
/// The line must start with a backslash; the engine rewrites free text to
/// `\send ...` before parsing.
pub fn parse_command(line: &str, mode: ParseMode) -> Result<ParsedCommand> {
    let name = command_name(line)
        .ok_or_else(|| NeuroError::parse(format!("not a command line: {:?}", line)))?
        .to_string();

    let after_name = &line[1 + name.len()..];

    match mode {
        ParseMode::Raw => Ok(ParsedCommand {
            name,
            options: HashMap::new(),
            input: strip_separator(after_name).to_string(),
        }),
        ParseMode::KeyValue => parse_with_bracket_block(name, after_name, false),
        ParseMode::WithOptions => parse_with_bracket_block(name, after_name, true),
    }
}

/// Removes the single separator space between the name (or `]`) and the input.
fn strip_separator(s: &str) -> &str {
    s.strip_prefix(' ').unwrap_or(s)
}

fn parse_with_bracket_block(
    name: String,
    after_name: &str,
    allow_arrays: bool,
) -> Result<ParsedCommand> {
    if !after_name.starts_with('[') {
        return Ok(ParsedCommand {
            name,
            options: HashMap::new(),
            input: strip_separator(after_name).to_string(),
        });
    }

    let (options, consumed) = parse_bracket_block(&name, after_name, allow_arrays)?;
    let input = strip_separator(&after_name[consumed..]).to_string();

    Ok(ParsedCommand {
        name,
        options,
        input,
    })
}

/// Parses a `[key=value, ...]` block starting at `block[0] == '['`.
///
/// Returns the option map and the number of bytes consumed including the
/// closing bracket.
fn parse_bracket_block(
    command: &str,
    block: &str,
    allow_arrays: bool,
) -> Result<(HashMap<String, String>, usize)> {
    let mut options = HashMap::new();
    let mut chars = block.char_indices().peekable();
    chars.next(); // consume '['

    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut closed_at = None;

    while let Some((idx, c)) = chars.next() {
        match c {
            ']' => {
                closed_at = Some(idx + 1);
                break;
            }
            ',' => {
                push_option(&mut options, &mut key, &mut value, &mut in_value);
            }
            '=' if !in_value => {
                in_value = true;
            }
            '"' if in_value && value.is_empty() => {
                value = collect_quoted(&mut chars, command)?;
            }
            '[' if allow_arrays && in_value && value.is_empty() => {
                value = collect_array(&mut chars, command)?;
            }
            '\\' => {
                // Escapes protect separators in bare values; any other
                // backslash stays literal (command names appear in values).
                match chars.peek().map(|&(_, n)| n) {
                    Some(n @ (',' | ']' | '\\')) => {
                        chars.next();
                        if in_value {
                            value.push(n);
                        } else {
                            key.push(n);
                        }
                    }
                    _ => {
                        if in_value {
                            value.push('\\');
                        } else {
                            key.push('\\');
                        }
                    }
                }
            }
            _ => {
                if in_value {
                    value.push(c);
                } else {
                    key.push(c);
                }
            }
        }
    }

    let consumed = closed_at.ok_or_else(|| {
        NeuroError::parse(format!("\\{}: unclosed option block", command))
    })?;

    push_option(&mut options, &mut key, &mut value, &mut in_value);

    Ok((options, consumed))
}

/// Commits the current key/value pair to the option map, if any.
///
/// A token without `=` becomes a key with an empty value (`\get[name]`).
fn push_option(
    options: &mut HashMap<String, String>,
    key: &mut String,
    value: &mut String,
    in_value: &mut bool,
) {
    let k = key.trim().to_string();
    if !k.is_empty() {
        options.insert(k, std::mem::take(value));
    } else {
        value.clear();
    }
    key.clear();
    *in_value = false;
}

/// Collects characters inside double quotes, handling escape sequences.
fn collect_quoted(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    command: &str,
) -> Result<String> {
    let mut result = String::new();
    let mut escaped = false;

    for (_, c) in chars.by_ref() {
        if escaped {
            match c {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                'r' => result.push('\r'),
                '\\' => result.push('\\'),
                '"' => result.push('"'),
                _ => {
                    // Unknown escape, keep as-is
                    result.push('\\');
                    result.push(c);
                }
            }
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => return Ok(result),
            _ => result.push(c),
        }
    }

    Err(NeuroError::parse(format!(
        "\\{}: unterminated quoted value",
        command
    )))
}

/// Collects a nested `[a,b,c]` array value, returning its inner text.
fn collect_array(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    command: &str,
) -> Result<String> {
    let mut result = String::new();
    let mut depth = 1usize;

    for (_, c) in chars.by_ref() {
        match c {
            '[' => {
                depth += 1;
                result.push(c);
            }
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(result);
                }
                result.push(c);
            }
            _ => result.push(c),
        }
    }

    Err(NeuroError::parse(format!(
        "\\{}: unterminated array value",
        command
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_command_name_plain() {
        assert_eq!(command_name("\\set[x=1]"), Some("set"));
        assert_eq!(command_name("\\bash ls -la"), Some("bash"));
        assert_eq!(command_name("\\quit"), Some("quit"));
    }

    #[test]
    fn test_command_name_rejects_non_commands() {
        assert_eq!(command_name("hello world"), None);
        assert_eq!(command_name("\\"), None);
        assert_eq!(command_name("\\[x=1]"), None);
    }

    #[test]
    fn test_parse_raw_keeps_input_verbatim() {
        let parsed = parse_command("\\bash ls -la  | wc", ParseMode::Raw).unwrap();
        assert_eq!(parsed.name, "bash");
        assert!(parsed.options.is_empty());
        assert_eq!(parsed.input, "ls -la  | wc");
    }

    #[test]
    fn test_parse_raw_keeps_bracket_text() {
        let parsed = parse_command("\\try \\get[missing]", ParseMode::Raw).unwrap();
        assert_eq!(parsed.input, "\\get[missing]");
    }

    #[test]
    fn test_parse_key_value_single_pair() {
        let parsed = parse_command("\\set[name=value]", ParseMode::KeyValue).unwrap();
        assert_eq!(parsed.options, opts(&[("name", "value")]));
        assert_eq!(parsed.input, "");
    }

    #[test]
    fn test_parse_key_value_multiple_pairs() {
        let parsed =
            parse_command("\\model-new[name=fast, provider=openai]", ParseMode::KeyValue).unwrap();
        assert_eq!(parsed.options, opts(&[("name", "fast"), ("provider", "openai")]));
    }

    #[test]
    fn test_parse_key_value_bare_key() {
        let parsed = parse_command("\\get[target_var]", ParseMode::KeyValue).unwrap();
        assert_eq!(parsed.options, opts(&[("target_var", "")]));
    }

    #[test]
    fn test_parse_key_value_with_input_after_block() {
        let parsed = parse_command("\\if[condition=true] \\set[x=1]", ParseMode::KeyValue).unwrap();
        assert_eq!(parsed.options, opts(&[("condition", "true")]));
        assert_eq!(parsed.input, "\\set[x=1]");
    }

    #[test]
    fn test_parse_key_value_no_block_is_all_input() {
        let parsed = parse_command("\\session-add-usermsg hello there", ParseMode::KeyValue).unwrap();
        assert!(parsed.options.is_empty());
        assert_eq!(parsed.input, "hello there");
    }

    #[test]
    fn test_parse_quoted_value_with_comma() {
        let parsed =
            parse_command("\\set[msg=\"hello, world\"]", ParseMode::KeyValue).unwrap();
        assert_eq!(parsed.options, opts(&[("msg", "hello, world")]));
    }

    #[test]
    fn test_parse_quoted_value_escape_sequences() {
        let parsed =
            parse_command(r#"\set[msg="line1\nline2\t\"quoted\""]"#, ParseMode::KeyValue).unwrap();
        assert_eq!(
            parsed.options,
            opts(&[("msg", "line1\nline2\t\"quoted\"")])
        );
    }

    #[test]
    fn test_parse_escaped_comma_in_bare_value() {
        let parsed = parse_command(r"\set[csv=a\,b\,c]", ParseMode::KeyValue).unwrap();
        assert_eq!(parsed.options, opts(&[("csv", "a,b,c")]));
    }

    #[test]
    fn test_parse_backslash_kept_literal_in_value() {
        let parsed = parse_command(r"\set[cmd=\get]", ParseMode::KeyValue).unwrap();
        assert_eq!(parsed.options, opts(&[("cmd", "\\get")]));
    }

    #[test]
    fn test_parse_unclosed_block_fails() {
        let err = parse_command("\\set[name=value", ParseMode::KeyValue).unwrap_err();
        assert!(matches!(err, NeuroError::Parse(_)));
        assert!(err.to_string().contains("unclosed"));
    }

    #[test]
    fn test_parse_unterminated_quote_fails() {
        let err = parse_command("\\set[msg=\"oops]", ParseMode::KeyValue).unwrap_err();
        assert!(matches!(err, NeuroError::Parse(_)));
    }

    #[test]
    fn test_parse_with_options_array_value() {
        let parsed =
            parse_command(r"\help[keywords=[\get,\set]]", ParseMode::WithOptions).unwrap();
        assert_eq!(parsed.options, opts(&[("keywords", r"\get,\set")]));
    }

    #[test]
    fn test_parse_with_options_nested_array() {
        let parsed =
            parse_command(r"\help[keywords=[a,[b,c]]]", ParseMode::WithOptions).unwrap();
        assert_eq!(parsed.options, opts(&[("keywords", "a,[b,c]")]));
    }

    #[test]
    fn test_parse_key_value_does_not_nest_arrays() {
        // In KeyValue mode the inner bracket closes the block at the first ']'.
        let parsed = parse_command(r"\set[v=[a]", ParseMode::KeyValue).unwrap();
        assert_eq!(parsed.options, opts(&[("v", "[a")]));
    }

    #[test]
    fn test_parse_empty_block() {
        let parsed = parse_command("\\vars[]", ParseMode::KeyValue).unwrap();
        assert!(parsed.options.is_empty());
        assert_eq!(parsed.input, "");
    }

    #[test]
    fn test_parse_whitespace_around_keys() {
        let parsed = parse_command("\\set[ a=1 , b=2 ]", ParseMode::KeyValue).unwrap();
        assert_eq!(parsed.options, opts(&[("a", "1 "), ("b", "2 ")]));
    }

    #[test]
    fn test_roundtrip_equivalent_mapping() {
        // Parsing then re-serializing an option block yields an equivalent
        // mapping, independent of key order.
        let parsed =
            parse_command("\\set[b=2, a=1]", ParseMode::KeyValue).unwrap();
        let mut pairs: Vec<String> = parsed
            .options
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();
        let reserialized = format!("\\set[{}]", pairs.join(", "));
        let reparsed = parse_command(&reserialized, ParseMode::KeyValue).unwrap();
        assert_eq!(parsed.options, reparsed.options);
    }
}
