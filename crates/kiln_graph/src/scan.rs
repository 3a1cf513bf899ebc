//! Static scan of command text.
//!
//! The scanner is deliberately shallow: it knows identifiers, quoted strings,
//! `${name}` interpolations and the `file_in("..")` / `file_out("..")` call
//! forms, and nothing else about the language the command is written in.
//!
//! - Identifiers outside string literals are *candidate* references; the graph
//!   builder keeps the ones that name a target.
//! - `${name}` is a *required* reference, recognised everywhere (including
//!   inside strings).
//! - `file_in` / `file_out` followed by a parenthesised string literal declare
//!   files.

use kiln_common::{is_ident_char, is_ident_start, is_valid_target_name};
use std::path::PathBuf;

/// What a scan of one command text found. Each list is in order of first
/// appearance without duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scan {
    /// Bare identifiers outside string literals.
    pub identifiers: Vec<String>,
    /// Names from `${name}` interpolations.
    pub required: Vec<String>,
    /// Paths from `file_in("..")`.
    pub file_inputs: Vec<PathBuf>,
    /// Paths from `file_out("..")`.
    pub file_outputs: Vec<PathBuf>,
}

/// Scans `text` for references and file declarations.
pub fn scan(text: &str) -> Scan {
    let chars: Vec<char> = text.chars().collect();
    let mut scan = Scan::default();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '$' && chars.get(i + 1) == Some(&'{') {
            i = interpolation(&chars, i, &mut scan);
        } else if c == '"' || c == '\'' {
            i = string_literal(&chars, i, &mut scan).1;
        } else if c.is_ascii_digit() {
            // Numbers like `16` or `1e3` are not identifiers.
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
        } else if is_ident_start(c) {
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            let declared = match ident.as_str() {
                "file_in" | "file_out" => call_argument(&chars, i, &mut scan),
                _ => None,
            };
            match declared {
                Some((path, end)) => {
                    let list = if ident == "file_in" {
                        &mut scan.file_inputs
                    } else {
                        &mut scan.file_outputs
                    };
                    push_unique(list, PathBuf::from(path));
                    i = end;
                }
                None => push_unique(&mut scan.identifiers, ident),
            }
        } else {
            i += 1;
        }
    }
    scan
}

/// Handles `${...}` starting at `start`; returns the index after it.
fn interpolation(chars: &[char], start: usize, scan: &mut Scan) -> usize {
    let body_start = start + 2;
    let Some(len) = chars[body_start..].iter().position(|&c| c == '}') else {
        return chars.len();
    };
    let name: String = chars[body_start..body_start + len].iter().collect();
    let name = name.trim();
    if is_valid_target_name(name) {
        push_unique(&mut scan.required, name.to_string());
    }
    body_start + len + 1
}

/// Reads a string literal opened at `start`. Returns its contents and the index
/// after the closing quote. Interpolations inside are still recorded.
fn string_literal(chars: &[char], start: usize, scan: &mut Scan) -> (String, usize) {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' && i + 1 < chars.len() {
            out.push(chars[i + 1]);
            i += 2;
        } else if c == quote {
            return (out, i + 1);
        } else if c == '$' && chars.get(i + 1) == Some(&'{') {
            let end = interpolation(chars, i, scan);
            out.extend(&chars[i..end.min(chars.len())]);
            i = end;
        } else {
            out.push(c);
            i += 1;
        }
    }
    (out, chars.len())
}

/// Parses `( "literal" )` after a `file_in`/`file_out` identifier.
fn call_argument(chars: &[char], mut i: usize, scan: &mut Scan) -> Option<(String, usize)> {
    i = skip_whitespace(chars, i);
    if chars.get(i) != Some(&'(') {
        return None;
    }
    i = skip_whitespace(chars, i + 1);
    match chars.get(i) {
        Some('"') | Some('\'') => {}
        _ => return None,
    }
    let (path, after) = string_literal(chars, i, scan);
    let close = skip_whitespace(chars, after);
    if chars.get(close) != Some(&')') {
        return None;
    }
    Some((path, close + 1))
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}
