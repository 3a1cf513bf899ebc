//! `${name}` placeholders in command text.

use kiln_common::is_valid_target_name;

/// Iterates the names of all well-formed `${name}` placeholders in `text`.
pub fn placeholders(text: &str) -> impl Iterator<Item = &str> {
    Placeholders { rest: text }
}

struct Placeholders<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Placeholders<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        loop {
            let start = self.rest.find("${")?;
            let after = &self.rest[start + 2..];
            let Some(end) = after.find('}') else {
                self.rest = "";
                return None;
            };
            let name = after[..end].trim();
            self.rest = &after[end + 1..];
            if is_valid_target_name(name) {
                return Some(name);
            }
        }
    }
}

/// Rewrites each `${name}` placeholder for which `replace` returns `Some`.
///
/// Placeholders `replace` declines, and malformed ones, are kept verbatim.
pub fn substitute(text: &str, mut replace: impl FnMut(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = after[..end].trim();
        match is_valid_target_name(name).then(|| replace(name)).flatten() {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_placeholders() {
        let names: Vec<_> = placeholders("fit ${rec} --units ${ units } \"${data}\"").collect();
        assert_eq!(names, vec!["rec", "units", "data"]);
    }

    #[test]
    fn skips_malformed() {
        let names: Vec<_> = placeholders("echo ${1x} ${} ${ok} ${unterminated").collect();
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn substitute_selected() {
        let out = substitute("fit --units ${units} ${rec}", |name| {
            (name == "units").then(|| "16".to_string())
        });
        assert_eq!(out, "fit --units 16 ${rec}");
    }

    #[test]
    fn substitute_keeps_unterminated_tail() {
        let out = substitute("a ${x} b ${y", |_| Some("X".to_string()));
        assert_eq!(out, "a X b ${y");
    }

    #[test]
    fn substitute_without_placeholders_is_identity() {
        let text = "plain $HOME text";
        assert_eq!(substitute(text, |_| Some(String::new())), text);
    }
}
