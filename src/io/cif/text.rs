// src/io/cif/text.rs
//
// Line level helpers shared by the block and loop parsers.

use crate::error::{CifError, Result};

fn is_quote(c: char) -> bool {
    c == '\'' || c == '"'
}

/// Remove a trailing `#` comment. A `#` only starts a comment at the beginning of a
/// token and outside of quotes.
pub fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = line.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let at_token_start = prev.is_none_or(char::is_whitespace);
        match quote {
            Some(q) => {
                let next_is_space = chars.peek().is_none_or(|(_, n)| n.is_whitespace());
                if c == q && next_is_space {
                    quote = None;
                }
            }
            None if is_quote(c) && at_token_start => quote = Some(c),
            None if c == '#' && at_token_start => return line[..i].trim_end(),
            None => {}
        }
        prev = Some(c);
    }
    line
}

/// Strip comments from every line that is not part of a `;` text field.
pub fn strip_comments<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    let mut in_text = false;
    lines
        .iter()
        .map(|&line| {
            if line.starts_with(';') {
                in_text = !in_text;
                return line;
            }
            if in_text {
                line
            } else {
                strip_comment(line)
            }
        })
        .collect()
}

/// Split a data line into raw tokens. Quoted tokens keep their quotes; a quote only
/// closes the token when followed by whitespace, so `'O'Brian's'` stays one token.
pub fn tokenize_line(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        if is_quote(chars[i]) {
            let q = chars[i];
            let mut j = i + 1;
            let mut end = None;
            while j < chars.len() {
                if chars[j] == q && (j + 1 == chars.len() || chars[j + 1].is_whitespace()) {
                    end = Some(j);
                    break;
                }
                j += 1;
            }
            // an unterminated quote swallows the rest of the line
            let stop = end.map_or(chars.len(), |e| e + 1);
            tokens.push(chars[start..stop].iter().collect());
            i = stop;
        } else {
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            tokens.push(chars[start..i].iter().collect());
        }
    }

    tokens
}

/// Read a `;` delimited text field whose opening line is `lines[start]`.
///
/// Returns the text and the index of the first line after the closing `;`.
pub fn parse_multiline_string(lines: &[&str], start: usize) -> Result<(String, usize)> {
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.starts_with(';'))
        .map(|offset| start + 1 + offset)
        .ok_or(CifError::UnterminatedText { line: start + 1 })?;

    let mut content: Vec<&str> = Vec::with_capacity(end - start);
    let opening = lines[start][1..].trim_end();
    if !opening.trim().is_empty() {
        content.push(opening);
    }
    content.extend(lines[start + 1..end].iter().map(|l| l.trim_end()));

    while content.first().is_some_and(|l| l.trim().is_empty()) {
        content.remove(0);
    }
    while content.last().is_some_and(|l| l.trim().is_empty()) {
        content.pop();
    }

    Ok((content.join("\n"), end + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_outside_quotes() {
        assert_eq!(strip_comment("_key value # comment"), "_key value");
        assert_eq!(strip_comment("_key 'a # b'"), "_key 'a # b'");
        assert_eq!(strip_comment("# whole line"), "");
        assert_eq!(strip_comment("_key C#1"), "_key C#1");
    }

    #[test]
    fn text_fields_keep_hashes() {
        let lines = ["_a 1 # x", ";", "text # kept", ";", "_b 2 #y"];
        assert_eq!(
            strip_comments(&lines),
            vec!["_a 1", ";", "text # kept", ";", "_b 2"]
        );
    }

    #[test]
    fn tokens_with_embedded_quotes() {
        assert_eq!(
            tokenize_line("C1 'O'Brian's' \"x y\" 1.5(3)"),
            vec!["C1", "'O'Brian's'", "\"x y\"", "1.5(3)"]
        );
    }

    #[test]
    fn multiline_string() {
        let lines = ["_text", ";", "", "first", "second", "", ";", "_next 1"];
        let (text, next) = parse_multiline_string(&lines, 1).unwrap();
        assert_eq!(text, "first\nsecond");
        assert_eq!(next, 7);
    }

    #[test]
    fn multiline_string_opening_text() {
        let lines = [";inline start", "more", ";"];
        let (text, next) = parse_multiline_string(&lines, 0).unwrap();
        assert_eq!(text, "inline start\nmore");
        assert_eq!(next, 3);
    }

    #[test]
    fn unterminated_multiline_string() {
        let lines = [";", "never closed"];
        assert!(matches!(
            parse_multiline_string(&lines, 0),
            Err(CifError::UnterminatedText { line: 1 })
        ));
    }
}
