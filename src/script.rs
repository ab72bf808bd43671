//! Embedded-script verification hook.
//!
//! The compiler treats script payloads as opaque: the real parser for the
//! host's scripting language lives outside this crate. What we do here is a
//! conservative structural pass — delimiter balance, string and comment
//! termination — plus a whitespace/comment minifier, so obviously broken
//! scripts fail the compile with a position instead of failing inside the
//! host. Verification errors surface as [`Error::Script`].

use crate::error::{Error, Result};

fn long_open(chars: &[char], at: usize) -> Option<usize> {
    if chars.get(at) != Some(&'[') {
        return None;
    }
    let mut level = 0;
    while chars.get(at + 1 + level) == Some(&'=') {
        level += 1;
    }
    if chars.get(at + 1 + level) == Some(&'[') {
        Some(level)
    } else {
        None
    }
}

fn long_close(chars: &[char], at: usize, level: usize) -> bool {
    chars.get(at) == Some(&']')
        && (0..level).all(|k| chars.get(at + 1 + k) == Some(&'='))
        && chars.get(at + 1 + level) == Some(&']')
}

/// Verify a script and, when `minify` is set, strip comments and blank
/// lines. The returned string is treated as opaque payload downstream.
pub fn verify_script(source: &str, minify: bool) -> Result<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    // Open delimiters with their positions, for the error message.
    let mut stack: Vec<(char, usize, usize)> = Vec::new();
    let mut line = 1usize;
    let mut column = 1usize;
    let mut i = 0usize;

    let err = |message: String, line: usize, column: usize| Error::Script {
        message,
        line,
        column,
    };

    macro_rules! advance {
        ($n:expr, $emit:expr) => {{
            for step in 0..$n {
                let c = chars[i + step];
                if $emit {
                    out.push(c);
                }
                if c == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }
            i += $n;
        }};
    }

    while i < chars.len() {
        let c = chars[i];
        // Comments: `--` then optionally a long bracket.
        if c == '-' && chars.get(i + 1) == Some(&'-') {
            if let Some(level) = long_open(&chars, i + 2) {
                let (start_line, start_column) = (line, column);
                advance!(4 + level, false);
                loop {
                    if i >= chars.len() {
                        return Err(err("unterminated comment".into(), start_line, start_column));
                    }
                    if long_close(&chars, i, level) {
                        advance!(2 + level, false);
                        break;
                    }
                    advance!(1, false);
                }
            } else {
                while i < chars.len() && chars[i] != '\n' {
                    advance!(1, false);
                }
            }
            continue;
        }
        // Quoted strings; backslash escapes, no embedded newlines.
        if c == '"' || c == '\'' {
            let (start_line, start_column) = (line, column);
            advance!(1, true);
            loop {
                if i >= chars.len() || chars[i] == '\n' {
                    return Err(err("unterminated string".into(), start_line, start_column));
                }
                if chars[i] == '\\' && i + 1 < chars.len() {
                    advance!(2, true);
                    continue;
                }
                if chars[i] == c {
                    advance!(1, true);
                    break;
                }
                advance!(1, true);
            }
            continue;
        }
        // Long strings pass through verbatim.
        if let Some(level) = long_open(&chars, i) {
            let (start_line, start_column) = (line, column);
            advance!(2 + level, true);
            loop {
                if i >= chars.len() {
                    return Err(err("unterminated string".into(), start_line, start_column));
                }
                if long_close(&chars, i, level) {
                    advance!(2 + level, true);
                    break;
                }
                advance!(1, true);
            }
            continue;
        }
        match c {
            '(' | '[' | '{' => stack.push((c, line, column)),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _, _)) if open == expected => {}
                    _ => return Err(err(format!("unbalanced delimiter '{}'", c), line, column)),
                }
            }
            _ => {}
        }
        advance!(1, true);
    }

    if let Some((open, line, column)) = stack.pop() {
        return Err(err(format!("unclosed delimiter '{}'", open), line, column));
    }

    if minify {
        let lines: Vec<&str> = out
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .collect();
        Ok(lines.join("\n"))
    } else {
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_script_passes_through() {
        let src = "function onTick()\n  local v = input.getNumber(1)\nend\n";
        let out = verify_script(src, false).unwrap();
        assert_eq!(out, src);
    }

    #[test]
    fn minify_strips_comments_and_blank_lines() {
        let src = "-- header comment\nlocal x = 1\n\nlocal y = 2 -- trailing\n";
        let out = verify_script(src, true).unwrap();
        assert_eq!(out, "local x = 1\nlocal y = 2");
    }

    #[test]
    fn unbalanced_parens_are_reported_with_position() {
        let err = verify_script("local x = (1 + 2\n", true).unwrap_err();
        match err {
            Error::Script { message, line, column } => {
                assert!(message.contains("unclosed"));
                assert_eq!(line, 1);
                assert_eq!(column, 11);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn mismatched_closer_is_an_error() {
        assert!(verify_script("local t = {1, 2)", true).is_err());
    }

    #[test]
    fn strings_may_contain_delimiters() {
        let out = verify_script("local s = \"a ) string ]\"", true).unwrap();
        assert!(out.contains("a ) string ]"));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(verify_script("local s = \"oops\n", true).is_err());
    }

    #[test]
    fn block_comments_are_stripped() {
        let src = "local x = 1\n--[[ multi\nline ]]local y = 2\n";
        let out = verify_script(src, true).unwrap();
        assert_eq!(out, "local x = 1\nlocal y = 2");
    }

    #[test]
    fn long_strings_survive_minification() {
        let src = "local s = [[keep\n  this ]]";
        let out = verify_script(src, true).unwrap();
        assert!(out.contains("keep"));
        assert!(out.contains("this"));
    }

    #[test]
    fn escaped_quotes_do_not_end_strings() {
        let out = verify_script("local s = \"a \\\" b\"", true).unwrap();
        assert_eq!(out, "local s = \"a \\\" b\"");
    }
}
