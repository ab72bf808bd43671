//! Textual rewriting of fused-function bodies.
//!
//! Function bodies stay strings all the way through the pipeline; the
//! optimizer only ever renames variables and splices sub-expressions. The
//! helpers here do identifier-aware substitution so that renaming `x` never
//! touches `max` or `x_input_y`.

use crate::wire::Wire;

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replace every standalone occurrence of the identifier `var` in `body`.
///
/// An occurrence is standalone when it is not surrounded by identifier
/// characters, i.e. the textual equivalent of a word-boundary match.
pub(crate) fn subst_var(body: &str, var: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let rest = &body[i..];
        let preceded = i > 0 && is_ident_char(bytes[i - 1] as char);
        if !preceded && rest.starts_with(var) {
            let end = i + var.len();
            let followed = end < bytes.len() && is_ident_char(bytes[end] as char);
            if !followed {
                out.push_str(replacement);
                i = end;
                continue;
            }
        }
        let c = rest.chars().next().unwrap();
        out.push(c);
        i += c.len_utf8();
    }
    out
}

/// Stable textual token standing in for an external wire inside a lowered
/// expression. The trailing underscore keeps one token from being a prefix
/// of another, so a plain string replace is safe.
pub(crate) fn wire_token(wire: Wire) -> String {
    format!("_w{}_", wire.id().0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_standalone_identifiers_only() {
        assert_eq!(subst_var("x+y*x", "x", "q"), "q+y*q");
        assert_eq!(subst_var("max(x,y)", "x", "q"), "max(q,y)");
        assert_eq!(subst_var("x_input_y+x", "x", "q"), "x_input_y+q");
        assert_eq!(subst_var("sgn(x)-xx", "x", "q"), "sgn(q)-xx");
    }

    #[test]
    fn substitution_handles_start_and_end() {
        assert_eq!(subst_var("x", "x", "(a+b)"), "(a+b)");
        assert_eq!(subst_var("y+x", "x", "z"), "y+z");
    }

    #[test]
    fn multi_char_vars_replace_whole_words() {
        assert_eq!(
            subst_var("x_input_y+z", "x_input_y", "w"),
            "w+z"
        );
    }

    #[test]
    fn tokens_are_prefix_free() {
        use crate::graph::Circuit;
        use crate::wire::SignalType;
        let mut c = Circuit::new();
        let a = c.unconnected(SignalType::Number);
        let b = c.unconnected(SignalType::Number);
        let ta = wire_token(a);
        let tb = wire_token(b);
        assert!(!ta.starts_with(&tb) && !tb.starts_with(&ta));
    }
}
