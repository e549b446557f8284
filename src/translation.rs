//! Placeholder scanning.
//!
//! Statements are rendered with anonymous `?` placeholders. PostgreSQL wants
//! `$1, $2, ...`; [`numbered_placeholders`] rewrites them, leaving quoted
//! literals, quoted identifiers and comments untouched.

use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment,
}

/// Byte offsets of every `?` placeholder outside literals and comments.
fn placeholder_positions(sql: &str) -> Vec<usize> {
    let bytes = sql.as_bytes();
    let mut positions = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    idx += 1;
                }
                b'?' => positions.push(idx),
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = State::Normal;
                    idx += 1;
                }
            }
        }
        idx += 1;
    }
    positions
}

/// Number of `?` placeholders a statement expects.
pub fn count_placeholders(sql: &str) -> usize {
    placeholder_positions(sql).len()
}

/// Rewrite `?` placeholders to `$1, $2, ...`, borrowing when there is nothing to rewrite.
pub fn numbered_placeholders(sql: &str) -> Cow<'_, str> {
    let positions = placeholder_positions(sql);
    if positions.is_empty() {
        return Cow::Borrowed(sql);
    }
    let mut out = String::with_capacity(sql.len() + positions.len() * 2);
    let mut last = 0;
    for (n, pos) in positions.iter().enumerate() {
        out.push_str(&sql[last..*pos]);
        out.push('$');
        out.push_str(&(n + 1).to_string());
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    Cow::Owned(out)
}
