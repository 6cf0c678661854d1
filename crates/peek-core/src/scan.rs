//! Balanced-delimiter scanning over source text.
//!
//! Every helper here walks "code bytes": bytes outside string, byte-string, raw-string and
//! quoted-char literals and comments, so delimiters inside them never affect nesting.

/// Iterator over the code bytes of a text, yielding `(byte_index, byte)`.
pub struct CodeBytes<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> CodeBytes<'a> {
    pub fn new(text: &'a str, start: usize) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: start,
        }
    }

    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    fn raw_string_end(&self, idx: usize) -> Option<usize> {
        let bytes = self.bytes;
        if idx > 0 && is_ident_byte(bytes[idx - 1]) {
            let prefixed = bytes[idx - 1] == b'b' && (idx < 2 || !is_ident_byte(bytes[idx - 2]));
            if !prefixed {
                return None;
            }
        }
        let mut cursor = idx + 1;
        while bytes.get(cursor) == Some(&b'#') {
            cursor += 1;
        }
        if bytes.get(cursor) != Some(&b'"') {
            return None;
        }
        let hashes = cursor - idx - 1;
        cursor += 1;
        while cursor < bytes.len() {
            if bytes[cursor] == b'"'
                && bytes[cursor + 1..].iter().take(hashes).filter(|b| **b == b'#').count() == hashes
            {
                return Some(cursor + 1 + hashes);
            }
            cursor += 1;
        }
        Some(bytes.len())
    }
}

impl Iterator for CodeBytes<'_> {
    type Item = (usize, u8);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let idx = self.pos;
            let byte = *self.bytes.get(idx)?;
            match byte {
                b'"' => {
                    self.pos = quoted_end(self.bytes, idx, b'"').unwrap_or(self.bytes.len());
                }
                b'\'' => match quoted_end(self.bytes, idx, b'\'') {
                    Some(end) => self.pos = end,
                    // a lone quote is a lifetime marker
                    None => {
                        self.pos += 1;
                        return Some((idx, byte));
                    }
                },
                b'/' if self.bytes.get(idx + 1) == Some(&b'/') => {
                    self.pos = self.bytes[idx..]
                        .iter()
                        .position(|b| *b == b'\n')
                        .map_or(self.bytes.len(), |offset| idx + offset);
                }
                b'/' if self.bytes.get(idx + 1) == Some(&b'*') => {
                    self.pos = block_comment_end(self.bytes, idx);
                }
                b'r' => match self.raw_string_end(idx) {
                    Some(end) => self.pos = end,
                    None => {
                        self.pos += 1;
                        return Some((idx, byte));
                    }
                },
                _ => {
                    self.pos += 1;
                    return Some((idx, byte));
                }
            }
        }
    }
}

/// Index just past the `*/` closing the comment opened at `open`. Block comments nest.
fn block_comment_end(bytes: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    let mut cursor = open;
    while cursor + 1 < bytes.len() {
        match &bytes[cursor..cursor + 2] {
            b"/*" => {
                depth += 1;
                cursor += 2;
            }
            b"*/" => {
                depth -= 1;
                cursor += 2;
                if depth == 0 {
                    return cursor;
                }
            }
            _ => cursor += 1,
        }
    }
    bytes.len()
}

/// Index just past the closing quote of the literal opening at `open`.
fn quoted_end(bytes: &[u8], open: usize, quote: u8) -> Option<usize> {
    if quote == b'\'' {
        return char_literal_end(bytes, open);
    }
    let mut cursor = open + 1;
    while cursor < bytes.len() {
        match bytes[cursor] {
            b'\\' => cursor += 2,
            b if b == quote => return Some(cursor + 1),
            _ => cursor += 1,
        }
    }
    None
}

/// `'x'`, `'\n'`, `'\u{1F600}'`; anything else starting with a quote is a lifetime.
fn char_literal_end(bytes: &[u8], open: usize) -> Option<usize> {
    let first = *bytes.get(open + 1)?;
    if first == b'\\' {
        let window = bytes.len().min(open + 12);
        return (open + 3..window)
            .find(|idx| bytes[*idx] == b'\'')
            .map(|idx| idx + 1);
    }
    let width = match first {
        b'\'' | b'\n' => return None,
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    };
    let close = open + 1 + width;
    (bytes.get(close) == Some(&b'\'')).then_some(close + 1)
}

pub fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte >= 0x80
}

pub(crate) fn closer_for(open: u8) -> Option<u8> {
    match open {
        b'(' => Some(b')'),
        b'[' => Some(b']'),
        b'{' => Some(b'}'),
        _ => None,
    }
}

/// Find the delimiter closing the one at `open`, honouring nesting of all three bracket kinds.
///
/// Returns `None` when the text ends first or a mismatched closer shows up.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    closer_for(*text.as_bytes().get(open)?)?;
    let mut expected = Vec::new();
    for (idx, byte) in CodeBytes::new(text, open) {
        match byte {
            b'(' | b'[' | b'{' => expected.push(closer_for(byte)?),
            b')' | b']' | b'}' => {
                if expected.pop() != Some(byte) {
                    return None;
                }
                if expected.is_empty() {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on `sep` occurrences that sit outside any bracket.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, byte) in CodeBytes::new(text, 0) {
        match byte {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b if b == sep && depth == 0 => {
                parts.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

pub fn contains_top_level(text: &str, sep: u8) -> bool {
    split_top_level(text, sep).len() > 1
}

/// Openers minus closers over the code bytes of `text`.
pub fn net_depth(text: &str) -> i64 {
    CodeBytes::new(text, 0).fold(0, |depth, (_, byte)| match byte {
        b'(' | b'[' | b'{' => depth + 1,
        b')' | b']' | b'}' => depth - 1,
        _ => depth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn matching_close_skips_nested_calls() {
        let text = "pv(f(a, g(b)))";
        assert_eq!(matching_close(text, 2), Some(13));
        assert_eq!(matching_close(text, 4), Some(12));
    }

    #[test]
    fn matching_close_ignores_delimiters_in_literals() {
        let text = r#"pe(")" + ')')"#;
        assert_eq!(matching_close(text, 2), Some(text.len() - 1));
        let raw = r###"pe(r#")"#)"###;
        assert_eq!(matching_close(raw, 2), Some(raw.len() - 1));
        let chars = "pv(['(', '\\'', 'é'])";
        assert_eq!(matching_close(chars, 2), Some(chars.len() - 1));
    }

    #[test]
    fn lifetimes_are_not_char_literals() {
        let text = "pe(f::<'a>(x), g::<'b>(y))";
        assert_eq!(matching_close(text, 2), Some(text.len() - 1));
    }

    #[test]
    fn block_comments_are_skipped() {
        let text = "pv(a /* ) */ [1])";
        assert_eq!(matching_close(text, 2), Some(text.len() - 1));
        let nested = "pe(x /* a /* ( */ ) */ + 1)";
        assert_eq!(matching_close(nested, 2), Some(nested.len() - 1));
        assert_eq!(net_depth("f( /* unterminated ("), 1);
    }

    #[test]
    fn matching_close_rejects_unbalanced_text() {
        assert_eq!(matching_close("pv(a[1)", 2), None);
        assert_eq!(matching_close("pv(a", 2), None);
    }

    #[test]
    fn split_top_level_respects_nesting() {
        assert_eq!(
            split_top_level("m[i, j], end = \"x,y\"", b','),
            vec!["m[i, j]", " end = \"x,y\""]
        );
        assert!(!contains_top_level("(i, j)", b','));
    }

    #[test]
    fn net_depth_counts_open_delimiters() {
        assert_eq!(net_depth("pv!(compute("), 2);
        assert_eq!(net_depth("a, b))"), -2);
        assert_eq!(net_depth("\"((\""), 0);
        assert_eq!(net_depth("pv!(x); // (note"), 0);
    }
}
