//! Query text tokenizer.
//!
//! Produces borrowed tokens with their 0-based byte offsets and supports
//! one token of pushback (`unparse`), which is all the recursive-descent
//! parser needs for lookahead. Quoted tokens are returned whole, quotes
//! included; [`strip_quotes`] removes them in one pass where the grammar
//! treats the token as a name or string constant.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'s> {
    pub text: &'s str,
    pub pos: usize,
}

pub(crate) struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    last: Option<Token<'s>>,
    pushed_back: bool,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        Lexer {
            src,
            pos: 0,
            last: None,
            pushed_back: false,
        }
    }

    /// Offset for error reporting: start of the most recently returned
    /// token, or the scan position at end of input.
    pub fn position(&self) -> usize {
        match self.last {
            Some(t) => t.pos,
            None => self.pos,
        }
    }

    /// Re-serve the last returned token on the next call.
    pub fn unparse(&mut self) {
        self.pushed_back = true;
    }

    pub fn next_token(&mut self) -> Option<Token<'s>> {
        if self.pushed_back {
            self.pushed_back = false;
            return self.last;
        }

        let bytes = self.src.as_bytes();
        let n = bytes.len();
        let mut i = self.pos;

        while i < n && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= n {
            self.pos = i;
            self.last = None;
            return None;
        }

        let start = i;
        let b = bytes[i];
        let end = if is_quote(b) {
            i += 1;
            while i < n && bytes[i] != b {
                i += 1;
            }
            // include the closing quote; an unterminated quote runs to
            // end of input and fails downstream
            if i < n {
                i += 1;
            }
            i
        } else if let Some(len) = symbol_len(&bytes[i..]) {
            i + len
        } else {
            i += 1;
            while i < n
                && !bytes[i].is_ascii_whitespace()
                && !is_quote(bytes[i])
                && symbol_len(&bytes[i..]).is_none()
            {
                i += 1;
            }
            i
        };

        self.pos = end;
        let token = Token {
            text: &self.src[start..end],
            pos: start,
        };
        self.last = Some(token);
        Some(token)
    }
}

fn is_quote(b: u8) -> bool {
    matches!(b, b'\'' | b'"' | b'`')
}

/// Length of the symbol starting at `bytes`, longest match first.
fn symbol_len(bytes: &[u8]) -> Option<usize> {
    if bytes.len() >= 2 {
        match &bytes[..2] {
            b"<=" | b">=" | b"!=" | b"<>" => return Some(2),
            _ => {}
        }
    }
    match bytes.first()? {
        b'(' | b')' | b',' | b'+' | b'-' | b'*' | b'/' | b'%' | b'=' | b'<' | b'>' | b'~' => {
            Some(1)
        }
        _ => None,
    }
}

/// True for tokens the lexer produced from the fixed symbol set.
pub(crate) fn is_symbol(token: &str) -> bool {
    symbol_len(token.as_bytes()) == Some(token.len())
}

/// Remove one level of matching quotes, if present.
pub(crate) fn strip_quotes(token: &str) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 && is_quote(bytes[0]) && bytes[bytes.len() - 1] == bytes[0] {
        &token[1..token.len() - 1]
    } else {
        token
    }
}
