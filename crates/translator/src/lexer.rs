//! Token scanner for the shader dialect.
//!
//! Only as much of GLSL as the translator needs: identifiers, numbers, quoted
//! strings and single-character punctuation. Whitespace, line comments and
//! block comments are skipped, so braces inside them never reach callers.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    Number,
    Punct(char),
    Str,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte offset of the first character in the scanned text.
    pub start: usize,
}

impl Token<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn is_ident(&self, name: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == name
    }

    pub fn is_punct(&self, ch: char) -> bool {
        self.kind == TokenKind::Punct(ch)
    }
}

pub(crate) struct Lexer<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.source.as_bytes().get(self.pos + offset).copied()
    }

    fn skip_line_comment(&mut self) {
        match self.source[self.pos..].find('\n') {
            Some(newline) => self.pos += newline + 1,
            None => self.pos = self.source.len(),
        }
    }

    fn skip_block_comment(&mut self) {
        // An unterminated comment swallows the rest of the input.
        match self.source[self.pos + 2..].find("*/") {
            Some(close) => self.pos += 2 + close + 2,
            None => self.pos = self.source.len(),
        }
    }

    fn take(&mut self, kind: TokenKind, start: usize) -> Token<'a> {
        Token {
            kind,
            text: &self.source[start..self.pos],
            start,
        }
    }

    fn string(&mut self, quote: u8) -> Token<'a> {
        let start = self.pos;
        self.pos += 1;
        let bytes = self.source.as_bytes();
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'\\' => self.pos += 2,
                byte if byte == quote => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(bytes.len());
        self.take(TokenKind::Str, start)
    }

    fn ident(&mut self) -> Token<'a> {
        let start = self.pos;
        while self
            .byte_at(0)
            .is_some_and(|byte| byte == b'_' || byte.is_ascii_alphanumeric())
        {
            self.pos += 1;
        }
        self.take(TokenKind::Ident, start)
    }

    fn number(&mut self) -> Token<'a> {
        let start = self.pos;
        while let Some(byte) = self.byte_at(0) {
            let exponent_sign = matches!(byte, b'+' | b'-')
                && self.pos > start
                && matches!(self.source.as_bytes()[self.pos - 1], b'e' | b'E')
                && !self.source[start..].starts_with("0x");
            if byte.is_ascii_alphanumeric() || byte == b'.' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.take(TokenKind::Number, start)
    }

    fn punct(&mut self) -> Option<Token<'a>> {
        let start = self.pos;
        let ch = self.source[self.pos..].chars().next()?;
        self.pos += ch.len_utf8();
        Some(self.take(TokenKind::Punct(ch), start))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        loop {
            let byte = self.byte_at(0)?;
            match byte {
                b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c => self.pos += 1,
                b'/' if self.byte_at(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.byte_at(1) == Some(b'*') => self.skip_block_comment(),
                b'"' | b'\'' => return Some(self.string(byte)),
                b'_' | b'a'..=b'z' | b'A'..=b'Z' => return Some(self.ident()),
                b'0'..=b'9' => return Some(self.number()),
                _ => return self.punct(),
            }
        }
    }
}

/// Whether a block comment is still open at the end of `line`, given whether
/// one was open at its start.
pub(crate) fn block_comment_open_after(line: &str, mut open: bool) -> bool {
    let bytes = line.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        if open {
            match bytes[pos..].windows(2).position(|pair| pair == b"*/") {
                Some(close) => {
                    pos += close + 2;
                    open = false;
                }
                None => return true,
            }
            continue;
        }
        match bytes[pos] {
            b'/' if bytes.get(pos + 1) == Some(&b'/') => return false,
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                open = true;
                pos += 2;
            }
            quote @ (b'"' | b'\'') => {
                pos += 1;
                while pos < bytes.len() {
                    match bytes[pos] {
                        b'\\' => pos += 2,
                        byte if byte == quote => {
                            pos += 1;
                            break;
                        }
                        _ => pos += 1,
                    }
                }
            }
            _ => pos += 1,
        }
    }
    open
}
