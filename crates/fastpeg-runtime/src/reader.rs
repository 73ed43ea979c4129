use std::fmt::Display;

use crate::token::Token;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ReaderPosition {
    position: usize,
}

impl ReaderPosition {
    pub fn get(self) -> usize {
        self.position
    }
}

/// Cursor over an immutable byte buffer.
///
/// Every combinator reads from and rewinds the same reader, the reader itself never
/// backtracks on its own. Besides the current position it remembers the furthest
/// position it has ever been rewound from, which is a cheap upper bound on how much
/// of the input some alternative managed to consume.
pub struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
    max_position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader {
            bytes,
            position: 0,
            max_position: 0,
        }
    }

    pub fn from_text(text: &'a str) -> Reader<'a> {
        Self::new(text.as_bytes())
    }

    fn update_max_position(&mut self) {
        self.max_position = std::cmp::max(self.max_position, self.position);
    }

    pub fn input(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn pos(&self) -> usize {
        self.position
    }

    #[track_caller]
    pub fn set_pos(&mut self, pos: usize) {
        assert!(pos <= self.bytes.len(), "Position {pos} is out of bounds");
        self.update_max_position();
        self.position = pos;
    }

    pub fn save_position(&self) -> ReaderPosition {
        ReaderPosition {
            position: self.position,
        }
    }

    pub fn restore_position(&mut self, state: ReaderPosition) {
        debug_assert!(state.position <= self.bytes.len());
        self.update_max_position();
        self.position = state.position;
    }

    /// The furthest position this reader has reached so far.
    pub fn furthest(&self) -> usize {
        std::cmp::max(self.max_position, self.position)
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.bytes[self.position..]
    }

    pub fn is_eof(&self) -> bool {
        debug_assert!(self.position <= self.bytes.len());
        self.position == self.bytes.len()
    }

    pub fn peek_char(&self) -> Option<char> {
        match bstr::decode_utf8(self.remaining()) {
            (_, 0) => None,
            (ch, _) => Some(ch.unwrap_or(char::REPLACEMENT_CHARACTER)),
        }
    }

    /// Decodes one code point and advances past it.
    ///
    /// An invalid UTF-8 sequence is consumed as a single `U+FFFD`.
    pub fn next_char(&mut self) -> Option<char> {
        match bstr::decode_utf8(self.remaining()) {
            (_, 0) => None,
            (ch, size) => {
                self.position += size;
                Some(ch.unwrap_or(char::REPLACEMENT_CHARACTER))
            }
        }
    }

    /// Consumes `literal` if the remaining input starts with it.
    pub fn consume(&mut self, literal: &[u8], ignore_case: bool) -> Option<Token> {
        let start = self.position;
        let prefix = self.remaining().get(..literal.len())?;

        let matches = match ignore_case {
            true => prefix.eq_ignore_ascii_case(literal),
            false => prefix == literal,
        };

        if !matches {
            return None;
        }

        self.position += literal.len();
        Some(Token::new(start, self.position))
    }

    pub fn token_since(&self, start: usize) -> Token {
        Token::new(start, self.position)
    }

    /// 1-based line and column (in code points) of a byte offset.
    pub fn location(&self, pos: usize) -> Location {
        let pos = usize::min(pos, self.bytes.len());
        let before = &self.bytes[..pos];

        let line_start = match before.iter().rposition(|&b| b == b'\n') {
            Some(newline) => newline + 1,
            None => 0,
        };
        let line = 1 + before.iter().filter(|&&b| b == b'\n').count();
        let column = 1 + bstr::ByteSlice::chars(&before[line_start..]).count();

        Location { line, column }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[test]
fn test_next_char() {
    let mut r = Reader::from_text("aé👍");
    assert_eq!(r.next_char(), Some('a'));
    assert_eq!(r.pos(), 1);
    assert_eq!(r.next_char(), Some('é'));
    assert_eq!(r.pos(), 3);
    assert_eq!(r.peek_char(), Some('👍'));
    assert_eq!(r.next_char(), Some('👍'));
    assert!(r.is_eof());
    assert_eq!(r.next_char(), None);
    assert_eq!(r.pos(), 7);
}

#[test]
fn test_invalid_utf8() {
    let mut r = Reader::new(b"\xFFa");
    assert_eq!(r.next_char(), Some(char::REPLACEMENT_CHARACTER));
    assert_eq!(r.pos(), 1);
    assert_eq!(r.next_char(), Some('a'));
}

#[test]
fn test_consume() {
    let mut r = Reader::from_text("SELECT x");
    assert_eq!(r.consume(b"select", false), None);
    assert_eq!(r.pos(), 0);
    assert_eq!(r.consume(b"select", true), Some(Token::new(0, 6)));
    assert_eq!(r.consume(b" x ", false), None);
    assert_eq!(r.pos(), 6);
}

#[test]
fn test_furthest() {
    let mut r = Reader::from_text("abcdef");
    let start = r.save_position();
    r.next_char();
    r.next_char();
    r.next_char();
    r.restore_position(start);
    assert_eq!(r.pos(), 0);
    assert_eq!(r.furthest(), 3);
    r.set_pos(5);
    assert_eq!(r.furthest(), 5);
}

#[test]
fn test_location() {
    let r = Reader::from_text("ab\ncé\nx");
    assert_eq!(r.location(0), Location { line: 1, column: 1 });
    assert_eq!(r.location(2), Location { line: 1, column: 3 });
    assert_eq!(r.location(3), Location { line: 2, column: 1 });
    // after the two byte 'é'
    assert_eq!(r.location(6), Location { line: 2, column: 3 });
    assert_eq!(r.location(7).to_string(), "3:1");
}
