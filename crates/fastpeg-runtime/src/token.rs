use std::{borrow::Cow, fmt::Display, sync::Arc};

use bstr::ByteSlice;

/// A `[start, end)` view into the reader's buffer.
///
/// The content is not stored, it is sliced out of the input on demand.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Token {
    start: usize,
    end: usize,
}

impl Token {
    #[track_caller]
    pub fn new(start: usize, end: usize) -> Token {
        debug_assert!(start <= end, "Token ends before it starts");
        Token { start, end }
    }
    pub fn empty(pos: usize) -> Token {
        Token {
            start: pos,
            end: pos,
        }
    }
    pub fn start(self) -> usize {
        self.start
    }
    pub fn end(self) -> usize {
        self.end
    }
    pub fn len(self) -> usize {
        self.end - self.start
    }
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
    #[track_caller]
    pub fn bytes(self, input: &[u8]) -> &[u8] {
        &input[self.start..self.end]
    }
    #[track_caller]
    pub fn text(self, input: &[u8]) -> Cow<'_, str> {
        self.bytes(input).to_str_lossy()
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A token with synthesized content that doesn't come from one contiguous slice of the input.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PseudoToken {
    start: usize,
    end: usize,
    content: Arc<[u8]>,
}

impl PseudoToken {
    pub fn new(start: usize, end: usize, content: impl Into<Arc<[u8]>>) -> PseudoToken {
        debug_assert!(start <= end, "Token ends before it starts");
        PseudoToken {
            start,
            end,
            content: content.into(),
        }
    }
    pub fn start(&self) -> usize {
        self.start
    }
    pub fn end(&self) -> usize {
        self.end
    }
    pub fn span(&self) -> Token {
        Token::new(self.start, self.end)
    }
    pub fn bytes(&self) -> &[u8] {
        &self.content
    }
    pub fn text(&self) -> Cow<'_, str> {
        self.content.to_str_lossy()
    }
}

#[test]
fn test_token_text() {
    let input = "let x = 1".as_bytes();
    let token = Token::new(4, 5);
    assert_eq!(token.bytes(input), b"x");
    assert_eq!(token.text(input), "x");
    assert!(!token.is_empty());
    assert!(Token::empty(3).is_empty());
    assert_eq!(token.to_string(), "4..5");
}

#[test]
fn test_pseudo_token_ignores_span() {
    let token = PseudoToken::new(0, 9, b"abc".to_vec());
    assert_eq!(token.bytes(), b"abc");
    assert_eq!(token.text(), "abc");
    assert_eq!(token.span(), Token::new(0, 9));
}
