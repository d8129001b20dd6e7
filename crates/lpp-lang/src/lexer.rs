#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Coefficient literal: digits and decimal points
    Number,
    /// `x`/`X` marker followed by its (possibly empty) index digits
    Variable,

    // Operators
    Plus,
    Minus,
    Star,

    // Special
    Eof,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte range in the source, whitespace included
    pub span: Span,
    /// Token text with whitespace removed
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, text: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            text: text.into(),
        }
    }
}

/// Scanner for linear expressions.
///
/// Whitespace is insignificant everywhere, including inside literals and
/// between a variable marker and its index (`x 1` reads as `x1`), while spans
/// still point into the original source.
pub struct Lexer {
    /// Non-whitespace characters with their byte offsets
    chars: Vec<(usize, char)>,
    pos: usize,
    source_len: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.char_indices().filter(|(_, c)| !c.is_whitespace()).collect(),
            pos: 0,
            source_len: source.len(),
        }
    }

    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    /// Byte offset of the next character, or the end of the source
    fn offset(&self) -> usize {
        self.chars.get(self.pos).map(|&(i, _)| i).unwrap_or(self.source_len)
    }

    /// Byte offset just past the last consumed character
    fn end_offset(&self) -> usize {
        match self.pos.checked_sub(1).and_then(|p| self.chars.get(p)) {
            Some(&(i, c)) => i + c.len_utf8(),
            None => 0,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn read_while(&mut self, text: &mut String, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
    }

    fn read_number(&mut self) -> Token {
        let start = self.offset();
        let mut text = String::new();
        self.read_while(&mut text, |c| c.is_ascii_digit() || c == '.');
        Token::new(TokenKind::Number, Span::new(start, self.end_offset()), text)
    }

    fn read_variable(&mut self) -> Token {
        let start = self.offset();
        let mut text = String::new();
        if let Some(marker) = self.advance() {
            text.push(marker);
        }
        self.read_while(&mut text, |c| c.is_ascii_digit());
        Token::new(TokenKind::Variable, Span::new(start, self.end_offset()), text)
    }

    pub fn next_token(&mut self) -> Token {
        let start = self.offset();

        let Some(c) = self.peek() else {
            return Token::new(TokenKind::Eof, Span::new(start, start), "");
        };

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            'x' | 'X' => return self.read_variable(),
            c if c.is_ascii_digit() || c == '.' => return self.read_number(),
            _ => TokenKind::Error,
        };
        self.advance();
        Token::new(kind, Span::new(start, self.end_offset()), c.to_string())
    }
}
