//! Streaming shell-source tokenizer with one-token lookahead.
//!
//! Grounded on the teacher's `core-keymap` style: a pure, deterministic,
//! side-effect-free resolution function fed one unit at a time (there,
//! `MappingTrie::resolve` over key sequences; here, `Tokenizer::advance`
//! over shell source text), plus a `peek`/consume split that models the
//! same one-step lookahead the keymap trie exposes through `Resolution`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("unterminated string starting at byte {0}")]
    UnterminatedString(usize),
    #[error("unterminated substitution starting at byte {0}")]
    UnterminatedSubstitution(usize),
    #[error("invalid unicode escape at byte {0}: {1}")]
    InvalidUnicodeEscape(usize, &'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableForm {
    Simple(String),
    Braced(String),
    Arithmetic(String),
    CommandSubstitution(String),
    Backtick(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Pipe,
    PipeAnd,
    Or,
    And,
    Semi,
    SemiSemi,
    SemiAnd,
    Background,
    RedirectOut,
    RedirectAppend,
    RedirectIn,
    RedirectInOut,
    HereDoc,
    HereDocStrip,
    HereString,
    RedirectOutAnd,
    RedirectAndOut,
    FdRedirectOut(u32),
    FdRedirectAppend(u32),
    FdRedirectIn(u32),
    Assign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(String),
    Word(String),
    Number(String),
    SingleQuoted(String),
    DoubleQuoted(String),
    Variable(VariableForm),
    Operator(Operator),
    Grouping(char),
    Assignment(String),
    Newline,
    Comment(String),
    Error(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

const KEYWORDS: &[&str] = &[
    "if", "then", "else", "elif", "fi", "while", "do", "done", "for", "in", "case", "esac",
    "until", "function",
];

/// Multi-char operator lexemes, longest-first so the matcher never has to
/// backtrack.
const OPERATORS: &[(&str, Operator)] = &[
    ("<<-", Operator::HereDocStrip),
    ("<<<", Operator::HereString),
    ("<<", Operator::HereDoc),
    (">>", Operator::RedirectAppend),
    ("&>", Operator::RedirectOutAnd),
    (">&", Operator::RedirectAndOut),
    ("||", Operator::Or),
    ("&&", Operator::And),
    (";;", Operator::SemiSemi),
    (";&", Operator::SemiAnd),
    ("|&", Operator::PipeAnd),
    ("<>", Operator::RedirectInOut),
    ("|", Operator::Pipe),
    (";", Operator::Semi),
    ("&", Operator::Background),
    (">", Operator::RedirectOut),
    ("<", Operator::RedirectIn),
];

fn is_word_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            '|' | '&' | ';' | '<' | '>' | '(' | ')' | '{' | '}' | '$' | '`' | '\'' | '"' | '#'
        )
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub struct Tokenizer {
    chars: Vec<char>,
    idx: usize,
    offset: usize,
    line: usize,
    column: usize,
    pub enable_keywords: bool,
    lookahead: Option<Token>,
    eof_emitted: bool,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            idx: 0,
            offset: 0,
            line: 1,
            column: 1,
            enable_keywords: true,
            lookahead: None,
            eof_emitted: false,
        }
    }

    fn position(&self) -> Position {
        Position {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek_char_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.idx + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.idx += 1;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn rest_starts_with(&self, lit: &str) -> bool {
        let mut it = lit.chars();
        for i in 0.. {
            match it.next() {
                None => return true,
                Some(c) => {
                    if self.peek_char_at(i) != Some(c) {
                        return false;
                    }
                }
            }
        }
        unreachable!()
    }

    /// Next token without consuming the internal lookahead slot -- the
    /// one-token lookahead the contract requires.
    pub fn peek(&mut self) -> &Token {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lex_one());
        }
        self.lookahead.as_ref().unwrap()
    }

    /// Consume and return the next token.
    pub fn advance(&mut self) -> Token {
        if let Some(t) = self.lookahead.take() {
            return t;
        }
        self.lex_one()
    }

    fn lex_one(&mut self) -> Token {
        if self.eof_emitted {
            return Token {
                kind: TokenKind::Eof,
                position: self.position(),
            };
        }

        self.skip_horizontal_whitespace();

        let start = self.position();
        let Some(c) = self.peek_char() else {
            self.eof_emitted = true;
            return Token {
                kind: TokenKind::Eof,
                position: start,
            };
        };

        if c == '\n' {
            self.bump();
            return Token {
                kind: TokenKind::Newline,
                position: start,
            };
        }
        if c == '#' {
            return self.lex_comment(start);
        }
        if c == '\'' {
            return self.lex_single_quoted(start);
        }
        if c == '"' {
            return self.lex_double_quoted(start);
        }
        if c == '`' {
            return self.lex_backtick(start);
        }
        if c == '$' {
            return self.lex_dollar(start);
        }
        if matches!(c, '(' | ')' | '{' | '}') {
            self.bump();
            return Token {
                kind: TokenKind::Grouping(c),
                position: start,
            };
        }
        if c.is_ascii_digit() {
            if let Some(tok) = self.try_lex_fd_redirect(start) {
                return tok;
            }
            return self.lex_number(start);
        }
        if matches!(c, '|' | '&' | ';' | '<' | '>') {
            return self.lex_operator(start);
        }
        if is_name_start(c) {
            return self.lex_word_or_keyword_or_assignment(start);
        }
        if is_word_char(c) {
            return self.lex_word_or_keyword_or_assignment(start);
        }

        self.bump();
        Token {
            kind: TokenKind::Error(format!("unexpected character '{}'", c)),
            position: start,
        }
    }

    fn skip_horizontal_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() && c != '\n' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn lex_comment(&mut self, start: Position) -> Token {
        self.bump(); // leading '#'
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            text.push(c);
            self.bump();
        }
        Token {
            kind: TokenKind::Comment(text),
            position: start,
        }
    }

    fn lex_single_quoted(&mut self, start: Position) -> Token {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\'') => {
                    return Token {
                        kind: TokenKind::SingleQuoted(text),
                        position: start,
                    };
                }
                Some(c) => text.push(c),
                None => {
                    return Token {
                        kind: TokenKind::Error(TokenizerError::UnterminatedString(start.offset).to_string()),
                        position: start,
                    };
                }
            }
        }
    }

    fn lex_double_quoted(&mut self, start: Position) -> Token {
        self.bump(); // opening quote
        let mut text = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Token {
                        kind: TokenKind::Error(TokenizerError::UnterminatedString(start.offset).to_string()),
                        position: start,
                    };
                }
                Some('"') => {
                    self.bump();
                    return Token {
                        kind: TokenKind::DoubleQuoted(text),
                        position: start,
                    };
                }
                Some('\\') => {
                    self.bump();
                    match self.lex_escape_sequence() {
                        Ok(decoded) => text.push_str(&decoded),
                        Err(e) => {
                            return Token {
                                kind: TokenKind::Error(e.to_string()),
                                position: start,
                            };
                        }
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    fn lex_escape_sequence(&mut self) -> Result<String, TokenizerError> {
        let esc_offset = self.offset;
        let Some(c) = self.bump() else {
            return Ok("\\".to_string());
        };
        Ok(match c {
            'n' => "\n".to_string(),
            't' => "\t".to_string(),
            'r' => "\r".to_string(),
            '\\' => "\\".to_string(),
            '"' => "\"".to_string(),
            'u' => self.decode_unicode_escape(4, esc_offset)?.to_string(),
            'U' => self.decode_unicode_escape(8, esc_offset)?.to_string(),
            other => {
                let mut s = String::from('\\');
                s.push(other);
                s
            }
        })
    }

    fn decode_unicode_escape(&mut self, digits: usize, esc_offset: usize) -> Result<char, TokenizerError> {
        let mut hex = String::with_capacity(digits);
        for _ in 0..digits {
            match self.peek_char() {
                Some(c) if c.is_ascii_hexdigit() => {
                    hex.push(c);
                    self.bump();
                }
                _ => {
                    return Err(TokenizerError::InvalidUnicodeEscape(
                        esc_offset,
                        "expected hex digit",
                    ));
                }
            }
        }
        let code = u32::from_str_radix(&hex, 16)
            .map_err(|_| TokenizerError::InvalidUnicodeEscape(esc_offset, "malformed hex digits"))?;
        if (0xD800..=0xDFFF).contains(&code) {
            return Err(TokenizerError::InvalidUnicodeEscape(
                esc_offset,
                "lone surrogate",
            ));
        }
        char::from_u32(code)
            .ok_or(TokenizerError::InvalidUnicodeEscape(esc_offset, "codepoint out of range"))
    }

    fn lex_backtick(&mut self, start: Position) -> Token {
        self.bump(); // opening backtick
        let mut text = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Token {
                        kind: TokenKind::Error(TokenizerError::UnterminatedSubstitution(start.offset).to_string()),
                        position: start,
                    };
                }
                Some('`') => {
                    self.bump();
                    return Token {
                        kind: TokenKind::Variable(VariableForm::Backtick(text)),
                        position: start,
                    };
                }
                Some('\\') => {
                    self.bump();
                    if let Some(c) = self.bump() {
                        text.push('\\');
                        text.push(c);
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    /// Consume balanced `open`/`close` delimiters, returning the inner text.
    fn lex_balanced(&mut self, open: char, close: char, start: Position) -> Result<String, Token> {
        let mut depth: u32 = 1;
        let mut text = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(Token {
                        kind: TokenKind::Error(TokenizerError::UnterminatedSubstitution(start.offset).to_string()),
                        position: start,
                    });
                }
                Some(c) if c == open => {
                    depth += 1;
                    text.push(c);
                    self.bump();
                }
                Some(c) if c == close => {
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                    text.push(c);
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    fn lex_dollar(&mut self, start: Position) -> Token {
        self.bump(); // '$'

        if self.rest_starts_with("((") {
            self.bump();
            self.bump();
            return match self.lex_balanced_double(')', start) {
                Ok(text) => Token {
                    kind: TokenKind::Variable(VariableForm::Arithmetic(text)),
                    position: start,
                },
                Err(tok) => tok,
            };
        }
        if self.peek_char() == Some('(') {
            self.bump();
            return match self.lex_balanced('(', ')', start) {
                Ok(text) => Token {
                    kind: TokenKind::Variable(VariableForm::CommandSubstitution(text)),
                    position: start,
                },
                Err(tok) => tok,
            };
        }
        if self.peek_char() == Some('{') {
            self.bump();
            return match self.lex_balanced('{', '}', start) {
                Ok(text) => Token {
                    kind: TokenKind::Variable(VariableForm::Braced(text)),
                    position: start,
                },
                Err(tok) => tok,
            };
        }

        let mut name = String::new();
        while let Some(c) = self.peek_char() {
            if is_name_char(c) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Token {
                kind: TokenKind::Error("bare '$' with no variable name".to_string()),
                position: start,
            };
        }
        Token {
            kind: TokenKind::Variable(VariableForm::Simple(name)),
            position: start,
        }
    }

    /// `$((...))`: consume until the matching `))`, tracking nested `(`/`)`
    /// so an inner arithmetic grouping doesn't end the substitution early.
    fn lex_balanced_double(&mut self, close: char, start: Position) -> Result<String, Token> {
        let mut depth: u32 = 1;
        let mut text = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(Token {
                        kind: TokenKind::Error(TokenizerError::UnterminatedSubstitution(start.offset).to_string()),
                        position: start,
                    });
                }
                Some('(') => {
                    depth += 1;
                    text.push('(');
                    self.bump();
                }
                Some(c) if c == close => {
                    if self.peek_char_at(1) == Some(close) && depth == 1 {
                        self.bump();
                        self.bump();
                        return Ok(text);
                    }
                    depth = depth.saturating_sub(1);
                    text.push(c);
                    self.bump();
                    if depth == 0 {
                        return Ok(text);
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
            }
        }
    }

    fn try_lex_fd_redirect(&mut self, start: Position) -> Option<Token> {
        let mut ahead = 0usize;
        while matches!(self.peek_char_at(ahead), Some(c) if c.is_ascii_digit()) {
            ahead += 1;
        }
        if ahead == 0 {
            return None;
        }
        let after = self.peek_char_at(ahead);
        if after != Some('>') && after != Some('<') {
            return None;
        }
        let digits: String = (0..ahead).map(|i| self.peek_char_at(i).unwrap()).collect();
        let fd: u32 = digits.parse().ok()?;
        for _ in 0..ahead {
            self.bump();
        }
        let op = if self.rest_starts_with(">>") {
            self.bump();
            self.bump();
            Operator::FdRedirectAppend(fd)
        } else if self.rest_starts_with(">") {
            self.bump();
            Operator::FdRedirectOut(fd)
        } else if self.rest_starts_with("<") {
            self.bump();
            Operator::FdRedirectIn(fd)
        } else {
            return None;
        };
        Some(Token {
            kind: TokenKind::Operator(op),
            position: start,
        })
    }

    fn lex_number(&mut self, start: Position) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '.' {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek_char().is_some_and(is_word_char) {
            // Digits directly fused with word characters (e.g. `3abc`):
            // the whole run is a word, not a pure number.
            let mut rest = String::new();
            while let Some(c) = self.peek_char() {
                if is_word_char(c) {
                    rest.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            text.push_str(&rest);
            return Token {
                kind: TokenKind::Word(text),
                position: start,
            };
        }
        Token {
            kind: TokenKind::Number(text),
            position: start,
        }
    }

    fn lex_operator(&mut self, start: Position) -> Token {
        for (lexeme, op) in OPERATORS {
            if self.rest_starts_with(lexeme) {
                for _ in 0..lexeme.chars().count() {
                    self.bump();
                }
                return Token {
                    kind: TokenKind::Operator(*op),
                    position: start,
                };
            }
        }
        let c = self.bump().expect("caller checked a char is present");
        Token {
            kind: TokenKind::Error(format!("unrecognized operator character '{}'", c)),
            position: start,
        }
    }

    fn lex_word_or_keyword_or_assignment(&mut self, start: Position) -> Token {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if c == '=' && !text.is_empty() && text.chars().next().is_some_and(is_name_start) && text.chars().all(is_name_char)
            {
                self.bump();
                return Token {
                    kind: TokenKind::Assignment(text),
                    position: start,
                };
            }
            if is_word_char(c) {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }

        if self.enable_keywords && KEYWORDS.contains(&text.as_str()) {
            return Token {
                kind: TokenKind::Keyword(text),
                position: start,
            };
        }
        Token {
            kind: TokenKind::Word(text),
            position: start,
        }
    }
}
