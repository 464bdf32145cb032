//! Streaming tokenizer for `.mm` machine descriptions.

use std::path::PathBuf;

use crate::model::bitfield::BitField;
use crate::model::diagnostic::{DiagnosticPhase, MachineDiagnostic, SourcePosition, SourceSpan};
use crate::model::error::MachineError;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub value: TokenValue,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Machine,
    Register,
    Memory,
    Immediate,
    Set,
    Instruction,
    Signed,
    Unsigned,
    Identifier,
    Number,
    /// `[N]`, `[N-bit]` or `[N-byte]`.
    Width,
    /// `[A-B]`.
    Field,
    /// `[...]`.
    Default,
    /// `(N-tick)`.
    Tick,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Colon,
    Semicolon,
    Equals,
    Comma,
    Period,
    Dollar,
    GreaterThan,
    Caret,
    Tilde,
    Ampersand,
    EOF,
}

impl TokenKind {
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::Machine
                | TokenKind::Register
                | TokenKind::Memory
                | TokenKind::Immediate
                | TokenKind::Set
                | TokenKind::Instruction
                | TokenKind::Signed
                | TokenKind::Unsigned
        )
    }

    fn keyword(word: &str) -> Option<Self> {
        Some(match word {
            "machine" => TokenKind::Machine,
            "register" => TokenKind::Register,
            "memory" => TokenKind::Memory,
            "immediate" => TokenKind::Immediate,
            "set" => TokenKind::Set,
            "instruction" => TokenKind::Instruction,
            "signed" => TokenKind::Signed,
            "unsigned" => TokenKind::Unsigned,
            _ => return None,
        })
    }
}

/// Decoded payload of literal tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenValue {
    None,
    Number(u64),
    Width(u32),
    Field(BitField),
    Tick(u32),
}

#[derive(Clone, Copy)]
enum Radix {
    Binary,
    Octal,
    Decimal,
    Hex,
}

impl Radix {
    fn accepts(self, ch: char) -> bool {
        match self {
            Radix::Binary => matches!(ch, '0' | '1'),
            Radix::Octal => matches!(ch, '0'..='7'),
            Radix::Decimal => ch.is_ascii_digit(),
            Radix::Hex => ch.is_ascii_hexdigit(),
        }
    }

    fn base(self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Octal => 8,
            Radix::Decimal => 10,
            Radix::Hex => 16,
        }
    }
}

pub struct Lexer<'src> {
    src: &'src str,
    path: PathBuf,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str, path: PathBuf) -> Self {
        Self {
            src,
            path,
            offset: 0,
            line: 1,
            column: 0,
        }
    }

    /// Produces the next token.
    pub fn next_token(&mut self) -> Result<Token, MachineError> {
        self.skip_ignorable();
        if self.is_eof() {
            let (line, column) = self.position();
            return Ok(self.make_token(TokenKind::EOF, "", TokenValue::None, line, column));
        }
        let ch = self.peek_char().expect("not eof");

        match ch {
            '{' => Ok(self.consume_single(TokenKind::LBrace)),
            '}' => Ok(self.consume_single(TokenKind::RBrace)),
            ']' => Ok(self.consume_single(TokenKind::RBracket)),
            '[' => self.consume_bracket(),
            '(' => self.consume_tick(),
            ':' => Ok(self.consume_single(TokenKind::Colon)),
            ';' => Ok(self.consume_single(TokenKind::Semicolon)),
            '=' => Ok(self.consume_single(TokenKind::Equals)),
            ',' => Ok(self.consume_single(TokenKind::Comma)),
            '.' => Ok(self.consume_single(TokenKind::Period)),
            '$' => Ok(self.consume_single(TokenKind::Dollar)),
            '>' => Ok(self.consume_single(TokenKind::GreaterThan)),
            '^' => Ok(self.consume_single(TokenKind::Caret)),
            '~' => Ok(self.consume_single(TokenKind::Tilde)),
            '&' => Ok(self.consume_single(TokenKind::Ampersand)),
            ch if ch.is_ascii_digit() => {
                let start = self.offset;
                let (line, column) = self.position();
                let value = self.consume_literal("lexer.number")?;
                Ok(self.make_token_from_span(
                    TokenKind::Number,
                    TokenValue::Number(value),
                    start,
                    line,
                    column,
                ))
            }
            ch if is_ident_start(ch) => Ok(self.consume_identifier()),
            _ => {
                let message = format!("unexpected character '{ch}'");
                let err = self.lexer_error_here("lexer.unexpected-char", message);
                self.advance_char();
                Err(err)
            }
        }
    }

    fn consume_identifier(&mut self) -> Token {
        let start = self.offset;
        let (line, column) = self.position();
        self.advance_char();
        while let Some(ch) = self.peek_char() {
            if is_ident_part(ch) {
                self.advance_char();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&self.src[start..self.offset]).unwrap_or(TokenKind::Identifier);
        self.make_token_from_span(kind, TokenValue::None, start, line, column)
    }

    /// Numeric literal with optional `0x`/`0o`/`0b` prefix and `_` separators.
    fn consume_literal(&mut self, code: &'static str) -> Result<u64, MachineError> {
        let (line, column) = self.position();
        let mut radix = Radix::Decimal;
        if self.peek_char() == Some('0') {
            let prefixed = match self.peek_next_char() {
                Some('x' | 'X') => Some(Radix::Hex),
                Some('o' | 'O') => Some(Radix::Octal),
                Some('b' | 'B') => Some(Radix::Binary),
                _ => None,
            };
            if let Some(prefixed) = prefixed {
                radix = prefixed;
                self.advance_char();
                self.advance_char();
            }
        }

        let mut digits = String::new();
        while let Some(ch) = self.peek_char() {
            if ch == '_' {
                self.advance_char();
                continue;
            }
            if radix.accepts(ch) {
                digits.push(ch);
                self.advance_char();
            } else {
                break;
            }
        }

        if digits.is_empty() {
            return Err(self.emit_lexer_diagnostic(
                missing_digits_code(code),
                "numeric literal requires digits after prefix",
                line,
                column,
            ));
        }
        u64::from_str_radix(&digits, radix.base()).map_err(|_| {
            self.emit_lexer_diagnostic(
                overflow_code(code),
                "numeric literal does not fit in 64 bits",
                line,
                column,
            )
        })
    }

    /// `[N]`, `[N-bit]`, `[N-byte]`, `[A-B]` and `[...]` become single tokens; any other `[`
    /// opens an operand list.
    fn consume_bracket(&mut self) -> Result<Token, MachineError> {
        let start = self.offset;
        let (line, column) = self.position();
        self.advance_char(); // '['
        self.skip_inline_whitespace();

        match self.peek_char() {
            Some('.') => {
                for _ in 0..3 {
                    if self.peek_char() != Some('.') {
                        return Err(self.lexer_error_here(
                            "lexer.default.syntax",
                            "default entry must be written '[...]'",
                        ));
                    }
                    self.advance_char();
                }
                self.expect_close_bracket()?;
                Ok(self.make_token_from_span(TokenKind::Default, TokenValue::None, start, line, column))
            }
            Some(ch) if ch.is_ascii_digit() => {
                let first = self.consume_literal("lexer.bracket")?;
                self.skip_inline_whitespace();
                let token = match self.peek_char() {
                    Some(']') => {
                        let width = self.narrow(first, line, column)?;
                        self.advance_char();
                        return Ok(self.make_token_from_span(
                            TokenKind::Width,
                            TokenValue::Width(width),
                            start,
                            line,
                            column,
                        ));
                    }
                    Some('-') => {
                        self.advance_char();
                        self.skip_inline_whitespace();
                        match self.peek_char() {
                            Some(ch) if ch.is_ascii_digit() => {
                                let second = self.consume_literal("lexer.bracket")?;
                                let a = self.bit_index(first, line, column)?;
                                let b = self.bit_index(second, line, column)?;
                                (TokenKind::Field, TokenValue::Field(BitField::new(a, b)))
                            }
                            Some(ch) if ch.is_ascii_alphabetic() => {
                                let width = self.consume_width_unit(first, line, column)?;
                                (TokenKind::Width, TokenValue::Width(width))
                            }
                            _ => {
                                return Err(self.lexer_error_here(
                                    "lexer.bracket.syntax",
                                    "expected bit index or 'bit'/'byte' after '-'",
                                ));
                            }
                        }
                    }
                    _ => {
                        return Err(self.lexer_error_here(
                            "lexer.bracket.syntax",
                            "expected ']' or '-' after bracketed number",
                        ));
                    }
                };
                self.expect_close_bracket()?;
                Ok(self.make_token_from_span(token.0, token.1, start, line, column))
            }
            _ => Ok(self.make_token_from_span(TokenKind::LBracket, TokenValue::None, start, line, column)),
        }
    }

    fn consume_width_unit(
        &mut self,
        count: u64,
        line: usize,
        column: usize,
    ) -> Result<u32, MachineError> {
        let (unit_line, unit_column) = self.position();
        let unit_start = self.offset;
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_alphabetic() {
                self.advance_char();
            } else {
                break;
            }
        }
        let unit = &self.src[unit_start..self.offset];
        let bits = match unit.to_ascii_lowercase().as_str() {
            "bit" | "bits" => Some(count),
            "byte" | "bytes" => count.checked_mul(8),
            _ => {
                return Err(self.emit_lexer_diagnostic(
                    "lexer.width.unit",
                    format!("unknown width unit '{unit}': expected bit/byte"),
                    unit_line,
                    unit_column,
                ));
            }
        };
        match bits {
            Some(bits) => self.narrow(bits, line, column),
            None => Err(self.emit_lexer_diagnostic(
                "lexer.width.overflow",
                "width does not fit in 32 bits",
                line,
                column,
            )),
        }
    }

    fn consume_tick(&mut self) -> Result<Token, MachineError> {
        let start = self.offset;
        let (line, column) = self.position();
        self.advance_char(); // '('
        self.skip_inline_whitespace();
        if !self.peek_char().is_some_and(|ch| ch.is_ascii_digit()) {
            return Err(self.emit_lexer_diagnostic(
                "lexer.tick.syntax",
                "tick count must be written '(N-tick)'",
                line,
                column,
            ));
        }
        let count = self.consume_literal("lexer.tick")?;
        let count = self.narrow(count, line, column)?;
        self.skip_inline_whitespace();
        let suffix_ok = self.src[self.offset..].starts_with("-tick");
        if suffix_ok {
            for _ in 0.."-tick".len() {
                self.advance_char();
            }
        }
        self.skip_inline_whitespace();
        if !suffix_ok || self.peek_char() != Some(')') {
            return Err(self.emit_lexer_diagnostic(
                "lexer.tick.syntax",
                "tick count must be written '(N-tick)'",
                line,
                column,
            ));
        }
        self.advance_char();
        Ok(self.make_token_from_span(TokenKind::Tick, TokenValue::Tick(count), start, line, column))
    }

    fn expect_close_bracket(&mut self) -> Result<(), MachineError> {
        self.skip_inline_whitespace();
        if self.peek_char() == Some(']') {
            self.advance_char();
            Ok(())
        } else {
            Err(self.lexer_error_here("lexer.bracket.unclosed", "bracket missing closing ']'"))
        }
    }

    fn narrow(&self, value: u64, line: usize, column: usize) -> Result<u32, MachineError> {
        u32::try_from(value).map_err(|_| {
            self.emit_lexer_diagnostic(
                "lexer.bracket.overflow",
                format!("bit index {value} does not fit in 32 bits"),
                line,
                column,
            )
        })
    }

    /// Field endpoints stop one short of `u32::MAX` so every field width fits in a `u32`.
    fn bit_index(&self, value: u64, line: usize, column: usize) -> Result<u32, MachineError> {
        match self.narrow(value, line, column)? {
            u32::MAX => Err(self.emit_lexer_diagnostic(
                "lexer.bracket.overflow",
                format!("bit index {value} is out of range"),
                line,
                column,
            )),
            index => Ok(index),
        }
    }

    fn consume_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            self.advance_char();
            if ch == '\n' {
                break;
            }
        }
    }

    fn consume_single(&mut self, kind: TokenKind) -> Token {
        let start = self.offset;
        let (line, column) = self.position();
        self.advance_char();
        self.make_token_from_span(kind, TokenValue::None, start, line, column)
    }

    fn skip_ignorable(&mut self) {
        loop {
            self.skip_whitespace();
            match (self.peek_char(), self.peek_next_char()) {
                (Some('#'), _) | (Some('/'), Some('/')) => self.consume_line_comment(),
                _ => break,
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn skip_inline_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() && ch != '\n' {
                self.advance_char();
            } else {
                return;
            }
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.offset..].chars().next()
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.src[self.offset..].chars();
        iter.next()?;
        iter.next()
    }

    fn advance_char(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }

    fn is_eof(&self) -> bool {
        self.offset >= self.src.len()
    }

    fn position(&self) -> (usize, usize) {
        (self.line, self.column + 1)
    }

    fn make_token(
        &self,
        kind: TokenKind,
        lexeme: &str,
        value: TokenValue,
        line: usize,
        column: usize,
    ) -> Token {
        Token {
            kind,
            lexeme: lexeme.to_string(),
            value,
            line,
            column,
        }
    }

    fn make_token_from_span(
        &self,
        kind: TokenKind,
        value: TokenValue,
        start: usize,
        line: usize,
        column: usize,
    ) -> Token {
        let slice = &self.src[start..self.offset];
        self.make_token(kind, slice, value, line, column)
    }

    fn emit_lexer_diagnostic(
        &self,
        code: &'static str,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> MachineError {
        let span = SourceSpan::point(self.path.clone(), SourcePosition::new(line, column));
        MachineError::Diagnostics {
            phase: DiagnosticPhase::Lexer,
            diagnostics: vec![MachineDiagnostic::error(
                DiagnosticPhase::Lexer,
                code,
                message,
                Some(span),
            )],
        }
    }

    fn lexer_error_here(&self, code: &'static str, message: impl Into<String>) -> MachineError {
        let (line, column) = self.position();
        self.emit_lexer_diagnostic(code, message, line, column)
    }
}

fn missing_digits_code(context: &'static str) -> &'static str {
    match context {
        "lexer.bracket" => "lexer.bracket.missing-digits",
        "lexer.tick" => "lexer.tick.missing-digits",
        _ => "lexer.number.missing-digits",
    }
}

fn overflow_code(context: &'static str) -> &'static str {
    match context {
        "lexer.bracket" => "lexer.bracket.overflow",
        "lexer.tick" => "lexer.tick.overflow",
        _ => "lexer.number.overflow",
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_part(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}
