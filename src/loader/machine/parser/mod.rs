//! Recursive descent parser that drives a [`MachineBuilder`](crate::model::MachineBuilder) one
//! construct at a time.

mod declarations;
mod instruction;
mod spans;

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::bitfield::BitField;
use crate::model::builder::MachineBuilder;
use crate::model::config::BuilderConfig;
use crate::model::diagnostic::{DiagnosticPhase, MachineDiagnostic};
use crate::model::error::{MachineError, SemanticError};
use crate::model::machine::Machine;

pub(super) use super::lexer::{Lexer, Token, TokenKind, TokenValue};
use spans::{span_from_token, span_from_tokens};

pub struct Parser<'src> {
    lexer: Lexer<'src>,
    peeked: Option<Token>,
    last_token: Option<Token>,
    path: PathBuf,
    config: BuilderConfig,
}

/// Parses and builds a machine from in-memory source.
pub fn parse_str(path: PathBuf, src: &str) -> Result<Machine, MachineError> {
    parse_str_with_config(path, src, BuilderConfig::default())
}

pub fn parse_str_with_config(
    path: PathBuf,
    src: &str,
    config: BuilderConfig,
) -> Result<Machine, MachineError> {
    Parser::new(src, path).with_config(config).parse_machine()
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, path: PathBuf) -> Self {
        Self {
            lexer: Lexer::new(source, path.clone()),
            peeked: None,
            last_token: None,
            path,
            config: BuilderConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BuilderConfig) -> Self {
        self.config = config;
        self
    }

    /// `machine NAME { entry* }` followed by end of input.
    pub fn parse_machine(&mut self) -> Result<Machine, MachineError> {
        self.expect(TokenKind::Machine, "'machine'")?;
        let name = self.expect_identifier("machine name")?;
        let mut builder = MachineBuilder::with_config(&name.lexeme, self.config);
        if let Err(err) = self.parse_machine_body(&mut builder) {
            warn!(
                target: "xmachine",
                machine = %name.lexeme,
                path = %self.path.display(),
                "machine build abandoned"
            );
            return Err(err);
        }
        self.expect(TokenKind::EOF, "end of input after machine body")?;
        Ok(builder.finish())
    }

    fn parse_machine_body(&mut self, builder: &mut MachineBuilder) -> Result<(), MachineError> {
        self.expect(TokenKind::LBrace, "'{' to open machine body")?;
        loop {
            match self.peek()?.kind {
                TokenKind::RBrace => {
                    self.consume()?;
                    return Ok(());
                }
                TokenKind::Semicolon => {
                    self.consume()?;
                }
                TokenKind::Register => self.parse_register_group(builder)?,
                TokenKind::Memory => self.parse_memory(builder)?,
                TokenKind::Immediate => self.parse_immediate(builder)?,
                TokenKind::Set => self.parse_set(builder)?,
                TokenKind::Instruction => self.parse_instruction(builder)?,
                _ => {
                    let token = self.consume()?;
                    return Err(self.unexpected(&token, "a declaration or '}'"));
                }
            }
        }
    }

    pub(super) fn expect(&mut self, kind: TokenKind, context: &str) -> Result<Token, MachineError> {
        let token = self.consume()?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.unexpected(&token, context))
        }
    }

    pub(super) fn expect_identifier(&mut self, context: &str) -> Result<Token, MachineError> {
        self.expect(TokenKind::Identifier, context)
    }

    pub(super) fn expect_width(&mut self, context: &str) -> Result<u32, MachineError> {
        let token = self.expect(TokenKind::Width, context)?;
        match token.value {
            TokenValue::Width(width) => Ok(width),
            _ => unreachable!("width tokens carry a width"),
        }
    }

    pub(super) fn expect_field(&mut self, context: &str) -> Result<BitField, MachineError> {
        let token = self.expect(TokenKind::Field, context)?;
        Ok(field_value(&token))
    }

    pub(super) fn expect_number(&mut self, context: &str) -> Result<u64, MachineError> {
        let token = self.expect(TokenKind::Number, context)?;
        match token.value {
            TokenValue::Number(value) => Ok(value),
            _ => unreachable!("number tokens carry a value"),
        }
    }

    /// Consumes a `,` or `;` if one is next.
    pub(super) fn skip_separator(&mut self) -> Result<bool, MachineError> {
        if self.check(TokenKind::Comma)? || self.check(TokenKind::Semicolon)? {
            self.consume()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(super) fn check(&mut self, kind: TokenKind) -> Result<bool, MachineError> {
        Ok(self.peek()?.kind == kind)
    }

    pub(super) fn peek(&mut self) -> Result<&Token, MachineError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(self.peeked.as_ref().expect("peeked token must exist"))
    }

    pub(super) fn consume(&mut self) -> Result<Token, MachineError> {
        let token = if let Some(token) = self.peeked.take() {
            token
        } else {
            self.lexer.next_token()?
        };
        self.last_token = Some(token.clone());
        Ok(token)
    }

    pub(super) fn file_path(&self) -> &Path {
        &self.path
    }

    pub(super) fn unexpected(&self, token: &Token, context: &str) -> MachineError {
        let found = if token.kind == TokenKind::EOF {
            "end of input".to_string()
        } else {
            format!("'{}'", token.lexeme)
        };
        self.error_at(token, "parser.unexpected-token", format!("expected {context}, found {found}"))
    }

    pub(super) fn error_at(
        &self,
        token: &Token,
        code: &'static str,
        message: impl Into<String>,
    ) -> MachineError {
        MachineError::Diagnostics {
            phase: DiagnosticPhase::Parser,
            diagnostics: vec![MachineDiagnostic::error(
                DiagnosticPhase::Parser,
                code,
                message,
                Some(span_from_token(self.file_path(), token)),
            )],
        }
    }

    /// Attaches the span of the construct starting at `start` to a builder failure.
    pub(super) fn lift<T>(
        &self,
        result: Result<T, SemanticError>,
        start: &Token,
    ) -> Result<T, MachineError> {
        result.map_err(|err| {
            let end = self.last_token.as_ref().unwrap_or(start);
            MachineError::Diagnostics {
                phase: DiagnosticPhase::Semantic,
                diagnostics: vec![MachineDiagnostic::error(
                    DiagnosticPhase::Semantic,
                    err.code(),
                    err.to_string(),
                    Some(span_from_tokens(self.file_path(), start, end)),
                )],
            }
        })
    }
}

pub(super) fn field_value(token: &Token) -> BitField {
    match token.value {
        TokenValue::Field(field) => field,
        _ => unreachable!("field tokens carry a bit field"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::parse_str;
    use crate::model::diagnostic::DiagnosticPhase;
    use crate::model::error::MachineError;

    fn diag(src: &str) -> (DiagnosticPhase, &'static str, usize) {
        match parse_str(PathBuf::from("<test>"), src).expect_err("expected failure") {
            MachineError::Diagnostics { phase, diagnostics } => {
                let first = &diagnostics[0];
                let line = first.span.as_ref().map(|span| span.start.line).unwrap_or(0);
                (phase, first.code, line)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn parses_empty_machine() {
        let machine = parse_str(PathBuf::from("<test>"), "machine empty { }").expect("parse");
        assert_eq!(machine.name(), "empty");
        assert!(machine.entries().is_empty());
    }

    #[test]
    fn rejects_trailing_tokens() {
        let (phase, code, _) = diag("machine m { } set");
        assert_eq!(phase, DiagnosticPhase::Parser);
        assert_eq!(code, "parser.unexpected-token");
    }

    #[test]
    fn semantic_errors_carry_construct_location() {
        let (phase, code, line) = diag(
            "machine m {\n  immediate a [8];\n  immediate a [16];\n}",
        );
        assert_eq!(phase, DiagnosticPhase::Semantic);
        assert_eq!(code, "semantic.duplicate-definition");
        assert_eq!(line, 3);
    }

    #[test]
    fn lexer_errors_surface_unchanged() {
        let (phase, code, _) = diag("machine m { immediate a [8-nibble]; }");
        assert_eq!(phase, DiagnosticPhase::Lexer);
        assert_eq!(code, "lexer.width.unit");
    }
}
