use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result as LspResult;
use tower_lsp::lsp_types::{
    Diagnostic, DiagnosticSeverity, DidChangeTextDocumentParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, InitializeParams, InitializeResult, InitializedParams, MessageType,
    NumberOrString, Position, Range, SemanticToken, SemanticTokenModifier, SemanticTokenType,
    SemanticTokens, SemanticTokensFullOptions, SemanticTokensLegend, SemanticTokensOptions,
    SemanticTokensParams, SemanticTokensResult, SemanticTokensServerCapabilities,
    ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, Url,
};
use tower_lsp::{Client, LanguageServer, LspService, Server, async_trait};
use tracing::debug;

use crate::loader::machine::lexer::{Lexer, Token, TokenKind};
use crate::loader::machine::parser::parse_str;
use crate::model::diagnostic::{DiagnosticLevel, MachineDiagnostic, SourceSpan};
use crate::model::error::MachineError;

const SUPPORTED_EXTENSIONS: &[&str] = &["mm", "machine"];
const SEMANTIC_TOKEN_TYPES: &[&str] = &[
    "comment",
    "number",
    "keyword",
    "machineEntity",
    "machineReference",
    "machineField",
    "operator",
];

#[derive(Clone)]
struct DocumentEntry {
    text: String,
    version: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HighlightKind {
    Comment,
    Number,
    Keyword,
    Entity,
    Reference,
    Field,
    Operator,
}

impl HighlightKind {
    fn index(self) -> u32 {
        match self {
            HighlightKind::Comment => 0,
            HighlightKind::Number => 1,
            HighlightKind::Keyword => 2,
            HighlightKind::Entity => 3,
            HighlightKind::Reference => 4,
            HighlightKind::Field => 5,
            HighlightKind::Operator => 6,
        }
    }

    fn classify(token: &Token, previous: Option<&Token>) -> Option<Self> {
        match token.kind {
            kind if kind.is_keyword() => Some(HighlightKind::Keyword),
            TokenKind::Identifier => {
                let declares = previous.is_some_and(|prev| {
                    matches!(
                        prev.kind,
                        TokenKind::Machine
                            | TokenKind::Register
                            | TokenKind::Memory
                            | TokenKind::Immediate
                            | TokenKind::Set
                            | TokenKind::Instruction
                    )
                });
                Some(if declares {
                    HighlightKind::Entity
                } else {
                    HighlightKind::Reference
                })
            }
            TokenKind::Number => Some(HighlightKind::Number),
            TokenKind::Width | TokenKind::Field | TokenKind::Default | TokenKind::Tick => {
                Some(HighlightKind::Field)
            }
            TokenKind::Dollar
            | TokenKind::GreaterThan
            | TokenKind::Caret
            | TokenKind::Tilde
            | TokenKind::Ampersand
            | TokenKind::Equals => Some(HighlightKind::Operator),
            _ => None,
        }
    }
}

struct HighlightSpan {
    line: u32,
    start: u32,
    length: u32,
    kind: HighlightKind,
}

/// LSP backend that surfaces lexer, parser and semantic diagnostics for machine descriptions.
pub struct MachineLanguageServer {
    client: Client,
    documents: Arc<RwLock<HashMap<Url, DocumentEntry>>>,
    legend: SemanticTokensLegend,
}

impl MachineLanguageServer {
    pub fn new(client: Client) -> Self {
        let legend = SemanticTokensLegend {
            token_types: SEMANTIC_TOKEN_TYPES
                .iter()
                .map(|value| SemanticTokenType::new(*value))
                .collect(),
            token_modifiers: Vec::<SemanticTokenModifier>::new(),
        };
        Self {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            legend,
        }
    }

    async fn refresh_document(&self, uri: &Url) {
        let snapshot = {
            let docs = self.documents.read().await;
            docs.get(uri).cloned()
        };
        if let Some(entry) = snapshot {
            let diagnostics = Self::check_document(uri, &entry.text);
            self.client
                .publish_diagnostics(uri.clone(), diagnostics, Some(entry.version))
                .await;
        }
    }

    async fn remove_document(&self, uri: &Url) {
        self.documents.write().await.remove(uri);
        self.client
            .publish_diagnostics(uri.clone(), Vec::new(), None)
            .await;
    }

    fn check_document(uri: &Url, text: &str) -> Vec<Diagnostic> {
        match parse_str(Self::path_from_uri(uri), text) {
            Ok(machine) => {
                debug!(target: "xmachine", machine = %machine.name(), %uri, "document clean");
                Vec::new()
            }
            Err(err) => Self::diagnostics_from_error(err),
        }
    }

    fn diagnostics_from_error(err: MachineError) -> Vec<Diagnostic> {
        match err {
            MachineError::Diagnostics { diagnostics, .. } => diagnostics
                .into_iter()
                .map(Self::machine_diag_to_lsp)
                .collect(),
            other => other
                .diagnostics()
                .into_iter()
                .map(Self::machine_diag_to_lsp)
                .collect(),
        }
    }

    fn machine_diag_to_lsp(diag: MachineDiagnostic) -> Diagnostic {
        let MachineDiagnostic {
            phase,
            level,
            code,
            message,
            span,
        } = diag;
        let range = span.as_ref().map(Self::range_from_span).unwrap_or_default();
        let severity = Some(match level {
            DiagnosticLevel::Error => DiagnosticSeverity::ERROR,
            DiagnosticLevel::Warning => DiagnosticSeverity::WARNING,
        });
        Diagnostic {
            range,
            severity,
            code: Some(NumberOrString::String(code.into())),
            source: Some(format!("xmachine-{phase:?}").to_ascii_lowercase()),
            message,
            ..Diagnostic::default()
        }
    }

    fn range_from_span(span: &SourceSpan) -> Range {
        Range {
            start: Position {
                line: span.start.line.saturating_sub(1) as u32,
                character: span.start.column.saturating_sub(1) as u32,
            },
            end: Position {
                line: span.end.line.saturating_sub(1) as u32,
                character: span.end.column.saturating_sub(1) as u32,
            },
        }
    }

    fn path_from_uri(uri: &Url) -> PathBuf {
        uri.to_file_path()
            .unwrap_or_else(|_| PathBuf::from(uri.path()))
    }

    fn is_supported_uri(uri: &Url) -> bool {
        Self::path_from_uri(uri)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                SUPPORTED_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    fn build_semantic_tokens_for_text(uri: &Url, text: &str) -> Vec<SemanticToken> {
        let mut spans = Self::collect_comment_spans(text);
        let tokens = Self::collect_tokens(uri, text);
        let mut previous: Option<&Token> = None;
        for token in &tokens {
            if let Some(kind) = HighlightKind::classify(token, previous) {
                spans.push(HighlightSpan {
                    line: token.line.saturating_sub(1) as u32,
                    start: token.column.saturating_sub(1) as u32,
                    length: (token.lexeme.chars().count() as u32).max(1),
                    kind,
                });
            }
            previous = Some(token);
        }
        spans.sort_by(|a, b| (a.line, a.start).cmp(&(b.line, b.start)));
        Self::encode_semantic_tokens(spans)
    }

    /// Tokens up to the first lexer error; highlighting stops there.
    fn collect_tokens(uri: &Url, text: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(text, Self::path_from_uri(uri));
        let mut tokens = Vec::new();
        loop {
            match lexer.next_token() {
                Ok(token) => {
                    if token.kind == TokenKind::EOF {
                        break;
                    }
                    tokens.push(token);
                }
                Err(err) => {
                    debug!(target: "xmachine", %uri, error = %err, "semantic token lexer error");
                    break;
                }
            }
        }
        tokens
    }

    fn encode_semantic_tokens(spans: Vec<HighlightSpan>) -> Vec<SemanticToken> {
        let mut data = Vec::with_capacity(spans.len());
        let mut prev_line = 0u32;
        let mut prev_start = 0u32;
        for span in spans {
            let delta_line = span.line.saturating_sub(prev_line);
            let delta_start = if delta_line == 0 {
                span.start.saturating_sub(prev_start)
            } else {
                span.start
            };
            data.push(SemanticToken {
                delta_line,
                delta_start,
                length: span.length,
                token_type: span.kind.index(),
                token_modifiers_bitset: 0,
            });
            prev_line = span.line;
            prev_start = span.start;
        }
        data
    }

    fn collect_comment_spans(text: &str) -> Vec<HighlightSpan> {
        let mut spans = Vec::new();
        for (line, content) in text.split('\n').enumerate() {
            let chars: Vec<char> = content.trim_end_matches('\r').chars().collect();
            let start = chars.iter().enumerate().position(|(idx, ch)| {
                *ch == '#' || (*ch == '/' && chars.get(idx + 1) == Some(&'/'))
            });
            if let Some(start) = start {
                spans.push(HighlightSpan {
                    line: line as u32,
                    start: start as u32,
                    length: (chars.len() - start) as u32,
                    kind: HighlightKind::Comment,
                });
            }
        }
        spans
    }
}

#[async_trait]
impl LanguageServer for MachineLanguageServer {
    async fn initialize(&self, _: InitializeParams) -> LspResult<InitializeResult> {
        let capabilities = ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Options(
                TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(TextDocumentSyncKind::FULL),
                    ..Default::default()
                },
            )),
            semantic_tokens_provider: Some(
                SemanticTokensServerCapabilities::SemanticTokensOptions(SemanticTokensOptions {
                    legend: self.legend.clone(),
                    full: Some(SemanticTokensFullOptions::Bool(true)),
                    ..SemanticTokensOptions::default()
                }),
            ),
            ..ServerCapabilities::default()
        };
        Ok(InitializeResult {
            capabilities,
            server_info: Some(ServerInfo {
                name: "xmachine".into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "machine description language server initialized")
            .await;
    }

    async fn shutdown(&self) -> LspResult<()> {
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        if !Self::is_supported_uri(&doc.uri) {
            return;
        }
        self.documents.write().await.insert(
            doc.uri.clone(),
            DocumentEntry {
                text: doc.text,
                version: doc.version,
            },
        );
        self.refresh_document(&doc.uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        if !Self::is_supported_uri(&uri) {
            return;
        }
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };
        self.documents.write().await.insert(
            uri.clone(),
            DocumentEntry {
                text: change.text,
                version: params.text_document.version,
            },
        );
        self.refresh_document(&uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.remove_document(&params.text_document.uri).await;
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> LspResult<Option<SemanticTokensResult>> {
        let uri = params.text_document.uri;
        let snapshot = {
            let docs = self.documents.read().await;
            docs.get(&uri).cloned()
        };
        let data = snapshot
            .map(|entry| Self::build_semantic_tokens_for_text(&uri, &entry.text))
            .unwrap_or_default();
        Ok(Some(
            SemanticTokens {
                result_id: None,
                data,
            }
            .into(),
        ))
    }
}

async fn run_stdio_language_server_impl<F>(factory: F) -> LspResult<()>
where
    F: Fn(Client) -> MachineLanguageServer,
{
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let (service, socket) = LspService::build(|client| factory(client)).finish();
    Server::new(stdin, stdout, socket).serve(service).await;
    Ok(())
}

pub async fn run_stdio_language_server() -> LspResult<()> {
    run_stdio_language_server_impl(MachineLanguageServer::new).await
}
