//! Machine description loading helpers (lexer, parser, file loader).

pub mod extension;
pub mod lexer;
pub mod loader;
pub mod parser;

pub use lexer::{Lexer, Token, TokenKind};
pub use loader::MachineLoader;
pub use parser::{Parser, parse_str, parse_str_with_config};
