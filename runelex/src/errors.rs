use thiserror::Error;

use crate::compiler::TokenId;
use crate::ranges::Rune;

/// Rejection reasons of the regular expression parser.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegexError {
    #[error("unexpected end of pattern")]
    UnexpectedEnd,
    #[error("unbalanced '('")]
    UnbalancedParen,
    #[error("unbalanced '['")]
    UnbalancedBracket,
    #[error("unknown escape '\\{escape}'")]
    UnknownEscape { escape: char },
    #[error("unknown unicode class {name:?}")]
    UnknownClass { name: String },
    #[error("bad hex escape")]
    BadHexEscape,
    #[error("bad range: {hi:#x} < {lo:#x}")]
    BadRange { lo: Rune, hi: Rune },
}

/// Everything that can go wrong while compiling a lexer. The compiler stops
/// at the first failure; no partial lexer is ever observable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("duplicate id {id} for token {token:?}")]
    DuplicateTokenId { id: TokenId, token: String },
    #[error("id 0 is reserved, used for token {token:?}")]
    ReservedTokenId { token: String },
    #[error("unknown token id {id} in start set {set}")]
    UnknownTokenInStartSet { id: TokenId, set: usize },
    #[error("grammar parse error: {0}")]
    GrammarParse(#[from] runelex_ebnf::ParseError),
    #[error("grammar verify error: {0}")]
    GrammarVerify(#[from] runelex_ebnf::VerifyError),
    #[error("recursive production {name:?}")]
    RecursiveProduction { name: String },
    #[error("unknown unicode class {name:?} in {label}")]
    UnknownUnicodeClass { label: String, name: String },
    #[error("regex syntax error in {label}: {source}")]
    RegexSyntax { label: String, source: RegexError },
}
