//! Runtime generation of actionless scanners (lexeme recognizers).
//!
//! A lexer is compiled from a mapping between token definitions and numeric
//! token ids, plus an optional EBNF grammar and an optional list of start
//! sets (the moral equivalent of start conditions in LEX). Token definitions
//! are literals, inline regular expressions written `/re/`, or identifiers
//! resolved against the grammar. The result is a Unicode rune based NFA
//! shared read-only by any number of scanners.
//!
//! The regular expression subset:
//!
//! ```text
//! .            any rune except newline
//! [xyz]        character class
//! [^xyz]       negated character class
//! \p{Greek}    Unicode character class (general categories and scripts)
//! \P{Greek}    negated Unicode character class
//! xy           concatenation        x|y          alternation
//! x*  x+  x?   repetition
//! (re)         grouping
//! ^  $  \A \z  anchors (recorded for the scanner to enforce)
//! \a \b \f \n \r \t \v    fixed code points
//! \M           M one of \.+*?()|[]^$
//! \xhh         rune from two hex digits
//! ```

mod compiler;
mod errors;
mod lower;
mod ranges;
mod regex;
mod source;
mod unicode;

pub use compiler::{compile, must_compile, Lexer, StartSetId, TokenId};
pub use errors::{CompileError, RegexError};
pub use ranges::{RangeSet, Rune, RuneRange, RUNE_MAX};
pub use source::{string_reader, Position, RuneReader, ScannerRune, ScannerSource, Source};
pub use unicode::class_ranges;

pub use runelex_automaton::{Anchor, Nfa, NfaEdge, StateId};
