//! Lowering of EBNF productions into regular expression strings that the
//! regex parser accepts.

use std::collections::HashMap;

use runelex_ebnf::{Expression, Grammar, VerifyError};

use crate::compiler::inline_regex;
use crate::errors::CompileError;
use crate::regex::quote;

/// Memo of already translated productions; `None` marks one whose
/// translation is still on the stack, i.e. a reference cycle.
pub(crate) type Memo = HashMap<String, Option<String>>;

/// Translates production `name` of a verified grammar into a regex matching
/// the same language.
pub(crate) fn production_regex(
    grammar: &Grammar,
    name: &str,
    memo: &mut Memo,
) -> Result<String, CompileError> {
    if let Some(entry) = memo.get(name) {
        return match entry {
            Some(regex) => Ok(regex.clone()),
            None => Err(CompileError::RecursiveProduction {
                name: name.to_string(),
            }),
        };
    }
    let production = grammar.get(name).ok_or_else(|| {
        CompileError::GrammarVerify(VerifyError::Undefined {
            name: name.to_string(),
        })
    })?;
    memo.insert(name.to_string(), None);
    let mut out = String::new();
    translate(grammar, &production.expr, memo, &mut out)?;
    memo.insert(name.to_string(), Some(out.clone()));
    Ok(out)
}

fn translate(
    grammar: &Grammar,
    expr: &Expression,
    memo: &mut Memo,
    out: &mut String,
) -> Result<(), CompileError> {
    match expr {
        Expression::Alternative(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push('|');
                }
                translate(grammar, item, memo, out)?;
            }
        }
        Expression::Sequence(items) => {
            for item in items {
                translate(grammar, item, memo, out)?;
            }
        }
        Expression::Group(body) => {
            out.push('(');
            translate(grammar, body, memo, out)?;
            out.push(')');
        }
        Expression::Optional(body) => {
            out.push('(');
            translate(grammar, body, memo, out)?;
            out.push_str(")?");
        }
        Expression::Repetition(body) => {
            out.push('(');
            translate(grammar, body, memo, out)?;
            out.push_str(")*");
        }
        Expression::Name(name) => {
            let inner = production_regex(grammar, name, memo)?;
            out.push('(');
            out.push_str(&inner);
            out.push(')');
        }
        Expression::Token(text) => match inline_regex(text) {
            Some(inner) => out.push_str(inner),
            None => out.push_str(&quote(text)),
        },
        Expression::Range { low, high } => {
            let (lo, hi) = (single_rune(low, high)?, single_rune(high, low)?);
            out.push('[');
            out.push_str(&quote(&lo.to_string()));
            out.push('-');
            out.push_str(&quote(&hi.to_string()));
            out.push(']');
        }
    }
    Ok(())
}

// the verifier guarantees single-rune endpoints; fail cleanly if bypassed
fn single_rune(token: &str, other: &str) -> Result<char, CompileError> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(CompileError::GrammarVerify(VerifyError::InvalidRange {
            low: token.to_string(),
            high: other.to_string(),
        })),
    }
}
