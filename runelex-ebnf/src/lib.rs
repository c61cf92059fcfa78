//! Parser and verifier for Wirth-style EBNF grammars.
//!
//! ```text
//! Production  = name "=" Expression "." .
//! Expression  = Alternative { "|" Alternative } .
//! Alternative = Term { Term } .
//! Term        = name | token [ "…" token ] | Group | Option | Repetition .
//! Group       = "(" Expression ")" .
//! Option      = "[" Expression "]" .
//! Repetition  = "{" Expression "}" .
//! ```
//!
//! The range ellipsis is `…` (U+2026); the ASCII spelling `...` is accepted
//! as well.

use std::collections::{HashMap, HashSet};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while_m_n},
    character::complete::{anychar, char, multispace0, none_of, satisfy},
    combinator::{map, opt, recognize},
    multi::{many0, many1, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Alternative(Vec<Expression>),
    Sequence(Vec<Expression>),
    /// Reference to another production.
    Name(String),
    /// A literal token (already unescaped).
    Token(String),
    /// Inclusive range between two single-rune tokens, `"a" … "z"`.
    Range { low: String, high: String },
    Group(Box<Expression>),
    Optional(Box<Expression>),
    Repetition(Box<Expression>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Production {
    pub name: String,
    pub expr: Expression,
}

/// A parsed grammar. Productions keep their source order so that diagnostics
/// and verification are deterministic.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    productions: Vec<Production>,
    index: HashMap<String, usize>,
}

impl Grammar {
    pub fn get(&self, name: &str) -> Option<&Production> {
        self.index.get(name).map(|i| &self.productions[*i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn productions(&self) -> impl Iterator<Item = &Production> {
        self.productions.iter()
    }

    pub fn len(&self) -> usize {
        self.productions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("{line}:{column}: grammar syntax error near {snippet:?}")]
    Syntax {
        line: u32,
        column: u32,
        snippet: String,
    },
    #[error("duplicate production {name:?}")]
    DuplicateProduction { name: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("missing start production {name:?}")]
    MissingStart { name: String },
    #[error("undefined production {name:?}")]
    Undefined { name: String },
    #[error("production {name:?} is unreachable from {start:?}")]
    Unreachable { name: String, start: String },
    #[error("range endpoints must be single-character tokens: {low:?} … {high:?}")]
    InvalidRange { low: String, high: String },
}

/// Parses an EBNF source text into a [`Grammar`].
pub fn parse(src: &str) -> Result<Grammar, ParseError> {
    let (rest, productions) = parse_productions(src).map_err(|err| match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => syntax_error(src, e.input),
        nom::Err::Incomplete(_) => syntax_error(src, ""),
    })?;
    if !rest.trim().is_empty() {
        return Err(syntax_error(src, rest));
    }
    let mut grammar = Grammar::default();
    for production in productions {
        if grammar.contains(&production.name) {
            return Err(ParseError::DuplicateProduction {
                name: production.name,
            });
        }
        grammar
            .index
            .insert(production.name.clone(), grammar.productions.len());
        grammar.productions.push(production);
    }
    Ok(grammar)
}

/// Checks that `start` exists, that every referenced production is defined,
/// and that every production is reachable from `start`.
pub fn verify(grammar: &Grammar, start: &str) -> Result<(), VerifyError> {
    if !grammar.contains(start) {
        return Err(VerifyError::MissingStart {
            name: start.to_string(),
        });
    }

    let mut visited = HashSet::new();
    let mut stack = vec![start.to_string()];
    while let Some(name) = stack.pop() {
        if !visited.insert(name.clone()) {
            continue;
        }
        let production = grammar
            .get(&name)
            .ok_or(VerifyError::Undefined { name })?;
        check_ranges(&production.expr)?;
        let mut references = Vec::new();
        collect_names(&production.expr, &mut references);
        stack.extend(references);
    }

    for production in grammar.productions() {
        if !visited.contains(&production.name) {
            return Err(VerifyError::Unreachable {
                name: production.name.clone(),
                start: start.to_string(),
            });
        }
    }
    Ok(())
}

fn check_ranges(expr: &Expression) -> Result<(), VerifyError> {
    match expr {
        Expression::Alternative(items) | Expression::Sequence(items) => {
            items.iter().try_for_each(check_ranges)
        }
        Expression::Range { low, high } => {
            if low.chars().count() == 1 && high.chars().count() == 1 {
                Ok(())
            } else {
                Err(VerifyError::InvalidRange {
                    low: low.clone(),
                    high: high.clone(),
                })
            }
        }
        Expression::Name(_) | Expression::Token(_) => Ok(()),
        Expression::Group(body) | Expression::Optional(body) | Expression::Repetition(body) => {
            check_ranges(body)
        }
    }
}

fn collect_names(expr: &Expression, out: &mut Vec<String>) {
    match expr {
        Expression::Alternative(items) | Expression::Sequence(items) => {
            for item in items {
                collect_names(item, out);
            }
        }
        Expression::Name(name) => out.push(name.clone()),
        Expression::Token(_) | Expression::Range { .. } => {}
        Expression::Group(body) | Expression::Optional(body) | Expression::Repetition(body) => {
            collect_names(body, out)
        }
    }
}

fn syntax_error(src: &str, rest: &str) -> ParseError {
    let consumed = src.len() - rest.len();
    let prefix = &src[..consumed];
    let line = prefix.matches('\n').count() as u32 + 1;
    let column = prefix
        .rsplit_once('\n')
        .map(|(_, tail)| tail)
        .unwrap_or(prefix)
        .chars()
        .count() as u32
        + 1;
    let snippet: String = rest.chars().take(20).collect();
    ParseError::Syntax {
        line,
        column,
        snippet,
    }
}

fn parse_productions(input: &str) -> IResult<&str, Vec<Production>> {
    preceded(
        multispace0,
        many1(terminated(parse_production, multispace0)),
    )(input)
}

fn parse_production(input: &str) -> IResult<&str, Production> {
    let (input, name) = parse_ident(input)?;
    let (input, _) = delimited(multispace0, char('='), multispace0)(input)?;
    let (input, expr) = parse_expression(input)?;
    let (input, _) = preceded(multispace0, char('.'))(input)?;
    Ok((
        input,
        Production {
            name: name.to_string(),
            expr,
        },
    ))
}

fn parse_expression(input: &str) -> IResult<&str, Expression> {
    let (input, mut alternatives) = separated_list1(
        delimited(multispace0, char('|'), multispace0),
        parse_sequence,
    )(input)?;
    if alternatives.len() == 1 {
        Ok((input, alternatives.remove(0)))
    } else {
        Ok((input, Expression::Alternative(alternatives)))
    }
}

fn parse_sequence(input: &str) -> IResult<&str, Expression> {
    let (input, mut terms) = many1(preceded(multispace0, parse_term))(input)?;
    if terms.len() == 1 {
        Ok((input, terms.remove(0)))
    } else {
        Ok((input, Expression::Sequence(terms)))
    }
}

fn parse_term(input: &str) -> IResult<&str, Expression> {
    alt((
        parse_token_or_range,
        map(parse_ident, |name| Expression::Name(name.to_string())),
        map(
            delimited(
                char('('),
                delimited(multispace0, parse_expression, multispace0),
                char(')'),
            ),
            |body| Expression::Group(Box::new(body)),
        ),
        map(
            delimited(
                char('['),
                delimited(multispace0, parse_expression, multispace0),
                char(']'),
            ),
            |body| Expression::Optional(Box::new(body)),
        ),
        map(
            delimited(
                char('{'),
                delimited(multispace0, parse_expression, multispace0),
                char('}'),
            ),
            |body| Expression::Repetition(Box::new(body)),
        ),
    ))(input)
}

fn parse_token_or_range(input: &str) -> IResult<&str, Expression> {
    let (input, low) = parse_token(input)?;
    let (input, high) = opt(preceded(
        tuple((multispace0, parse_ellipsis, multispace0)),
        parse_token,
    ))(input)?;
    let expr = match high {
        Some(high) => Expression::Range { low, high },
        None => Expression::Token(low),
    };
    Ok((input, expr))
}

fn parse_ellipsis(input: &str) -> IResult<&str, &str> {
    alt((tag("…"), tag("...")))(input)
}

fn parse_token(input: &str) -> IResult<&str, String> {
    let (input, chars) = delimited(
        char('"'),
        many0(alt((parse_token_escape, none_of("\"\\")))),
        char('"'),
    )(input)?;
    Ok((input, chars.into_iter().collect()))
}

fn parse_token_escape(input: &str) -> IResult<&str, char> {
    let (input, _) = char('\\')(input)?;
    let (input, ch) = anychar(input)?;
    let ch = match ch {
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        '\\' => '\\',
        '"' => '"',
        'x' => {
            let (input, digits) =
                take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit())(input)?;
            let code = u32::from_str_radix(digits, 16).unwrap();
            return Ok((input, char::from_u32(code).unwrap()));
        }
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Escaped,
            )))
        }
    };
    Ok((input, ch))
}

fn parse_ident(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}
