//! Recursive descent parser for the supported regular expression subset,
//! building Thompson fragments directly into an [`Nfa`].

use std::iter::Peekable;
use std::str::Chars;

use runelex_automaton::{Anchor, Nfa, StateId};

use crate::errors::RegexError;
use crate::ranges::{RangeSet, Rune, RUNE_MAX};
use crate::unicode;

const NEWLINE: Rune = 0x0A;

/// `(entry, exit)` of a partial automaton.
pub(crate) type Fragment = (StateId, StateId);

/// Parses `pattern` and wires its states into `nfa`, returning the entry and
/// exit of the produced fragment.
pub(crate) fn parse_regex(
    nfa: &mut Nfa<RangeSet>,
    pattern: &str,
) -> Result<Fragment, RegexError> {
    let mut parser = Parser {
        chars: pattern.chars().peekable(),
        nfa,
    };
    let fragment = parser.alternation()?;
    match parser.chars.next() {
        // only an unmatched ')' can stop the descent early
        Some(_) => Err(RegexError::UnbalancedParen),
        None => Ok(fragment),
    }
}

/// Escapes every regex metacharacter in `text`, yielding a pattern matching
/// the literal string.
pub(crate) fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_metachar(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn is_metachar(c: char) -> bool {
    matches!(
        c,
        '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '^' | '$' | '-'
    )
}

enum ClassItem {
    Rune(Rune),
    Set(RangeSet),
}

struct Parser<'pattern, 'nfa> {
    chars: Peekable<Chars<'pattern>>,
    nfa: &'nfa mut Nfa<RangeSet>,
}

impl<'pattern, 'nfa> Parser<'pattern, 'nfa> {
    // alternation < concatenation < repetition < primary
    fn alternation(&mut self) -> Result<Fragment, RegexError> {
        let first = self.concatenation()?;
        if self.chars.peek() != Some(&'|') {
            return Ok(first);
        }
        let entry = self.nfa.add_state();
        let exit = self.nfa.add_state();
        self.nfa.add_epsilon(entry, first.0, 0);
        self.nfa.add_epsilon(first.1, exit, 0);
        while self.eat('|') {
            let branch = self.concatenation()?;
            self.nfa.add_epsilon(entry, branch.0, 0);
            self.nfa.add_epsilon(branch.1, exit, 0);
        }
        Ok((entry, exit))
    }

    fn concatenation(&mut self) -> Result<Fragment, RegexError> {
        let mut fragment = self.repetition()?;
        while self.starts_primary() {
            let next = self.repetition()?;
            self.nfa.add_epsilon(fragment.1, next.0, 0);
            fragment = (fragment.0, next.1);
        }
        Ok(fragment)
    }

    fn starts_primary(&mut self) -> bool {
        !matches!(self.chars.peek(), None | Some(')') | Some('|'))
    }

    fn repetition(&mut self) -> Result<Fragment, RegexError> {
        let mut fragment = self.primary()?;
        loop {
            fragment = match self.chars.peek() {
                Some('*') => {
                    self.chars.next();
                    self.star(fragment)
                }
                Some('+') => {
                    self.chars.next();
                    self.plus(fragment)
                }
                Some('?') => {
                    self.chars.next();
                    self.question(fragment)
                }
                _ => break,
            };
        }
        Ok(fragment)
    }

    fn star(&mut self, (inner_entry, inner_exit): Fragment) -> Fragment {
        let entry = self.nfa.add_state();
        let exit = self.nfa.add_state();
        self.nfa.add_epsilon(entry, inner_entry, 0);
        self.nfa.add_epsilon(entry, exit, 0);
        self.nfa.add_epsilon(inner_exit, inner_entry, 0);
        self.nfa.add_epsilon(inner_exit, exit, 0);
        (entry, exit)
    }

    fn plus(&mut self, (inner_entry, inner_exit): Fragment) -> Fragment {
        let entry = self.nfa.add_state();
        let exit = self.nfa.add_state();
        self.nfa.add_epsilon(entry, inner_entry, 0);
        self.nfa.add_epsilon(inner_exit, inner_entry, 0);
        self.nfa.add_epsilon(inner_exit, exit, 0);
        (entry, exit)
    }

    fn question(&mut self, (inner_entry, inner_exit): Fragment) -> Fragment {
        let entry = self.nfa.add_state();
        let exit = self.nfa.add_state();
        self.nfa.add_epsilon(entry, inner_entry, 0);
        self.nfa.add_epsilon(entry, exit, 0);
        self.nfa.add_epsilon(inner_exit, exit, 0);
        (entry, exit)
    }

    fn primary(&mut self) -> Result<Fragment, RegexError> {
        let c = self.chars.next().ok_or(RegexError::UnexpectedEnd)?;
        match c {
            '(' => {
                let inner = self.alternation()?;
                if !self.eat(')') {
                    return Err(RegexError::UnbalancedParen);
                }
                Ok(inner)
            }
            ')' => Err(RegexError::UnbalancedParen),
            '|' => Err(RegexError::UnexpectedEnd),
            '[' => self.class(),
            '.' => {
                let mut any = RangeSet::new();
                any.push(0, NEWLINE - 1);
                any.push(NEWLINE + 1, RUNE_MAX);
                Ok(self.set_fragment(any))
            }
            '^' => Ok(self.anchor_fragment(Anchor::LineStart)),
            '$' => Ok(self.anchor_fragment(Anchor::LineEnd)),
            '\\' => self.escaped_primary(),
            other => Ok(self.set_fragment(RangeSet::single(other as Rune))),
        }
    }

    fn escaped_primary(&mut self) -> Result<Fragment, RegexError> {
        match self.chars.peek().ok_or(RegexError::UnexpectedEnd)? {
            'A' => {
                self.chars.next();
                Ok(self.anchor_fragment(Anchor::TextStart))
            }
            'z' => {
                self.chars.next();
                Ok(self.anchor_fragment(Anchor::TextEnd))
            }
            'p' => {
                self.chars.next();
                let set = self.unicode_class(false)?;
                Ok(self.set_fragment(set))
            }
            'P' => {
                self.chars.next();
                let set = self.unicode_class(true)?;
                Ok(self.set_fragment(set))
            }
            _ => {
                let rune = self.escape_rune()?;
                Ok(self.set_fragment(RangeSet::single(rune)))
            }
        }
    }

    /// One escape following a consumed backslash, excluding anchors and
    /// `\p`/`\P` which the callers handle themselves.
    fn escape_rune(&mut self) -> Result<Rune, RegexError> {
        let c = self.chars.next().ok_or(RegexError::UnexpectedEnd)?;
        match c {
            'a' => Ok(0x07),
            'b' => Ok(0x08),
            'f' => Ok(0x0C),
            'n' => Ok(0x0A),
            'r' => Ok(0x0D),
            't' => Ok(0x09),
            'v' => Ok(0x0B),
            'x' => self.hex_escape(),
            c if is_metachar(c) => Ok(c as Rune),
            other => Err(RegexError::UnknownEscape { escape: other }),
        }
    }

    fn hex_escape(&mut self) -> Result<Rune, RegexError> {
        let mut value: Rune = 0;
        for _ in 0..2 {
            let digit = self.chars.next().ok_or(RegexError::UnexpectedEnd)?;
            let digit = digit.to_digit(16).ok_or(RegexError::BadHexEscape)?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    fn unicode_class(&mut self, negated: bool) -> Result<RangeSet, RegexError> {
        match self.chars.next() {
            Some('{') => {}
            Some(_) => {
                return Err(RegexError::UnknownEscape {
                    escape: if negated { 'P' } else { 'p' },
                })
            }
            None => return Err(RegexError::UnexpectedEnd),
        }
        let mut name = String::new();
        loop {
            match self.chars.next() {
                Some('}') => break,
                Some(c) => name.push(c),
                None => return Err(RegexError::UnexpectedEnd),
            }
        }
        let set = unicode::class_ranges(&name)?;
        Ok(if negated { set.complement() } else { set })
    }

    fn class(&mut self) -> Result<Fragment, RegexError> {
        let negated = self.eat('^');
        let mut set = RangeSet::new();
        loop {
            match self.chars.peek() {
                None => return Err(RegexError::UnbalancedBracket),
                Some(']') => {
                    self.chars.next();
                    break;
                }
                _ => {}
            }
            match self.class_item()? {
                ClassItem::Set(ranges) => set.union(&ranges),
                ClassItem::Rune(lo) => {
                    if self.chars.peek() == Some(&'-') {
                        self.chars.next();
                        match self.chars.peek() {
                            // trailing '-' is a literal
                            Some(']') | None => {
                                set.push(lo, lo);
                                set.push('-' as Rune, '-' as Rune);
                            }
                            _ => match self.class_item()? {
                                ClassItem::Rune(hi) => {
                                    if hi < lo {
                                        return Err(RegexError::BadRange { lo, hi });
                                    }
                                    set.push(lo, hi);
                                }
                                ClassItem::Set(_) => {
                                    return Err(RegexError::BadRange { lo, hi: lo })
                                }
                            },
                        }
                    } else {
                        set.push(lo, lo);
                    }
                }
            }
        }
        set.normalize();
        if negated {
            set = set.complement();
        }
        Ok(self.set_fragment(set))
    }

    fn class_item(&mut self) -> Result<ClassItem, RegexError> {
        let c = self.chars.next().ok_or(RegexError::UnbalancedBracket)?;
        if c != '\\' {
            return Ok(ClassItem::Rune(c as Rune));
        }
        match self.chars.peek() {
            Some('p') => {
                self.chars.next();
                Ok(ClassItem::Set(self.unicode_class(false)?))
            }
            Some('P') => {
                self.chars.next();
                Ok(ClassItem::Set(self.unicode_class(true)?))
            }
            _ => Ok(ClassItem::Rune(self.escape_rune()?)),
        }
    }

    fn set_fragment(&mut self, mut set: RangeSet) -> Fragment {
        set.normalize();
        let entry = self.nfa.add_state();
        let exit = self.nfa.add_state();
        self.nfa.add_transition(entry, exit, set);
        (entry, exit)
    }

    fn anchor_fragment(&mut self, anchor: Anchor) -> Fragment {
        let entry = self.nfa.add_state();
        let exit = self.nfa.add_state();
        self.nfa.add_anchor(entry, exit, anchor);
        (entry, exit)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.chars.peek() == Some(&expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }
}
