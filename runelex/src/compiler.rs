use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display};

use log::debug;
use runelex_automaton::{Nfa, NfaEdge, StateId};

use crate::errors::{CompileError, RegexError};
use crate::lower;
use crate::ranges::RangeSet;
use crate::regex::{self, quote};

/// Numeric identifier of a lexeme class. Id 0 is reserved: inside the NFA a
/// token id travels as the priority of a non-consuming edge, and priority 0
/// means "plain epsilon".
pub type TokenId = u32;

/// Index of a start set, the unit a scanner switches between at run time.
pub type StartSetId = usize;

/// A compiled lexer: one NFA, one start state per start set, and a single
/// accept state shared by every token path. Immutable after compilation and
/// safe to share read-only between any number of scanners.
#[derive(Debug)]
pub struct Lexer {
    nfa: Nfa<RangeSet>,
    starts: Vec<StateId>,
    accept: StateId,
}

impl Lexer {
    pub fn nfa(&self) -> &Nfa<RangeSet> {
        &self.nfa
    }

    pub fn starts(&self) -> &[StateId] {
        &self.starts
    }

    pub fn start(&self, set: StartSetId) -> StateId {
        self.starts[set]
    }

    pub fn accept(&self) -> StateId {
        self.accept
    }
}

/// Compiles token definitions into a [`Lexer`].
///
/// Every `tokdefs` entry maps a definition to its token id. A definition
/// enclosed in slashes (`/re/`) is an inline regex; an identifier is looked
/// up in `grammar` (when one is given); anything else is a literal. `starts`
/// selects which token ids each start set admits; omitting it yields a
/// single start set holding every id. `start` names the synthesized umbrella
/// production anchoring the grammar and prefixes diagnostic labels.
pub fn compile(
    starts: Option<Vec<Vec<TokenId>>>,
    tokdefs: &HashMap<String, TokenId>,
    grammar: &str,
    start: &str,
) -> Result<Lexer, CompileError> {
    // order by id so that compilation is deterministic
    let mut defs: Vec<(&str, TokenId)> = tokdefs
        .iter()
        .map(|(tokdef, id)| (tokdef.as_str(), *id))
        .collect();
    defs.sort_unstable();
    defs.sort_by_key(|(_, id)| *id);

    let mut res: BTreeMap<TokenId, String> = BTreeMap::new();
    let mut xref: BTreeMap<TokenId, String> = BTreeMap::new();
    let mut prodnames: Vec<(&str, TokenId)> = Vec::new();

    for &(tokdef, id) in &defs {
        if id == 0 {
            return Err(CompileError::ReservedTokenId {
                token: tokdef.to_string(),
            });
        }
        if res.contains_key(&id) {
            return Err(CompileError::DuplicateTokenId {
                id,
                token: tokdef.to_string(),
            });
        }
        xref.insert(id, format!("id-{}", id));
        if let Some(inner) = inline_regex(tokdef) {
            res.insert(id, inner.to_string());
        } else if !grammar.is_empty() && is_ident(tokdef) {
            prodnames.push((tokdef, id));
            res.insert(id, String::new());
        } else {
            res.insert(id, quote(tokdef));
        }
    }

    if !prodnames.is_empty() {
        let alternatives = prodnames
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(" | ");
        let src = format!("{}\n{} = {} .", grammar, start, alternatives);
        let parsed = runelex_ebnf::parse(&src)?;
        runelex_ebnf::verify(&parsed, start)?;
        let mut memo = lower::Memo::new();
        for &(name, id) in &prodnames {
            res.insert(id, lower::production_regex(&parsed, name, &mut memo)?);
            xref.insert(id, name.to_string());
        }
        debug!(
            "lowered {} grammar-driven token(s) through {} production(s)",
            prodnames.len(),
            parsed.len()
        );
    }

    let start_sets: Vec<Vec<TokenId>> =
        starts.unwrap_or_else(|| vec![res.keys().copied().collect()]);

    let mut nfa = Nfa::new();
    let accept = nfa.add_state();
    let mut start_states = Vec::with_capacity(start_sets.len());
    for (set_index, set) in start_sets.iter().enumerate() {
        let state = nfa.add_state();
        start_states.push(state);
        for &id in set {
            let re = res
                .get(&id)
                .ok_or(CompileError::UnknownTokenInStartSet { id, set: set_index })?;
            let label = format!("{}-{}", start, xref[&id]);
            let (entry, exit) =
                regex::parse_regex(&mut nfa, re).map_err(|err| regex_failure(&label, err))?;
            nfa.add_epsilon(state, entry, id);
            nfa.add_epsilon(exit, accept, 0);
        }
    }

    let mut pinned = vec![accept];
    pinned.extend_from_slice(&start_states);
    let states_before = nfa.state_count();
    let (nfa, pins) = nfa.reduce(&pinned);
    debug!(
        "compiled {} token(s) in {} start set(s): {} states reduced to {}",
        res.len(),
        start_sets.len(),
        states_before,
        nfa.state_count()
    );

    Ok(Lexer {
        accept: pins[0],
        starts: pins[1..].to_vec(),
        nfa,
    })
}

/// Like [`compile`] but panics on failure. Intended for lexers built from
/// trusted definitions in static initialisation.
pub fn must_compile(
    starts: Option<Vec<Vec<TokenId>>>,
    tokdefs: &HashMap<String, TokenId>,
    grammar: &str,
    start: &str,
) -> Lexer {
    match compile(starts, tokdefs, grammar, start) {
        Ok(lexer) => lexer,
        Err(err) => panic!("lexer compilation failed: {}", err),
    }
}

fn regex_failure(label: &str, err: RegexError) -> CompileError {
    match err {
        RegexError::UnknownClass { name } => CompileError::UnknownUnicodeClass {
            label: label.to_string(),
            name,
        },
        other => CompileError::RegexSyntax {
            label: label.to_string(),
            source: other,
        },
    }
}

/// The `/re/` form: one leading and one trailing slash with at least one
/// rune between them.
pub(crate) fn inline_regex(tokdef: &str) -> Option<&str> {
    let bytes = tokdef.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'/' && bytes[bytes.len() - 1] == b'/' {
        Some(&tokdef[1..tokdef.len() - 1])
    } else {
        None
    }
}

fn is_ident(tokdef: &str) -> bool {
    let mut chars = tokdef.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

impl Display for Lexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for state in self.nfa.states() {
            writeln!(f, "state {}:", state.index())?;
            for (edge, target) in self.nfa.edges_from(state) {
                match edge {
                    NfaEdge::Transition(set) => {
                        writeln!(f, "  {} -> {}", set, target.index())?
                    }
                    NfaEdge::Epsilon(priority) => {
                        writeln!(f, "  eps({}) -> {}", priority, target.index())?
                    }
                    NfaEdge::Anchor(anchor) => {
                        writeln!(f, "  anchor({:?}) -> {}", anchor, target.index())?
                    }
                }
            }
        }
        for (index, start) in self.starts.iter().enumerate() {
            write!(f, "start set {} = {{", index)?;
            for id in self.nfa.priorities_from(*start) {
                write!(f, " {}", id)?;
            }
            writeln!(f, " }}")?;
        }
        write!(f, "accept: {}", self.accept.index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokdefs(defs: &[(&str, TokenId)]) -> HashMap<String, TokenId> {
        defs.iter()
            .map(|(tokdef, id)| (tokdef.to_string(), *id))
            .collect()
    }

    #[test]
    fn inline_regex_requires_both_slashes_and_content() {
        assert_eq!(inline_regex("/[0-9]/"), Some("[0-9]"));
        assert_eq!(inline_regex("/a/"), Some("a"));
        assert_eq!(inline_regex("//"), None);
        assert_eq!(inline_regex("/a"), None);
        assert_eq!(inline_regex("a/"), None);
        assert_eq!(inline_regex("abc"), None);
    }

    #[test]
    fn ident_recognition() {
        assert!(is_ident("number"));
        assert!(is_ident("_x9"));
        assert!(is_ident("λ"));
        assert!(!is_ident(""));
        assert!(!is_ident("9x"));
        assert!(!is_ident("a-b"));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let err = compile(None, &tokdefs(&[("if", 1), ("else", 1)]), "", "TOK").unwrap_err();
        assert!(matches!(err, CompileError::DuplicateTokenId { id: 1, .. }));
    }

    #[test]
    fn id_zero_is_rejected() {
        let err = compile(None, &tokdefs(&[("if", 0)]), "", "TOK").unwrap_err();
        assert_eq!(
            err,
            CompileError::ReservedTokenId {
                token: "if".to_string()
            }
        );
    }

    #[test]
    fn unknown_id_in_start_set_is_rejected() {
        let err = compile(
            Some(vec![vec![1, 99]]),
            &tokdefs(&[("if", 1)]),
            "",
            "TOK",
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownTokenInStartSet { id: 99, set: 0 }
        );
    }

    #[test]
    fn regex_errors_carry_the_token_label() {
        let err = compile(None, &tokdefs(&[("/[z-a]/", 5)]), "", "TOK").unwrap_err();
        match err {
            CompileError::RegexSyntax { label, source } => {
                assert_eq!(label, "TOK-id-5");
                assert_eq!(source, RegexError::BadRange { lo: 0x7A, hi: 0x61 });
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn grammar_tokens_use_their_name_as_label() {
        let err = compile(
            None,
            &tokdefs(&[("num", 3)]),
            "num = \"/[9-0]+/\" .",
            "TOK",
        )
        .unwrap_err();
        match err {
            CompileError::RegexSyntax { label, .. } => assert_eq!(label, "TOK-num"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn unknown_unicode_class_is_its_own_error() {
        let err = compile(None, &tokdefs(&[(r"/\p{Nope}/", 2)]), "", "TOK").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownUnicodeClass {
                label: "TOK-id-2".to_string(),
                name: "Nope".to_string()
            }
        );
    }

    #[test]
    fn accept_state_has_no_outgoing_edges() {
        let lexer = compile(None, &tokdefs(&[("if", 1), ("/[0-9]+/", 2)]), "", "TOK").unwrap();
        assert!(lexer.nfa().edges_from(lexer.accept()).is_empty());
    }

    #[test]
    fn start_state_reaches_each_token_by_one_priority_hop() {
        let lexer = compile(None, &tokdefs(&[("if", 1), ("fi", 2)]), "", "TOK").unwrap();
        assert_eq!(lexer.starts().len(), 1);
        assert_eq!(lexer.nfa().priorities_from(lexer.start(0)), vec![1, 2]);
    }

    #[test]
    fn empty_tokdefs_leave_accept_unreachable() {
        let lexer = compile(None, &HashMap::new(), "", "TOK").unwrap();
        assert_eq!(lexer.starts().len(), 1);
        assert!(lexer.nfa().edges_from(lexer.start(0)).is_empty());
        assert!(lexer.nfa().edges_from(lexer.accept()).is_empty());
    }

    #[test]
    fn empty_tokdef_is_rejected() {
        let err = compile(None, &tokdefs(&[("", 1)]), "", "TOK").unwrap_err();
        assert!(matches!(
            err,
            CompileError::RegexSyntax {
                source: RegexError::UnexpectedEnd,
                ..
            }
        ));
    }

    #[test]
    fn snapshot_lists_starts_and_accept() {
        let lexer = compile(None, &tokdefs(&[("if", 1)]), "", "TOK").unwrap();
        let dump = lexer.to_string();
        assert!(dump.contains("state 0:"));
        assert!(dump.contains("start set 0 = { 1 }"));
        assert!(dump.contains("accept: 0"));
    }
}
