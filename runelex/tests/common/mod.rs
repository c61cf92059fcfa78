//! A minimal NFA walker standing in for the runtime scanner: epsilon
//! closures with token-id tracking and greedy longest-prefix matching.

use runelex::{Anchor, Lexer, NfaEdge, StartSetId, StateId, TokenId};

/// Runs the NFA from the given start set over `input` and returns the
/// longest matching prefix (in runes) together with its token id.
pub fn longest_match(lexer: &Lexer, set: StartSetId, input: &str) -> Option<(usize, TokenId)> {
    let runes: Vec<char> = input.chars().collect();
    let mut threads: Vec<(StateId, Option<TokenId>)> = vec![(lexer.start(set), None)];
    let mut best: Option<(usize, TokenId)> = None;
    for pos in 0..=runes.len() {
        closure(lexer, &mut threads, pos, runes.len());
        for (state, id) in &threads {
            if *state == lexer.accept() {
                if let Some(id) = id {
                    match best {
                        Some((len, _)) if len >= pos => {}
                        _ => best = Some((pos, *id)),
                    }
                }
            }
        }
        if pos == runes.len() {
            break;
        }
        let rune = runes[pos] as u32;
        let mut advanced: Vec<(StateId, Option<TokenId>)> = Vec::new();
        for (state, id) in &threads {
            for (edge, target) in lexer.nfa().edges_from(*state) {
                if let NfaEdge::Transition(ranges) = edge {
                    if ranges.contains(rune) && !advanced.contains(&(target, *id)) {
                        advanced.push((target, *id));
                    }
                }
            }
        }
        threads = advanced;
        if threads.is_empty() {
            break;
        }
    }
    best
}

/// The token id matching `input` in its entirety, if any.
pub fn matches_whole(lexer: &Lexer, set: StartSetId, input: &str) -> Option<TokenId> {
    match longest_match(lexer, set, input) {
        Some((len, id)) if len == input.chars().count() => Some(id),
        _ => None,
    }
}

fn closure(
    lexer: &Lexer,
    threads: &mut Vec<(StateId, Option<TokenId>)>,
    pos: usize,
    len: usize,
) {
    let mut i = 0;
    while i < threads.len() {
        let (state, id) = threads[i];
        for (edge, target) in lexer.nfa().edges_from(state) {
            let follow = match edge {
                NfaEdge::Epsilon(0) => Some(id),
                NfaEdge::Epsilon(priority) => Some(Some(*priority)),
                NfaEdge::Anchor(anchor) => {
                    let at_boundary = match anchor {
                        Anchor::TextStart | Anchor::LineStart => pos == 0,
                        Anchor::TextEnd | Anchor::LineEnd => pos == len,
                    };
                    at_boundary.then_some(id)
                }
                NfaEdge::Transition(_) => None,
            };
            if let Some(new_id) = follow {
                if !threads.contains(&(target, new_id)) {
                    threads.push((target, new_id));
                }
            }
        }
        i += 1;
    }
}
