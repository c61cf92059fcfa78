use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{Debug, Display};

use petgraph::{
    graph::EdgeIndex,
    graph::NodeIndex,
    prelude::DiGraph,
    visit::EdgeRef,
    Direction::{Incoming, Outgoing},
};

pub type StateId = NodeIndex;

/// Position assertion attached to a non-consuming edge. The scanner is
/// responsible for enforcing these; compilation only carries them through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    TextStart,
    TextEnd,
    LineStart,
    LineEnd,
}

#[derive(Clone, PartialEq, Eq)]
pub enum NfaEdge<T> {
    /// Non-consuming edge. Priority 0 is a plain epsilon; a non-zero
    /// priority carries the token id emitted when this edge is crossed.
    Epsilon(u32),
    Anchor(Anchor),
    /// Consuming edge, traversed by reading one input symbol matching `T`.
    Transition(T),
}

impl<T: Debug> Debug for NfaEdge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Epsilon(0) => write!(f, "ε"),
            Self::Epsilon(priority) => write!(f, "ε/{}", priority),
            Self::Anchor(anchor) => write!(f, "@{:?}", anchor),
            Self::Transition(t) => write!(f, "{:?}", t),
        }
    }
}

impl<T: Display> Display for NfaEdge<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Epsilon(0) => write!(f, "ε"),
            Self::Epsilon(priority) => write!(f, "ε/{}", priority),
            Self::Anchor(anchor) => write!(f, "@{:?}", anchor),
            Self::Transition(t) => write!(f, "{}", t),
        }
    }
}

/// Transitions that can be folded together when two consuming edges share a
/// source and a target.
pub trait Merge {
    fn merge(&mut self, other: &Self);
}

/// A nondeterministic finite automaton. States are petgraph node indices and
/// are only ever referenced by index, so the automaton can be relocated and
/// snapshotted freely.
#[derive(Debug, Clone)]
pub struct Nfa<T> {
    graph: DiGraph<(), NfaEdge<T>>,
}

impl<T> Default for Nfa<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Nfa<T> {
    pub fn new() -> Self {
        Nfa {
            graph: DiGraph::new(),
        }
    }

    pub fn add_state(&mut self) -> StateId {
        self.graph.add_node(())
    }

    pub fn add_epsilon(&mut self, from: StateId, to: StateId, priority: u32) -> EdgeIndex {
        self.graph.add_edge(from, to, NfaEdge::Epsilon(priority))
    }

    pub fn add_anchor(&mut self, from: StateId, to: StateId, anchor: Anchor) -> EdgeIndex {
        self.graph.add_edge(from, to, NfaEdge::Anchor(anchor))
    }

    pub fn add_transition(&mut self, from: StateId, to: StateId, transition: T) -> EdgeIndex {
        self.graph.add_edge(from, to, NfaEdge::Transition(transition))
    }

    pub fn state_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn states(&self) -> impl Iterator<Item = StateId> {
        self.graph.node_indices()
    }

    /// Outgoing edges of `state` in insertion order.
    pub fn edges_from(&self, state: StateId) -> Vec<(&NfaEdge<T>, StateId)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(state, Outgoing)
            .map(|edge| (edge.weight(), edge.target()))
            .collect();
        edges.reverse();
        edges
    }

    /// Priorities of the non-consuming edges leaving `state`, skipping plain
    /// epsilons. For a start state these are the token ids it can reach.
    pub fn priorities_from(&self, state: StateId) -> Vec<u32> {
        self.edges_from(state)
            .into_iter()
            .filter_map(|(edge, _)| match edge {
                NfaEdge::Epsilon(priority) if *priority != 0 => Some(*priority),
                _ => None,
            })
            .collect()
    }
}

impl<T: Clone + Merge> Nfa<T> {
    /// Rewrites the automaton to a fixed point: pure-epsilon chains are
    /// short-circuited, duplicate edges folded, and states unreachable from
    /// `pinned` dropped. Pinned states always survive; the returned vector
    /// holds their ids in the rebuilt automaton, in the order given.
    ///
    /// Non-consuming edges with a non-zero priority encode a token choice.
    /// They are never merged with plain epsilons and their targets are never
    /// collapsed away.
    pub fn reduce(self, pinned: &[StateId]) -> (Self, Vec<StateId>) {
        let mut nfa = self;
        let mut pins = pinned.to_vec();
        loop {
            let before = (nfa.state_count(), nfa.edge_count());
            let (next, next_pins) = nfa.reduce_once(&pins);
            let after = (next.state_count(), next.edge_count());
            nfa = next;
            pins = next_pins;
            if after == before {
                break;
            }
        }
        (nfa, pins)
    }

    fn reduce_once(&self, pins: &[StateId]) -> (Self, Vec<StateId>) {
        let redirect = self.collapse_candidates(pins);
        let resolve = |start: StateId| -> StateId {
            let mut seen = HashSet::new();
            let mut state = start;
            while let Some(&next) = redirect.get(&state) {
                if !seen.insert(state) {
                    break;
                }
                state = next;
            }
            state
        };

        // Reachability from the pinned states, bypassing collapsed nodes.
        let mut keep = vec![false; self.graph.node_count()];
        let mut queue: VecDeque<StateId> = pins.iter().copied().collect();
        while let Some(state) = queue.pop_front() {
            if keep[state.index()] {
                continue;
            }
            keep[state.index()] = true;
            for edge in self.graph.edges_directed(state, Outgoing) {
                queue.push_back(resolve(edge.target()));
            }
        }

        let mut out = Nfa::new();
        let mut mapping: HashMap<StateId, StateId> = HashMap::new();
        for state in self.graph.node_indices() {
            if keep[state.index()] {
                mapping.insert(state, out.add_state());
            }
        }

        for state in self.graph.node_indices() {
            if !keep[state.index()] {
                continue;
            }
            let from = mapping[&state];
            let mut consuming: Vec<(StateId, T)> = Vec::new();
            let mut epsilons: Vec<(u32, StateId)> = Vec::new();
            let mut anchors: Vec<(Anchor, StateId)> = Vec::new();
            for (weight, target) in self.edges_from(state) {
                let target = mapping[&resolve(target)];
                match weight {
                    NfaEdge::Transition(t) => {
                        if let Some((_, merged)) =
                            consuming.iter_mut().find(|(existing, _)| *existing == target)
                        {
                            merged.merge(t);
                        } else {
                            consuming.push((target, t.clone()));
                        }
                    }
                    NfaEdge::Epsilon(priority) => {
                        if !epsilons.contains(&(*priority, target)) {
                            epsilons.push((*priority, target));
                        }
                    }
                    NfaEdge::Anchor(anchor) => {
                        if !anchors.contains(&(*anchor, target)) {
                            anchors.push((*anchor, target));
                        }
                    }
                }
            }
            for (target, transition) in consuming {
                out.add_transition(from, target, transition);
            }
            for (priority, target) in epsilons {
                out.add_epsilon(from, target, priority);
            }
            for (anchor, target) in anchors {
                out.add_anchor(from, target, anchor);
            }
        }

        let pins = pins.iter().map(|pin| mapping[&resolve(*pin)]).collect();
        (out, pins)
    }

    /// A state may be short-circuited when its only outgoing edge is a plain
    /// epsilon and nothing reaches it through a priority-bearing or anchor
    /// edge.
    fn collapse_candidates(&self, pins: &[StateId]) -> HashMap<StateId, StateId> {
        let mut redirect = HashMap::new();
        for state in self.graph.node_indices() {
            if pins.contains(&state) {
                continue;
            }
            let outgoing: Vec<_> = self.graph.edges_directed(state, Outgoing).collect();
            if outgoing.len() != 1 {
                continue;
            }
            let edge = &outgoing[0];
            if edge.target() == state || !matches!(edge.weight(), NfaEdge::Epsilon(0)) {
                continue;
            }
            let blocked = self
                .graph
                .edges_directed(state, Incoming)
                .any(|incoming| match incoming.weight() {
                    NfaEdge::Epsilon(priority) => *priority != 0,
                    NfaEdge::Anchor(_) => true,
                    NfaEdge::Transition(_) => false,
                });
            if !blocked {
                redirect.insert(state, edge.target());
            }
        }
        redirect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Sym(Vec<u32>);

    impl Merge for Sym {
        fn merge(&mut self, other: &Self) {
            self.0.extend_from_slice(&other.0);
            self.0.sort_unstable();
            self.0.dedup();
        }
    }

    #[test]
    fn collapse_epsilon_chain() {
        let mut nfa = Nfa::new();
        let start = nfa.add_state();
        let a = nfa.add_state();
        let b = nfa.add_state();
        let accept = nfa.add_state();
        nfa.add_transition(start, a, Sym(vec![1]));
        nfa.add_epsilon(a, b, 0);
        nfa.add_epsilon(b, accept, 0);

        let (nfa, pins) = nfa.reduce(&[start, accept]);
        // start -[1]-> accept, both intermediates gone
        assert_eq!(nfa.state_count(), 2);
        let edges = nfa.edges_from(pins[0]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].1, pins[1]);
    }

    #[test]
    fn priority_epsilon_survives() {
        let mut nfa: Nfa<Sym> = Nfa::new();
        let start = nfa.add_state();
        let entry = nfa.add_state();
        let accept = nfa.add_state();
        nfa.add_epsilon(start, entry, 7);
        nfa.add_epsilon(entry, accept, 0);

        let (nfa, pins) = nfa.reduce(&[start, accept]);
        // entry's only outgoing edge is a plain epsilon, but it is the
        // target of a priority edge and must not be collapsed
        assert_eq!(nfa.state_count(), 3);
        let edges = nfa.edges_from(pins[0]);
        assert!(matches!(edges[0].0, NfaEdge::Epsilon(7)));
    }

    #[test]
    fn duplicate_consuming_edges_merge() {
        let mut nfa = Nfa::new();
        let start = nfa.add_state();
        let accept = nfa.add_state();
        nfa.add_transition(start, accept, Sym(vec![1]));
        nfa.add_transition(start, accept, Sym(vec![2]));

        let (nfa, pins) = nfa.reduce(&[start, accept]);
        let edges = nfa.edges_from(pins[0]);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].0, &NfaEdge::Transition(Sym(vec![1, 2])));
    }

    #[test]
    fn unreachable_states_dropped() {
        let mut nfa = Nfa::new();
        let start = nfa.add_state();
        let accept = nfa.add_state();
        let orphan = nfa.add_state();
        let orphan2 = nfa.add_state();
        nfa.add_transition(start, accept, Sym(vec![1]));
        nfa.add_transition(orphan, orphan2, Sym(vec![2]));

        let (nfa, _) = nfa.reduce(&[start, accept]);
        assert_eq!(nfa.state_count(), 2);
    }

    #[test]
    fn pinned_accept_survives_even_unreachable() {
        let mut nfa: Nfa<Sym> = Nfa::new();
        let accept = nfa.add_state();
        let start = nfa.add_state();

        let (nfa, pins) = nfa.reduce(&[accept, start]);
        assert_eq!(nfa.state_count(), 2);
        assert_eq!(pins.len(), 2);
        assert!(nfa.edges_from(pins[0]).is_empty());
    }

    #[test]
    fn epsilon_cycle_does_not_hang() {
        let mut nfa: Nfa<Sym> = Nfa::new();
        let start = nfa.add_state();
        let a = nfa.add_state();
        let b = nfa.add_state();
        nfa.add_epsilon(start, a, 0);
        nfa.add_epsilon(a, b, 0);
        nfa.add_epsilon(b, a, 0);

        let (nfa, _) = nfa.reduce(&[start]);
        assert!(nfa.state_count() <= 3);
    }
}
