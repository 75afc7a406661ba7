//! Automaton state identifiers.
//!
//! Per design notes §9, a state id is a tagged variant instead of a string:
//! either a single [`StateAtom`] born from a CompLearner decode or a slice,
//! or a [`SmallSortedSet`] of atoms produced by `merge_states`/subset
//! construction. Equality and ordering are structural (by atom sequence),
//! never by a textual rendering.

use std::fmt;

use crate::ids::StateAtom;

/// A small, always-sorted, deduplicated set of state atoms.
///
/// Stands in for the Python original's `','.join(natsorted(...))` composite
/// state name — here the "comma join" never happens; the set itself is the
/// identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SmallSortedSet(Vec<StateAtom>);

impl SmallSortedSet {
    /// Build a sorted, deduplicated set from an iterator of atoms.
    pub fn from_iter(atoms: impl IntoIterator<Item = StateAtom>) -> Self {
        let mut v: Vec<StateAtom> = atoms.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        SmallSortedSet(v)
    }

    /// The constituent atoms, in ascending order.
    pub fn atoms(&self) -> &[StateAtom] {
        &self.0
    }

    /// The number of constituent atoms.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if this set has no atoms (never constructed by public API, but
    /// useful as a guard in debug assertions).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SmallSortedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|a| a.id().to_string())
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{joined}")
    }
}

/// An automaton state identifier: a single atom, or a merged composite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateId {
    /// A state born directly from a CompLearner decode or a slice cursor.
    Atom(StateAtom),
    /// A state produced by merging two or more states together.
    Composite(SmallSortedSet),
}

impl StateId {
    /// Create an atomic state id.
    pub fn atom(id: impl Into<StateAtom>) -> Self {
        StateId::Atom(id.into())
    }

    /// The constituent atoms of this state, in ascending order.
    ///
    /// An atomic state has exactly one constituent (itself); a composite
    /// state has all the atoms that were merged into it, transitively.
    pub fn atoms(&self) -> Vec<StateAtom> {
        match self {
            StateId::Atom(a) => vec![*a],
            StateId::Composite(set) => set.atoms().to_vec(),
        }
    }

    /// Build a state id directly from a collection of atoms, collapsing to
    /// [`StateId::Atom`] when there is exactly one.
    pub fn from_atoms(atoms: impl IntoIterator<Item = StateAtom>) -> StateId {
        let set = SmallSortedSet::from_iter(atoms);
        if set.len() == 1 {
            StateId::Atom(set.atoms()[0])
        } else {
            StateId::Composite(set)
        }
    }

    /// Merge a non-empty collection of states into one composite state.
    ///
    /// Flattens nested composites so repeated merges never nest sets of
    /// sets; matches spec.md §4.2's requirement that `merge_states` be
    /// idempotent and commutative in its argument.
    pub fn merge<'a>(states: impl IntoIterator<Item = &'a StateId>) -> StateId {
        let atoms = states.into_iter().flat_map(|s| s.atoms());
        let set = SmallSortedSet::from_iter(atoms);
        if set.len() == 1 {
            StateId::Atom(set.atoms()[0])
        } else {
            StateId::Composite(set)
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateId::Atom(a) => write!(f, "{a}"),
            StateId::Composite(set) => write!(f, "{set}"),
        }
    }
}

impl PartialOrd for StateId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StateId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.atoms().cmp(&other.atoms())
    }
}

impl From<StateAtom> for StateId {
    fn from(a: StateAtom) -> Self {
        StateId::Atom(a)
    }
}

impl From<u32> for StateId {
    fn from(a: u32) -> Self {
        StateId::Atom(StateAtom::new(a))
    }
}
