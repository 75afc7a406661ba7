//! Identifiers used throughout the crate.
//!
//! [`ComponentId`] and [`TemplateId`] wrap interned strings, matching the
//! data model in spec.md §3 (`component` and `tid` are strings in the input
//! log). [`ExecId`] and the automaton-internal [`StateAtom`] are plain
//! integers; an automaton never has more states than fit comfortably in a
//! `u32`, and executions are identified the way the original `logID` column
//! is (a dense integer).

use std::fmt;
use std::sync::Arc;

macro_rules! impl_int_id {
    ($name:ident, $tp:ty) => {
        /// Opaque integer identifier.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name($tp);

        impl $name {
            /// Create a new id from its underlying integer.
            #[inline]
            pub const fn new(index: $tp) -> Self {
                $name(index)
            }

            /// Get the id as its underlying integer.
            #[inline]
            pub fn as_usize(&self) -> usize {
                self.0 as usize
            }

            /// Get the id as its underlying integer.
            #[inline]
            pub fn id(&self) -> $tp {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$tp> for $name {
            fn from(index: $tp) -> Self {
                $name::new(index)
            }
        }
    };
}

/// The id type for automaton state atoms. Used by [`crate::internal::state::StateId`].
pub type StateAtomBase = u32;
impl_int_id!(StateAtom, StateAtomBase);

/// The id type for a single execution (one trace) in the corpus.
pub type ExecIdBase = u64;
impl_int_id!(ExecId, ExecIdBase);

macro_rules! impl_str_id {
    ($name:ident) => {
        /// Opaque interned-string identifier.
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Create a new id from any string-like value.
            pub fn new(s: impl Into<Arc<str>>) -> Self {
                $name(s.into())
            }

            /// Get the id as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name::new(s)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// The id type for a system component (e.g. a microservice or subsystem name).
impl_str_id!(ComponentId);

/// The id type for a log template (the alphabet's event label, before a guard is attached).
impl_str_id!(TemplateId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_id_compares_by_value() {
        let a = ComponentId::from("auth");
        let b = ComponentId::from("auth".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn state_atom_roundtrips() {
        let a = StateAtom::new(7);
        assert_eq!(a.as_usize(), 7);
        assert_eq!(a.id(), 7);
    }
}
