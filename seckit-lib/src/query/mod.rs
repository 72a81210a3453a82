//! Attribute predicates and the retrieval primitives built on them.
//!
//! A [`Predicate`] is an ordered attribute map that renders into a native
//! dictionary. A [`Lookup`] assembles the predicates the item stores use and
//! runs single-match and multi-match retrievals. [`delete_all_matching`]
//! drives the trust store's one-at-a-time delete to completion.

mod delete;
mod lookup;
mod predicate;

pub use delete::{delete_all_matching, DeleteError};
pub use lookup::{ItemClass, Lookup, MatchLimit, Records, ReturnFlags};
pub use predicate::{Predicate, Value};
