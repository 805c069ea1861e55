//! # jtcount - Core of a Join-Tree Weighted Model Counter
//!
//! `jtcount` is the computational core of a weighted / projected / MaxSAT
//! model counter over Boolean formulas in an extended DIMACS format. It
//! provides the formula model (clauses, XOR constraints, canonical
//! pseudo-boolean constraints, literal weights and the additive-variable
//! partition), the primal-graph variable-ordering heuristics, the join-tree
//! data model with slice-assignment enumeration, and the number semiring all
//! valuations combine in.
//!
//! The decision-diagram package used as valuation carrier is deliberately
//! not part of this crate: a join tree, a variable order and the slice
//! assignments produced here are everything such a carrier is driven by.
//!
//! After parsing and join-tree construction every structure is immutable, so
//! slices can be evaluated in parallel against shared references.

pub mod instances;
pub mod jointree;
pub mod types;

mod utils;
