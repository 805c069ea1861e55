//! # Formula Instance Representation
//!
//! The formula model of the counter: the [`Cnf`] type holding clauses, XOR
//! and pseudo-boolean constraints together with literal weights and the
//! additive-variable set, the primal [`Graph`], and the variable-ordering
//! heuristics computed over it.

use crate::types::NumberMode;

pub mod fio;
pub mod graph;
mod sat;

pub use graph::Graph;
pub use sat::{Cnf, WeightError};

/// Counter-wide configuration, established once at initialization and
/// threaded explicitly to every consumer. The only mutation after startup is
/// [`Config::min_maxsat_solving`], which the parser flips when a `vm` line
/// classifies variables as minimization variables; after parsing the value is
/// fixed, so workers may share the config immutably.
#[derive(Clone, Debug)]
pub struct Config {
    /// Literal weights are read and applied
    pub weighted_counting: bool,
    /// Additive variables are restricted to the declared projection set
    pub projected_counting: bool,
    /// The outer combination is maximization instead of summation
    pub maxsat_solving: bool,
    /// MaxSAT over minimization variables (set by the parser on `vm` lines)
    pub min_maxsat_solving: bool,
    /// Numbers are arbitrary-precision rationals
    pub multiple_precision: bool,
    /// Numbers live in base-10 log space
    pub log_counting: bool,
    /// Seed for the random variable-order heuristic
    pub random_seed: u64,
    /// External bound handed to MaxSAT pruning
    pub maxsat_bound: i64,
    /// Verbosity of formula parsing (0 silent, 1 summary, 2 parsed
    /// constraints and weights, 3 raw input lines)
    pub verbose_cnf: u8,
    /// Verbosity of solving-phase diagnostics (0 silent, 1 timing rows, 2
    /// chosen orders)
    pub verbose_solving: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weighted_counting: false,
            projected_counting: false,
            maxsat_solving: false,
            min_maxsat_solving: false,
            multiple_precision: false,
            log_counting: false,
            random_seed: 0,
            maxsat_bound: i64::MAX,
            verbose_cnf: 0,
            verbose_solving: 0,
        }
    }
}

impl Config {
    /// The number universe all valuations live in
    pub fn number_mode(&self) -> NumberMode {
        if self.multiple_precision {
            NumberMode::Ratio
        } else if self.log_counting {
            NumberMode::Log
        } else {
            NumberMode::Float
        }
    }
}

/// Variable-order heuristics. The first seven are computed on the formula and
/// its primal graph; the last two are computed on a join tree and fall back
/// to the formula-level orders when requested there.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VarOrderHeuristic {
    /// Seeded shuffle of the apparent variables
    Random,
    /// Ascending by declared index
    Declared,
    /// Descending by number of constraints a variable appears in
    MostClauses,
    /// Repeated minimum-fill-in elimination on the primal graph
    Minfill,
    /// Maximum cardinality search
    Mcs,
    /// Lexicographic BFS by label
    Lexp,
    /// Lexicographic BFS with path-restricted label updates (minimal
    /// triangulations)
    Lexm,
    /// Group variables by the largest join-tree node containing them
    BiggestNode,
    /// Emit projection variables in BFS order from the join-tree root
    HighestNode,
}

impl VarOrderHeuristic {
    /// Whether the heuristic is computed on the formula rather than a join
    /// tree
    pub fn is_cnf_level(&self) -> bool {
        !matches!(
            self,
            VarOrderHeuristic::BiggestNode | VarOrderHeuristic::HighestNode
        )
    }
}
