//! # Formula Model
//!
//! The parsed formula: declared variable range, ordered constraint list (the
//! position is the constraint id), literal weights, the additive-variable
//! set, and the occurrence map feeding the primal graph. The seven
//! formula-level variable-ordering heuristics live here as well.

use std::{
    collections::{BTreeMap, BTreeSet},
    io,
    path::Path,
};

use itertools::Itertools;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use thiserror::Error;
use tracing::debug;

use super::{fio, graph::Graph, Config, VarOrderHeuristic};
use crate::types::{Constraint, Lit, Number, NumberMode, Var};

/// Error completing the literal-weight map after parsing
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum WeightError {
    /// In log space a one-sided weight must represent a value at most one for
    /// its complement to exist
    #[error("weight of variable {0} exceeds 1, complement undefined in log space")]
    ComplementUndefined(Var),
}

/// Type representing the formula a counter runs on: constraints, literal
/// weights and the additive/disjunctive variable partition.
///
/// Constraints are indexed by insertion order; the occurrence map and the
/// apparent-variable set are maintained incrementally by
/// [`Cnf::add_constraint`]. After parsing, [`Cnf::complete`] makes the
/// literal-weight map total and defaults the additive set.
#[derive(Clone, Debug, Default)]
pub struct Cnf {
    declared_var_count: u32,
    constraints: Vec<Constraint>,
    literal_weights: BTreeMap<Lit, Number>,
    additive_vars: BTreeSet<Var>,
    var_to_constraints: BTreeMap<Var, BTreeSet<usize>>,
    apparent_vars: BTreeSet<Var>,
    maxsat_top: f64,
    empty_clause_lines: Vec<usize>,
}

impl Cnf {
    /// Creates an empty formula
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a formula in extended DIMACS format from a reader object. The
    /// config is only mutated by `vm` lines, which flip
    /// [`Config::min_maxsat_solving`].
    pub fn from_dimacs<R: io::Read>(
        reader: R,
        config: &mut Config,
    ) -> Result<Self, fio::ParsingError> {
        Ok(fio::dimacs::parse_dimacs(reader, config)?)
    }

    /// Parses a formula from a file path. For the format see
    /// [`Cnf::from_dimacs`].
    pub fn from_dimacs_path<P: AsRef<Path>>(path: P, config: &mut Config) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::from_dimacs(file, config)?)
    }

    /// Sets the declared variable count from the problem line
    pub fn set_declared_var_count(&mut self, n: u32) {
        self.declared_var_count = n;
    }

    /// Gets the declared variable count
    pub fn declared_var_count(&self) -> u32 {
        self.declared_var_count
    }

    /// Iterates over the declared variables `x0..x(n-1)`
    pub fn declared_vars(&self) -> impl Iterator<Item = Var> {
        (0..self.declared_var_count).map(Var::new_unchecked)
    }

    /// Adds a constraint, updating the occurrence map and the apparent
    /// variables. Returns the id of the new constraint.
    pub fn add_constraint(&mut self, constraint: Constraint) -> usize {
        let id = self.constraints.len();
        for var in constraint.vars() {
            self.var_to_constraints.entry(var).or_default().insert(id);
            self.apparent_vars.insert(var);
        }
        self.constraints.push(constraint);
        id
    }

    /// Gets the constraints in insertion order
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Gets a constraint by id
    pub fn constraint(&self, id: usize) -> &Constraint {
        &self.constraints[id]
    }

    /// Gets the number of constraints
    pub fn n_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Sets the weight of a literal
    pub fn set_literal_weight(&mut self, lit: Lit, weight: Number) {
        self.literal_weights.insert(lit, weight);
    }

    /// Gets the weight of a literal; total over all declared literals once
    /// [`Cnf::complete`] has run
    pub fn literal_weight(&self, lit: Lit) -> Option<&Number> {
        self.literal_weights.get(&lit)
    }

    /// Marks a variable as additive
    pub fn add_additive_var(&mut self, var: Var) {
        self.additive_vars.insert(var);
    }

    /// Gets the additive (summation / maximization) variables
    pub fn additive_vars(&self) -> &BTreeSet<Var> {
        &self.additive_vars
    }

    /// Gets the disjunctive (multiplication) variables: the declared variables
    /// that are not additive
    pub fn disjunctive_vars(&self) -> BTreeSet<Var> {
        self.declared_vars()
            .filter(|v| !self.additive_vars.contains(v))
            .collect()
    }

    /// Gets the variables occurring in at least one constraint
    pub fn apparent_vars(&self) -> &BTreeSet<Var> {
        &self.apparent_vars
    }

    /// Gets the ids of the constraints a variable occurs in
    pub fn constraints_of_var(&self, var: Var) -> Option<&BTreeSet<usize>> {
        self.var_to_constraints.get(&var)
    }

    /// Sets the trivial MaxSAT bound (`top`); hard constraints weigh
    /// `top + 1`
    pub fn set_maxsat_top(&mut self, top: f64) {
        self.maxsat_top = top;
    }

    /// Gets the trivial MaxSAT bound
    pub fn maxsat_top(&self) -> f64 {
        self.maxsat_top
    }

    /// Records the input line of an empty (unsatisfiable) clause
    pub fn record_empty_clause(&mut self, line: usize) {
        self.empty_clause_lines.push(line);
    }

    /// Input lines holding empty clauses; a non-empty result means the whole
    /// formula can be short-circuited to zero
    pub fn empty_clause_lines(&self) -> &[usize] {
        &self.empty_clause_lines
    }

    /// Completes the formula after parsing: defaults the additive set to all
    /// declared variables unless projecting or solving MaxSAT, and makes the
    /// literal-weight map total. Unweighted counting assigns every literal
    /// weight 1; weighted counting derives a missing one-sided weight from
    /// `w(v) + w(-v) = 1`.
    pub fn complete(&mut self, config: &Config) -> Result<(), WeightError> {
        if !config.projected_counting && !config.maxsat_solving {
            for var in self.declared_vars() {
                self.additive_vars.insert(var);
            }
        }

        let mode = config.number_mode();
        let one = || Number::one(mode);
        if !config.weighted_counting {
            for var in self.declared_vars() {
                self.literal_weights.insert(var.pos_lit(), one());
                self.literal_weights.insert(var.neg_lit(), one());
            }
            return Ok(());
        }
        for var in self.declared_vars() {
            let pos = self.literal_weights.contains_key(&var.pos_lit());
            let neg = self.literal_weights.contains_key(&var.neg_lit());
            match (pos, neg) {
                (true, true) => (),
                (false, false) => {
                    self.literal_weights.insert(var.pos_lit(), one());
                    self.literal_weights.insert(var.neg_lit(), one());
                }
                (false, true) | (true, false) => {
                    let known = if pos { var.pos_lit() } else { var.neg_lit() };
                    let missing = if pos { var.neg_lit() } else { var.pos_lit() };
                    let weight = self.literal_weights[&known].clone();
                    if mode == NumberMode::Log && !(weight <= one()) {
                        return Err(WeightError::ComplementUndefined(var));
                    }
                    self.literal_weights.insert(missing, one() - weight);
                }
            }
        }
        Ok(())
    }

    /// Builds the primal graph: apparent variables as vertices, an edge
    /// between every pair of variables sharing a constraint
    pub fn primal_graph(&self) -> Graph {
        let mut graph = Graph::new(self.apparent_vars.iter().copied());
        for constraint in &self.constraints {
            for (v1, v2) in constraint.vars().iter().tuple_combinations() {
                graph.add_edge(*v1, *v2);
            }
        }
        graph
    }

    /// Computes a permutation of the apparent variables with a formula-level
    /// heuristic; `invert` reverses the order.
    ///
    /// Panics when called with a join-tree-level heuristic.
    pub fn var_order(
        &self,
        heuristic: VarOrderHeuristic,
        invert: bool,
        config: &Config,
    ) -> Vec<Var> {
        let mut order = match heuristic {
            VarOrderHeuristic::Random => self.random_var_order(config),
            VarOrderHeuristic::Declared => self.declared_var_order(),
            VarOrderHeuristic::MostClauses => self.most_clauses_var_order(),
            VarOrderHeuristic::Minfill => self.minfill_var_order(),
            VarOrderHeuristic::Mcs => self.mcs_var_order(),
            VarOrderHeuristic::Lexp => self.lexp_var_order(),
            VarOrderHeuristic::Lexm => self.lexm_var_order(),
            VarOrderHeuristic::BiggestNode | VarOrderHeuristic::HighestNode => {
                panic!("join-tree heuristic passed to Cnf::var_order")
            }
        };
        if invert {
            order.reverse();
        }
        order
    }

    fn random_var_order(&self, config: &Config) -> Vec<Var> {
        let mut order: Vec<Var> = self.apparent_vars.iter().copied().collect();
        let mut rng = StdRng::seed_from_u64(config.random_seed);
        order.shuffle(&mut rng);
        order
    }

    fn declared_var_order(&self) -> Vec<Var> {
        self.declared_vars()
            .filter(|v| self.apparent_vars.contains(v))
            .collect()
    }

    /// Descending by occurrence count; equal counts keep the ascending
    /// variable order they were inserted in
    fn most_clauses_var_order(&self) -> Vec<Var> {
        let mut by_count: BTreeMap<std::cmp::Reverse<usize>, Vec<Var>> = BTreeMap::new();
        for (var, constrs) in &self.var_to_constraints {
            by_count
                .entry(std::cmp::Reverse(constrs.len()))
                .or_default()
                .push(*var);
        }
        by_count.into_values().flatten().collect()
    }

    fn minfill_var_order(&self) -> Vec<Var> {
        let mut graph = self.primal_graph();
        let mut order = Vec::with_capacity(graph.vertex_count());
        while !graph.is_empty() {
            let vertex = graph.minfill_vertex().expect("graph is nonempty");
            graph.fill_in_edges(vertex);
            graph.remove_vertex(vertex);
            order.push(vertex);
        }
        order
    }

    /// Maximum cardinality search, starting from the smallest apparent
    /// variable; ties towards the first candidate in ascending order
    fn mcs_var_order(&self) -> Vec<Var> {
        let graph = self.primal_graph();
        let mut vertices = graph.vertices();
        let Some(start) = vertices.next() else {
            return vec![];
        };
        // unranked vertex -> number of ranked neighbors
        let mut ranked_neighbor_counts: BTreeMap<Var, usize> =
            vertices.map(|v| (v, 0)).collect();

        let mut best = start;
        let mut order = Vec::with_capacity(graph.vertex_count());
        loop {
            order.push(best);
            ranked_neighbor_counts.remove(&best);
            for &neighbor in graph.neighbors(best) {
                if let Some(count) = ranked_neighbor_counts.get_mut(&neighbor) {
                    *count += 1;
                }
            }
            let mut next: Option<(Var, usize)> = None;
            for (&var, &count) in &ranked_neighbor_counts {
                match next {
                    Some((_, best_count)) if best_count >= count => (),
                    _ => next = Some((var, count)),
                }
            }
            match next {
                Some((var, _)) => best = var,
                None => break,
            }
        }
        order
    }

    fn lexp_var_order(&self) -> Vec<Var> {
        let graph = self.primal_graph();
        let mut unnumbered: BTreeMap<Var, Label> = self
            .apparent_vars
            .iter()
            .map(|v| (*v, Label::default()))
            .collect();
        let mut numbered = Vec::with_capacity(unnumbered.len());
        for number in (1..=unnumbered.len() as u32).rev() {
            let vertex = largest_label_vertex(&unnumbered).expect("vertices remain");
            numbered.push(vertex);
            unnumbered.remove(&vertex);
            for neighbor in graph.neighbors(vertex) {
                if let Some(label) = unnumbered.get_mut(neighbor) {
                    label.add_number(number);
                }
            }
        }
        numbered
    }

    /// Like [`Cnf::lexp_var_order`], but a neighbor label is only extended
    /// when the just-numbered vertex can reach it through unnumbered vertices
    /// with strictly smaller labels. More expensive, but the resulting orders
    /// yield minimal triangulations.
    fn lexm_var_order(&self) -> Vec<Var> {
        let graph = self.primal_graph();
        let mut unnumbered: BTreeMap<Var, Label> = self
            .apparent_vars
            .iter()
            .map(|v| (*v, Label::default()))
            .collect();
        let mut numbered = Vec::with_capacity(unnumbered.len());
        for number in (1..=unnumbered.len() as u32).rev() {
            let vertex = largest_label_vertex(&unnumbered).expect("vertices remain");
            numbered.push(vertex);
            unnumbered.remove(&vertex);

            // reachability is judged against the labels at the start of the
            // round; updates apply together afterwards
            let round_labels = unnumbered.clone();
            let mut reached = Vec::new();
            for (&target, target_label) in &round_labels {
                let mut subgraph = graph.clone();
                for &v in &numbered {
                    if v != vertex {
                        subgraph.remove_vertex(v);
                    }
                }
                for (&other, other_label) in &round_labels {
                    if other != target && other_label >= target_label {
                        subgraph.remove_vertex(other);
                    }
                }
                if subgraph.has_path(vertex, target) {
                    reached.push(target);
                }
            }
            for target in reached {
                unnumbered
                    .get_mut(&target)
                    .expect("target is unnumbered")
                    .add_number(number);
            }
        }
        numbered
    }

    /// Traces parse statistics and, at higher verbosity, the parsed formula
    pub(crate) fn trace_parsed(&self, config: &Config) {
        if config.verbose_cnf < 1 {
            return;
        }
        debug!(
            declared_var_count = self.declared_var_count,
            apparent_var_count = self.apparent_vars.len(),
            constraint_count = self.constraints.len(),
            "parsed formula"
        );
        if config.projected_counting {
            debug!(additive_vars = ?self.additive_vars, "projection");
        }
        if config.verbose_cnf < 2 {
            return;
        }
        for (id, constraint) in self.constraints.iter().enumerate() {
            debug!("constraint {}: {}", id + 1, constraint);
        }
        if config.weighted_counting {
            for (lit, weight) in &self.literal_weights {
                debug!("weight {}: {}", lit.to_dimacs(), weight);
            }
        }
    }
}

/// A vertex label for the lexicographic orders: a sequence of numbers kept
/// sorted descending, compared lexicographically
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub(crate) struct Label(Vec<u32>);

impl Label {
    pub(crate) fn add_number(&mut self, number: u32) {
        self.0.push(number);
        self.0.sort_unstable_by(|a, b| b.cmp(a));
    }
}

/// The unnumbered vertex with the lexicographically largest label; ties go to
/// the first candidate in map iteration order
fn largest_label_vertex(unnumbered: &BTreeMap<Var, Label>) -> Option<Var> {
    let mut best: Option<(Var, &Label)> = None;
    for (&var, label) in unnumbered {
        match best {
            Some((_, best_label)) if best_label >= label => (),
            _ => best = Some((var, label)),
        }
    }
    best.map(|(var, _)| var)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{Cnf, Label};
    use crate::{
        clause, dimacs_lit, lit,
        instances::{Config, VarOrderHeuristic},
        types::Constraint,
        var,
    };

    fn chain_cnf() -> Cnf {
        // (x0 | x1) (x1 | x2) (x2 | x3), primal graph is a path
        let mut cnf = Cnf::new();
        cnf.set_declared_var_count(4);
        cnf.add_constraint(Constraint::clause(clause![lit![0], lit![1]]));
        cnf.add_constraint(Constraint::clause(clause![lit![1], lit![2]]));
        cnf.add_constraint(Constraint::clause(clause![lit![2], lit![3]]));
        cnf
    }

    const CNF_HEURISTICS: [VarOrderHeuristic; 7] = [
        VarOrderHeuristic::Random,
        VarOrderHeuristic::Declared,
        VarOrderHeuristic::MostClauses,
        VarOrderHeuristic::Minfill,
        VarOrderHeuristic::Mcs,
        VarOrderHeuristic::Lexp,
        VarOrderHeuristic::Lexm,
    ];

    #[test]
    fn occurrence_map_tracks_constraints() {
        let cnf = chain_cnf();
        assert_eq!(
            cnf.constraints_of_var(var![1]),
            Some(&BTreeSet::from([0, 1]))
        );
        assert_eq!(cnf.constraints_of_var(var![3]), Some(&BTreeSet::from([2])));
        assert_eq!(cnf.apparent_vars().len(), 4);
    }

    #[test]
    fn primal_graph_edges() {
        let cnf = chain_cnf();
        let graph = cnf.primal_graph();
        assert!(graph.is_neighbor(var![0], var![1]));
        assert!(graph.is_neighbor(var![1], var![2]));
        assert!(graph.is_neighbor(var![2], var![3]));
        assert!(!graph.is_neighbor(var![0], var![2]));
        assert!(!graph.is_neighbor(var![0], var![3]));
    }

    #[test]
    fn every_heuristic_permutes_apparent_vars() {
        let cnf = chain_cnf();
        let config = Config::default();
        for heuristic in CNF_HEURISTICS {
            let order = cnf.var_order(heuristic, false, &config);
            let as_set: BTreeSet<_> = order.iter().copied().collect();
            assert_eq!(order.len(), 4, "{:?} dropped variables", heuristic);
            assert_eq!(&as_set, cnf.apparent_vars(), "{:?}", heuristic);
        }
    }

    #[test]
    fn inverted_heuristic_reverses_exactly() {
        let cnf = chain_cnf();
        let config = Config::default();
        for heuristic in CNF_HEURISTICS {
            let order = cnf.var_order(heuristic, false, &config);
            let mut inverted = cnf.var_order(heuristic, true, &config);
            inverted.reverse();
            assert_eq!(order, inverted, "{:?}", heuristic);
        }
    }

    #[test]
    fn random_order_is_reproducible() {
        let cnf = chain_cnf();
        let config = Config {
            random_seed: 42,
            ..Config::default()
        };
        let order1 = cnf.var_order(VarOrderHeuristic::Random, false, &config);
        let order2 = cnf.var_order(VarOrderHeuristic::Random, false, &config);
        assert_eq!(order1, order2);
    }

    #[test]
    fn declared_order_skips_unused_vars() {
        let mut cnf = Cnf::new();
        cnf.set_declared_var_count(5);
        cnf.add_constraint(Constraint::clause(clause![dimacs_lit![1], dimacs_lit![-4]]));
        let order = cnf.var_order(VarOrderHeuristic::Declared, false, &Config::default());
        assert_eq!(order, vec![var![0], var![3]]);
    }

    #[test]
    fn most_clauses_sorts_by_occurrence() {
        let cnf = chain_cnf();
        let order = cnf.var_order(VarOrderHeuristic::MostClauses, false, &Config::default());
        // x1 and x2 occur twice, x0 and x3 once; equal counts in ascending order
        assert_eq!(order, vec![var![1], var![2], var![0], var![3]]);
    }

    #[test]
    fn mcs_starts_at_first_vertex() {
        let cnf = chain_cnf();
        let order = cnf.var_order(VarOrderHeuristic::Mcs, false, &Config::default());
        assert_eq!(order[0], var![0]);
        // after x0, x1 is the only vertex with a ranked neighbor
        assert_eq!(order[1], var![1]);
        assert_eq!(order, vec![var![0], var![1], var![2], var![3]]);
    }

    #[test]
    fn minfill_on_cycle() {
        // 4-cycle: every vertex has one missing pair, the first wins
        let mut cnf = Cnf::new();
        cnf.set_declared_var_count(4);
        cnf.add_constraint(Constraint::clause(clause![lit![0], lit![1]]));
        cnf.add_constraint(Constraint::clause(clause![lit![1], lit![2]]));
        cnf.add_constraint(Constraint::clause(clause![lit![2], lit![3]]));
        cnf.add_constraint(Constraint::clause(clause![lit![3], lit![0]]));
        let order = cnf.var_order(VarOrderHeuristic::Minfill, false, &Config::default());
        assert_eq!(order[0], var![0]);
    }

    #[test]
    fn lexp_numbers_from_first_vertex() {
        let cnf = chain_cnf();
        let order = cnf.var_order(VarOrderHeuristic::Lexp, false, &Config::default());
        // all labels start empty, so x0 is picked first; its neighbor x1
        // gets the highest number and is picked next
        assert_eq!(order, vec![var![0], var![1], var![2], var![3]]);
    }

    #[test]
    fn lexm_matches_lexp_on_chordal_path() {
        let cnf = chain_cnf();
        let config = Config::default();
        assert_eq!(
            cnf.var_order(VarOrderHeuristic::Lexp, false, &config),
            cnf.var_order(VarOrderHeuristic::Lexm, false, &config)
        );
    }

    #[test]
    fn label_order_is_lexicographic_on_sorted_sequences() {
        let mut a = Label::default();
        let mut b = Label::default();
        a.add_number(3);
        b.add_number(2);
        assert!(a > b);
        b.add_number(3);
        // b = [3, 2] > a = [3]
        assert!(b > a);
        a.add_number(1);
        // a = [3, 1] < b = [3, 2]
        assert!(a < b);
    }

    #[test]
    fn complete_defaults_unweighted() {
        let mut cnf = chain_cnf();
        let config = Config::default();
        cnf.complete(&config).unwrap();
        assert_eq!(cnf.additive_vars().len(), 4);
        for var in cnf.declared_vars() {
            let one = crate::types::Number::one(config.number_mode());
            assert_eq!(cnf.literal_weight(var.pos_lit()), Some(&one));
            assert_eq!(cnf.literal_weight(var.neg_lit()), Some(&one));
        }
    }

    #[test]
    fn complete_derives_missing_weight() {
        let mut cnf = Cnf::new();
        cnf.set_declared_var_count(1);
        cnf.add_constraint(Constraint::clause(clause![lit![0]]));
        let config = Config {
            weighted_counting: true,
            ..Config::default()
        };
        let mode = config.number_mode();
        cnf.set_literal_weight(
            lit![0],
            crate::types::Number::parse("0.3", mode).unwrap(),
        );
        cnf.complete(&config).unwrap();
        let expected = crate::types::Number::parse("0.7", mode).unwrap();
        assert_eq!(cnf.literal_weight(!lit![0]), Some(&expected));
    }
}
