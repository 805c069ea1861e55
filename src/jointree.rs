//! # Join Trees
//!
//! A join tree is a rooted tree of constraint clusters driving variable
//! elimination: each leaf binds to exactly one constraint of the formula,
//! each internal node carries the set of variables eliminated at that node,
//! and every variable to eliminate appears in the projection set of exactly
//! one node on the path from a leaf mentioning it to the root.
//!
//! Nodes live in a [`JoinTree`] arena and are addressed by [`NodeId`]
//! handles; the tree also owns the index counters that the original
//! static-field discipline would make global. Terminals take the indices
//! `0..terminal_count` in creation order (binding them to constraint ids),
//! nonterminals take disjoint indices at or above the terminal count.

use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    io::{self, Write},
};

use cpu_time::ProcessTime;
use thiserror::Error;
use tracing::debug;

use crate::{
    instances::{Cnf, Config, VarOrderHeuristic},
    types::{Assignment, Var},
    utils,
};

/// The keyword separating children from projection variables in an emitted
/// node line
const VAR_ELIM_WORD: &str = "e";

/// Errors constructing or querying a join tree
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JoinTreeError {
    /// A requested nonterminal index collides with the terminal range
    #[error("requested node index {requested} is below the terminal count {terminal_count}")]
    IndexBelowTerminals {
        /// The requested index
        requested: usize,
        /// Number of terminals, the lower bound for nonterminal indices
        terminal_count: usize,
    },
    /// A requested nonterminal index is already in use
    #[error("requested node index {0} already taken")]
    IndexTaken(usize),
    /// A nonterminal needs at least one child
    #[error("nonterminal constructed without children")]
    NoChildren,
    /// The current cluster index is outside the clustering pipeline
    #[error("cluster index {index} out of range for {cluster_count} clusters")]
    ClusterIndexOutOfRange {
        /// The offending index
        index: usize,
        /// Number of clusters in the pipeline
        cluster_count: usize,
    },
}

/// Heuristics steering where a node moves in a clustering pipeline. Bucket
/// heuristics rank nodes by the smallest relevant variable, bouquet
/// heuristics by the largest; list variants always step to the next cluster
/// while tree variants scan ahead for the first interacting one.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClusteringHeuristic {
    /// Bucket elimination over a cluster list
    BucketList,
    /// Bucket elimination over a cluster tree
    BucketTree,
    /// Bouquet clustering over a cluster list
    BouquetList,
    /// Bouquet clustering over a cluster tree
    BouquetTree,
}

impl ClusteringHeuristic {
    fn is_bucket(&self) -> bool {
        matches!(
            self,
            ClusteringHeuristic::BucketList | ClusteringHeuristic::BucketTree
        )
    }

    fn is_list(&self) -> bool {
        matches!(
            self,
            ClusteringHeuristic::BucketList | ClusteringHeuristic::BouquetList
        )
    }
}

/// Handle to a node in a [`JoinTree`] arena
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NodeId(usize);

/// A node of a join tree
#[derive(Clone, Debug)]
pub enum JoinNode {
    /// A leaf bound to the constraint with the same index
    Terminal {
        /// Node index, equal to the bound constraint id
        index: usize,
        /// The variables of the bound constraint
        pre_projection_vars: BTreeSet<Var>,
    },
    /// An internal node eliminating its projection variables
    Nonterminal {
        /// Node index, disjoint from other nonterminals and at or above the
        /// terminal count
        index: usize,
        /// Child nodes, at least one
        children: Vec<NodeId>,
        /// Variables eliminated at this node
        projection_vars: BTreeSet<Var>,
        /// Union of the children's post-projection variables
        pre_projection_vars: BTreeSet<Var>,
    },
}

impl JoinNode {
    /// Gets the node index
    pub fn index(&self) -> usize {
        match self {
            JoinNode::Terminal { index, .. } | JoinNode::Nonterminal { index, .. } => *index,
        }
    }

    /// Gets the variables in scope before projection
    pub fn pre_projection_vars(&self) -> &BTreeSet<Var> {
        match self {
            JoinNode::Terminal {
                pre_projection_vars,
                ..
            }
            | JoinNode::Nonterminal {
                pre_projection_vars,
                ..
            } => pre_projection_vars,
        }
    }

    /// Gets the variables eliminated at this node; terminals eliminate none
    pub fn projection_vars(&self) -> Option<&BTreeSet<Var>> {
        match self {
            JoinNode::Terminal { .. } => None,
            JoinNode::Nonterminal {
                projection_vars, ..
            } => Some(projection_vars),
        }
    }
}

/// A captured state of the tree counters and arena, restorable to roll back
/// speculative construction
#[derive(Clone, Debug)]
pub struct Snapshot {
    nodes_len: usize,
    node_count: usize,
    terminal_count: usize,
    nonterminal_indices: BTreeSet<usize>,
}

/// An arena of join-tree nodes together with the node-index counters
#[derive(Clone, Debug, Default)]
pub struct JoinTree {
    nodes: Vec<JoinNode>,
    node_count: usize,
    terminal_count: usize,
    nonterminal_indices: BTreeSet<usize>,
}

impl JoinTree {
    /// Creates an empty tree arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a node by its handle
    pub fn node(&self, id: NodeId) -> &JoinNode {
        &self.nodes[id.0]
    }

    /// Gets the total number of nodes created
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Gets the number of terminals created
    pub fn terminal_count(&self) -> usize {
        self.terminal_count
    }

    /// Captures the counters and arena length for a later [`JoinTree::restore`]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            nodes_len: self.nodes.len(),
            node_count: self.node_count,
            terminal_count: self.terminal_count,
            nonterminal_indices: self.nonterminal_indices.clone(),
        }
    }

    /// Rolls the arena back to a snapshot, dropping nodes created since
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.nodes.truncate(snapshot.nodes_len);
        self.node_count = snapshot.node_count;
        self.terminal_count = snapshot.terminal_count;
        self.nonterminal_indices = snapshot.nonterminal_indices;
    }

    /// Creates the next terminal. Terminals bind to constraints in creation
    /// order: the n-th call binds to constraint id n.
    pub fn add_terminal(&mut self, cnf: &Cnf) -> NodeId {
        let index = self.terminal_count;
        self.terminal_count += 1;
        self.node_count += 1;
        self.nodes.push(JoinNode::Terminal {
            index,
            pre_projection_vars: cnf.constraint(index).vars(),
        });
        NodeId(self.nodes.len() - 1)
    }

    /// Creates a nonterminal over existing children. The pre-projection scope
    /// is the union of the children's post-projection variables. A requested
    /// index must be at or above the terminal count and unused; without one
    /// the running node count is assigned.
    pub fn add_nonterminal(
        &mut self,
        children: Vec<NodeId>,
        projection_vars: BTreeSet<Var>,
        requested_index: Option<usize>,
    ) -> Result<NodeId, JoinTreeError> {
        if children.is_empty() {
            return Err(JoinTreeError::NoChildren);
        }
        let index = match requested_index {
            None => self.node_count,
            Some(requested) => {
                if requested < self.terminal_count {
                    return Err(JoinTreeError::IndexBelowTerminals {
                        requested,
                        terminal_count: self.terminal_count,
                    });
                }
                if self.nonterminal_indices.contains(&requested) {
                    return Err(JoinTreeError::IndexTaken(requested));
                }
                requested
            }
        };
        let mut pre_projection_vars = BTreeSet::new();
        for child in &children {
            pre_projection_vars.extend(self.post_projection_vars(*child));
        }
        self.nonterminal_indices.insert(index);
        self.node_count += 1;
        self.nodes.push(JoinNode::Nonterminal {
            index,
            children,
            projection_vars,
            pre_projection_vars,
        });
        Ok(NodeId(self.nodes.len() - 1))
    }

    /// Checks whether a node is a terminal, i.e., its index is below the
    /// terminal count
    pub fn is_terminal(&self, id: NodeId) -> bool {
        self.node(id).index() < self.terminal_count
    }

    /// The node's scope after eliminating its projection variables
    pub fn post_projection_vars(&self, id: NodeId) -> BTreeSet<Var> {
        match self.node(id) {
            JoinNode::Terminal {
                pre_projection_vars,
                ..
            } => pre_projection_vars.clone(),
            JoinNode::Nonterminal {
                pre_projection_vars,
                projection_vars,
                ..
            } => pre_projection_vars
                .difference(projection_vars)
                .copied()
                .collect(),
        }
    }

    /// The largest scope size in the subtree after applying an assignment:
    /// variables bound by the assignment leave every scope
    pub fn width(&self, id: NodeId, assignment: &Assignment) -> usize {
        let node = self.node(id);
        let own = node
            .pre_projection_vars()
            .iter()
            .filter(|v| !assignment.contains_var(**v))
            .count();
        match node {
            JoinNode::Terminal { .. } => own,
            JoinNode::Nonterminal { children, .. } => children
                .iter()
                .map(|child| self.width(*child, assignment))
                .fold(own, usize::max),
        }
    }

    /// For each variable in the subtree, raises its entry to the size of the
    /// largest scope containing it
    pub fn update_var_sizes(&self, id: NodeId, var_sizes: &mut BTreeMap<Var, usize>) {
        let node = self.node(id);
        let scope = node.pre_projection_vars();
        for var in scope {
            let entry = var_sizes.entry(*var).or_default();
            *entry = (*entry).max(scope.len());
        }
        if let JoinNode::Nonterminal { children, .. } = node {
            for child in children {
                self.update_var_sizes(*child, var_sizes);
            }
        }
    }

    /// Decides where a node moves in a clustering pipeline. A node whose
    /// post-projection scope is disjoint from all projectable variables lands
    /// in the special cluster `projectable_var_sets.len()`; list heuristics
    /// step to the next cluster, tree heuristics to the first later cluster
    /// whose variables intersect the scope.
    pub fn choose_cluster_index(
        &self,
        id: NodeId,
        cluster_index: usize,
        projectable_var_sets: &[BTreeSet<Var>],
        heuristic: ClusteringHeuristic,
    ) -> Result<usize, JoinTreeError> {
        if cluster_index >= projectable_var_sets.len() {
            return Err(JoinTreeError::ClusterIndexOutOfRange {
                index: cluster_index,
                cluster_count: projectable_var_sets.len(),
            });
        }
        let post_projection_vars = self.post_projection_vars(id);
        if projectable_var_sets
            .iter()
            .all(|set| set.is_disjoint(&post_projection_vars))
        {
            return Ok(projectable_var_sets.len());
        }
        if heuristic.is_list() {
            return Ok(cluster_index + 1);
        }
        for target in cluster_index + 1..projectable_var_sets.len() {
            if !projectable_var_sets[target].is_disjoint(&post_projection_vars) {
                return Ok(target);
            }
        }
        Ok(projectable_var_sets.len())
    }

    /// The rank of a node under a restricted variable order: the position of
    /// the first in-scope variable for bucket heuristics, of the last for
    /// bouquet heuristics, and the order length when no variable is in scope
    pub fn node_rank(
        &self,
        id: NodeId,
        restricted_var_order: &[Var],
        heuristic: ClusteringHeuristic,
    ) -> usize {
        let post_projection_vars = self.post_projection_vars(id);
        let rank = if heuristic.is_bucket() {
            restricted_var_order
                .iter()
                .position(|v| post_projection_vars.contains(v))
        } else {
            restricted_var_order
                .iter()
                .rposition(|v| post_projection_vars.contains(v))
        };
        rank.unwrap_or(restricted_var_order.len())
    }

    /// Groups variables by the size of the largest node containing them,
    /// biggest first; within a group the ascending variable order of the size
    /// scan is kept
    pub fn biggest_node_var_order(&self, root: NodeId, cnf: &Cnf) -> Vec<Var> {
        let mut var_sizes: BTreeMap<Var, usize> =
            cnf.apparent_vars().iter().map(|v| (*v, 0)).collect();
        self.update_var_sizes(root, &mut var_sizes);
        utils::flip_map(&var_sizes)
            .into_iter()
            .map(|(_, var)| var)
            .collect()
    }

    /// Emits every node's projection variables in BFS order from the root
    pub fn highest_node_var_order(&self, root: NodeId) -> Vec<Var> {
        let mut var_order = Vec::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if let JoinNode::Nonterminal {
                children,
                projection_vars,
                ..
            } = self.node(id)
            {
                var_order.extend(projection_vars.iter().copied());
                queue.extend(
                    children
                        .iter()
                        .filter(|child| !self.is_terminal(**child))
                        .copied(),
                );
            }
        }
        var_order
    }

    /// Computes a variable order for the tree rooted at `root`. Formula-level
    /// heuristics delegate to [`Cnf::var_order`]; `invert` reverses the
    /// result.
    pub fn var_order(
        &self,
        root: NodeId,
        heuristic: VarOrderHeuristic,
        invert: bool,
        cnf: &Cnf,
        config: &Config,
    ) -> Vec<Var> {
        if heuristic.is_cnf_level() {
            return cnf.var_order(heuristic, invert, config);
        }
        let mut var_order = match heuristic {
            VarOrderHeuristic::BiggestNode => self.biggest_node_var_order(root, cnf),
            VarOrderHeuristic::HighestNode => self.highest_node_var_order(root),
            _ => unreachable!("formula-level heuristics are delegated"),
        };
        if invert {
            var_order.reverse();
        }
        var_order
    }

    /// Enumerates slice assignments over a prefix of additive variables:
    /// walks the chosen variable order and doubles the assignment list on
    /// each additive variable until `slice_var_count` of them are bound. The
    /// result has `2^min(slice_var_count, additive vars in order)` entries;
    /// with a zero count it is the single empty assignment.
    pub fn additive_assignments(
        &self,
        root: NodeId,
        heuristic: VarOrderHeuristic,
        invert: bool,
        slice_var_count: usize,
        cnf: &Cnf,
        config: &Config,
    ) -> Vec<Assignment> {
        if slice_var_count == 0 {
            return vec![Assignment::new()];
        }

        let var_order_start = ProcessTime::now();
        let var_order = self.var_order(root, heuristic, invert, cnf, config);
        if config.verbose_solving >= 1 {
            debug!(
                seconds = utils::duration_secs(var_order_start),
                "slice var order computed"
            );
        }

        let assignments_start = ProcessTime::now();
        let mut assignments = Vec::new();
        let mut slice_vars = Vec::new();
        for var in var_order {
            if slice_vars.len() >= slice_var_count {
                break;
            }
            if cnf.additive_vars().contains(&var) {
                assignments = Assignment::extend_assignments(assignments, var);
                slice_vars.push(var);
            }
        }
        if config.verbose_solving >= 2 {
            debug!(?slice_vars, "slice var order");
        }
        if config.verbose_solving >= 1 {
            debug!(
                seconds = utils::duration_secs(assignments_start),
                "slice assignments generated"
            );
        }
        if assignments.is_empty() {
            return vec![Assignment::new()];
        }
        assignments
    }

    /// Writes a nonterminal as
    /// `<start_word> <index+1> <child index+1>... e <projection var>...`;
    /// terminals are implicit in the child references and print nothing
    pub fn write_node<W: Write>(
        &self,
        writer: &mut W,
        id: NodeId,
        start_word: &str,
    ) -> io::Result<()> {
        let JoinNode::Nonterminal {
            index,
            children,
            projection_vars,
            ..
        } = self.node(id)
        else {
            return Ok(());
        };
        write!(writer, "{} {} ", start_word, index + 1)?;
        for child in children {
            write!(writer, "{} ", self.node(*child).index() + 1)?;
        }
        write!(writer, "{}", VAR_ELIM_WORD)?;
        for var in projection_vars {
            write!(writer, " {}", var.to_dimacs())?;
        }
        writeln!(writer)
    }

    /// Writes the subtree under a node, children before parents
    pub fn write_subtree<W: Write>(
        &self,
        writer: &mut W,
        id: NodeId,
        start_word: &str,
    ) -> io::Result<()> {
        if let JoinNode::Nonterminal { children, .. } = self.node(id) {
            for child in children {
                self.write_subtree(writer, *child, start_word)?;
            }
            self.write_node(writer, id, start_word)?;
        }
        Ok(())
    }
}
