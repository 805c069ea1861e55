use std::{collections::BTreeSet, io::Cursor};

use jtcount::{
    instances::{Cnf, Config, VarOrderHeuristic},
    jointree::{JoinTree, NodeId},
    types::Assignment,
    var,
};

fn parse(data: &str, config: &mut Config) -> Cnf {
    Cnf::from_dimacs(Cursor::new(data), config).unwrap()
}

/// Builds a terminal per constraint and joins them all under one root
/// projecting the given variables
fn star_tree(cnf: &Cnf, projection: BTreeSet<jtcount::types::Var>) -> (JoinTree, NodeId) {
    let mut tree = JoinTree::new();
    let terminals: Vec<_> = (0..cnf.n_constraints())
        .map(|_| tree.add_terminal(cnf))
        .collect();
    let root = tree.add_nonterminal(terminals, projection, None).unwrap();
    (tree, root)
}

#[test]
fn scopes_of_a_parsed_tree() {
    let mut config = Config::default();
    let cnf = parse("p cnf 3 2\n1 2 0\n2 3 0\n", &mut config);
    let (tree, root) = star_tree(&cnf, BTreeSet::from([var![1]]));

    assert_eq!(
        tree.node(root).pre_projection_vars(),
        &BTreeSet::from([var![0], var![1], var![2]])
    );
    assert_eq!(
        tree.post_projection_vars(root),
        BTreeSet::from([var![0], var![2]])
    );
    assert_eq!(tree.width(root, &Assignment::new()), 3);
}

#[test]
fn every_variable_projected_once_on_root_path() {
    let mut config = Config::default();
    let cnf = parse("p cnf 4 3\n1 2 0\n2 3 0\n3 4 0\n", &mut config);
    let mut tree = JoinTree::new();
    let t0 = tree.add_terminal(&cnf);
    let t1 = tree.add_terminal(&cnf);
    let t2 = tree.add_terminal(&cnf);
    let inner = tree
        .add_nonterminal(vec![t0, t1], BTreeSet::from([var![0], var![1]]), None)
        .unwrap();
    let root = tree
        .add_nonterminal(
            vec![inner, t2],
            BTreeSet::from([var![2], var![3]]),
            None,
        )
        .unwrap();

    // every apparent variable is eliminated at exactly one node on its
    // leaf-to-root paths
    let mut eliminated = BTreeSet::new();
    for id in [inner, root] {
        let projected = tree.node(id).projection_vars().unwrap();
        assert!(eliminated.is_disjoint(projected));
        eliminated.extend(projected.iter().copied());
    }
    assert_eq!(&eliminated, cnf.apparent_vars());
    assert!(tree.post_projection_vars(root).is_empty());
}

#[test]
fn slice_assignments_from_parsed_formula() {
    let mut config = Config::default();
    let cnf = parse("p cnf 3 2\n1 2 0\n2 3 0\n", &mut config);
    let (tree, root) = star_tree(&cnf, BTreeSet::from([var![0], var![1], var![2]]));

    let slices =
        tree.additive_assignments(root, VarOrderHeuristic::Declared, false, 2, &cnf, &config);
    assert_eq!(slices.len(), 4);
    for (pos, slice) in slices.iter().enumerate() {
        // stable doubling: x0 is the slow bit, x1 the fast one
        assert_eq!(slice.var_value(var![0]), Some(pos >= 2));
        assert_eq!(slice.var_value(var![1]), Some(pos % 2 == 1));
        assert_eq!(slice.var_value(var![2]), None);
    }

    // requesting more slice vars than additive vars exist caps the count
    let slices =
        tree.additive_assignments(root, VarOrderHeuristic::Declared, false, 10, &cnf, &config);
    assert_eq!(slices.len(), 8);
}

#[test]
fn slices_under_projection() {
    let mut config = Config {
        projected_counting: true,
        ..Config::default()
    };
    let cnf = parse("p cnf 3 2\nvp 2 0\n1 2 0\n2 3 0\n", &mut config);
    let (tree, root) = star_tree(&cnf, cnf.additive_vars().clone());

    let slices =
        tree.additive_assignments(root, VarOrderHeuristic::Declared, false, 4, &cnf, &config);
    assert_eq!(slices.len(), 2);
    assert!(slices.iter().all(|s| s.contains_var(var![1])));
}

#[test]
fn emitted_tree_lists_children_before_parents() {
    let mut config = Config::default();
    let cnf = parse("p cnf 3 2\n1 2 0\n2 3 0\n", &mut config);
    let mut tree = JoinTree::new();
    let t0 = tree.add_terminal(&cnf);
    let t1 = tree.add_terminal(&cnf);
    let inner = tree
        .add_nonterminal(vec![t1], BTreeSet::from([var![2]]), None)
        .unwrap();
    let root = tree
        .add_nonterminal(
            vec![t0, inner],
            BTreeSet::from([var![0], var![1]]),
            None,
        )
        .unwrap();

    let mut out = Vec::new();
    tree.write_subtree(&mut out, root, "jt").unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "jt 3 2 e 3");
    assert_eq!(lines[1], "jt 4 1 3 e 1 2");
}
