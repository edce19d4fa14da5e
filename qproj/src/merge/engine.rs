// Copyright 2022 Parakram Majumdar
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Greedy bounded-support clustering of factors and variables.
//!
//! The engine builds a bipartite merge graph over the input functions and
//! variables, scores every candidate contraction between two same-kind
//! nodes, and executes candidates best-first until none is eligible any
//! more. A contraction conjoins the two functions, so the clustered
//! factors are logically equivalent to the inputs; eligibility is bounded
//! by the prospective support size of the merged neighbourhood so that the
//! downstream factor graph never sees a node wider than the configured
//! limit.
//!
//! Nodes and candidate mergers live in arenas addressed by dense ids.
//! Contracted nodes are never deallocated mid-run: stale candidates may
//! still name them, and the reconciliation step resolves those names
//! against the arena before discarding the candidates.

use std::collections::BTreeSet;

use fxhash::FxHashSet;
use log::debug;

use crate::dd::{Bdd, Ref};
use crate::merge::heap::IndexedMaxHeap;
use crate::merge::MergeHints;

/// The position of a node in the merge graph's node arena.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
struct NodeId(usize);

/// The position of a candidate merger in the merger arena. Ids double as
/// heap keys and as the deterministic tie-break on equal scores.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
struct MergerId(usize);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum NodeKind {
    Func,
    Var,
}

/// A node of the merge graph: either a factor function or a variable.
struct MergeNode {
    kind: NodeKind,
    bdd: Ref,
    /// Cube of the variables the node ranges over; equal to `bdd` for
    /// variable nodes.
    support: Ref,
    /// Support-sharing nodes of the opposite kind. May keep naming
    /// contracted nodes; their supports are subsumed by their
    /// replacement's, so the bound stays conservative.
    neighbours: Vec<NodeId>,
    /// Candidate mergers this node participates in.
    mergers: BTreeSet<MergerId>,
}

/// A candidate contraction between two same-kind nodes.
#[derive(Clone, Copy)]
struct Merger {
    node1: NodeId,
    node2: NodeId,
}

/// The surviving clustered factors and variables, in ascending handle
/// order.
#[derive(Debug, Clone)]
pub struct MergeResults {
    pub factors: Vec<Ref>,
    pub variables: Vec<Ref>,
}

/// Cluster `factors` and `variables` under the given support bound.
///
/// `hints` biases the contraction order (the engine works on its own copy,
/// rewriting pairs as contractions proceed); `quantified_variables` holds
/// the variable cubes subject to quantification, and contractions never
/// mix a quantified node with an unquantified one. The inputs themselves
/// are not consumed: when nothing is eligible the results simply echo
/// them.
pub fn merge(
    manager: &mut Bdd,
    factors: &[Ref],
    variables: &[Ref],
    largest_support_set: usize,
    hints: &MergeHints,
    quantified_variables: &FxHashSet<Ref>,
) -> MergeResults {
    let mut graph = MergeGraph {
        nodes: vec![],
        mergers: vec![],
        heap: IndexedMaxHeap::new(),
        hints: hints.clone(),
        largest_support_set,
        quantified_vars: quantified_variables.clone(),
        quantified_funcs: FxHashSet::default(),
        surviving_factors: factors.iter().copied().collect(),
        surviving_variables: variables.iter().copied().collect(),
    };
    graph.build(manager, factors, variables);
    graph.contract(manager);
    MergeResults {
        factors: graph.surviving_factors.iter().copied().collect(),
        variables: graph.surviving_variables.iter().copied().collect(),
    }
}

struct MergeGraph {
    nodes: Vec<MergeNode>,
    mergers: Vec<Merger>,
    heap: IndexedMaxHeap,
    hints: MergeHints,
    largest_support_set: usize,
    /// Quantification class of variable nodes, extended as quantified
    /// variables merge.
    quantified_vars: FxHashSet<Ref>,
    /// Quantification class of factor nodes. Starts empty and is carried
    /// for symmetry with the variable side.
    quantified_funcs: FxHashSet<Ref>,
    surviving_factors: BTreeSet<Ref>,
    surviving_variables: BTreeSet<Ref>,
}

impl MergeGraph {
    fn add_node(&mut self, manager: &mut Bdd, kind: NodeKind, bdd: Ref) -> NodeId {
        let support = match kind {
            NodeKind::Func => manager.support(bdd),
            NodeKind::Var => bdd,
        };
        let id = NodeId(self.nodes.len());
        self.nodes.push(MergeNode {
            kind,
            bdd,
            support,
            neighbours: vec![],
            mergers: BTreeSet::new(),
        });
        id
    }

    fn is_connected(&self, manager: &mut Bdd, n1: NodeId, n2: NodeId) -> bool {
        let shared =
            manager.cube_intersection(self.nodes[n1.0].support, self.nodes[n2.0].support);
        !manager.is_one(shared)
    }

    /// Score the contraction of `n1` and `n2`, or `None` when ineligible.
    ///
    /// The support bound is checked against the union of both supports
    /// *and* every neighbour's support: that is the widest function the
    /// merged node could grow into once its own fan-in contracts.
    fn compatibility(
        &self,
        manager: &mut Bdd,
        n1: NodeId,
        n2: NodeId,
        hint: f64,
        quantified: &FxHashSet<Ref>,
    ) -> Option<f64> {
        let (s1, s2) = (self.nodes[n1.0].support, self.nodes[n2.0].support);
        let q1 = quantified.contains(&s1);
        let q2 = quantified.contains(&s2);
        if q1 != q2 {
            return None;
        }
        let mut combined = manager.cube_union(s1, s2);
        let neighbours = self.nodes[n1.0]
            .neighbours
            .iter()
            .chain(self.nodes[n2.0].neighbours.iter());
        for &n in neighbours {
            combined = manager.cube_union(combined, self.nodes[n.0].support);
        }
        let union_size = manager.cube_size(combined);
        if union_size > self.largest_support_set {
            debug!(
                "cannot merge {} and {}: union size {} exceeds bound {}",
                self.nodes[n1.0].bdd, self.nodes[n2.0].bdd, union_size, self.largest_support_set
            );
            return None;
        }
        let common = manager.cube_intersection(s1, s2);
        let common_size = manager.cube_size(common) as f64;
        let size1 = manager.cube_size(s1) as f64;
        let size2 = manager.cube_size(s2) as f64;
        Some(common_size / size1.min(size2) + hint)
    }

    fn create_merger(&mut self, n1: NodeId, n2: NodeId, score: f64) {
        assert!(
            self.nodes[n1.0].kind == self.nodes[n2.0].kind,
            "merger endpoints must share a kind"
        );
        let id = MergerId(self.mergers.len());
        self.mergers.push(Merger { node1: n1, node2: n2 });
        self.nodes[n1.0].mergers.insert(id);
        self.nodes[n2.0].mergers.insert(id);
        self.heap.push(id.0, score);
    }

    fn build(&mut self, manager: &mut Bdd, factors: &[Ref], variables: &[Ref]) {
        let func_ids: Vec<NodeId> = factors
            .iter()
            .map(|&f| self.add_node(manager, NodeKind::Func, f))
            .collect();
        let var_ids: Vec<NodeId> = variables
            .iter()
            .map(|&v| self.add_node(manager, NodeKind::Var, v))
            .collect();

        // Factor-variable edges for every support-sharing pair.
        for &f in &func_ids {
            for &v in &var_ids {
                if self.is_connected(manager, f, v) {
                    self.nodes[f.0].neighbours.push(v);
                    self.nodes[v.0].neighbours.push(f);
                }
            }
        }

        // Factor-factor candidates only for connected pairs...
        for (i, &f1) in func_ids.iter().enumerate() {
            for &f2 in &func_ids[i + 1..] {
                if !self.is_connected(manager, f1, f2) {
                    continue;
                }
                let hint = self.hints.get_weight(self.nodes[f1.0].bdd, self.nodes[f2.0].bdd);
                if let Some(score) =
                    self.compatibility(manager, f1, f2, hint, &self.quantified_funcs)
                {
                    self.create_merger(f1, f2, score);
                }
            }
        }

        // ...but every variable pair is a candidate, connected or not; the
        // eligibility tests weed out the hopeless ones.
        for (i, &v1) in var_ids.iter().enumerate() {
            for &v2 in &var_ids[i + 1..] {
                let hint = self.hints.get_weight(self.nodes[v1.0].bdd, self.nodes[v2.0].bdd);
                if let Some(score) =
                    self.compatibility(manager, v1, v2, hint, &self.quantified_vars)
                {
                    self.create_merger(v1, v2, score);
                }
            }
        }
    }

    /// Execute the most promising candidate until none is left.
    fn contract(&mut self, manager: &mut Bdd) {
        while let Some(key) = self.heap.pop() {
            let Merger { node1, node2 } = self.mergers[key];
            let kind = self.nodes[node1.0].kind;
            assert!(
                kind == self.nodes[node2.0].kind,
                "merger endpoints disagree on kind"
            );

            let was_quantified = match kind {
                NodeKind::Var => self.quantified_vars.contains(&self.nodes[node1.0].support),
                NodeKind::Func => self.quantified_funcs.contains(&self.nodes[node1.0].support),
            };
            let merged_bdd = manager.and(self.nodes[node1.0].bdd, self.nodes[node2.0].bdd);
            debug!(
                "contracting {} and {} into {}",
                self.nodes[node1.0].bdd, self.nodes[node2.0].bdd, merged_bdd
            );
            if was_quantified {
                // The merged node inherits the quantification class.
                match kind {
                    NodeKind::Var => self.quantified_vars.insert(merged_bdd),
                    NodeKind::Func => self.quantified_funcs.insert(merged_bdd),
                };
            }
            let (bdd1, bdd2) = (self.nodes[node1.0].bdd, self.nodes[node2.0].bdd);
            self.hints.merge(bdd1, bdd2, merged_bdd);

            let merged = self.add_node(manager, kind, merged_bdd);
            let survivors = match kind {
                NodeKind::Func => &mut self.surviving_factors,
                NodeKind::Var => &mut self.surviving_variables,
            };
            survivors.remove(&bdd1);
            survivors.remove(&bdd2);
            survivors.insert(merged_bdd);

            let neighbourhood: BTreeSet<NodeId> = self.nodes[node1.0]
                .neighbours
                .iter()
                .chain(self.nodes[node2.0].neighbours.iter())
                .copied()
                .collect();
            self.nodes[merged.0].neighbours = neighbourhood.into_iter().collect();

            self.reconcile(manager, node1, node2, merged, kind);
        }
    }

    /// Drop the candidates incident to the contracted nodes and requeue
    /// one fresh candidate per distinct surviving counterpart.
    fn reconcile(
        &mut self,
        manager: &mut Bdd,
        node1: NodeId,
        node2: NodeId,
        merged: NodeId,
        kind: NodeKind,
    ) {
        let mut old: Vec<MergerId> = self.nodes[node1.0].mergers.iter().copied().collect();
        old.extend(self.nodes[node2.0].mergers.iter().copied());
        self.nodes[node1.0].mergers.clear();
        self.nodes[node2.0].mergers.clear();

        let mut seen: BTreeSet<NodeId> = BTreeSet::new();
        let mut stale_others: Vec<NodeId> = vec![];
        for merger_id in old {
            let m = &self.mergers[merger_id.0];
            let other = if m.node1 != node1 && m.node1 != node2 {
                m.node1
            } else if m.node2 != node1 && m.node2 != node2 {
                m.node2
            } else {
                // Both endpoints were contracted: this is the executed
                // candidate itself, already out of the heap.
                continue;
            };
            self.nodes[other.0].mergers.remove(&merger_id);
            self.heap.remove(merger_id.0);
            if seen.insert(other) {
                stale_others.push(other);
            }
        }

        for other in stale_others {
            let hint = self.hints.get_weight(self.nodes[merged.0].bdd, self.nodes[other.0].bdd);
            let quantified = match kind {
                NodeKind::Var => &self.quantified_vars,
                NodeKind::Func => &self.quantified_funcs,
            };
            if let Some(score) = self.compatibility(manager, merged, other, hint, quantified) {
                self.create_merger(merged, other, score);
            }
        }
    }
}

#[cfg(test)]
mod test_engine {
    use super::*;

    fn clause(manager: &mut Bdd, literals: &[i32]) -> Ref {
        let mut acc = manager.zero;
        for &lit in literals {
            let v = manager.mk_var(lit.unsigned_abs());
            let l = if lit < 0 { manager.not(v) } else { v };
            acc = manager.or(acc, l);
        }
        acc
    }

    fn vars(manager: &mut Bdd, indices: &[u32]) -> Vec<Ref> {
        indices.iter().map(|&i| manager.mk_var(i)).collect()
    }

    #[test]
    fn overlapping_factors_merge_under_a_generous_bound() {
        let mut manager = Bdd::new();
        let f1 = clause(&mut manager, &[1, 2]);
        let f2 = clause(&mut manager, &[2, 3]);
        let variables = vars(&mut manager, &[1, 2, 3]);
        let hints = MergeHints::new();
        let results = merge(
            &mut manager,
            &[f1, f2],
            &variables,
            3,
            &hints,
            &FxHashSet::default(),
        );
        assert_eq!(results.factors.len(), 1);
        let expected = manager.and(f1, f2);
        assert_eq!(results.factors[0], expected);
    }

    #[test]
    fn a_tight_bound_blocks_every_contraction() {
        let mut manager = Bdd::new();
        let f1 = clause(&mut manager, &[1, 2]);
        let f2 = clause(&mut manager, &[3, 4]);
        let variables = vars(&mut manager, &[1, 2, 3, 4]);
        let hints = MergeHints::new();
        let results = merge(
            &mut manager,
            &[f1, f2],
            &variables,
            1,
            &hints,
            &FxHashSet::default(),
        );
        assert_eq!(results.factors.len(), 2);
        assert!(results.factors.contains(&f1));
        assert!(results.factors.contains(&f2));
    }

    #[test]
    fn clustered_factors_stay_logically_equivalent_to_the_inputs() {
        let mut manager = Bdd::new();
        let factors = [
            clause(&mut manager, &[1, 2]),
            clause(&mut manager, &[-2, 3]),
            clause(&mut manager, &[3, 4]),
            clause(&mut manager, &[-4, -1]),
        ];
        let variables = vars(&mut manager, &[1, 2, 3, 4]);
        let hints = MergeHints::new();
        let results = merge(
            &mut manager,
            &factors,
            &variables,
            4,
            &hints,
            &FxHashSet::default(),
        );
        let before = manager.and_all(factors.iter().copied());
        let after = manager.and_all(results.factors.iter().copied());
        assert_eq!(before, after);
        for &f in &results.factors {
            let support = manager.support(f);
            assert!(manager.cube_size(support) <= 4);
        }
    }

    #[test]
    fn quantified_and_free_variables_never_mix() {
        let mut manager = Bdd::new();
        let variables = vars(&mut manager, &[1, 2, 3]);
        let quantified: FxHashSet<Ref> = [variables[0], variables[1]].into_iter().collect();
        let hints = MergeHints::new();
        let results = merge(&mut manager, &[], &variables, 3, &hints, &quantified);
        // a and b fuse, c stays apart; results come in handle order.
        let ab = manager.and(variables[0], variables[1]);
        assert_eq!(results.variables, vec![variables[2], ab]);
    }

    #[test]
    fn hints_steer_the_contraction_order() {
        let mut manager = Bdd::new();
        // Two equally attractive pairs; the hint promotes the second.
        let f1 = clause(&mut manager, &[1, 2]);
        let f2 = clause(&mut manager, &[2, 3]);
        let f3 = clause(&mut manager, &[4, 5]);
        let f4 = clause(&mut manager, &[5, 6]);
        let variables = vars(&mut manager, &[1, 2, 3, 4, 5, 6]);
        let mut hints = MergeHints::new();
        hints.add_weight(f3, f4, 10.0);
        // Bound 3 allows each chain to contract once but not across chains.
        let results = merge(
            &mut manager,
            &[f1, f2, f3, f4],
            &variables,
            3,
            &hints,
            &FxHashSet::default(),
        );
        assert_eq!(results.factors.len(), 2);
        let left = manager.and(f1, f2);
        let right = manager.and(f3, f4);
        assert!(results.factors.contains(&left));
        assert!(results.factors.contains(&right));
    }

    #[test]
    fn duplicate_factors_collapse_into_one_survivor() {
        let mut manager = Bdd::new();
        let a = clause(&mut manager, &[1]);
        let variables = vars(&mut manager, &[1]);
        let hints = MergeHints::new();
        let results = merge(
            &mut manager,
            &[a, a, a],
            &variables,
            5,
            &hints,
            &FxHashSet::default(),
        );
        assert_eq!(results.factors, vec![a]);
        assert_eq!(results.variables, vec![a]);
    }

    #[test]
    fn the_same_inputs_produce_the_same_clustering() {
        let run = || {
            let mut manager = Bdd::new();
            let factors = [
                clause(&mut manager, &[1, 2]),
                clause(&mut manager, &[2, 3]),
                clause(&mut manager, &[3, 4]),
                clause(&mut manager, &[1, 4]),
            ];
            let variables = vars(&mut manager, &[1, 2, 3, 4]);
            let hints = MergeHints::new();
            let results = merge(
                &mut manager,
                &factors,
                &variables,
                3,
                &hints,
                &FxHashSet::default(),
            );
            (
                results.factors.iter().map(|f| f.index()).collect::<Vec<_>>(),
                results.variables.iter().map(|v| v.index()).collect::<Vec<_>>(),
            )
        };
        assert_eq!(run(), run());
    }
}
