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

//! Factor-graph message passing over decision diagrams.
//!
//! The graph is bipartite: factor nodes on one side, variable groups on
//! the other, with an edge wherever a factor's support meets a group's
//! cube. A message from a factor to a group is the factor conjoined with
//! the messages flowing in from its other groups, projected onto the
//! group's cube; a message from a group to a factor conjoins what the
//! other factors told the group. All messages start at `one` and only ever
//! shrink, so the iteration reaches a fixpoint; canonical handles make the
//! fixpoint test a plain equality check.
//!
//! The conjunction of the messages incoming to the free variables is an
//! over-approximation of the existential projection of the factor
//! conjunction.

use fxhash::FxHashMap;
use log::debug;

use crate::dd::{Bdd, Ref};

struct FactorNode {
    func: Ref,
    support: Ref,
    groups: Vec<usize>,
}

struct GroupNode {
    cube: Ref,
    factors: Vec<usize>,
}

pub struct FactorGraph {
    factors: Vec<FactorNode>,
    groups: Vec<GroupNode>,
    /// (factor index, group index) -> current message, one entry per edge.
    factor_to_group: FxHashMap<(usize, usize), Ref>,
    /// (group index, factor index) -> current reply, one entry per edge.
    group_to_factor: FxHashMap<(usize, usize), Ref>,
}

impl FactorGraph {
    /// Build the graph for the given factors, one singleton group per
    /// variable occurring in any factor's support.
    pub fn new(manager: &mut Bdd, factors: &[Ref]) -> Self {
        let factor_nodes: Vec<FactorNode> = factors
            .iter()
            .map(|&f| FactorNode {
                func: f,
                support: manager.support(f),
                groups: vec![],
            })
            .collect();
        let mut all_vars = manager.one;
        for node in &factor_nodes {
            all_vars = manager.cube_union(all_vars, node.support);
        }
        let groups = manager
            .cube_vars(all_vars)
            .into_iter()
            .map(|v| {
                let cube = manager.cube([v]);
                GroupNode { cube, factors: vec![] }
            })
            .collect();
        let mut graph = Self {
            factors: factor_nodes,
            groups,
            factor_to_group: FxHashMap::default(),
            group_to_factor: FxHashMap::default(),
        };
        graph.rewire(manager);
        graph
    }

    /// Recompute adjacency and reset every message to `one`.
    fn rewire(&mut self, manager: &mut Bdd) {
        for node in &mut self.factors {
            node.groups.clear();
        }
        for group in &mut self.groups {
            group.factors.clear();
        }
        self.factor_to_group.clear();
        self.group_to_factor.clear();
        for fi in 0..self.factors.len() {
            for gi in 0..self.groups.len() {
                let shared =
                    manager.cube_intersection(self.factors[fi].support, self.groups[gi].cube);
                if !manager.is_one(shared) {
                    self.factors[fi].groups.push(gi);
                    self.groups[gi].factors.push(fi);
                    self.factor_to_group.insert((fi, gi), manager.one);
                    self.group_to_factor.insert((gi, fi), manager.one);
                }
            }
        }
    }

    /// Fuse every group intersecting `cube` into a single group carrying
    /// the union of their cubes. Messages restart from `one`.
    pub fn group_variables(&mut self, manager: &mut Bdd, cube: Ref) {
        let mut kept = vec![];
        let mut fused = manager.one;
        let mut hit = false;
        for group in self.groups.drain(..) {
            let shared = manager.cube_intersection(group.cube, cube);
            if manager.is_one(shared) {
                kept.push(group);
            } else {
                hit = true;
                fused = manager.cube_union(fused, group.cube);
            }
        }
        if hit {
            kept.push(GroupNode { cube: fused, factors: vec![] });
        }
        self.groups = kept;
        self.rewire(manager);
    }

    /// Iterate message updates until nothing changes; returns the number
    /// of rounds.
    pub fn converge(&mut self, manager: &mut Bdd) -> usize {
        let mut rounds = 0;
        loop {
            rounds += 1;
            let mut changed = false;

            // Factor-to-group messages from the current group replies.
            for fi in 0..self.factors.len() {
                let adjacent = self.factors[fi].groups.clone();
                for &gi in &adjacent {
                    let mut conj = self.factors[fi].func;
                    for &other in &adjacent {
                        if other != gi {
                            conj = manager.and(conj, self.group_to_factor[&(other, fi)]);
                        }
                    }
                    let support = manager.support(conj);
                    let to_drop = manager.cube_diff(support, self.groups[gi].cube);
                    let message = manager.exists(conj, to_drop);
                    if self.factor_to_group.insert((fi, gi), message) != Some(message) {
                        changed = true;
                    }
                }
            }

            // Group-to-factor replies from the fresh factor messages.
            for gi in 0..self.groups.len() {
                let adjacent = self.groups[gi].factors.clone();
                for &fi in &adjacent {
                    let mut conj = manager.one;
                    for &other in &adjacent {
                        if other != fi {
                            conj = manager.and(conj, self.factor_to_group[&(other, gi)]);
                        }
                    }
                    if self.group_to_factor.insert((gi, fi), conj) != Some(conj) {
                        changed = true;
                    }
                }
            }

            if !changed {
                break;
            }
        }
        debug!("factor graph converged after {rounds} rounds");
        rounds
    }

    /// The factor messages incoming to every group whose cube lies inside
    /// `cube`, in graph order.
    pub fn incoming_messages(&self, manager: &mut Bdd, cube: Ref) -> Vec<Ref> {
        let mut messages = vec![];
        for (gi, group) in self.groups.iter().enumerate() {
            let outside = manager.cube_diff(group.cube, cube);
            if !manager.is_one(outside) {
                continue;
            }
            for &fi in &group.factors {
                messages.push(self.factor_to_group[&(fi, gi)]);
            }
        }
        messages
    }
}

#[cfg(test)]
mod test_fgraph {
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

    #[test]
    fn a_single_factor_sends_its_own_projection() {
        let mut manager = Bdd::new();
        let f = clause(&mut manager, &[1, 2]);
        let mut graph = FactorGraph::new(&mut manager, &[f]);
        graph.converge(&mut manager);
        // Message into {2} is ∃1. (1 ∨ 2) == one.
        let q = manager.cube([2]);
        let incoming = graph.incoming_messages(&mut manager, q);
        assert_eq!(incoming.len(), 1);
        assert!(manager.is_one(incoming[0]));
    }

    #[test]
    fn convergence_is_a_fixpoint() {
        let mut manager = Bdd::new();
        let factors = [
            clause(&mut manager, &[1, 2]),
            clause(&mut manager, &[-2, 3]),
        ];
        let mut graph = FactorGraph::new(&mut manager, &[factors[0], factors[1]]);
        let first = graph.converge(&mut manager);
        assert!(first >= 1);
        // Converging again changes nothing and settles immediately.
        assert_eq!(graph.converge(&mut manager), 1);
    }

    #[test]
    fn the_candidate_over_approximates_the_exact_projection() {
        let mut manager = Bdd::new();
        // ∃ {1,2}. (1 ∨ 3) ∧ (-1 ∨ 4) ∧ (2 ∨ -4)
        let factors = [
            clause(&mut manager, &[1, 3]),
            clause(&mut manager, &[-1, 4]),
            clause(&mut manager, &[2, -4]),
        ];
        let mut graph = FactorGraph::new(&mut manager, &[factors[0], factors[1], factors[2]]);
        graph.converge(&mut manager);
        let free = manager.cube([3, 4]);
        let incoming = graph.incoming_messages(&mut manager, free);
        let candidate = manager.and_all(incoming);

        let conj = manager.and_all(factors.iter().copied());
        let quantified = manager.cube([1, 2]);
        let exact = manager.exists(conj, quantified);

        // exact implies candidate
        let not_candidate = manager.not(candidate);
        let gap = manager.and(exact, not_candidate);
        assert!(manager.is_zero(gap));
    }

    #[test]
    fn grouping_variables_coarsens_the_projection() {
        let mut manager = Bdd::new();
        let factors = [
            clause(&mut manager, &[1, 2]),
            clause(&mut manager, &[-1, 2]),
        ];
        let mut graph = FactorGraph::new(&mut manager, &[factors[0], factors[1]]);
        let both = manager.cube([1, 2]);
        graph.group_variables(&mut manager, both);
        graph.converge(&mut manager);
        let incoming = graph.incoming_messages(&mut manager, both);
        let candidate = manager.and_all(incoming);
        // With 1 and 2 in one group the messages carry the full functions,
        // so the candidate is exactly (1 ∨ 2) ∧ (¬1 ∨ 2) == 2.
        let expected = manager.mk_var(2);
        assert_eq!(candidate, expected);
    }
}
