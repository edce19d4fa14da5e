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

//! The projection pipeline and its refinement loop.
//!
//! The driver owns the manager, the compiled instance, and the learned
//! merge hints. It produces an over-approximate projection candidate by
//! factor-graph message passing, and registers itself as the callback of
//! the MUS enumerator: every minimal unsatisfiable subset the enumerator
//! reports is a counterexample certificate, and whenever the current
//! candidate fails to exclude one, the driver bumps the pairwise hints of
//! the clauses involved, re-runs the merge with the accumulated hints, and
//! rebuilds the factor graph from the tighter clustering.

use std::collections::{BTreeMap, BTreeSet};

use fxhash::FxHashSet;
use log::{debug, info};

use crate::common::{literal_var, AssignmentSet, Clause, Literal};
use crate::dd::{Bdd, Ref};
use crate::fgraph::FactorGraph;
use crate::merge::{merge, MergeHints};
use crate::mus::{Master, MucCallback};
use crate::qdimacs::{Qdimacs, QdimacsToBdd, QuantifierKind};

/// Instances the pipeline cannot process. Both are prefix-shape
/// violations: the projection problem is ∃X.F with a single existential
/// block.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("expected exactly one quantifier block, found {0}")]
    QuantifierCount(usize),
    #[error("expected the quantifier block to be existential")]
    UniversalQuantifier,
}

/// What the driver remembers about a registered clause: the free-variable
/// handles, the diagram of the full clause, and the assignment that
/// falsifies its free literals.
#[derive(Debug)]
struct ClauseData {
    var_nodes: Vec<Ref>,
    func_node: Ref,
    literal_assignments: AssignmentSet,
}

/// Tuning knobs of the pipeline, defaulted like the command line.
#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// Upper bound on the support size of any clustered node.
    pub largest_support_set: usize,
    /// Weight added to a pair of hints for every reported counterexample.
    pub muc_merge_weight: f64,
    /// Counterexample certificates larger than this are not reported.
    pub max_muc_size: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            largest_support_set: 50,
            muc_merge_weight: 0.5,
            max_muc_size: 10,
        }
    }
}

#[derive(Debug)]
pub struct ProjectionDriver {
    manager: Bdd,
    qdimacs: Qdimacs,
    bdds: QdimacsToBdd,
    /// The quantified variables as singleton cubes.
    quantified_variables: FxHashSet<Ref>,
    quantified_cube: Ref,
    /// Cube of every variable of the instance outside the quantifier
    /// block.
    free_cube: Ref,
    factors: Vec<Ref>,
    variables: Vec<Ref>,
    hints: MergeHints,
    config: DriverConfig,
    candidate: Ref,
    clause_data: BTreeMap<BTreeSet<Literal>, ClauseData>,
    refinements: usize,
}

impl ProjectionDriver {
    /// Compile the instance, check the prefix shape, and converge the
    /// initial (unclustered) factor graph into the first candidate.
    pub fn new(qdimacs: Qdimacs, config: DriverConfig) -> Result<Self, Error> {
        let mut manager = Bdd::new();
        let bdds = QdimacsToBdd::compile(&mut manager, &qdimacs);
        if bdds.quantifiers.len() != 1 {
            return Err(Error::QuantifierCount(bdds.quantifiers.len()));
        }
        if bdds.quantifiers[0].kind != QuantifierKind::Exists {
            return Err(Error::UniversalQuantifier);
        }
        let quantified_cube = bdds.quantifiers[0].cube;
        let quantified_variables: FxHashSet<Ref> = manager
            .cube_vars(quantified_cube)
            .into_iter()
            .map(|v| manager.mk_var(v))
            .collect();

        let mut factors = vec![];
        let mut all_vars = manager.one;
        for &f in bdds.clauses.values() {
            factors.push(f);
            let support = manager.support(f);
            all_vars = manager.cube_union(all_vars, support);
        }
        let variables: Vec<Ref> = manager
            .cube_vars(all_vars)
            .into_iter()
            .map(|v| manager.mk_var(v))
            .collect();

        let every_var = manager.cube(1..=qdimacs.num_variables as u32);
        let free_cube = manager.cube_diff(every_var, quantified_cube);

        let mut driver = Self {
            candidate: manager.one,
            manager,
            qdimacs,
            bdds,
            quantified_variables,
            quantified_cube,
            free_cube,
            factors,
            variables,
            hints: MergeHints::new(),
            config,
            clause_data: BTreeMap::new(),
            refinements: 0,
        };
        let initial_factors = driver.factors.clone();
        driver.candidate = driver.run_factor_graph(&initial_factors, &[]);
        Ok(driver)
    }

    pub fn candidate(&self) -> Ref {
        self.candidate
    }

    /// How often a counterexample forced a re-clustering.
    pub fn refinements(&self) -> usize {
        self.refinements
    }

    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn manager_mut(&mut self) -> &mut Bdd {
        &mut self.manager
    }

    /// The exact projection, by brute conjunction and quantification.
    /// Diagnostic only; the whole point of the pipeline is to avoid this
    /// computation.
    pub fn exact_result(&mut self) -> Ref {
        let conj = {
            let clauses: Vec<Ref> = self.bdds.clauses.values().copied().collect();
            self.manager.and_all(clauses)
        };
        self.manager.exists(conj, self.quantified_cube)
    }

    /// Build a factor graph over `factors`, fuse the variable groups given
    /// by `groups`, converge, and conjoin the messages reaching the free
    /// variables.
    fn run_factor_graph(&mut self, factors: &[Ref], groups: &[Ref]) -> Ref {
        let mut graph = FactorGraph::new(&mut self.manager, factors);
        for &cube in groups {
            graph.group_variables(&mut self.manager, cube);
        }
        let iterations = graph.converge(&mut self.manager);
        info!("factor graph of {} factors converged after {iterations} iterations", factors.len());
        let messages = graph.incoming_messages(&mut self.manager, self.free_cube);
        self.manager.and_all(messages)
    }

    /// Set up the MUS enumerator over the quantified skeletons of the
    /// clauses, registering the matching [`ClauseData`] along the way.
    ///
    /// Clauses with no quantified literal cannot participate in a
    /// counterexample and are skipped. Clauses whose quantified skeletons
    /// collide are disambiguated with a fresh selector variable (plus the
    /// unit clause forcing it off) so the enumerator sees them as distinct
    /// constraints.
    pub fn build_master(&mut self) -> Master {
        let quantified: FxHashSet<u32> = self.qdimacs.quantifiers[0]
            .variables
            .iter()
            .copied()
            .collect();
        let mut num_must_variables = self.qdimacs.num_variables as u32;
        let mut output_clauses: Vec<Clause> = vec![];
        let mut output_clause_set: BTreeSet<BTreeSet<Literal>> = BTreeSet::new();
        let mut literal_positions: BTreeMap<Literal, BTreeSet<usize>> = BTreeMap::new();

        let clauses = self.qdimacs.clauses.clone();
        for clause in &clauses {
            let (quantified_literals, free_literals): (BTreeSet<Literal>, BTreeSet<Literal>) =
                clause
                    .iter()
                    .copied()
                    .partition(|&lit| quantified.contains(&literal_var(lit)));
            if quantified_literals.is_empty() {
                continue;
            }

            let output_pos = output_clauses.len();
            let registered_key = if output_clause_set.insert(quantified_literals.clone()) {
                output_clauses.push(quantified_literals.iter().copied().collect());
                quantified_literals
            } else {
                num_must_variables += 1;
                let fake = num_must_variables as Literal;
                let mut extended = quantified_literals;
                extended.insert(fake);
                output_clauses.push(extended.iter().copied().collect());
                output_clauses.push(vec![-fake]);
                extended
            };
            for &lit in &free_literals {
                literal_positions.entry(lit).or_default().insert(output_pos);
            }

            let full_key: BTreeSet<Literal> = clause.iter().copied().collect();
            let func_node = self
                .bdds
                .clause_bdd(&full_key)
                .expect("clause missing from the compiled instance");
            let mut var_nodes = vec![];
            let mut literal_assignments = AssignmentSet::new();
            for &lit in &free_literals {
                let v = literal_var(lit);
                var_nodes.push(self.manager.mk_var(v));
                literal_assignments.insert((v, lit < 0));
            }
            self.clause_data.insert(
                registered_key,
                ClauseData { var_nodes, func_node, literal_assignments },
            );
        }

        let mut master = Master::new(num_must_variables as usize, output_clauses);
        master.max_muc_size = Some(self.config.max_muc_size);

        // Two skeletons whose originals carry a free variable with
        // opposite signs can never be falsified by one assignment; keep
        // the enumerator away from such pairs.
        let mut inconsistent: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (&lit, positions) in &literal_positions {
            if lit < 0 {
                continue;
            }
            let Some(opposite) = literal_positions.get(&-lit) else {
                continue;
            };
            for &cid in positions {
                for &opp in opposite {
                    let pair = (cid.min(opp), cid.max(opp));
                    if pair.0 == pair.1 || !inconsistent.insert(pair) {
                        continue;
                    }
                    debug!("marking clauses {} and {} inconsistent on variable {lit}", pair.0, pair.1);
                    master.explorer.mark_inconsistent_pair(pair.0, pair.1);
                }
            }
        }
        master
    }
}

/// Raise the hint of every ordered pair of distinct handles.
fn bump_all_pairs(hints: &mut MergeHints, nodes: &[Ref], weight: f64) {
    for &a in nodes {
        for &b in nodes {
            if a != b {
                hints.add_weight(a, b, weight);
            }
        }
    }
}

impl MucCallback for ProjectionDriver {
    fn process_muc(&mut self, muc: &[Clause]) {
        debug!("callback received a muc of {} clauses", muc.len());
        let mut var_nodes: BTreeSet<Ref> = BTreeSet::new();
        let mut func_nodes: Vec<Ref> = vec![];
        let mut assignment = AssignmentSet::new();
        for clause in muc {
            let key: BTreeSet<Literal> = clause.iter().copied().collect();
            let Some(data) = self.clause_data.get(&key) else {
                continue;
            };
            var_nodes.extend(data.var_nodes.iter().copied());
            func_nodes.push(data.func_node);
            assignment.extend(data.literal_assignments.iter().copied());
        }

        let mut assigned = self.candidate;
        for &(var, value) in &assignment {
            debug!("assigning {value} to variable {var}");
            assigned = self.manager.restrict(assigned, var, value);
        }
        if self.manager.is_zero(assigned) {
            info!("counterexample is already excluded by the candidate");
            return;
        }

        info!(
            "counterexample satisfies the candidate; bumping {} factor and {} variable hints",
            func_nodes.len(),
            var_nodes.len()
        );
        let var_nodes: Vec<Ref> = var_nodes.into_iter().collect();
        bump_all_pairs(&mut self.hints, &func_nodes, self.config.muc_merge_weight);
        bump_all_pairs(&mut self.hints, &var_nodes, self.config.muc_merge_weight);

        let results = merge(
            &mut self.manager,
            &self.factors,
            &self.variables,
            self.config.largest_support_set,
            &self.hints,
            &self.quantified_variables,
        );
        info!(
            "re-merged into {} factors and {} variable groups",
            results.factors.len(),
            results.variables.len()
        );
        self.candidate = self.run_factor_graph(&results.factors, &results.variables);
        self.refinements += 1;
    }
}
