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

//! Enumeration of minimal unsatisfiable subsets.
//!
//! A seed-shrink enumerator: the [`Explorer`] keeps a SAT instance over
//! one selector variable per clause whose models are the clause subsets
//! not yet accounted for. Satisfiable seeds are blocked downward,
//! unsatisfiable seeds are shrunk by deletion to a minimal core, reported,
//! and blocked upward. Pairs of clauses marked inconsistent never appear
//! together in any seed.

pub mod sat;

use log::{debug, info};

use crate::common::Clause;
use crate::mus::sat::Solver;

/// Receiver of enumerated MUSes.
pub trait MucCallback {
    /// Invoked once per minimal unsatisfiable subset, with the clauses of
    /// the subset in their original literal form.
    fn process_muc(&mut self, muc: &[Clause]);
}

/// Bookkeeping of the still-unexplored clause subsets.
pub struct Explorer {
    map: Solver,
    num_clauses: usize,
}

impl Explorer {
    fn new(num_clauses: usize) -> Self {
        Self {
            map: Solver::new(num_clauses),
            num_clauses,
        }
    }

    /// Forbid any candidate subset containing both clauses.
    pub fn mark_inconsistent_pair(&mut self, c1: usize, c2: usize) {
        assert!(c1 < self.num_clauses && c2 < self.num_clauses);
        self.map.add_clause(vec![-Self::selector(c1), -Self::selector(c2)]);
    }

    /// Selector variable of clause `index` (selectors are 1-based).
    fn selector(index: usize) -> i32 {
        index as i32 + 1
    }

    /// A maximal unexplored subset, as clause indices.
    fn next_candidate(&self) -> Option<Vec<usize>> {
        let model = self.map.solve()?;
        Some((0..self.num_clauses).filter(|&i| model[i + 1]).collect())
    }

    /// Every subset of `subset` is accounted for.
    fn block_down(&mut self, subset: &[usize]) {
        let inside: Vec<bool> = {
            let mut inside = vec![false; self.num_clauses];
            for &i in subset {
                inside[i] = true;
            }
            inside
        };
        let clause: Clause = (0..self.num_clauses)
            .filter(|&i| !inside[i])
            .map(Self::selector)
            .collect();
        self.map.add_clause(clause);
    }

    /// Every superset of `mus` is accounted for.
    fn block_up(&mut self, mus: &[usize]) {
        let clause: Clause = mus.iter().map(|&i| -Self::selector(i)).collect();
        self.map.add_clause(clause);
    }
}

/// The MUS enumeration master.
pub struct Master {
    num_vars: usize,
    clauses: Vec<Clause>,
    /// Exposed so the caller can seed domain knowledge before
    /// enumeration, e.g. pairs of clauses that must not co-occur.
    pub explorer: Explorer,
    /// MUSes larger than this are still blocked but not reported.
    pub max_muc_size: Option<usize>,
}

impl Master {
    pub fn new(num_vars: usize, clauses: Vec<Clause>) -> Self {
        let explorer = Explorer::new(clauses.len());
        Self {
            num_vars,
            clauses,
            explorer,
            max_muc_size: None,
        }
    }

    fn is_satisfiable(&self, subset: &[usize]) -> bool {
        let mut solver = Solver::new(self.num_vars);
        for &i in subset {
            solver.add_clause(self.clauses[i].clone());
        }
        solver.solve().is_some()
    }

    /// Deletion-based shrink of an unsatisfiable subset to a minimal one.
    fn shrink(&self, mut seed: Vec<usize>) -> Vec<usize> {
        let mut i = 0;
        while i < seed.len() {
            let dropped = seed.remove(i);
            if self.is_satisfiable(&seed) {
                seed.insert(i, dropped);
                i += 1;
            }
        }
        seed
    }

    /// Enumerate every MUS, reporting each through the callback.
    pub fn enumerate(&mut self, callback: &mut dyn MucCallback) {
        let mut found = 0usize;
        while let Some(candidate) = self.explorer.next_candidate() {
            if self.is_satisfiable(&candidate) {
                debug!("satisfiable seed of {} clauses", candidate.len());
                self.explorer.block_down(&candidate);
                continue;
            }
            let mus = self.shrink(candidate);
            self.explorer.block_up(&mus);
            if self.max_muc_size.is_some_and(|bound| mus.len() > bound) {
                debug!("dropping an oversized mus of {} clauses", mus.len());
                continue;
            }
            found += 1;
            let muc: Vec<Clause> = mus.iter().map(|&i| self.clauses[i].clone()).collect();
            callback.process_muc(&muc);
        }
        info!("mus enumeration finished, {found} reported");
    }
}
