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

//! A small DPLL SAT solver.
//!
//! Just enough solver for the enumerator sitting on top: unit propagation,
//! deterministic lowest-index branching, and a positive polarity bias so
//! that returned models are large — the enumerator reads models as clause
//! subsets and wants maximal seeds. No watched literals, no clause
//! learning; the instances here are tiny.

use crate::common::Clause;

pub struct Solver {
    num_vars: usize,
    clauses: Vec<Clause>,
}

impl Solver {
    pub fn new(num_vars: usize) -> Self {
        Self { num_vars, clauses: vec![] }
    }

    pub fn add_clause(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// A model as a 1-indexed vector (slot 0 is unused), or `None` when
    /// unsatisfiable. Variables the search never had to fix come out
    /// `true`.
    pub fn solve(&self) -> Option<Vec<bool>> {
        let mut assignment: Vec<Option<bool>> = vec![None; self.num_vars + 1];
        if Self::search(&self.clauses, &mut assignment) {
            Some(assignment.iter().map(|v| v.unwrap_or(true)).collect())
        } else {
            None
        }
    }

    fn search(clauses: &[Clause], assignment: &mut Vec<Option<bool>>) -> bool {
        // Unit propagation to saturation.
        loop {
            let mut unit = None;
            let mut all_satisfied = true;
            for clause in clauses {
                let mut satisfied = false;
                let mut open = vec![];
                for &lit in clause {
                    match assignment[lit.unsigned_abs() as usize] {
                        Some(value) if value == (lit > 0) => {
                            satisfied = true;
                            break;
                        }
                        Some(_) => {}
                        None => open.push(lit),
                    }
                }
                if satisfied {
                    continue;
                }
                all_satisfied = false;
                match open.len() {
                    0 => return false,
                    1 => {
                        unit = Some(open[0]);
                        break;
                    }
                    _ => {}
                }
            }
            if all_satisfied {
                return true;
            }
            match unit {
                Some(lit) => assignment[lit.unsigned_abs() as usize] = Some(lit > 0),
                None => break,
            }
        }

        let Some(var) = (1..assignment.len()).find(|&v| assignment[v].is_none()) else {
            return false;
        };
        for value in [true, false] {
            let mut trail = assignment.clone();
            trail[var] = Some(value);
            if Self::search(clauses, &mut trail) {
                *assignment = trail;
                return true;
            }
        }
        false
    }
}
