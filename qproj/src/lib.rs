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

//! # QPROJ
//! QPROJ computes over-approximations of quantified boolean projections
//! ∃X. F(X, Y), where F is a CNF formula over variables split into an
//! existentially quantified block X and free variables Y. The answer is a
//! boolean function over Y represented as a reduced ordered binary
//! decision diagram.
//!
//! Three engines cooperate:
//! 1. a factor graph propagating decision-diagram messages between
//!    factors and variable groups until fixpoint ([`FactorGraph`]),
//! 2. an enumerator of minimal unsatisfiable subsets whose findings act
//!    as counterexample certificates against the current answer
//!    ([`Master`]),
//! 3. an approximate-merge engine that greedily clusters factors and
//!    variables under a support-size bound, steered by pairwise weights
//!    learned from those counterexamples ([`merge()`], [`MergeHints`]).
//!
//! The [`ProjectionDriver`] ties them together: it produces a first
//! candidate from the unclustered factor graph, then lets the enumerator
//! drive a refinement loop in which every counterexample the candidate
//! fails to exclude tightens the next clustering.
//!
//! ## Quick example
//! ```
//! use qproj::{DriverConfig, ProjectionDriver, Qdimacs};
//!
//! // ∃1. (1 ∨ 3) ∧ (¬1 ∨ 4)
//! let instance = "p cnf 4 2\ne 1 0\n1 3 0\n-1 4 0\n";
//! let qdimacs = Qdimacs::parse(instance.as_bytes()).unwrap();
//! let config = DriverConfig { largest_support_set: 3, ..Default::default() };
//! let mut driver = ProjectionDriver::new(qdimacs, config).unwrap();
//!
//! // Refine the candidate against every counterexample certificate.
//! let mut master = driver.build_master();
//! master.enumerate(&mut driver);
//!
//! let candidate = driver.candidate();
//! let exact = driver.exact_result();
//! assert_eq!(candidate, exact);
//! ```

mod common;
mod dd;
mod driver;
mod fgraph;
mod merge;
mod mus;
mod qdimacs;

pub use common::*;
pub use dd::{Bdd, Ref};
pub use driver::{DriverConfig, ProjectionDriver};
pub use fgraph::FactorGraph;
pub use merge::{merge, MergeHints, MergeResults};
pub use mus::{sat::Solver, Master, MucCallback};
pub use qdimacs::{clause_to_bdd, Qdimacs, QdimacsToBdd, QuantifierKind};
