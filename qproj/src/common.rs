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

//! The shared vocabulary of the crate: DIMACS-style literals and clauses,
//! and the assignment sets the feedback loop substitutes into projection
//! candidates.

use std::collections::BTreeSet;

/// A DIMACS literal: variable index with a sign, never 0.
pub type Literal = i32;

/// A clause as a disjunction of literals.
pub type Clause = Vec<Literal>;

/// A set of `(variable, value)` pairs, iterated in ascending order.
pub type AssignmentSet = BTreeSet<(u32, bool)>;

/// The variable a literal ranges over.
pub fn literal_var(literal: Literal) -> u32 {
    literal.unsigned_abs()
}
