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

//! A hash-consed ROBDD manager.
//!
//! Nodes are stored in a single arena and shared through the unique table,
//! so a [`Ref`] compares equal to another exactly when both denote the same
//! canonical function. The manager is deliberately simple: no complement
//! edges, no garbage collection, no reordering. All operations take
//! `&mut self` because apply steps may intern new nodes.

use std::collections::BTreeSet;

use fxhash::{FxHashMap, FxHashSet};

use crate::dd::Ref;

/// Variable tag carried by the two terminal nodes. Larger than every real
/// variable index so that the terminals never participate in top-variable
/// selection.
const TERMINAL_VAR: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Node {
    var: u32,
    low: Ref,
    high: Ref,
}

/// The decision diagram manager.
///
/// Variables are identified by `u32` indices starting at 1 (DIMACS
/// convention) and ordered by index. A *cube* is a conjunction of positive
/// literals; cubes double as variable sets throughout the projection
/// engine.
#[derive(Debug)]
pub struct Bdd {
    nodes: Vec<Node>,
    unique: FxHashMap<(u32, Ref, Ref), Ref>,
    ite_cache: FxHashMap<(Ref, Ref, Ref), Ref>,
    support_cache: FxHashMap<Ref, Ref>,
    exists_cache: FxHashMap<(Ref, Ref), Ref>,
    restrict_cache: FxHashMap<(Ref, u32, bool), Ref>,
    /// The constant false function.
    pub zero: Ref,
    /// The constant true function.
    pub one: Ref,
}

impl Bdd {
    pub fn new() -> Self {
        let terminal = |_| Node {
            var: TERMINAL_VAR,
            low: Ref::new(0),
            high: Ref::new(0),
        };
        Self {
            nodes: (0..2u32).map(terminal).collect(),
            unique: FxHashMap::default(),
            ite_cache: FxHashMap::default(),
            support_cache: FxHashMap::default(),
            exists_cache: FxHashMap::default(),
            restrict_cache: FxHashMap::default(),
            zero: Ref::new(0),
            one: Ref::new(1),
        }
    }

    /// Number of nodes interned so far (terminals included).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn var(&self, f: Ref) -> u32 {
        self.nodes[f.index() as usize].var
    }

    fn low(&self, f: Ref) -> Ref {
        self.nodes[f.index() as usize].low
    }

    fn high(&self, f: Ref) -> Ref {
        self.nodes[f.index() as usize].high
    }

    pub fn is_zero(&self, f: Ref) -> bool {
        f == self.zero
    }

    pub fn is_one(&self, f: Ref) -> bool {
        f == self.one
    }

    pub fn is_terminal(&self, f: Ref) -> bool {
        self.is_zero(f) || self.is_one(f)
    }

    fn mk_node(&mut self, var: u32, low: Ref, high: Ref) -> Ref {
        if low == high {
            return low;
        }
        if let Some(&r) = self.unique.get(&(var, low, high)) {
            return r;
        }
        let r = Ref::new(self.nodes.len() as u32);
        self.nodes.push(Node { var, low, high });
        self.unique.insert((var, low, high), r);
        r
    }

    /// The function of a single variable.
    pub fn mk_var(&mut self, var: u32) -> Ref {
        assert!(
            var >= 1 && var < TERMINAL_VAR,
            "variable index must be a positive u32, got {var}"
        );
        self.mk_node(var, self.zero, self.one)
    }

    fn top_cofactors(&self, f: Ref, var: u32) -> (Ref, Ref) {
        if self.var(f) == var {
            (self.low(f), self.high(f))
        } else {
            (f, f)
        }
    }

    /// If-then-else: `(f ∧ g) ∨ (¬f ∧ h)`.
    pub fn ite(&mut self, f: Ref, g: Ref, h: Ref) -> Ref {
        if self.is_one(f) {
            return g;
        }
        if self.is_zero(f) {
            return h;
        }
        if g == h {
            return g;
        }
        if self.is_one(g) && self.is_zero(h) {
            return f;
        }
        if let Some(&r) = self.ite_cache.get(&(f, g, h)) {
            return r;
        }
        let m = self.var(f).min(self.var(g)).min(self.var(h));
        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);
        let low = self.ite(f0, g0, h0);
        let high = self.ite(f1, g1, h1);
        let res = self.mk_node(m, low, high);
        self.ite_cache.insert((f, g, h), res);
        res
    }

    pub fn and(&mut self, f: Ref, g: Ref) -> Ref {
        self.ite(f, g, self.zero)
    }

    pub fn or(&mut self, f: Ref, g: Ref) -> Ref {
        self.ite(f, self.one, g)
    }

    pub fn not(&mut self, f: Ref) -> Ref {
        self.ite(f, self.zero, self.one)
    }

    /// Conjunction of an arbitrary sequence of functions.
    pub fn and_all<I: IntoIterator<Item = Ref>>(&mut self, fs: I) -> Ref {
        let mut acc = self.one;
        for f in fs {
            acc = self.and(acc, f);
        }
        acc
    }

    /// The cube of the variables `f` depends on.
    pub fn support(&mut self, f: Ref) -> Ref {
        if let Some(&c) = self.support_cache.get(&f) {
            return c;
        }
        let mut vars = BTreeSet::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![f];
        while let Some(n) = stack.pop() {
            if self.is_terminal(n) || !seen.insert(n) {
                continue;
            }
            vars.insert(self.var(n));
            stack.push(self.low(n));
            stack.push(self.high(n));
        }
        let cube = self.cube(vars);
        self.support_cache.insert(f, cube);
        cube
    }

    /// The cube (conjunction of positive literals) over the given variables.
    pub fn cube<I: IntoIterator<Item = u32>>(&mut self, vars: I) -> Ref {
        let mut vs: Vec<u32> = vars.into_iter().collect();
        vs.sort_unstable();
        vs.dedup();
        let mut cube = self.one;
        for &v in vs.iter().rev() {
            cube = self.mk_node(v, self.zero, cube);
        }
        cube
    }

    /// The variables of a cube, in ascending index order.
    pub fn cube_vars(&self, cube: Ref) -> Vec<u32> {
        let mut vs = vec![];
        let mut c = cube;
        while !self.is_one(c) {
            debug_assert!(
                !self.is_terminal(c) && self.is_zero(self.low(c)),
                "cube_vars called on a non-cube"
            );
            vs.push(self.var(c));
            c = self.high(c);
        }
        vs
    }

    /// Number of variables in a cube.
    pub fn cube_size(&self, cube: Ref) -> usize {
        self.cube_vars(cube).len()
    }

    /// Cube of the variables occurring in both cubes.
    pub fn cube_intersection(&mut self, a: Ref, b: Ref) -> Ref {
        let bv: FxHashSet<u32> = self.cube_vars(b).into_iter().collect();
        let common: Vec<u32> = self
            .cube_vars(a)
            .into_iter()
            .filter(|v| bv.contains(v))
            .collect();
        self.cube(common)
    }

    /// Cube of the union of both variable sets.
    pub fn cube_union(&mut self, a: Ref, b: Ref) -> Ref {
        self.and(a, b)
    }

    /// Cube of the variables of `a` that do not occur in `b`.
    pub fn cube_diff(&mut self, a: Ref, b: Ref) -> Ref {
        let bv: FxHashSet<u32> = self.cube_vars(b).into_iter().collect();
        let rest: Vec<u32> = self
            .cube_vars(a)
            .into_iter()
            .filter(|v| !bv.contains(v))
            .collect();
        self.cube(rest)
    }

    /// The smallest-index variable of a cube, `None` for the empty cube.
    pub fn var_with_lowest_index(&self, cube: Ref) -> Option<u32> {
        if self.is_one(cube) {
            None
        } else {
            Some(self.var(cube))
        }
    }

    /// Cofactor of `f` with `var` fixed to `value`.
    pub fn restrict(&mut self, f: Ref, var: u32, value: bool) -> Ref {
        // Ordering: once the top variable exceeds `var`, `var` cannot occur
        // below. Terminals carry TERMINAL_VAR and are caught here as well.
        if self.var(f) > var {
            return f;
        }
        if let Some(&r) = self.restrict_cache.get(&(f, var, value)) {
            return r;
        }
        let res = if self.var(f) == var {
            if value {
                self.high(f)
            } else {
                self.low(f)
            }
        } else {
            let (l, h) = (self.low(f), self.high(f));
            let low = self.restrict(l, var, value);
            let high = self.restrict(h, var, value);
            self.mk_node(self.var(f), low, high)
        };
        self.restrict_cache.insert((f, var, value), res);
        res
    }

    /// Existential quantification of every variable in `cube`.
    pub fn exists(&mut self, f: Ref, cube: Ref) -> Ref {
        if self.is_terminal(f) || self.is_one(cube) {
            return f;
        }
        // Quantified variables above the top of f are vacuous.
        let mut cube = cube;
        while !self.is_one(cube) && self.var(cube) < self.var(f) {
            cube = self.high(cube);
        }
        if self.is_one(cube) {
            return f;
        }
        if let Some(&r) = self.exists_cache.get(&(f, cube)) {
            return r;
        }
        let fv = self.var(f);
        let (l, h) = (self.low(f), self.high(f));
        let res = if self.var(cube) == fv {
            let rest = self.high(cube);
            let lo = self.exists(l, rest);
            let hi = self.exists(h, rest);
            self.or(lo, hi)
        } else {
            let lo = self.exists(l, cube);
            let hi = self.exists(h, cube);
            self.mk_node(fv, lo, hi)
        };
        self.exists_cache.insert((f, cube), res);
        res
    }

    /// Evaluate `f` under a total assignment; unassigned variables read as
    /// false.
    pub fn eval(&self, f: Ref, assignment: &FxHashMap<u32, bool>) -> bool {
        let mut n = f;
        while !self.is_terminal(n) {
            let v = self.var(n);
            n = if assignment.get(&v).copied().unwrap_or(false) {
                self.high(n)
            } else {
                self.low(n)
            };
        }
        self.is_one(n)
    }
}

impl Default for Bdd {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test_manager {
    use super::*;

    #[test]
    fn terminals_are_distinct_and_fixed() {
        let bdd = Bdd::new();
        assert!(bdd.is_zero(bdd.zero));
        assert!(bdd.is_one(bdd.one));
        assert_ne!(bdd.zero, bdd.one);
    }

    #[test]
    fn hash_consing_makes_equal_functions_identical() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let a = bdd.and(x, y);
        let b = bdd.and(y, x);
        assert_eq!(a, b);
        let c = bdd.ite(x, y, bdd.zero);
        assert_eq!(a, c);
    }

    #[test]
    fn negation_is_an_involution() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.or(x, y);
        let nf = bdd.not(f);
        assert_ne!(f, nf);
        assert_eq!(f, bdd.not(nf));
    }

    #[test]
    fn support_of_a_conjunction_is_the_union_of_supports() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let z = bdd.mk_var(3);
        let f = bdd.and(x, z);
        let support = bdd.support(f);
        assert_eq!(bdd.cube_vars(support), vec![1, 3]);
    }

    #[test]
    fn support_of_a_variable_is_itself() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(4);
        assert_eq!(bdd.support(x), x);
    }

    #[test]
    fn cube_algebra_behaves_like_set_algebra() {
        let mut bdd = Bdd::new();
        let ab = bdd.cube([1, 2]);
        let bc = bdd.cube([2, 3]);
        let int = bdd.cube_intersection(ab, bc);
        assert_eq!(bdd.cube_vars(int), vec![2]);
        let uni = bdd.cube_union(ab, bc);
        assert_eq!(bdd.cube_vars(uni), vec![1, 2, 3]);
        let diff = bdd.cube_diff(ab, bc);
        assert_eq!(bdd.cube_vars(diff), vec![1]);
        assert_eq!(bdd.cube_size(uni), 3);
        let empty = bdd.cube([]);
        assert!(bdd.is_one(empty));
        assert_eq!(bdd.var_with_lowest_index(empty), None);
        assert_eq!(bdd.var_with_lowest_index(uni), Some(1));
    }

    #[test]
    fn restrict_fixes_a_single_variable() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.or(x, y);
        let top = bdd.restrict(f, 1, true);
        assert!(bdd.is_one(top));
        assert_eq!(bdd.restrict(f, 1, false), y);
        // A variable outside the support is a no-op.
        assert_eq!(bdd.restrict(f, 7, true), f);
    }

    #[test]
    fn exists_removes_the_quantified_variables_from_the_support() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let z = bdd.mk_var(3);
        let xy = bdd.and(x, y);
        let f = bdd.or(xy, z);
        let qx = bdd.cube([1]);
        let g = bdd.exists(f, qx);
        let support = bdd.support(g);
        assert_eq!(bdd.cube_vars(support), vec![2, 3]);
        // ∃x. (x ∧ y) ∨ z  ==  y ∨ z
        let yz = bdd.or(y, z);
        assert_eq!(g, yz);
    }

    #[test]
    fn exists_of_an_unsat_conjunction_is_zero() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let nx = bdd.not(x);
        let f = bdd.and(x, nx);
        assert!(bdd.is_zero(f));
        let q = bdd.cube([1]);
        let projected = bdd.exists(f, q);
        assert!(bdd.is_zero(projected));
    }

    #[test]
    fn eval_follows_the_assignment() {
        let mut bdd = Bdd::new();
        let x = bdd.mk_var(1);
        let y = bdd.mk_var(2);
        let f = bdd.and(x, y);
        let mut assignment = FxHashMap::default();
        assignment.insert(1, true);
        assignment.insert(2, true);
        assert!(bdd.eval(f, &assignment));
        assignment.insert(2, false);
        assert!(!bdd.eval(f, &assignment));
    }
}
