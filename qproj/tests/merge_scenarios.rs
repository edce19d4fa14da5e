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

//! End-to-end clustering scenarios exercised against the real manager.

use fxhash::FxHashSet;
use qproj::{clause_to_bdd, merge, Bdd, MergeHints, Ref};

fn clause(manager: &mut Bdd, literals: &[i32]) -> Ref {
    clause_to_bdd(manager, &literals.to_vec())
}

fn vars(manager: &mut Bdd, indices: &[u32]) -> Vec<Ref> {
    indices.iter().map(|&i| manager.mk_var(i)).collect()
}

fn cube_union_of(manager: &mut Bdd, cubes: &[Ref]) -> Vec<u32> {
    let mut acc = manager.one;
    for &c in cubes {
        acc = manager.cube_union(acc, c);
    }
    manager.cube_vars(acc)
}

#[test]
fn two_touching_clauses_clump_and_the_isolated_one_stays() {
    let mut manager = Bdd::new();
    let f1 = clause(&mut manager, &[1, 2]); // a ∨ b
    let f2 = clause(&mut manager, &[2, 3]); // b ∨ c
    let f3 = clause(&mut manager, &[4, 5]); // d ∨ e
    let variables = vars(&mut manager, &[1, 2, 3, 4, 5]);
    let results = merge(
        &mut manager,
        &[f1, f2, f3],
        &variables,
        3,
        &MergeHints::new(),
        &FxHashSet::default(),
    );

    let f12 = manager.and(f1, f2);
    assert_eq!(results.factors.len(), 2);
    assert!(results.factors.contains(&f12));
    assert!(results.factors.contains(&f3));

    // The variables clump along the factor structure: {a,b,c} and {d,e}.
    // Their union is exactly the input variables.
    let abc = manager.cube([1, 2, 3]);
    let de = manager.cube([4, 5]);
    assert_eq!(results.variables, vec![de, abc]);
    assert_eq!(
        cube_union_of(&mut manager, &results.variables),
        vec![1, 2, 3, 4, 5]
    );
}

#[test]
fn a_bound_of_one_returns_the_inputs_untouched() {
    let mut manager = Bdd::new();
    let f1 = clause(&mut manager, &[1, 2]);
    let f2 = clause(&mut manager, &[3, 4]);
    let variables = vars(&mut manager, &[1, 2, 3, 4]);
    let results = merge(
        &mut manager,
        &[f1, f2],
        &variables,
        1,
        &MergeHints::new(),
        &FxHashSet::default(),
    );
    assert_eq!(results.factors, vec![f1, f2]);
    assert_eq!(results.variables, variables);
}

#[test]
fn triplicated_factors_come_back_as_one() {
    let mut manager = Bdd::new();
    let a = clause(&mut manager, &[1]);
    let variables = vars(&mut manager, &[1]);
    let results = merge(
        &mut manager,
        &[a, a, a],
        &variables,
        5,
        &MergeHints::new(),
        &FxHashSet::default(),
    );
    assert_eq!(results.factors, vec![a]);
    assert_eq!(results.variables, vec![a]);
}

#[test]
fn a_hint_pulls_a_disconnected_chain_into_a_single_factor() {
    let mut manager = Bdd::new();
    let f1 = clause(&mut manager, &[1, 2]); // a ∨ b
    let f2 = clause(&mut manager, &[2, 3]); // b ∨ c
    let f3 = clause(&mut manager, &[3, 4]); // c ∨ d
    let variables = vars(&mut manager, &[1, 2, 3, 4]);
    let quantified: FxHashSet<Ref> = [variables[0]].into_iter().collect();
    let mut hints = MergeHints::new();
    // The endpoints of the chain share no support, so no direct candidate
    // exists for them; the weight still reaches the merged middle because
    // contraction retargets it.
    hints.add_weight(f1, f3, 100.0);

    let results = merge(&mut manager, &[f1, f2, f3], &variables, 4, &hints, &quantified);

    assert_eq!(results.factors.len(), 1);
    let f12 = manager.and(f1, f2);
    let chain = manager.and(f12, f3);
    assert_eq!(results.factors[0], chain);

    // The quantified variable stays alone, the free ones clump.
    let bcd = manager.cube([2, 3, 4]);
    assert_eq!(results.variables, vec![variables[0], bcd]);
}

#[test]
fn variable_merges_respect_the_quantification_classes() {
    let mut manager = Bdd::new();
    let variables = vars(&mut manager, &[1, 2, 3]);
    let quantified: FxHashSet<Ref> = [variables[0], variables[1]].into_iter().collect();
    let results = merge(
        &mut manager,
        &[],
        &variables,
        3,
        &MergeHints::new(),
        &quantified,
    );
    let ab = manager.and(variables[0], variables[1]);
    assert_eq!(results.variables, vec![variables[2], ab]);
}

#[test]
fn clustered_factors_never_exceed_the_support_bound() {
    let mut manager = Bdd::new();
    let factors = [
        clause(&mut manager, &[1, 2]),
        clause(&mut manager, &[2, 3]),
        clause(&mut manager, &[3, 4]),
        clause(&mut manager, &[4, 5]),
        clause(&mut manager, &[5, 6]),
        clause(&mut manager, &[6, 1]),
    ];
    let variables = vars(&mut manager, &[1, 2, 3, 4, 5, 6]);
    for bound in [2, 3, 4, 5] {
        let results = merge(
            &mut manager,
            &factors,
            &variables,
            bound,
            &MergeHints::new(),
            &FxHashSet::default(),
        );
        for &f in &results.factors {
            let support = manager.support(f);
            assert!(manager.cube_size(support) <= bound);
        }
        // Clustering never changes the conjunction of the factors...
        let before = manager.and_all(factors.iter().copied());
        let after = manager.and_all(results.factors.iter().copied());
        assert_eq!(before, after);
        // ...nor the union of the variables.
        assert_eq!(
            cube_union_of(&mut manager, &results.variables),
            vec![1, 2, 3, 4, 5, 6]
        );
    }
}
