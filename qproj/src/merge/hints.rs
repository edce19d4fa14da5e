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

//! Learned pairwise merge preferences.

use std::collections::BTreeMap;

use fxhash::FxHashMap;

use crate::dd::Ref;

/// A symmetric weighted relation over pairs of decision diagrams.
///
/// Pairs are stored with the smaller handle first; the weight of an absent
/// pair is 0 and the weight of `{f, f}` is 0 by definition. Weights bias
/// the compatibility score of the merge engine, and survive contractions
/// through [`MergeHints::merge`] which retargets the pairs of contracted
/// handles onto their replacement.
#[derive(Debug, Clone, Default)]
pub struct MergeHints {
    weights: FxHashMap<(Ref, Ref), f64>,
}

fn ordered(f1: Ref, f2: Ref) -> (Ref, Ref) {
    if f2 < f1 {
        (f2, f1)
    } else {
        (f1, f2)
    }
}

impl MergeHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a weight for the pair `{f1, f2}`.
    ///
    /// The first weight ever written for a pair wins; later calls for the
    /// same pair are ignored. A pair of equal handles is never stored.
    pub fn add_weight(&mut self, f1: Ref, f2: Ref, weight: f64) {
        if f1 == f2 {
            return;
        }
        self.weights.entry(ordered(f1, f2)).or_insert(weight);
    }

    /// The stored weight of `{f1, f2}`, 0 when absent.
    pub fn get_weight(&self, f1: Ref, f2: Ref) -> f64 {
        if f1 == f2 {
            return 0.0;
        }
        self.weights.get(&ordered(f1, f2)).copied().unwrap_or(0.0)
    }

    /// Rewrite the relation after `old1` and `old2` were contracted into
    /// `new`.
    ///
    /// Every pair `{old1, x}` or `{old2, x}` is removed and re-added as
    /// `{new, x}`; when both contracted handles were paired with the same
    /// `x`, the larger of the two weights is kept. The pair
    /// `{old1, old2}` itself is deleted without leaving a self-loop.
    pub fn merge(&mut self, old1: Ref, old2: Ref, new: Ref) {
        if old1 == old2 {
            return;
        }
        let (old1, old2) = ordered(old1, old2);

        let mut retargeted: BTreeMap<Ref, f64> = BTreeMap::new();
        let mut stale: Vec<(Ref, Ref)> = vec![];
        for (&(g1, g2), &w) in &self.weights {
            if g1 == old1 && g2 == old2 {
                stale.push((g1, g2));
            } else if g1 == old1 || g1 == old2 {
                stale.push((g1, g2));
                let slot = retargeted.entry(g2).or_insert(w);
                *slot = slot.max(w);
            } else if g2 == old1 || g2 == old2 {
                stale.push((g1, g2));
                let slot = retargeted.entry(g1).or_insert(w);
                *slot = slot.max(w);
            }
        }
        for key in stale {
            self.weights.remove(&key);
        }
        for (other, w) in retargeted {
            self.add_weight(other, new, w);
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[cfg(test)]
mod test_hints {
    use super::*;

    fn r(i: u32) -> Ref {
        Ref::new(i)
    }

    #[test]
    fn weights_are_symmetric() {
        let mut hints = MergeHints::new();
        hints.add_weight(r(5), r(3), 1.5);
        assert_eq!(hints.get_weight(r(3), r(5)), 1.5);
        assert_eq!(hints.get_weight(r(5), r(3)), 1.5);
    }

    #[test]
    fn the_weight_of_a_pair_with_itself_is_zero() {
        let mut hints = MergeHints::new();
        hints.add_weight(r(4), r(4), 9.0);
        assert_eq!(hints.get_weight(r(4), r(4)), 0.0);
        assert!(hints.is_empty());
    }

    #[test]
    fn missing_pairs_default_to_zero() {
        let hints = MergeHints::new();
        assert_eq!(hints.get_weight(r(1), r(2)), 0.0);
    }

    #[test]
    fn the_first_inserted_weight_wins() {
        let mut hints = MergeHints::new();
        hints.add_weight(r(1), r(2), 1.0);
        hints.add_weight(r(2), r(1), 7.0);
        assert_eq!(hints.get_weight(r(1), r(2)), 1.0);
    }

    #[test]
    fn merge_retargets_pairs_onto_the_replacement() {
        let mut hints = MergeHints::new();
        hints.add_weight(r(1), r(3), 2.0);
        hints.add_weight(r(2), r(3), 5.0);
        hints.add_weight(r(1), r(2), 9.0);
        hints.merge(r(1), r(2), r(10));
        // {1,2} is gone, no self loop was created.
        assert_eq!(hints.get_weight(r(10), r(10)), 0.0);
        // Both {1,3} and {2,3} moved to {10,3}, combined by max.
        assert_eq!(hints.get_weight(r(10), r(3)), 5.0);
        // The contracted handles carry no weight any more.
        assert_eq!(hints.get_weight(r(1), r(3)), 0.0);
        assert_eq!(hints.get_weight(r(2), r(3)), 0.0);
        assert_eq!(hints.len(), 1);
    }

    #[test]
    fn merge_does_not_overwrite_a_preexisting_pair_of_the_replacement() {
        let mut hints = MergeHints::new();
        hints.add_weight(r(1), r(3), 8.0);
        hints.add_weight(r(10), r(3), 0.5);
        hints.merge(r(1), r(2), r(10));
        // add_weight keeps the first weight written, so the retargeted 8.0
        // is dropped in favour of the existing 0.5.
        assert_eq!(hints.get_weight(r(10), r(3)), 0.5);
    }

    #[test]
    fn merge_with_a_contracted_endpoint_equal_to_the_replacement() {
        let mut hints = MergeHints::new();
        hints.add_weight(r(1), r(3), 4.0);
        hints.merge(r(1), r(2), r(3));
        // {1,3} retargets to {3,3} which is never stored.
        assert_eq!(hints.get_weight(r(3), r(3)), 0.0);
        assert!(hints.is_empty());
    }
}
