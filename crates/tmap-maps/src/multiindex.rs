//! Multi-index sets: exponent tuples selecting tensor-product basis terms.
//!
//! A growable [`MultiIndexSet`] accumulates indices; [`MultiIndexSet::fix`]
//! materializes it into a [`FixedMultiIndexSet`] whose stable slot
//! enumeration defines the coefficient-vector layout of a map component.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use tmap_core::{Error, Result};

/// An ordered tuple of non-negative exponents identifying one
/// tensor-product basis term. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MultiIndex(Box<[usize]>);

impl MultiIndex {
    /// Build from an exponent tuple.
    pub fn new(exponents: impl Into<Vec<usize>>) -> Self {
        MultiIndex(exponents.into().into_boxed_slice())
    }

    /// Number of dimensions (tuple length).
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Total degree: sum of exponents.
    pub fn degree(&self) -> usize {
        self.0.iter().sum()
    }

    /// Exponents as a slice.
    pub fn exponents(&self) -> &[usize] {
        &self.0
    }
}

impl Index<usize> for MultiIndex {
    type Output = usize;

    fn index(&self, i: usize) -> &usize {
        &self.0[i]
    }
}

impl fmt::Display for MultiIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{e}")?;
        }
        write!(f, "]")
    }
}

/// A growable set of [`MultiIndex`] values of a common dimension.
///
/// Duplicates are forbidden. Supports insertion and union only; admissible
/// -neighbor expansion for adaptive schemes is out of scope. Must be
/// [`fix`](Self::fix)ed before it can back a map component.
#[derive(Debug, Clone)]
pub struct MultiIndexSet {
    dim: usize,
    indices: Vec<MultiIndex>,
    slots: HashMap<MultiIndex, usize>,
}

impl MultiIndexSet {
    /// Empty set of the given dimension.
    pub fn new(dim: usize) -> Self {
        MultiIndexSet { dim, indices: Vec::new(), slots: HashMap::new() }
    }

    /// Explicit enumeration from integer rows, one multi-index per row.
    ///
    /// All rows must share a length; duplicates are configuration errors.
    pub fn from_rows(rows: &[Vec<usize>]) -> Result<Self> {
        let dim = rows
            .first()
            .map(|r| r.len())
            .ok_or_else(|| Error::Config("multi-index set needs at least one row".into()))?;
        let mut set = MultiIndexSet::new(dim);
        for row in rows {
            set.insert(MultiIndex::new(row.clone()))?;
        }
        Ok(set)
    }

    /// All tuples of dimension `dim` with total degree `≤ max_order`.
    ///
    /// `limiter` is an optional per-dimension exponent cap: tuples with
    /// `exponent[i] > limiter[i]` in any dimension are excluded. Enumeration
    /// is deterministic and graded: degree 0, 1, ..., with the leading
    /// exponent descending within a degree, so `total_order(2, 2, None)`
    /// yields `[0,0],[1,0],[0,1],[2,0],[1,1],[0,2]` in that order.
    pub fn total_order(dim: usize, max_order: usize, limiter: Option<&[usize]>) -> Result<Self> {
        if dim == 0 {
            return Err(Error::Config("total-order set needs dimension >= 1".into()));
        }
        if let Some(caps) = limiter {
            if caps.len() != dim {
                return Err(Error::Config(format!(
                    "limiter length {} does not match dimension {}",
                    caps.len(),
                    dim
                )));
            }
        }
        let mut set = MultiIndexSet::new(dim);
        let mut tuple = vec![0usize; dim];
        for degree in 0..=max_order {
            enumerate_degree(&mut set, &mut tuple, 0, degree, limiter)?;
        }
        Ok(set)
    }

    /// Shared dimension of contained indices.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of indices currently held.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether the set holds no indices.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Insert one multi-index. Dimension mismatch and duplicates are
    /// configuration errors.
    pub fn insert(&mut self, index: MultiIndex) -> Result<()> {
        if index.dim() != self.dim {
            return Err(Error::Config(format!(
                "multi-index {} has dimension {}, set has dimension {}",
                index,
                index.dim(),
                self.dim
            )));
        }
        if self.slots.contains_key(&index) {
            return Err(Error::Config(format!("duplicate multi-index {index}")));
        }
        self.slots.insert(index.clone(), self.indices.len());
        self.indices.push(index);
        Ok(())
    }

    /// Insert every index of `other` not already present.
    pub fn union(&mut self, other: &MultiIndexSet) -> Result<()> {
        if other.dim != self.dim {
            return Err(Error::Config(format!(
                "cannot union sets of dimension {} and {}",
                self.dim, other.dim
            )));
        }
        for idx in &other.indices {
            if !self.slots.contains_key(idx) {
                self.insert(idx.clone())?;
            }
        }
        Ok(())
    }

    /// Materialize into an order-stable enumeration.
    ///
    /// Fails on an empty set or zero dimension: neither can define a
    /// coefficient layout.
    pub fn fix(self) -> Result<FixedMultiIndexSet> {
        if self.dim == 0 {
            return Err(Error::Config("cannot fix a zero-dimensional multi-index set".into()));
        }
        if self.indices.is_empty() {
            return Err(Error::Config("cannot fix an empty multi-index set".into()));
        }
        let mut max_degrees = vec![0usize; self.dim];
        for idx in &self.indices {
            for (i, &e) in idx.exponents().iter().enumerate() {
                max_degrees[i] = max_degrees[i].max(e);
            }
        }
        Ok(FixedMultiIndexSet {
            dim: self.dim,
            indices: self.indices,
            slots: self.slots,
            max_degrees,
        })
    }
}

/// Recursive graded enumeration: place exponents summing to exactly
/// `remaining` into `tuple[pos..]`, leading exponent descending.
fn enumerate_degree(
    set: &mut MultiIndexSet,
    tuple: &mut Vec<usize>,
    pos: usize,
    remaining: usize,
    limiter: Option<&[usize]>,
) -> Result<()> {
    let cap = |i: usize| limiter.map_or(usize::MAX, |caps| caps[i]);
    if pos == tuple.len() - 1 {
        if remaining <= cap(pos) {
            tuple[pos] = remaining;
            set.insert(MultiIndex::new(tuple.clone()))?;
        }
        return Ok(());
    }
    for e in (0..=remaining.min(cap(pos))).rev() {
        tuple[pos] = e;
        enumerate_degree(set, tuple, pos + 1, remaining - e, limiter)?;
    }
    tuple[pos] = 0;
    Ok(())
}

/// An immutable, order-stable multi-index enumeration.
///
/// Slot `i` of the coefficient vector of the owning component corresponds to
/// `set[i]`; the slot map is explicit so gradient assembly and serialization
/// never depend on implicit ordering.
#[derive(Debug, Clone)]
pub struct FixedMultiIndexSet {
    dim: usize,
    indices: Vec<MultiIndex>,
    slots: HashMap<MultiIndex, usize>,
    max_degrees: Vec<usize>,
}

impl FixedMultiIndexSet {
    /// Total-order set of the given dimension and order, already fixed.
    pub fn total_order(dim: usize, max_order: usize) -> Result<Self> {
        MultiIndexSet::total_order(dim, max_order, None)?.fix()
    }

    /// Number of indices (= number of coefficients of a bound component).
    pub fn size(&self) -> usize {
        self.indices.len()
    }

    /// Shared dimension of contained indices.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Stable slot of `index`, if present.
    pub fn slot_of(&self, index: &MultiIndex) -> Option<usize> {
        self.slots.get(index).copied()
    }

    /// Largest exponent appearing in dimension `i`. Sizes basis tables.
    pub fn max_degree(&self, i: usize) -> usize {
        self.max_degrees[i]
    }

    /// Iterate indices in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &MultiIndex> {
        self.indices.iter()
    }
}

impl Index<usize> for FixedMultiIndexSet {
    type Output = MultiIndex;

    fn index(&self, i: usize) -> &MultiIndex {
        &self.indices[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exps(set: &FixedMultiIndexSet) -> Vec<Vec<usize>> {
        set.iter().map(|m| m.exponents().to_vec()).collect()
    }

    #[test]
    fn test_total_order_dim2_order2() {
        let set = FixedMultiIndexSet::total_order(2, 2).unwrap();
        assert_eq!(set.size(), 6);
        assert_eq!(
            exps(&set),
            vec![
                vec![0, 0],
                vec![1, 0],
                vec![0, 1],
                vec![2, 0],
                vec![1, 1],
                vec![0, 2]
            ]
        );
    }

    #[test]
    fn test_total_order_zero_keeps_constant() {
        let set = FixedMultiIndexSet::total_order(3, 0).unwrap();
        assert_eq!(set.size(), 1);
        assert_eq!(set[0].exponents(), &[0, 0, 0]);
    }

    #[test]
    fn test_total_order_with_limiter() {
        // Cap dimension 0 at exponent 1: [2,0] drops out.
        let set = MultiIndexSet::total_order(2, 2, Some(&[1, 2])).unwrap().fix().unwrap();
        assert_eq!(
            exps(&set),
            vec![vec![0, 0], vec![1, 0], vec![0, 1], vec![1, 1], vec![0, 2]]
        );
    }

    #[test]
    fn test_slots_are_stable() {
        let set = FixedMultiIndexSet::total_order(2, 2).unwrap();
        for i in 0..set.size() {
            assert_eq!(set.slot_of(&set[i]), Some(i));
        }
        assert_eq!(set.slot_of(&MultiIndex::new(vec![3, 3])), None);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut set = MultiIndexSet::new(2);
        set.insert(MultiIndex::new(vec![1, 0])).unwrap();
        let err = set.insert(MultiIndex::new(vec![1, 0])).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut set = MultiIndexSet::new(2);
        assert!(set.insert(MultiIndex::new(vec![1])).is_err());
        assert!(MultiIndexSet::from_rows(&[vec![0, 0], vec![1]]).is_err());
    }

    #[test]
    fn test_fix_empty_rejected() {
        assert!(MultiIndexSet::new(2).fix().is_err());
    }

    #[test]
    fn test_union() {
        let mut a = MultiIndexSet::from_rows(&[vec![0, 0], vec![1, 0]]).unwrap();
        let b = MultiIndexSet::from_rows(&[vec![1, 0], vec![0, 1]]).unwrap();
        a.union(&b).unwrap();
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_max_degrees() {
        let set =
            MultiIndexSet::from_rows(&[vec![0, 3], vec![2, 1], vec![1, 0]]).unwrap().fix().unwrap();
        assert_eq!(set.max_degree(0), 2);
        assert_eq!(set.max_degree(1), 3);
    }
}
