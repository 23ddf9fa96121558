//! Flat storage for the coefficients of a truncated polynomial map `R^N -> R^M`.
//!
//! Component `i` occupies one contiguous block of `C(N+D, D)` entries. Inside
//! the block the coefficients are grouped by homogeneous degree, and inside
//! each degree ordered by [`Multipointer::index`].

use crate::combinatorics::binomial_direct;
use crate::error::{ensure_dimension, ensure_index, JetError, Result};
use crate::multiindex::Multiindex;
use crate::multipointer::Multipointer;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Whether a container may change shape after construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapePolicy {
    #[default]
    Dynamic,
    /// Shape set at construction; resizing to another shape fails.
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ContainerRepr<O>")]
pub struct CnContainer<O> {
    image: usize,
    dimension: usize,
    degree: usize,
    policy: ShapePolicy,
    /// `offsets[d]` is the start of degree `d` inside a component block;
    /// `offsets[degree + 1]` is the block length.
    #[serde(skip)]
    offsets: Vec<usize>,
    data: Vec<O>,
}

#[derive(Deserialize)]
struct ContainerRepr<O> {
    image: usize,
    dimension: usize,
    degree: usize,
    #[serde(default)]
    policy: ShapePolicy,
    data: Vec<O>,
}

impl<O> TryFrom<ContainerRepr<O>> for CnContainer<O> {
    type Error = JetError;

    fn try_from(repr: ContainerRepr<O>) -> Result<Self> {
        let offsets = degree_offsets(repr.dimension, repr.degree)?;
        let expected = repr.image * offsets[repr.degree + 1];
        ensure_dimension("container data", expected, repr.data.len())?;
        Ok(Self {
            image: repr.image,
            dimension: repr.dimension,
            degree: repr.degree,
            policy: repr.policy,
            offsets,
            data: repr.data,
        })
    }
}

/// Start of every homogeneous degree inside one component block, plus the block length.
pub(crate) fn degree_offsets(dimension: usize, degree: usize) -> Result<Vec<usize>> {
    let mut offsets = Vec::with_capacity(degree + 2);
    offsets.push(0);
    for d in 1..=degree + 1 {
        offsets.push(binomial_direct(dimension + d - 1, dimension)?);
    }
    Ok(offsets)
}

/// Offset of `(j, c)` inside the degree two block of `n` variables, symmetric in `j` and `c`.
pub(crate) fn second_order_offset(n: usize, j: usize, c: usize) -> usize {
    let (j, c) = if j <= c { (j, c) } else { (c, j) };
    c + j * n - j * (j + 1) / 2
}

/// Offset of `(j, c, k)` inside the degree three block of `n` variables.
pub(crate) fn third_order_offset(n: usize, j: usize, c: usize, k: usize) -> Result<usize> {
    if j > c || c > k {
        return Err(JetError::UnorderedIndices(vec![j, c, k]));
    }
    ensure_index("variable", k, n)?;
    let (j, c, k, n) = (j as i64, c as i64, k as i64, n as i64);
    let offset = j * ((j - 1) * (j - 2) + 3 * n * (n - j + 2)) / 6
        + (j - c) * (c + j - 2 * n - 1) / 2
        + k
        - c;
    Ok(offset as usize)
}

impl<O: Clone> CnContainer<O> {
    /// Container of `image` components in `dimension` variables up to `degree`,
    /// every entry set to `value`.
    pub fn filled(image: usize, dimension: usize, degree: usize, value: O) -> Result<Self> {
        let offsets = degree_offsets(dimension, degree)?;
        let len = image
            .checked_mul(offsets[degree + 1])
            .ok_or_else(|| JetError::Overflow(format!("container size {image} x {}", offsets[degree + 1])))?;
        Ok(Self {
            image,
            dimension,
            degree,
            policy: ShapePolicy::Dynamic,
            offsets,
            data: vec![value; len],
        })
    }

    /// Changes the shape; all entries are reset to `value`.
    pub fn resize_with(&mut self, image: usize, dimension: usize, degree: usize, value: O) -> Result<()> {
        if self.policy == ShapePolicy::Fixed && !self.has_shape(image, dimension, degree) {
            return Err(JetError::ResizeForbidden {
                image: self.image,
                dimension: self.dimension,
                degree: self.degree,
            });
        }
        let policy = self.policy;
        *self = Self::filled(image, dimension, degree, value)?;
        self.policy = policy;
        Ok(())
    }

    pub fn fill(&mut self, value: O) {
        for entry in &mut self.data {
            *entry = value.clone();
        }
    }
}

impl<O: Clone + Default> CnContainer<O> {
    pub fn new(image: usize, dimension: usize, degree: usize) -> Result<Self> {
        Self::filled(image, dimension, degree, O::default())
    }

    /// Same as [`CnContainer::new`] but the shape can never change afterwards.
    pub fn fixed(image: usize, dimension: usize, degree: usize) -> Result<Self> {
        let mut container = Self::new(image, dimension, degree)?;
        container.policy = ShapePolicy::Fixed;
        Ok(container)
    }

    pub fn resize(&mut self, image: usize, dimension: usize, degree: usize) -> Result<()> {
        self.resize_with(image, dimension, degree, O::default())
    }
}

impl<O> CnContainer<O> {
    pub fn image_dimension(&self) -> usize {
        self.image
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn policy(&self) -> ShapePolicy {
        self.policy
    }

    pub fn has_shape(&self, image: usize, dimension: usize, degree: usize) -> bool {
        self.image == image && self.dimension == dimension && self.degree == degree
    }

    /// Number of coefficients per component, `C(N+D, D)`.
    pub fn block_len(&self) -> usize {
        self.offsets[self.degree + 1]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[O] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [O] {
        &mut self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, O> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, O> {
        self.data.iter_mut()
    }

    /// Flat offset of the first coefficient of degree `d` in component `i`.
    pub fn begin(&self, i: usize, d: usize) -> Result<usize> {
        ensure_index("component", i, self.image)?;
        self.ensure_degree(d)?;
        Ok(i * self.block_len() + self.offsets[d])
    }

    /// One past the last coefficient of degree `d` in component `i`.
    pub fn end(&self, i: usize, d: usize) -> Result<usize> {
        ensure_index("component", i, self.image)?;
        self.ensure_degree(d)?;
        Ok(i * self.block_len() + self.offsets[d + 1])
    }

    /// Flat range holding the homogeneous degree `d` part of component `i`.
    pub fn degree_range(&self, i: usize, d: usize) -> Result<Range<usize>> {
        Ok(self.begin(i, d)?..self.end(i, d)?)
    }

    pub fn component_range(&self, i: usize) -> Result<Range<usize>> {
        ensure_index("component", i, self.image)?;
        let start = i * self.block_len();
        Ok(start..start + self.block_len())
    }

    pub fn degree_slice(&self, i: usize, d: usize) -> Result<&[O]> {
        let range = self.degree_range(i, d)?;
        Ok(&self.data[range])
    }

    /// Starting multipointer for the degree `d` scan.
    pub fn first(&self, d: usize) -> Multipointer {
        Multipointer::first(d)
    }

    /// Advances `mp` in the same order as a linear scan of [`CnContainer::degree_range`].
    pub fn has_next(&self, mp: &mut Multipointer) -> bool {
        mp.has_next(self.dimension)
    }

    /// Every multipointer of degree `d`, in storage order.
    pub fn multipointers(&self, d: usize) -> Vec<Multipointer> {
        let mut result = Vec::new();
        let mut mp = self.first(d);
        loop {
            result.push(mp.clone());
            if !self.has_next(&mut mp) {
                break;
            }
        }
        result
    }

    /// Flat position of the coefficient of component `i` at `mp`.
    pub fn position(&self, i: usize, mp: &Multipointer) -> Result<usize> {
        let offset = mp.index(self.dimension, self.degree)?;
        Ok(self.begin(i, mp.module())? + offset)
    }

    pub fn position_of(&self, i: usize, mi: &Multiindex) -> Result<usize> {
        ensure_dimension("multiindex", self.dimension, mi.dimension())?;
        let offset = mi.index(self.degree)?;
        Ok(self.begin(i, mi.module())? + offset)
    }

    pub fn get(&self, i: usize, mp: &Multipointer) -> Result<&O> {
        let at = self.position(i, mp)?;
        Ok(&self.data[at])
    }

    pub fn get_mut(&mut self, i: usize, mp: &Multipointer) -> Result<&mut O> {
        let at = self.position(i, mp)?;
        Ok(&mut self.data[at])
    }

    pub fn get_mi(&self, i: usize, mi: &Multiindex) -> Result<&O> {
        let at = self.position_of(i, mi)?;
        Ok(&self.data[at])
    }

    pub fn get_mi_mut(&mut self, i: usize, mi: &Multiindex) -> Result<&mut O> {
        let at = self.position_of(i, mi)?;
        Ok(&mut self.data[at])
    }

    /// Constant term of component `i`.
    pub fn value(&self, i: usize) -> Result<&O> {
        let at = self.begin(i, 0)?;
        Ok(&self.data[at])
    }

    pub fn value_mut(&mut self, i: usize) -> Result<&mut O> {
        let at = self.begin(i, 0)?;
        Ok(&mut self.data[at])
    }

    pub fn first_order(&self, i: usize, j: usize) -> Result<&O> {
        let at = self.first_order_position(i, j)?;
        Ok(&self.data[at])
    }

    pub fn first_order_mut(&mut self, i: usize, j: usize) -> Result<&mut O> {
        let at = self.first_order_position(i, j)?;
        Ok(&mut self.data[at])
    }

    /// Coefficient at `(j, c)`; the two indices may come in either order.
    pub fn second_order(&self, i: usize, j: usize, c: usize) -> Result<&O> {
        let at = self.second_order_position(i, j, c)?;
        Ok(&self.data[at])
    }

    pub fn second_order_mut(&mut self, i: usize, j: usize, c: usize) -> Result<&mut O> {
        let at = self.second_order_position(i, j, c)?;
        Ok(&mut self.data[at])
    }

    /// Coefficient at `(j, c, k)`; requires `j <= c <= k`.
    pub fn third_order(&self, i: usize, j: usize, c: usize, k: usize) -> Result<&O> {
        let at = self.third_order_position(i, j, c, k)?;
        Ok(&self.data[at])
    }

    pub fn third_order_mut(&mut self, i: usize, j: usize, c: usize, k: usize) -> Result<&mut O> {
        let at = self.third_order_position(i, j, c, k)?;
        Ok(&mut self.data[at])
    }

    fn first_order_position(&self, i: usize, j: usize) -> Result<usize> {
        ensure_index("variable", j, self.dimension)?;
        Ok(self.begin(i, 1)? + j)
    }

    fn second_order_position(&self, i: usize, j: usize, c: usize) -> Result<usize> {
        ensure_index("variable", j.max(c), self.dimension)?;
        Ok(self.begin(i, 2)? + second_order_offset(self.dimension, j, c))
    }

    fn third_order_position(&self, i: usize, j: usize, c: usize, k: usize) -> Result<usize> {
        let offset = third_order_offset(self.dimension, j, c, k)?;
        Ok(self.begin(i, 3)? + offset)
    }

    fn ensure_degree(&self, d: usize) -> Result<()> {
        if d > self.degree {
            return Err(JetError::DegreeExceeded {
                requested: d,
                max: self.degree,
            });
        }
        Ok(())
    }
}

impl<O> std::ops::Index<usize> for CnContainer<O> {
    type Output = O;

    fn index(&self, at: usize) -> &O {
        &self.data[at]
    }
}

impl<O> std::ops::IndexMut<usize> for CnContainer<O> {
    fn index_mut(&mut self, at: usize) -> &mut O {
        &mut self.data[at]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Debug;

    fn assert_err_contains<T: Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected failure");
        let message = format!("{err}");
        assert!(message.contains(needle), "'{message}' does not contain '{needle}'");
    }

    fn numbered(image: usize, dimension: usize, degree: usize) -> CnContainer<usize> {
        let mut container = CnContainer::new(image, dimension, degree).expect("container should allocate");
        for (k, entry) in container.iter_mut().enumerate() {
            *entry = k;
        }
        container
    }

    #[test]
    fn size_and_degree_ranges() {
        let container = numbered(2, 3, 3);
        assert_eq!(container.block_len(), 20);
        assert_eq!(container.len(), 40);
        assert_eq!(container.degree_range(0, 0).expect("range"), 0..1);
        assert_eq!(container.degree_range(0, 1).expect("range"), 1..4);
        assert_eq!(container.degree_range(0, 2).expect("range"), 4..10);
        assert_eq!(container.degree_range(1, 3).expect("range"), 30..40);
        assert_err_contains(container.begin(0, 4), "exceeds maximal degree");
        assert_err_contains(container.begin(2, 0), "component index 2");
    }

    #[test]
    fn first_has_next_scan_matches_linear_layout() {
        let container = numbered(2, 3, 3);
        for i in 0..2 {
            for d in 0..=3 {
                let range = container.degree_range(i, d).expect("range");
                let scanned: Vec<usize> = container
                    .multipointers(d)
                    .iter()
                    .map(|mp| *container.get(i, mp).expect("coefficient"))
                    .collect();
                assert_eq!(scanned, range.collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn multiindex_access_matches_multipointer_access() {
        let container = numbered(1, 3, 3);
        for d in 0..=3 {
            for mp in container.multipointers(d) {
                let mi = Multiindex::from_multipointer(3, &mp).expect("conversion");
                assert_eq!(container.get(0, &mp).expect("mp"), container.get_mi(0, &mi).expect("mi"));
            }
        }
        assert_err_contains(container.get_mi(0, &Multiindex::new(vec![1, 0])), "incompatible dimensions");
    }

    #[test]
    fn fixed_arity_accessors_agree_with_multipointers() {
        for dim in 1..=4 {
            let container = numbered(2, dim, 3);
            for i in 0..2 {
                assert_eq!(
                    container.value(i).expect("value"),
                    container.get(i, &Multipointer::first(0)).expect("mp")
                );
                for j in 0..dim {
                    let mp = Multipointer::from_unsorted(vec![j]);
                    assert_eq!(container.first_order(i, j).expect("c1"), container.get(i, &mp).expect("mp"));
                    for c in 0..dim {
                        let mp = Multipointer::from_unsorted(vec![j, c]);
                        let expected = container.get(i, &mp).expect("mp");
                        assert_eq!(container.second_order(i, j, c).expect("c2"), expected);
                        for k in c.max(j)..dim {
                            if j > c {
                                continue;
                            }
                            let mp = Multipointer::from_unsorted(vec![j, c, k]);
                            assert_eq!(
                                container.third_order(i, j, c, k).expect("c3"),
                                container.get(i, &mp).expect("mp"),
                                "dim {dim} ({j},{c},{k})"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn third_order_rejects_unordered_indices() {
        let container = numbered(1, 3, 3);
        assert!(matches!(
            container.third_order(0, 1, 0, 2),
            Err(JetError::UnorderedIndices(_))
        ));
        assert!(matches!(
            container.third_order(0, 0, 2, 1),
            Err(JetError::UnorderedIndices(_))
        ));
        assert_err_contains(container.third_order(0, 0, 1, 3), "variable index 3");
    }

    #[test]
    fn resize_respects_shape_policy() {
        let mut dynamic: CnContainer<f64> = CnContainer::new(1, 2, 2).expect("container should allocate");
        dynamic.resize(2, 3, 1).expect("dynamic containers resize");
        assert_eq!(dynamic.len(), 8);

        let mut fixed: CnContainer<f64> = CnContainer::fixed(1, 2, 2).expect("container should allocate");
        fixed[3] = 1.0;
        fixed.resize(1, 2, 2).expect("same shape is allowed");
        assert_eq!(fixed[3], 0.0);
        assert_err_contains(fixed.resize(1, 2, 3), "container shape is fixed");
    }

    #[test]
    fn nested_coefficients() {
        let inner: CnContainer<f64> = CnContainer::new(1, 1, 2).expect("inner");
        let mut outer = CnContainer::filled(1, 2, 1, inner).expect("outer");
        *outer.first_order_mut(0, 1).expect("c1").value_mut(0).expect("value") = 2.5;
        assert_eq!(*outer.first_order(0, 1).expect("c1").value(0).expect("value"), 2.5);
        assert_eq!(*outer.first_order(0, 0).expect("c1").value(0).expect("value"), 0.0);
    }

    #[test]
    fn serde_round_trip_recomputes_layout() {
        let container = numbered(2, 2, 2);
        let json = serde_json::to_string(&container).expect("serialize");
        let restored: CnContainer<usize> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, container);
        assert_eq!(restored.second_order(1, 1, 0).expect("c2"), &10);

        let broken = r#"{"image":1,"dimension":2,"degree":2,"data":[1,2]}"#;
        assert!(serde_json::from_str::<CnContainer<usize>>(broken).is_err());
    }
}
