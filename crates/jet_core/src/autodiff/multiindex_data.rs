use crate::autodiff::indexing::degree_begin;
use crate::error::Result;
use crate::multiindex::Multiindex;
use serde::{Deserialize, Serialize};

/// Offset of multiindex `mi` inside a node block, at time coefficient zero.
pub fn total_index(mi: &Multiindex, degree: usize, order: usize) -> Result<usize> {
    let within = mi.index(degree)?;
    Ok(degree_begin(mi.dimension(), order, mi.module())? + (order + 1) * within)
}

/// Precomputed addressing data of one multiindex.
///
/// `convolution[n]` lists the offset pairs `(ia, ib)` such that the time
/// coefficient `n` of a product at this multiindex is `sum left[ia] * right[ib]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiindexData {
    multiindex: Multiindex,
    pivot: usize,
    index: usize,
    convolution: Vec<Vec<(usize, usize)>>,
    convolution_from_pivot: Vec<Vec<(usize, usize)>>,
}

impl MultiindexData {
    pub fn new(multiindex: Multiindex, degree: usize, order: usize) -> Result<Self> {
        let index = total_index(&multiindex, degree, order)?;
        let pivot = pivot_of(&multiindex);

        let mut convolution = Vec::with_capacity(order + 1);
        let mut convolution_from_pivot = Vec::with_capacity(order + 1);
        for coeff in 0..=order {
            let mut pairs = Vec::new();
            let mut from_pivot = Vec::new();
            let mut a = Multiindex::zeros(multiindex.dimension());
            let mut b = multiindex.clone();
            loop {
                let ia = total_index(&a, degree, order)?;
                let ib = total_index(&b, degree, order)?;
                let touches_pivot = a.dimension() > 0 && a[pivot] > 0;
                for j in 0..=coeff {
                    let pair = (ia + j, ib + coeff - j);
                    pairs.push(pair);
                    if touches_pivot {
                        from_pivot.push(pair);
                    }
                }
                if !multiindex.next_split(&mut a, &mut b)? {
                    break;
                }
            }
            convolution.push(pairs);
            convolution_from_pivot.push(from_pivot);
        }

        Ok(Self {
            multiindex,
            pivot,
            index,
            convolution,
            convolution_from_pivot,
        })
    }

    pub fn multiindex(&self) -> &Multiindex {
        &self.multiindex
    }

    /// Variable with the largest exponent, the first one on ties.
    pub fn pivot(&self) -> usize {
        self.pivot
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_value(&self) -> bool {
        self.multiindex.module() == 0
    }

    pub fn convolution(&self, coeff: usize) -> &[(usize, usize)] {
        &self.convolution[coeff]
    }

    /// The pairs of [`MultiindexData::convolution`] whose left factor is
    /// differentiated at least once with respect to the pivot.
    pub fn convolution_from_pivot(&self, coeff: usize) -> &[(usize, usize)] {
        &self.convolution_from_pivot[coeff]
    }
}

fn pivot_of(mi: &Multiindex) -> usize {
    let mut pivot = 0;
    for (i, &exponent) in mi.as_slice().iter().enumerate() {
        if exponent > mi[pivot] {
            pivot = i;
        }
    }
    pivot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_convolution_is_the_cauchy_product() {
        let data = MultiindexData::new(Multiindex::zeros(2), 2, 2).expect("data");
        assert!(data.is_value());
        assert_eq!(data.index(), 0);
        assert_eq!(data.convolution(0), &[(0, 0)]);
        assert_eq!(data.convolution(2), &[(0, 2), (1, 1), (2, 0)]);
        assert!(data.convolution_from_pivot(2).is_empty());
    }

    #[test]
    fn first_derivative_pairs_with_values() {
        // domain 2, degree 2, order 0: offsets 0 = (0,0), 1 = (1,0), 2 = (0,1)
        let data = MultiindexData::new(Multiindex::new(vec![0, 1]), 2, 0).expect("data");
        assert_eq!(data.index(), 2);
        assert_eq!(data.pivot(), 1);
        assert_eq!(data.convolution(0), &[(0, 2), (2, 0)]);
        assert_eq!(data.convolution_from_pivot(0), &[(2, 0)]);
    }

    #[test]
    fn mixed_second_derivative() {
        // (1,1) splits into 0+(1,1), (1,0)+(0,1), (0,1)+(1,0), (1,1)+0
        let data = MultiindexData::new(Multiindex::new(vec![1, 1]), 2, 0).expect("data");
        assert_eq!(data.index(), 4);
        assert_eq!(data.pivot(), 0);
        let mut pairs = data.convolution(0).to_vec();
        pairs.sort_unstable();
        assert_eq!(pairs, vec![(0, 4), (1, 2), (2, 1), (4, 0)]);
        let mut from_pivot = data.convolution_from_pivot(0).to_vec();
        from_pivot.sort_unstable();
        assert_eq!(from_pivot, vec![(1, 2), (4, 0)]);
    }

    #[test]
    fn total_index_scales_with_time_order() {
        let mi = Multiindex::new(vec![2, 0]);
        assert_eq!(total_index(&mi, 2, 0).expect("index"), 3);
        assert_eq!(total_index(&mi, 2, 1).expect("index"), 6);
        assert!(total_index(&mi, 1, 0).is_err());
    }
}
