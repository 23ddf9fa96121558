use super::indexing::{c1_offset, c2_offset, c3_offset, degree_begin, degree_end, jet_size};
use super::multiindex_data::{total_index, MultiindexData};
use super::types::DagShape;
use crate::cn_container::CnContainer;
use crate::error::{ensure_dimension, ensure_index, JetError, Result};
use crate::multiindex::Multiindex;
use crate::traits::Scalar;

/// Coefficient storage for the nodes of an expression DAG.
///
/// Node `i` owns `data[i * time_jet_size .. (i + 1) * time_jet_size]`. The
/// index array holds one [`MultiindexData`] per multiindex up to `degree` and
/// is rebuilt whenever the shape changes; the optional mask marks the node
/// offsets that evaluation has to compute.
#[derive(Debug, Clone)]
pub struct DagIndexer<T> {
    shape: DagShape,
    jet_size: usize,
    time_jet_size: usize,
    data: Vec<T>,
    index_array: CnContainer<MultiindexData>,
    mask: Option<Vec<bool>>,
}

/// Mutable view used by the node operations.
pub(crate) struct Workspace<'a, T> {
    pub index: &'a [MultiindexData],
    pub mask: Option<&'a [bool]>,
    pub data: &'a mut [T],
    pub time_jet_size: usize,
    pub nodes: usize,
    pub order: usize,
    pub domain: usize,
}

impl<T> Workspace<'_, T> {
    pub fn node_base(&self, node: usize) -> Result<usize> {
        ensure_index("node", node, self.nodes)?;
        Ok(node * self.time_jet_size)
    }

    pub fn ensure_coefficient(&self, coeff: usize) -> Result<()> {
        ensure_index("time coefficient", coeff, self.order + 1)
    }

    pub fn is_needed(&self, offset: usize) -> bool {
        self.mask.map_or(true, |mask| mask[offset])
    }
}

impl<T: Scalar> DagIndexer<T> {
    /// Allocates zeroed storage and builds the index array.
    pub fn new(shape: DagShape) -> Result<Self> {
        let jet_size = jet_size(shape.domain, shape.degree)?;
        let time_jet_size = jet_size * (shape.order + 1);
        let len = time_jet_size
            .checked_mul(shape.nodes)
            .ok_or_else(|| JetError::Overflow(format!("{} nodes of {time_jet_size} coefficients", shape.nodes)))?;
        log::debug!(
            "allocating dag indexer: {} nodes, domain {}, degree {}, order {}",
            shape.nodes,
            shape.domain,
            shape.degree,
            shape.order
        );
        Ok(Self {
            shape,
            jet_size,
            time_jet_size,
            data: vec![T::zero(); len],
            index_array: create_index_array(shape)?,
            mask: None,
        })
    }

    /// Reallocates for a new shape. Coefficients are zeroed and the mask dropped.
    pub fn resize(&mut self, shape: DagShape) -> Result<()> {
        *self = Self::new(shape)?;
        Ok(())
    }

    /// Changes the time order, keeping only the value of every node.
    ///
    /// A mask survives: each multiindex keeps the flag of its time
    /// coefficient zero for all new coefficients.
    pub fn set_order(&mut self, order: usize) -> Result<()> {
        if order == self.shape.order {
            return Ok(());
        }
        let old_order = self.shape.order;
        let shape = self.shape.with_order(order);
        let mut resized = Self::new(shape)?;
        for node in 0..shape.nodes {
            resized.data[node * resized.time_jet_size] = self.data[node * self.time_jet_size];
        }
        if let Some(old_mask) = &self.mask {
            let mut mask = vec![false; resized.time_jet_size];
            for i in 0..self.jet_size {
                let flag = old_mask[i * (old_order + 1)];
                for j in 0..=order {
                    mask[i * (order + 1) + j] = flag;
                }
            }
            resized.mask = Some(mask);
        }
        log::debug!("dag indexer time order changed from {old_order} to {order}");
        *self = resized;
        Ok(())
    }

    pub fn shape(&self) -> DagShape {
        self.shape
    }

    pub fn domain_dimension(&self) -> usize {
        self.shape.domain
    }

    pub fn image_dimension(&self) -> usize {
        self.shape.image
    }

    pub fn degree(&self) -> usize {
        self.shape.degree
    }

    pub fn order(&self) -> usize {
        self.shape.order
    }

    pub fn node_count(&self) -> usize {
        self.shape.nodes
    }

    /// Number of multiindices per node.
    pub fn jet_size(&self) -> usize {
        self.jet_size
    }

    pub fn time_jet_size(&self) -> usize {
        self.time_jet_size
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn index_array(&self) -> &CnContainer<MultiindexData> {
        &self.index_array
    }

    pub fn multiindex_data(&self, mi: &Multiindex) -> Result<&MultiindexData> {
        self.index_array.get_mi(0, mi)
    }

    /// Offset of `mi` inside a node block, at time coefficient zero.
    pub fn total_index(&self, mi: &Multiindex) -> Result<usize> {
        ensure_dimension("multiindex", self.shape.domain, mi.dimension())?;
        total_index(mi, self.shape.degree, self.shape.order)
    }

    pub fn node(&self, node: usize) -> Result<&[T]> {
        let base = self.begin(node)?;
        Ok(&self.data[base..base + self.time_jet_size])
    }

    pub fn node_mut(&mut self, node: usize) -> Result<&mut [T]> {
        let base = self.begin(node)?;
        let end = base + self.time_jet_size;
        Ok(&mut self.data[base..end])
    }

    pub fn begin(&self, node: usize) -> Result<usize> {
        ensure_index("node", node, self.shape.nodes)?;
        Ok(node * self.time_jet_size)
    }

    /// Flat offset of the first degree `d` coefficient of `node`.
    pub fn begin_degree(&self, node: usize, d: usize) -> Result<usize> {
        self.ensure_degree(d)?;
        Ok(self.begin(node)? + degree_begin(self.shape.domain, self.shape.order, d)?)
    }

    pub fn end_degree(&self, node: usize, d: usize) -> Result<usize> {
        self.ensure_degree(d)?;
        Ok(self.begin(node)? + degree_end(self.shape.domain, self.shape.order, d)?)
    }

    pub fn c0(&self, node: usize, coeff: usize) -> Result<T> {
        Ok(self.data[self.c0_position(node, coeff)?])
    }

    pub fn c0_mut(&mut self, node: usize, coeff: usize) -> Result<&mut T> {
        let at = self.c0_position(node, coeff)?;
        Ok(&mut self.data[at])
    }

    pub fn c1(&self, node: usize, der: usize, coeff: usize) -> Result<T> {
        Ok(self.data[self.c1_position(node, der, coeff)?])
    }

    pub fn c1_mut(&mut self, node: usize, der: usize, coeff: usize) -> Result<&mut T> {
        let at = self.c1_position(node, der, coeff)?;
        Ok(&mut self.data[at])
    }

    pub fn c2(&self, node: usize, j: usize, c: usize, coeff: usize) -> Result<T> {
        Ok(self.data[self.c2_position(node, j, c, coeff)?])
    }

    pub fn c2_mut(&mut self, node: usize, j: usize, c: usize, coeff: usize) -> Result<&mut T> {
        let at = self.c2_position(node, j, c, coeff)?;
        Ok(&mut self.data[at])
    }

    pub fn c3(&self, node: usize, j: usize, c: usize, k: usize, coeff: usize) -> Result<T> {
        Ok(self.data[self.c3_position(node, j, c, k, coeff)?])
    }

    pub fn c3_mut(&mut self, node: usize, j: usize, c: usize, k: usize, coeff: usize) -> Result<&mut T> {
        let at = self.c3_position(node, j, c, k, coeff)?;
        Ok(&mut self.data[at])
    }

    fn c0_position(&self, node: usize, coeff: usize) -> Result<usize> {
        self.ensure_coefficient(coeff)?;
        Ok(self.begin(node)? + coeff)
    }

    fn c1_position(&self, node: usize, der: usize, coeff: usize) -> Result<usize> {
        self.ensure_degree(1)?;
        self.ensure_coefficient(coeff)?;
        ensure_index("variable", der, self.shape.domain)?;
        Ok(self.begin(node)? + c1_offset(self.shape.order, der, coeff))
    }

    fn c2_position(&self, node: usize, j: usize, c: usize, coeff: usize) -> Result<usize> {
        self.ensure_degree(2)?;
        self.ensure_coefficient(coeff)?;
        ensure_index("variable", j.max(c), self.shape.domain)?;
        Ok(self.begin(node)? + c2_offset(self.shape.domain, self.shape.order, j, c, coeff))
    }

    fn c3_position(&self, node: usize, j: usize, c: usize, k: usize, coeff: usize) -> Result<usize> {
        self.ensure_degree(3)?;
        self.ensure_coefficient(coeff)?;
        let offset = c3_offset(self.shape.domain, self.shape.order, j, c, k, coeff)?;
        Ok(self.begin(node)? + offset)
    }

    fn ensure_degree(&self, d: usize) -> Result<()> {
        if d > self.shape.degree {
            return Err(JetError::DegreeExceeded {
                requested: d,
                max: self.shape.degree,
            });
        }
        Ok(())
    }

    fn ensure_coefficient(&self, coeff: usize) -> Result<()> {
        ensure_index("time coefficient", coeff, self.shape.order + 1)
    }

    /// Installs a mask computing exactly what the given multiindices need.
    ///
    /// Entries outside the mask are zeroed, apart from the value of each node.
    pub fn set_mask(&mut self, multiindices: &[Multiindex]) -> Result<()> {
        let mut mask = vec![false; self.time_jet_size];
        for flag in mask.iter_mut().take(self.shape.order + 1) {
            *flag = true;
        }
        self.mask = Some(mask);
        for mi in multiindices {
            self.add_multiindex_to_mask(mi)?;
        }
        self.fill_by_zeroes();
        log::debug!(
            "mask installed for {} multiindices, {} of {} offsets needed",
            multiindices.len(),
            self.mask.as_ref().map_or(0, |m| m.iter().filter(|&&f| f).count()),
            self.time_jet_size
        );
        Ok(())
    }

    /// Marks every offset that the coefficients of `mi` depend on.
    pub fn add_multiindex_to_mask(&mut self, mi: &Multiindex) -> Result<()> {
        let data = self.index_array.get_mi(0, mi)?;
        let order = self.shape.order;
        let time_jet_size = self.time_jet_size;
        let mask = self.mask.get_or_insert_with(|| {
            let mut mask = vec![false; time_jet_size];
            for flag in mask.iter_mut().take(order + 1) {
                *flag = true;
            }
            mask
        });
        for &(ia, ib) in data.convolution(order) {
            mask[ia] = true;
            mask[ib] = true;
        }
        Ok(())
    }

    pub fn clear_mask(&mut self) {
        self.mask = None;
    }

    pub fn mask(&self) -> Option<&[bool]> {
        self.mask.as_deref()
    }

    /// Whether the offset is computed during evaluation; always true without a mask.
    pub fn is_needed(&self, offset: usize) -> bool {
        self.mask.as_ref().map_or(true, |mask| mask[offset])
    }

    pub fn mask_first_order(&self, j: usize) -> Result<bool> {
        self.ensure_degree(1)?;
        ensure_index("variable", j, self.shape.domain)?;
        Ok(self.is_needed(c1_offset(self.shape.order, j, 0)))
    }

    pub fn mask_second_order(&self, j: usize, c: usize) -> Result<bool> {
        self.ensure_degree(2)?;
        ensure_index("variable", j.max(c), self.shape.domain)?;
        Ok(self.is_needed(c2_offset(self.shape.domain, self.shape.order, j, c, 0)))
    }

    /// Zeroes every coefficient of every node except its value.
    pub fn fill_by_zeroes(&mut self) {
        if self.time_jet_size == 0 {
            return;
        }
        for block in self.data.chunks_mut(self.time_jet_size) {
            for c in block.iter_mut().skip(1) {
                *c = T::zero();
            }
        }
    }

    pub(crate) fn workspace(&mut self) -> Workspace<'_, T> {
        Workspace {
            index: self.index_array.as_slice(),
            mask: self.mask.as_deref(),
            data: &mut self.data,
            time_jet_size: self.time_jet_size,
            nodes: self.shape.nodes,
            order: self.shape.order,
            domain: self.shape.domain,
        }
    }
}

/// One [`MultiindexData`] per multiindex up to the degree, in jet storage order.
fn create_index_array(shape: DagShape) -> Result<CnContainer<MultiindexData>> {
    let mut index_array = CnContainer::filled(1, shape.domain, shape.degree, MultiindexData::default())?;
    let top = if shape.domain == 0 { 0 } else { shape.degree };
    for d in 0..=top {
        let mut mp = index_array.first(d);
        loop {
            let mi = Multiindex::from_multipointer(shape.domain, &mp)?;
            *index_array.get_mut(0, &mp)? = MultiindexData::new(mi, shape.degree, shape.order)?;
            if !index_array.has_next(&mut mp) {
                break;
            }
        }
    }
    Ok(index_array)
}
