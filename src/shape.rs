use crate::errors::LayerRefError;
use crate::errors::LayerRefError::ShapeMismatch;

/// Axis order that moves the trailing channel axis of a channel-last shape
/// to position 1. Identity below rank 3.
pub fn channel_first_order(rank: usize) -> Vec<usize> {
    if rank < 3 {
        return (0..rank).collect();
    }
    let mut order = vec![0, rank - 1];
    order.extend(1..rank - 1);
    order
}

/// Inverse of [`channel_first_order`]: axis 1 goes to the end.
pub fn channel_last_order(rank: usize) -> Vec<usize> {
    if rank < 3 {
        return (0..rank).collect();
    }
    let mut order = vec![0];
    order.extend(2..rank);
    order.push(1);
    order
}

/// `out[k] = shape[order[k]]`. Callers pass orders from
/// [`channel_first_order`], [`channel_last_order`] or ones already checked
/// by `Tensor::transpose`.
pub(crate) fn permute_shape(shape: &[i64], order: &[usize]) -> Vec<i64> {
    order.iter().map(|&i| shape[i]).collect()
}

/// (N, spatial..., C) -> (N, C, spatial...). Shapes below rank 3 are
/// returned unchanged.
pub fn channel_first_permutation(shape: &[i64]) -> Vec<i64> {
    permute_shape(shape, &channel_first_order(shape.len()))
}

/// (N, C, spatial...) -> (N, spatial..., C).
pub fn channel_last_permutation(shape: &[i64]) -> Vec<i64> {
    permute_shape(shape, &channel_last_order(shape.len()))
}

/// Left-pads `operand_shape` with singleton dimensions until it has
/// `reference_rank` elements. Longer shapes come back as they are.
pub fn align_operand_shape(operand_shape: &[i64], reference_rank: usize) -> Vec<i64> {
    let mut aligned = operand_shape.to_vec();
    while aligned.len() < reference_rank {
        aligned.insert(0, 1);
    }
    aligned
}

pub fn shape_to_strides(shape: &[i64]) -> Vec<i64> {
    let mut res = vec![];
    for i in 0..shape.len() {
        let mut prod: i64 = 1;
        for j in i + 1..shape.len() {
            prod *= shape[j];
        }
        res.push(prod);
    }
    res
}

pub fn numel(shape: &[i64]) -> usize {
    shape.iter().fold(1, |x, y| x * y) as usize
}

#[derive(Debug)]
pub struct BroadcastResult {
    pub shape: Vec<i64>,
    /// Strides of each operand over the common shape. Broadcast axes get 0.
    pub left_logical_strides: Vec<i64>,
    pub right_logical_strides: Vec<i64>,
}

pub fn broadcast(s1: &[i64], s2: &[i64]) -> Result<BroadcastResult, LayerRefError> {
    let maxlen = s1.len().max(s2.len());
    let l_aligned = align_operand_shape(s1, maxlen);
    let r_aligned = align_operand_shape(s2, maxlen);

    let mut l_strides = shape_to_strides(&l_aligned);
    let mut r_strides = shape_to_strides(&r_aligned);

    let mut shape = Vec::with_capacity(maxlen);
    for (i, (&l, &r)) in l_aligned.iter().zip(r_aligned.iter()).enumerate() {
        let dim = match (l, r) {
            (l, r) if l == r => l,
            (1, r) => {
                l_strides[i] = 0;
                r
            }
            (l, 1) => {
                r_strides[i] = 0;
                l
            }
            _ => {
                return Err(ShapeMismatch {
                    left: s1.to_vec(),
                    right: s2.to_vec(),
                });
            }
        };
        shape.push(dim);
    }

    Ok(BroadcastResult {
        shape,
        left_logical_strides: l_strides,
        right_logical_strides: r_strides,
    })
}

/// Numpy broadcast of two shapes, without any layout change.
pub fn broadcast_shape(s1: &[i64], s2: &[i64]) -> Result<Vec<i64>, LayerRefError> {
    Ok(broadcast(s1, s2)?.shape)
}

/// Broadcast result as the target representation reports it.
pub fn expected_output_shape(x_shape: &[i64], y_shape: &[i64]) -> Result<Vec<i64>, LayerRefError> {
    let mul_shape = broadcast_shape(x_shape, y_shape)?;
    Ok(channel_first_permutation(&mul_shape))
}
