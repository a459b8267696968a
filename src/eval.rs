use num_traits::Num;

use crate::errors::LayerRefError;
use crate::shape::{broadcast, numel};
use crate::tensor::Tensor;

/// Physical offset of the `i`-th element of the common (broadcast) shape
/// inside an operand whose logical strides are `logical_strides`.
fn direct_strided_offset(i: usize, common_shape: &[i64], logical_strides: &[i64]) -> usize {
    let mut strided_offset = 0;
    let mut cumulative_factor = 1;
    for (&shape, &logical_stride) in
        itertools::izip!(common_shape.iter().rev(), logical_strides.iter().rev())
    {
        if logical_stride != 0 {
            let idx = (i as i64 / cumulative_factor) % shape;
            strided_offset += idx * logical_stride;
        }
        cumulative_factor *= shape;
    }
    strided_offset as usize
}

fn binary_elementwise<T, F>(a: &Tensor<T>, b: &Tensor<T>, f: F) -> Result<Tensor<T>, LayerRefError>
where
    T: Num + Copy,
    F: Fn(T, T) -> T,
{
    if a.shape() == b.shape() {
        let values = a
            .values()
            .iter()
            .zip(b.values().iter())
            .map(|(&l, &r)| f(l, r))
            .collect();
        return Tensor::new(values, a.shape().to_vec());
    }

    let bcast = broadcast(a.shape(), b.shape())?;
    let values = (0..numel(&bcast.shape))
        .map(|i| {
            let l = a.values()[direct_strided_offset(i, &bcast.shape, &bcast.left_logical_strides)];
            let r =
                b.values()[direct_strided_offset(i, &bcast.shape, &bcast.right_logical_strides)];
            f(l, r)
        })
        .collect();
    Tensor::new(values, bcast.shape)
}

/// Numpy-style broadcasting multiplication.
pub fn mul<T: Num + Copy>(a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, LayerRefError> {
    binary_elementwise(a, b, |l, r| l * r)
}
