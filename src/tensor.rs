use serde::{Deserialize, Serialize};

use crate::errors::LayerRefError;
use crate::errors::LayerRefError::{InvalidPermutation, TensorCreateError};
use crate::shape::{
    align_operand_shape, channel_first_order, numel, permute_shape, shape_to_strides,
};

/// Dense row-major tensor. A rank 0 tensor holds exactly one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawTensor<T>",
    bound(deserialize = "T: Deserialize<'de> + Copy")
)]
pub struct Tensor<T> {
    values: Vec<T>,
    shape: Vec<i64>,
}

/// Unchecked wire form; every deserialized tensor goes through `Tensor::new`.
#[derive(Deserialize)]
struct RawTensor<T> {
    values: Vec<T>,
    shape: Vec<i64>,
}

impl<T: Copy> TryFrom<RawTensor<T>> for Tensor<T> {
    type Error = LayerRefError;

    fn try_from(raw: RawTensor<T>) -> Result<Self, Self::Error> {
        Tensor::new(raw.values, raw.shape)
    }
}

fn len_and_shape_valid<T>(vals: &[T], shape: &[i64]) -> bool {
    shape.iter().all(|&d| d >= 0) && vals.len() == numel(shape)
}

impl<T: Copy> Tensor<T> {
    pub fn new(values: Vec<T>, shape: Vec<i64>) -> Result<Self, LayerRefError> {
        if !len_and_shape_valid(&values, &shape) {
            return Err(TensorCreateError(format!(
                "{} values cannot be arranged as {:?}",
                values.len(),
                shape
            )));
        }
        Ok(Self { values, shape })
    }

    pub fn shape(&self) -> &[i64] {
        &self.shape
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn into_values(self) -> Vec<T> {
        self.values
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Inserts a leading axis of length 1. Values are untouched.
    pub fn expand_dims_front(mut self) -> Self {
        self.shape.insert(0, 1);
        self
    }

    /// Expands leading axes until the tensor has `rank` axes, the same way
    /// [`align_operand_shape`] pads a bare shape.
    pub fn align_to_rank(self, rank: usize) -> Self {
        let mut t = self;
        while t.rank() < rank {
            t = t.expand_dims_front();
        }
        t
    }

    /// Axis permutation with data movement: output axis `k` is input axis
    /// `order[k]`.
    pub fn transpose(&self, order: &[usize]) -> Result<Self, LayerRefError> {
        let rank = self.rank();
        let mut seen = vec![false; rank];
        for &axis in order {
            if axis >= rank || seen[axis] {
                return Err(InvalidPermutation {
                    order: order.to_vec(),
                    rank,
                });
            }
            seen[axis] = true;
        }
        if order.len() != rank {
            return Err(InvalidPermutation {
                order: order.to_vec(),
                rank,
            });
        }

        Ok(self.gather(order))
    }

    pub fn permute_channel_first(&self) -> Self {
        self.gather(&channel_first_order(self.rank()))
    }

    // `order` is assumed to be a valid permutation of the axes.
    fn gather(&self, order: &[usize]) -> Self {
        let rank = self.rank();
        let in_strides = shape_to_strides(&self.shape);
        let out_shape = permute_shape(&self.shape, order);
        let gather_strides = permute_shape(&in_strides, order);

        let mut values = Vec::with_capacity(self.values.len());
        let mut index = vec![0i64; rank];
        for _ in 0..self.values.len() {
            let offset: i64 = index
                .iter()
                .zip(gather_strides.iter())
                .map(|(i, s)| i * s)
                .sum();
            values.push(self.values[offset as usize]);

            // odometer increment over the output shape
            for axis in (0..rank).rev() {
                index[axis] += 1;
                if index[axis] < out_shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }

        Self {
            values,
            shape: out_shape,
        }
    }
}

impl<T: bytemuck::Pod> Tensor<T> {
    /// Raw little-endian element bytes, as stored in an IR weights blob.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.values).to_vec()
    }
}

/// Left-pads a constant operand with singleton axes up to `reference_rank`.
/// The returned tensor's shape is `align_operand_shape(operand_shape,
/// reference_rank)`.
pub fn align_operand_tensor<T: Copy>(
    operand_shape: &[i64],
    operand_values: Vec<T>,
    reference_rank: usize,
) -> Result<Tensor<T>, LayerRefError> {
    let t = Tensor::new(operand_values, operand_shape.to_vec())?.align_to_rank(reference_rank);
    debug_assert_eq!(t.shape(), align_operand_shape(operand_shape, reference_rank));
    Ok(t)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn create_checks_len() {
        assert!(Tensor::new(vec![1.0f32, 2.0, 3.0], vec![1, 3]).is_ok());
        assert!(Tensor::new(vec![1.0f32], vec![]).is_ok());
        let out = Tensor::new(vec![1.0f32, 2.0], vec![3]);
        assert!(matches!(out, Err(TensorCreateError(_))));
    }

    #[test]
    fn deserialize_checks_len() -> Result<(), serde_json::Error> {
        let t: Tensor<f32> = serde_json::from_str(r#"{"values":[1.0,2.0],"shape":[2,1]}"#)?;
        assert_eq!(t.shape(), &[2, 1]);

        let short = serde_json::from_str::<Tensor<f32>>(r#"{"values":[1.0],"shape":[1,2,3]}"#);
        assert!(short.is_err());
        let negative = serde_json::from_str::<Tensor<f32>>(r#"{"values":[],"shape":[-1]}"#);
        assert!(negative.is_err());
        Ok(())
    }

    #[test]
    fn align_expands_leading_axes() -> Result<(), LayerRefError> {
        let t = align_operand_tensor(&[3], vec![1.0f32, 2.0, 3.0], 4)?;
        assert_eq!(t.shape(), &[1, 1, 1, 3]);
        assert_eq!(t.values(), &[1.0, 2.0, 3.0]);

        let t = align_operand_tensor(&[2, 2], vec![1, 2, 3, 4], 2)?;
        assert_eq!(t.shape(), &[2, 2]);
        Ok(())
    }

    #[test]
    fn transpose_2d() -> Result<(), LayerRefError> {
        let t = Tensor::new((0..6).collect::<Vec<i32>>(), vec![2, 3])?;
        let tt = t.transpose(&[1, 0])?;
        assert_eq!(tt.shape(), &[3, 2]);
        assert_eq!(tt.values(), &[0, 3, 1, 4, 2, 5]);
        Ok(())
    }

    #[test]
    fn transpose_channel_first() -> Result<(), LayerRefError> {
        // (N=1, H=2, W=2, C=3) -> (N=1, C=3, H=2, W=2)
        let t = Tensor::new((0..12).collect::<Vec<i32>>(), vec![1, 2, 2, 3])?;
        let p = t.permute_channel_first();
        assert_eq!(p.shape(), &[1, 3, 2, 2]);
        assert_eq!(p.values(), &[0, 3, 6, 9, 1, 4, 7, 10, 2, 5, 8, 11]);
        Ok(())
    }

    #[test]
    fn transpose_rejects_bad_order() -> Result<(), LayerRefError> {
        let t = Tensor::new(vec![0.0f32; 6], vec![2, 3])?;
        assert!(matches!(t.transpose(&[0, 0]), Err(InvalidPermutation { .. })));
        assert!(matches!(t.transpose(&[0]), Err(InvalidPermutation { .. })));
        assert!(matches!(t.transpose(&[0, 2]), Err(InvalidPermutation { .. })));
        Ok(())
    }

    #[test]
    fn low_rank_permute_is_identity() -> Result<(), LayerRefError> {
        let t = Tensor::new(vec![1.0f32, 2.0], vec![2, 1])?;
        assert_eq!(t.permute_channel_first(), t);
        Ok(())
    }

    #[test]
    fn le_bytes() -> Result<(), LayerRefError> {
        let t = Tensor::new(vec![1.0f32, -2.0], vec![2])?;
        let bytes = t.to_le_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        Ok(())
    }
}
