use std::fmt;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::errors::LayerRefError;
use crate::shape::{broadcast_shape, channel_first_permutation, channel_last_permutation, numel};
use crate::tensor::Tensor;

/// How the converter is expected to lower the multiplication. Informational
/// only, nothing here depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lowering {
    Power,
    ScaleShift,
    Eltwise,
}

impl fmt::Display for Lowering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lowering::Power => write!(f, "Power"),
            Lowering::ScaleShift => write!(f, "ScaleShift"),
            Lowering::Eltwise => write!(f, "Eltwise"),
        }
    }
}

/// A tracked converter defect the case is known to hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnownFailure {
    pub reference: String,
}

/// Placeholder * Const with both shapes written in channel-first form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulCase {
    pub x_shape: Vec<i64>,
    pub y_shape: Vec<i64>,
    pub lowering: Lowering,
    #[serde(default)]
    pub known_failures: Vec<KnownFailure>,
}

/// What the converted net must report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedLayout {
    pub reported_shape: Vec<i64>,
    pub constant: Tensor<f32>,
}

/// Source-framework constant: integers in [-255, 255) stored as f32. An
/// all-ones constant is bumped by one so the converter cannot fold the Mul
/// away.
pub fn generate_constant(shape: &[i64], rng: &mut StdRng) -> Result<Tensor<f32>, LayerRefError> {
    let mut values: Vec<f32> = (0..numel(shape))
        .map(|_| rng.gen_range(-255..255) as f32)
        .collect();
    if values.iter().all(|&v| v == 1.0) {
        values.iter_mut().for_each(|v| *v += 1.0);
    }
    Tensor::new(values, shape.to_vec())
}

/// Expected artifacts for `x_src * constant` where `x_src` and the constant
/// are laid out the way the source framework reports them.
pub fn resolve_layout(
    x_src: &[i64],
    constant: &Tensor<f32>,
) -> Result<ExpectedLayout, LayerRefError> {
    let mul_shape = broadcast_shape(x_src, constant.shape())?;
    let reported_shape = channel_first_permutation(&mul_shape);

    let aligned = constant.clone().align_to_rank(x_src.len());
    let layout = if aligned.rank() >= 3 {
        aligned.permute_channel_first()
    } else {
        aligned
    };

    debug!(
        "x {:?} * const {:?}: reported {:?}, const layout {:?}",
        x_src,
        constant.shape(),
        reported_shape,
        layout.shape()
    );

    Ok(ExpectedLayout {
        reported_shape,
        constant: layout,
    })
}

impl MulCase {
    pub fn new(x_shape: Vec<i64>, y_shape: Vec<i64>, lowering: Lowering) -> Self {
        Self {
            x_shape,
            y_shape,
            lowering,
            known_failures: vec![],
        }
    }

    pub fn known_failing(mut self, reference: &str) -> Self {
        self.known_failures.push(KnownFailure {
            reference: reference.to_string(),
        });
        self
    }

    pub fn is_known_failing(&self) -> bool {
        !self.known_failures.is_empty()
    }

    /// Shapes as the source framework sees them (channel-last).
    pub fn source_shapes(&self) -> (Vec<i64>, Vec<i64>) {
        (
            channel_last_permutation(&self.x_shape),
            channel_last_permutation(&self.y_shape),
        )
    }

    pub fn name(&self) -> String {
        format!("x{:?}_y{:?}", self.x_shape, self.y_shape)
            .replace(' ', "")
            .replace(['[', ']'], "")
            .replace(',', "x")
    }

    pub fn source_constant(&self, rng: &mut StdRng) -> Result<Tensor<f32>, LayerRefError> {
        let (_, y_src) = self.source_shapes();
        generate_constant(&y_src, rng)
    }

    pub fn expected_layout(&self, seed: u64) -> Result<ExpectedLayout, LayerRefError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let constant = self.source_constant(&mut rng)?;
        let (x_src, _) = self.source_shapes();
        resolve_layout(&x_src, &constant)
    }
}

#[cfg(test)]
mod test {
    use crate::eval::mul;

    use super::*;

    fn ones(shape: &[i64]) -> Tensor<f32> {
        Tensor::new(vec![1.0; numel(shape)], shape.to_vec()).unwrap()
    }

    #[test]
    fn same_shape_3d() -> Result<(), LayerRefError> {
        let expected = resolve_layout(&[1, 3, 224], &ones(&[1, 3, 224]))?;
        assert_eq!(expected.reported_shape, vec![1, 224, 3]);
        assert_eq!(expected.constant.shape(), &[1, 224, 3]);
        Ok(())
    }

    #[test]
    fn rank2_pads_constant() -> Result<(), LayerRefError> {
        let c = Tensor::new(vec![2.0, 3.0, 4.0], vec![3])?;
        let expected = resolve_layout(&[3, 1], &c)?;
        assert_eq!(expected.reported_shape, vec![3, 3]);
        assert_eq!(expected.constant.shape(), &[1, 3]);
        assert_eq!(expected.constant.values(), &[2.0, 3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn constant_of_lower_rank_broadcasts() -> Result<(), LayerRefError> {
        let expected = resolve_layout(&[1, 1, 1], &ones(&[3, 1]))?;
        assert_eq!(expected.reported_shape, vec![1, 1, 3]);
        assert_eq!(expected.constant.shape(), &[1, 1, 3]);
        Ok(())
    }

    #[test]
    fn scale_shift_4d_from_table() -> Result<(), LayerRefError> {
        let case = MulCase::new(vec![1, 3, 100, 224], vec![3], Lowering::ScaleShift);
        assert_eq!(case.source_shapes(), (vec![1, 100, 224, 3], vec![3]));
        let expected = case.expected_layout(0)?;
        assert_eq!(expected.reported_shape, vec![1, 3, 100, 224]);
        assert_eq!(expected.constant.shape(), &[1, 3, 1, 1]);
        Ok(())
    }

    #[test]
    fn incompatible_shapes() {
        let out = resolve_layout(&[2, 3], &ones(&[4, 5]));
        assert!(matches!(out, Err(LayerRefError::ShapeMismatch { .. })));
    }

    #[test]
    fn constant_generation() -> Result<(), LayerRefError> {
        let mut rng = StdRng::seed_from_u64(7);
        let c = generate_constant(&[2, 3, 4], &mut rng)?;
        assert_eq!(c.len(), 24);
        assert!(c
            .values()
            .iter()
            .all(|&v| (-255.0..255.0).contains(&v) && v.fract() == 0.0));

        let mut rng1 = StdRng::seed_from_u64(7);
        assert_eq!(generate_constant(&[2, 3, 4], &mut rng1)?, c);
        Ok(())
    }

    #[test]
    fn case_name() {
        let case = MulCase::new(vec![1, 3, 1, 1], vec![3, 1], Lowering::Eltwise);
        assert_eq!(case.name(), "x1x3x1x1_y3x1");
    }

    // The permuted constant must multiply the channel-first activation to
    // the channel-first permutation of the source product.
    #[test]
    fn transposed_constant_is_equivalent() -> Result<(), LayerRefError> {
        let cases = vec![
            MulCase::new(vec![1, 3, 1, 2], vec![3, 1, 2], Lowering::Eltwise),
            MulCase::new(vec![2, 3, 1, 2], vec![1, 3, 2, 1], Lowering::Eltwise),
            MulCase::new(vec![1, 3, 5, 1, 2], vec![5, 3, 2, 1], Lowering::Eltwise),
            MulCase::new(vec![1, 3, 2, 2], vec![3], Lowering::ScaleShift),
        ];
        for case in cases {
            let mut rng = StdRng::seed_from_u64(3);
            let c_src = case.source_constant(&mut rng)?;
            let (x_src_shape, _) = case.source_shapes();
            let x_src = Tensor::new(
                (0..numel(&x_src_shape)).map(|v| v as f32).collect(),
                x_src_shape.clone(),
            )?;
            let expected = resolve_layout(&x_src_shape, &c_src)?;

            let y_src = mul(&x_src, &c_src)?;
            let x_ref = x_src.permute_channel_first();
            let y_ref = mul(&x_ref, &expected.constant)?;

            assert_eq!(y_ref.shape(), &expected.reported_shape[..]);
            assert_eq!(y_ref, y_src.permute_channel_first());
        }
        Ok(())
    }
}
