//! Expected output shapes and constant layouts for converter layer tests of
//! `Placeholder * Const`, plus the case tables and harness that drive them.

pub mod case;
pub mod errors;
pub mod eval;
pub mod harness;
pub mod ir;
pub mod shape;
pub mod suite;
pub mod tensor;

pub use case::{resolve_layout, ExpectedLayout, KnownFailure, Lowering, MulCase};
pub use errors::LayerRefError;
pub use harness::{BuiltGraph, Converter, ConvertedMul, GraphBuilder, Harness, Outcome};
pub use shape::{
    align_operand_shape, broadcast_shape, channel_first_permutation, expected_output_shape,
};
pub use suite::{Precision, Suite, SuiteConfig};
pub use tensor::{align_operand_tensor, Tensor};
