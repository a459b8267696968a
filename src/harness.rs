use std::fmt;

use anyhow::Context;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::case::{resolve_layout, ExpectedLayout, MulCase};
use crate::suite::{Suite, SuiteConfig};
use crate::tensor::Tensor;

/// A graph built in the source framework, ready for conversion.
#[derive(Debug, Clone)]
pub struct BuiltGraph {
    pub input_node: String,
    pub output_node: String,
    pub serialized_graph: Vec<u8>,
}

/// Builds `Placeholder(x_shape) * Const(constant)` in the source framework.
/// Shapes are in the framework's own (channel-last) layout.
pub trait GraphBuilder {
    fn build(&self, x_shape: &[i64], constant: &Tensor<f32>) -> anyhow::Result<BuiltGraph>;
}

/// What the converter produced for the Mul node.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedMul {
    pub output_shape: Vec<i64>,
    pub constant: Tensor<f32>,
}

pub trait Converter {
    fn convert(&self, graph: &BuiltGraph, config: &SuiteConfig) -> anyhow::Result<ConvertedMul>;
}

/// Exact shape equality, values within `tolerance`.
pub fn compare(
    expected: &ExpectedLayout,
    actual: &ConvertedMul,
    tolerance: f32,
) -> Result<(), Vec<String>> {
    let mut reasons = vec![];
    if expected.reported_shape != actual.output_shape {
        reasons.push(format!(
            "output shape: expected {:?}, found {:?}",
            expected.reported_shape, actual.output_shape
        ));
    }
    if expected.constant.shape() != actual.constant.shape() {
        reasons.push(format!(
            "constant shape: expected {:?}, found {:?}",
            expected.constant.shape(),
            actual.constant.shape()
        ));
    } else if expected.constant.len() != actual.constant.len() {
        reasons.push(format!(
            "constant value count: expected {}, found {}",
            expected.constant.len(),
            actual.constant.len()
        ));
    } else if let Some((i, (e, a))) = expected
        .constant
        .values()
        .iter()
        .zip(actual.constant.values().iter())
        .enumerate()
        .find(|(_, (e, a))| {
            let diff = (*e - *a).abs();
            diff.is_nan() || diff > tolerance
        })
    {
        reasons.push(format!(
            "constant value at {}: expected {}, found {}",
            i, e, a
        ));
    }

    if reasons.is_empty() {
        Ok(())
    } else {
        Err(reasons)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Passed,
    Failed(Vec<String>),
    /// Failed, and tagged with these tracking references.
    KnownFailure(Vec<String>),
    /// Passed although tagged as failing.
    UnexpectedPass(Vec<String>),
    Skipped,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => write!(f, "PASSED"),
            Outcome::Failed(_) => write!(f, "FAILED"),
            Outcome::KnownFailure(_) => write!(f, "XFAIL"),
            Outcome::UnexpectedPass(_) => write!(f, "XPASS"),
            Outcome::Skipped => write!(f, "SKIPPED"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CaseReport {
    pub group: String,
    pub case: MulCase,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    fn count(&self, outcome: fn(&Outcome) -> bool) -> usize {
        self.cases.iter().filter(|r| outcome(&r.outcome)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }

    pub fn known_failures(&self) -> usize {
        self.count(|o| matches!(o, Outcome::KnownFailure(_)))
    }

    pub fn unexpected_passes(&self) -> usize {
        self.count(|o| matches!(o, Outcome::UnexpectedPass(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} passed, {} failed, {} xfailed, {} xpassed, {} skipped",
            self.passed(),
            self.failed(),
            self.known_failures(),
            self.unexpected_passes(),
            self.skipped()
        )
    }
}

pub struct Harness<B, C> {
    builder: B,
    converter: C,
    config: SuiteConfig,
}

impl<B: GraphBuilder, C: Converter> Harness<B, C> {
    pub fn new(builder: B, converter: C, config: SuiteConfig) -> Self {
        Self {
            builder,
            converter,
            config,
        }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    fn check(&self, case: &MulCase) -> anyhow::Result<Result<(), Vec<String>>> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let constant = case.source_constant(&mut rng)?;
        let (x_src, _) = case.source_shapes();
        let expected = resolve_layout(&x_src, &constant)?;

        let graph = self
            .builder
            .build(&x_src, &constant)
            .with_context(|| format!("building {}", case.name()))?;
        let converted = self
            .converter
            .convert(&graph, &self.config)
            .with_context(|| format!("converting {}", case.name()))?;

        Ok(compare(&expected, &converted, self.config.tolerance))
    }

    pub fn run_case(&self, case: &MulCase) -> Outcome {
        let refs: Vec<String> = case
            .known_failures
            .iter()
            .map(|k| k.reference.clone())
            .collect();
        if case.is_known_failing() && !self.config.run_known_failing {
            return Outcome::Skipped;
        }

        let result = match self.check(case) {
            Ok(r) => r,
            Err(e) => Err(vec![format!("{:#}", e)]),
        };

        let outcome = match (result, refs.is_empty()) {
            (Ok(()), true) => Outcome::Passed,
            (Ok(()), false) => Outcome::UnexpectedPass(refs),
            (Err(reasons), true) => Outcome::Failed(reasons),
            (Err(_), false) => Outcome::KnownFailure(refs),
        };
        if let Outcome::UnexpectedPass(refs) = &outcome {
            warn!("{} passed but is tagged {:?}", case.name(), refs);
        }
        debug!("{}: {}", case.name(), outcome);
        outcome
    }

    pub fn run_suite(&self, suite: &Suite) -> SuiteReport {
        let mut report = SuiteReport::default();
        for (group, case) in suite.cases(&self.config) {
            let outcome = self.run_case(case);
            report.cases.push(CaseReport {
                group: group.to_string(),
                case: case.clone(),
                outcome,
            });
        }
        info!("mul layer suite: {}", report);
        report
    }
}
