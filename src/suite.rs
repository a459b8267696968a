use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};

use crate::case::MulCase;
use crate::errors::LayerRefError;
use crate::errors::LayerRefError::{CaseTable, Config, UnknownGroup};

static CASES_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/cases");

const TABLE_PREFIX: &str = "mul_placeholder_const_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    FP32,
    FP16,
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::FP32 => write!(f, "FP32"),
            Precision::FP16 => write!(f, "FP16"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Seed for the constant operand values.
    pub seed: u64,
    pub ir_version: u32,
    pub precision: Precision,
    pub device: String,
    pub run_known_failing: bool,
    /// Absolute tolerance for constant values. 0 means exact.
    pub tolerance: f32,
    /// Only run these groups when set.
    pub groups: Option<Vec<String>>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            ir_version: 10,
            precision: Precision::FP32,
            device: "CPU".to_string(),
            run_known_failing: true,
            tolerance: 0.0,
            groups: None,
        }
    }
}

impl SuiteConfig {
    pub fn from_json_str(s: &str) -> Result<Self, LayerRefError> {
        let config: SuiteConfig = serde_json::from_str(s).map_err(|e| Config(e.to_string()))?;
        if config.tolerance < 0.0 {
            return Err(Config(format!(
                "tolerance must not be negative, got {}",
                config.tolerance
            )));
        }
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, LayerRefError> {
        let s = std::fs::read_to_string(path.as_ref()).map_err(|e| Config(e.to_string()))?;
        Self::from_json_str(&s)
    }

    pub fn selects(&self, group: &str) -> bool {
        match &self.groups {
            None => true,
            Some(groups) => groups.iter().any(|g| g == group),
        }
    }
}

/// Case tables keyed by group name (`4D`, `broadcast_3D`, ...).
#[derive(Debug, Clone, Default)]
pub struct Suite {
    groups: BTreeMap<String, Vec<MulCase>>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables shipped with the crate.
    pub fn embedded() -> Result<Self, LayerRefError> {
        let mut suite = Suite::new();
        for file in CASES_DIR.files() {
            let stem = file
                .path()
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| CaseTable(format!("bad table name {:?}", file.path())))?;
            let group = stem.strip_prefix(TABLE_PREFIX).unwrap_or(stem);
            let contents = file
                .contents_utf8()
                .ok_or_else(|| CaseTable(format!("{} is not valid utf-8", stem)))?;
            suite.add_table(group, contents)?;
        }
        Ok(suite)
    }

    pub fn add_table(&mut self, group: &str, json: &str) -> Result<(), LayerRefError> {
        let cases: Vec<MulCase> =
            serde_json::from_str(json).map_err(|e| CaseTable(format!("{}: {}", group, e)))?;
        for case in &cases {
            if case.x_shape.iter().chain(case.y_shape.iter()).any(|&d| d < 1) {
                return Err(CaseTable(format!(
                    "{}: dimensions must be positive in {}",
                    group,
                    case.name()
                )));
            }
        }
        self.groups.insert(group.to_string(), cases);
        Ok(())
    }

    pub fn add_case(&mut self, group: &str, case: MulCase) {
        self.groups.entry(group.to_string()).or_default().push(case);
    }

    pub fn group(&self, name: &str) -> Result<&[MulCase], LayerRefError> {
        self.groups
            .get(name)
            .map(|v| v.as_slice())
            .ok_or_else(|| UnknownGroup(name.to_string()))
    }

    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(|k| k.as_str()).collect()
    }

    /// All cases in group order, restricted to the groups `config` selects.
    pub fn cases<'a>(
        &'a self,
        config: &'a SuiteConfig,
    ) -> impl Iterator<Item = (&'a str, &'a MulCase)> {
        self.groups
            .iter()
            .filter(move |(g, _)| config.selects(g))
            .flat_map(|(g, cases)| cases.iter().map(move |c| (g.as_str(), c)))
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
