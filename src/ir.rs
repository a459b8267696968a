use include_dir::{include_dir, Dir};

use crate::case::ExpectedLayout;
use crate::errors::LayerRefError;
use crate::errors::LayerRefError::Template;
use crate::suite::{Precision, SuiteConfig};
use crate::tensor::Tensor;

static TEMPLATE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates");

pub fn to_csv_str<T: ToString>(vals: &[T]) -> String {
    let res: Vec<String> = vals.iter().map(|v| v.to_string()).collect();
    res.join(",")
}

/// Const payload in the element type `precision` stores: f32 as is, FP16
/// as half floats, two bytes per value.
fn encode_weights(constant: &Tensor<f32>, precision: Precision) -> (&'static str, Vec<u8>) {
    match precision {
        Precision::FP32 => ("f32", constant.to_le_bytes()),
        Precision::FP16 => (
            "f16",
            constant
                .values()
                .iter()
                .flat_map(|&v| half::f16::from_f32(v).to_le_bytes())
                .collect(),
        ),
    }
}

/// Reference IR for `Input * Const`: the net xml and its weights blob.
#[derive(Debug, Clone)]
pub struct ReferenceNet {
    pub name: String,
    pub xml: String,
    pub weights: Vec<u8>,
}

impl ReferenceNet {
    /// `x_shape` is the activation shape in channel-first form.
    pub fn render(
        case_name: &str,
        x_shape: &[i64],
        expected: &ExpectedLayout,
        config: &SuiteConfig,
    ) -> Result<Self, LayerRefError> {
        let template = TEMPLATE_DIR
            .get_file("mul_net.xml")
            .and_then(|f| f.contents_utf8())
            .ok_or_else(|| Template("mul_net.xml not found".to_string()))?;

        // unique per render so several nets can share one output directory
        let name = format!("{}_{}", case_name, uuid::Uuid::new_v4().simple());
        let (const_type, weights) = encode_weights(&expected.constant, config.precision);

        let mut tera = tera::Tera::default();
        let mut context = tera::Context::new();
        tera.add_raw_template("mul_net", template)
            .map_err(|e| Template(e.to_string()))?;

        context.insert("name", &name);
        context.insert("ir_version", &config.ir_version);
        context.insert("precision", &config.precision.to_string());
        context.insert("x_shape", &to_csv_str(x_shape));
        context.insert("x_dims", x_shape);
        context.insert("const_type", const_type);
        context.insert("const_shape", &to_csv_str(expected.constant.shape()));
        context.insert("const_dims", expected.constant.shape());
        context.insert("const_size", &weights.len());
        context.insert("out_dims", &expected.reported_shape);

        let xml = tera
            .render("mul_net", &context)
            .map_err(|e| Template(e.to_string()))?;

        Ok(Self { name, xml, weights })
    }
}

#[cfg(test)]
mod test {
    use crate::case::{Lowering, MulCase};
    use crate::suite::Precision;

    use super::*;

    #[test]
    fn render_scale_shift() -> Result<(), LayerRefError> {
        let case = MulCase::new(vec![1, 3, 100, 224], vec![3], Lowering::ScaleShift);
        let expected = case.expected_layout(0)?;
        let config = SuiteConfig {
            precision: Precision::FP16,
            ..SuiteConfig::default()
        };
        let net = ReferenceNet::render(&case.name(), &case.x_shape, &expected, &config)?;

        assert!(net.name.starts_with("x1x3x100x224_y3_"));
        assert_eq!(net.weights.len(), 3 * 2);
        assert!(net.xml.contains(r#"<net name="x1x3x100x224_y3_"#));
        assert!(net.xml.contains(r#"version="10""#));
        assert!(net.xml.contains(r#"<data shape="1,3,100,224" element_type="f32"/>"#));
        assert!(net.xml.contains(r#"element_type="f16" shape="1,3,1,1" offset="0" size="6""#));
        let first = half::f16::from_le_bytes([net.weights[0], net.weights[1]]);
        assert_eq!(first.to_f32(), expected.constant.values()[0]);
        assert!(net.xml.contains(r#"precision="FP16""#));
        assert!(net.xml.contains("<dim>224</dim>"));
        assert_eq!(net.xml.matches("<edge ").count(), 3);
        Ok(())
    }

    #[test]
    fn fp32_weights_are_raw_values() -> Result<(), LayerRefError> {
        let case = MulCase::new(vec![1, 3, 1, 1], vec![3, 1], Lowering::Eltwise);
        let expected = case.expected_layout(7)?;
        let config = SuiteConfig::default();
        let net = ReferenceNet::render(&case.name(), &case.x_shape, &expected, &config)?;

        let data = format!(
            r#"element_type="f32" shape="{}" offset="0" size="{}""#,
            to_csv_str(expected.constant.shape()),
            expected.constant.len() * 4
        );
        assert_eq!(net.weights, expected.constant.to_le_bytes());
        assert!(net.xml.contains(&data));
        Ok(())
    }

    #[test]
    fn names_are_unique() -> Result<(), LayerRefError> {
        let case = MulCase::new(vec![1, 1], vec![1], Lowering::Power);
        let expected = case.expected_layout(0)?;
        let config = SuiteConfig::default();
        let a = ReferenceNet::render(&case.name(), &case.x_shape, &expected, &config)?;
        let b = ReferenceNet::render(&case.name(), &case.x_shape, &expected, &config)?;
        assert_ne!(a.name, b.name);
        assert_eq!(a.weights, b.weights);
        Ok(())
    }

    #[test]
    fn csv() {
        assert_eq!(to_csv_str(&[1, 3, 224]), "1,3,224");
        assert_eq!(to_csv_str::<i64>(&[]), "");
    }
}
