use crate::config::CodegenConfig;
use crate::engines::codegen::common::{self, FeatureSchema, INDENTATION};
use crate::engines::codegen::decision_tree::DecisionTreeNode;
use crate::error::Result;
use crate::types::Mode;

/// Lowers a tree to a single nested conditional expression.
pub(crate) struct TernaryGenerator<'a> {
    schema: &'a FeatureSchema,
    config: &'a CodegenConfig,
}

impl<'a> TernaryGenerator<'a> {
    pub(crate) fn new(schema: &'a FeatureSchema, config: &'a CodegenConfig) -> Self {
        Self { schema, config }
    }

    pub(crate) fn generate(&self, root: &DecisionTreeNode, mode: Mode, doc: &str) -> Result<String> {
        let expression = self.expression(root, 1)?;

        let mut out = String::new();
        out.push_str("\n/**\n");
        out.push_str(" * Auto-generated decision tree prediction function.\n");
        out.push_str(&format!(
            " * At most {} comparisons are necessary to get a result.\n",
            self.config.max_depth
        ));
        out.push_str(" *\n");
        for line in doc.lines().filter(|l| !l.trim().is_empty()) {
            out.push_str(&format!(" * {}\n", line.trim()));
        }
        out.push_str(" *\n");
        out.push_str(&format!(" * @return {}\n", common::return_doc(mode, self.config)));
        out.push_str(" */\n");
        out.push_str(&common::header(mode, self.config));
        out.push('\n');
        out.push_str("    // clang-format off\n");
        out.push_str(&format!("return {};\n", expression));
        out.push_str("    // clang-format on\n");
        out.push_str("}\n");
        Ok(out)
    }

    /// Only the bare expression, without the function around it.
    pub(crate) fn expression(&self, node: &DecisionTreeNode, level: usize) -> Result<String> {
        match node {
            DecisionTreeNode::Leaf { output, counts } => {
                Ok(common::leaf_token(*output, counts, self.config))
            }
            DecisionTreeNode::Split {
                feature,
                threshold,
                true_child,
                false_child,
            } => {
                let name = self.schema.name(*feature)?;
                let t = self.expression(true_child, level + 1)?;
                let f = self.expression(false_child, level + 1)?;
                let value =
                    common::format_threshold(*threshold, self.schema.is_fractional(*feature), self.config);

                let optimizable = self.config.is_optimizable();
                if optimizable && t == "1" && f == "0" {
                    return Ok(format!("{} <= {}", name, value));
                }
                if optimizable && t == "0" && f == "1" {
                    return Ok(format!("{} > {}", name, value));
                }

                let indent = INDENTATION.repeat(level);
                Ok(format!(
                    "(\n{indent}{name} <= {value}\n{indent}? {t}\n{indent}: {f}\n{close})",
                    indent = indent,
                    name = name,
                    value = value,
                    t = common::num_to_bool(&t, self.config),
                    f = common::num_to_bool(&f, self.config),
                    close = INDENTATION.repeat(level - 1),
                ))
            }
        }
    }
}
