use crate::config::CodegenConfig;
use crate::engines::codegen::common::{self, FeatureSchema};
use crate::engines::codegen::decision_tree::DecisionTreeNode;
use crate::error::{Result, TapholdError};
use crate::types::Mode;

/// Lowers a tree to straight-line code that selects between subtree results
/// with bitmasks.
pub(crate) struct BranchlessGenerator<'a> {
    schema: &'a FeatureSchema,
    config: &'a CodegenConfig,
    result_type: &'static str,
    next_id: usize,
    body: String,
}

impl<'a> BranchlessGenerator<'a> {
    pub(crate) fn new(schema: &'a FeatureSchema, config: &'a CodegenConfig) -> Self {
        Self {
            schema,
            config,
            result_type: common::result_type(config),
            next_id: 0,
            body: String::new(),
        }
    }

    pub(crate) fn generate(mut self, root: &DecisionTreeNode, mode: Mode) -> Result<String> {
        if self.config.output_probability {
            return Err(TapholdError::Codegen(
                "branchless code needs class-label leaves".to_string(),
            ));
        }

        let result = self.node(root)?;

        let mut out = String::new();
        out.push_str("/**\n");
        out.push_str(" * Auto-generated branchless decision tree prediction function.\n");
        out.push_str(" */\n");
        out.push_str(&common::header(mode, self.config));
        out.push('\n');
        out.push_str(&self.body);
        out.push_str(&format!("    return {};\n", result));
        out.push_str("}\n");
        Ok(out)
    }

    /// Emits the statements of a subtree and returns the expression holding
    /// its result.
    fn node(&mut self, node: &DecisionTreeNode) -> Result<String> {
        match node {
            DecisionTreeNode::Leaf { output, .. } => {
                if output.fract() != 0.0 || !output.is_finite() {
                    return Err(TapholdError::Codegen(format!(
                        "branchless code needs integral leaves, got {}",
                        output
                    )));
                }
                Ok(common::format_output(*output))
            }
            DecisionTreeNode::Split {
                feature,
                threshold,
                true_child,
                false_child,
            } => {
                let true_result = self.node(true_child)?;
                let false_result = self.node(false_child)?;

                let id = self.next_id;
                self.next_id += 1;

                let name = self.schema.name(*feature)?;
                let value =
                    common::format_threshold(*threshold, self.schema.is_fractional(*feature), self.config);
                let ty = self.result_type;

                self.body.push('\n');
                if true_result == "1" && false_result == "0" {
                    self.body
                        .push_str(&format!("    {} result_{} = {} <= {};\n", ty, id, name, value));
                } else if true_result == "0" && false_result == "1" {
                    self.body
                        .push_str(&format!("    {} result_{} = {} > {};\n", ty, id, name, value));
                } else {
                    self.body.push_str(&format!(
                        "    {} condition_{} = {} <= {};\n",
                        ty, id, name, value
                    ));
                    self.body
                        .push_str(&format!("    {} mask_{} = -condition_{};\n", ty, id, id));
                    self.body.push_str(&format!(
                        "    {} result_{} = ({} & ~mask_{}) | ({} & mask_{});\n",
                        ty, id, false_result, id, true_result, id
                    ));
                }

                Ok(format!("result_{}", id))
            }
        }
    }
}
