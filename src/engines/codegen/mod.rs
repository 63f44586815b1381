pub mod branchless;
pub mod common;
pub mod decision_tree;
pub mod formula;
pub mod ternary;

pub use common::FeatureSchema;
pub use decision_tree::DecisionTreeNode;
pub use formula::{expression_function, expression_to_c};

use crate::config::{Backend, CodegenConfig};
use crate::error::Result;
use crate::types::Mode;
use branchless::BranchlessGenerator;
use ternary::TernaryGenerator;

/// Compiles decision trees into C prediction functions.
///
/// Output depends only on the tree, schema, config and mode; compiling the
/// same tree twice gives identical text.
pub struct TreeCompiler {
    schema: FeatureSchema,
    config: CodegenConfig,
    mode: Mode,
}

impl TreeCompiler {
    pub fn new(schema: FeatureSchema, config: CodegenConfig, mode: Mode) -> Self {
        Self {
            schema,
            config,
            mode,
        }
    }

    pub fn for_mode(mode: Mode, config: CodegenConfig) -> Self {
        Self::new(FeatureSchema::for_mode(mode), config, mode)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn config(&self) -> &CodegenConfig {
        &self.config
    }

    pub fn compile(&self, root: &DecisionTreeNode) -> Result<String> {
        self.compile_with_doc(root, "")
    }

    /// Like [`TreeCompiler::compile`]; non-blank lines of `doc` go into the
    /// doc comment of the ternary backend.
    pub fn compile_with_doc(&self, root: &DecisionTreeNode, doc: &str) -> Result<String> {
        root.validate(self.schema.len())?;
        if root.depth() > self.config.max_depth {
            log::warn!(
                "Tree depth {} exceeds the documented maximum of {}",
                root.depth(),
                self.config.max_depth
            );
        }

        match self.config.backend {
            Backend::Branchless => {
                BranchlessGenerator::new(&self.schema, &self.config).generate(root, self.mode)
            }
            Backend::Ternary => {
                TernaryGenerator::new(&self.schema, &self.config).generate(root, self.mode, doc)
            }
        }
    }

    /// The nested conditional alone, as used in the ternary function body.
    pub fn ternary_expression(&self, root: &DecisionTreeNode) -> Result<String> {
        root.validate(self.schema.len())?;
        TernaryGenerator::new(&self.schema, &self.config).expression(root, 1)
    }
}
