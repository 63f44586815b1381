use std::collections::HashMap;

use super::primitives::Operator;
use super::traits::Primitive;

pub struct FunctionRegistry {
    functions: HashMap<&'static str, Operator>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };
        registry.register_primitives();
        registry
    }

    fn register_primitives(&mut self) {
        for op in Operator::ALL {
            self.functions.insert(op.alias(), op);
        }
        // formulas exported by other tools spell safe division as `div`
        self.functions.insert("div", Operator::Sd);
    }

    pub fn get_operator(&self, name: &str) -> Option<Operator> {
        self.functions.get(name).copied()
    }

    pub fn get_primitive(&self, name: &str) -> Option<&'static dyn Primitive> {
        self.get_operator(name).map(Operator::primitive)
    }

    /// Operators that lower to a branch in C
    pub fn branching(&self) -> Vec<Operator> {
        Operator::ALL
            .iter()
            .copied()
            .filter(|op| op.primitive().is_branching())
            .collect()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
