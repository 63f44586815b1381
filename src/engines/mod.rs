pub mod codegen;
pub mod evaluation;
pub mod generation;
