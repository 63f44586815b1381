pub mod primitives;
pub mod registry;
pub mod traits;

pub use primitives::{safe_div, Operator};
pub use registry::FunctionRegistry;
pub use traits::Primitive;
