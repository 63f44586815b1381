/// Primitive function usable as an inner node of an expression tree
pub trait Primitive: Send + Sync {
    /// Name used in formulas, e.g. `sd`
    fn alias(&self) -> &'static str;

    fn arity(&self) -> usize;

    /// Infix symbol and binding strength, for operators written between operands
    fn infix(&self) -> Option<(&'static str, u8)> {
        None
    }

    /// Whether the lowered C code needs a comparison/branch for this primitive
    fn is_branching(&self) -> bool {
        false
    }

    /// Evaluate on scalar arguments (`args.len() == arity()`)
    fn apply(&self, args: &[f64]) -> f64;

    /// Generate C code from already rendered operands
    fn generate_c(&self, args: &[String]) -> String;
}
