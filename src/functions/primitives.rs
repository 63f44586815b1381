use crate::functions::traits::Primitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Division that returns the numerator when the denominator is exactly zero.
pub fn safe_div(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        a
    } else {
        a / b
    }
}

/// `b - a` if `a < b`, else 0. Gives evolution a graded "less than".
pub fn less_than_step(a: f64, b: f64) -> f64 {
    if a < b {
        b - a
    } else {
        0.0
    }
}

// --- Arithmetic ---
pub struct Add;
impl Primitive for Add {
    fn alias(&self) -> &'static str { "add" }
    fn arity(&self) -> usize { 2 }
    fn infix(&self) -> Option<(&'static str, u8)> { Some(("+", 1)) }
    fn apply(&self, args: &[f64]) -> f64 {
        args[0] + args[1]
    }
    fn generate_c(&self, args: &[String]) -> String {
        format!("{} + {}", args[0], args[1])
    }
}

pub struct Sub;
impl Primitive for Sub {
    fn alias(&self) -> &'static str { "sub" }
    fn arity(&self) -> usize { 2 }
    fn infix(&self) -> Option<(&'static str, u8)> { Some(("-", 1)) }
    fn apply(&self, args: &[f64]) -> f64 {
        args[0] - args[1]
    }
    fn generate_c(&self, args: &[String]) -> String {
        format!("{} - {}", args[0], args[1])
    }
}

pub struct Mul;
impl Primitive for Mul {
    fn alias(&self) -> &'static str { "mul" }
    fn arity(&self) -> usize { 2 }
    fn infix(&self) -> Option<(&'static str, u8)> { Some(("*", 2)) }
    fn apply(&self, args: &[f64]) -> f64 {
        args[0] * args[1]
    }
    fn generate_c(&self, args: &[String]) -> String {
        format!("{} * {}", args[0], args[1])
    }
}

// --- Branching ---
pub struct Max;
impl Primitive for Max {
    fn alias(&self) -> &'static str { "max" }
    fn arity(&self) -> usize { 2 }
    fn is_branching(&self) -> bool { true }
    fn apply(&self, args: &[f64]) -> f64 {
        args[0].max(args[1])
    }
    fn generate_c(&self, args: &[String]) -> String {
        format!("MAX({}, {})", args[0], args[1])
    }
}

pub struct Min;
impl Primitive for Min {
    fn alias(&self) -> &'static str { "min" }
    fn arity(&self) -> usize { 2 }
    fn is_branching(&self) -> bool { true }
    fn apply(&self, args: &[f64]) -> f64 {
        args[0].min(args[1])
    }
    fn generate_c(&self, args: &[String]) -> String {
        format!("MIN({}, {})", args[0], args[1])
    }
}

pub struct Abs;
impl Primitive for Abs {
    fn alias(&self) -> &'static str { "abs" }
    fn arity(&self) -> usize { 1 }
    fn is_branching(&self) -> bool { true }
    fn apply(&self, args: &[f64]) -> f64 {
        args[0].abs()
    }
    fn generate_c(&self, args: &[String]) -> String {
        format!("ABS({})", args[0])
    }
}

pub struct LessThanStep;
impl Primitive for LessThanStep {
    fn alias(&self) -> &'static str { "lts" }
    fn arity(&self) -> usize { 2 }
    fn is_branching(&self) -> bool { true }
    fn apply(&self, args: &[f64]) -> f64 {
        less_than_step(args[0], args[1])
    }
    fn generate_c(&self, args: &[String]) -> String {
        format!("LTS({}, {})", args[0], args[1])
    }
}

pub struct SafeDiv;
impl Primitive for SafeDiv {
    fn alias(&self) -> &'static str { "sd" }
    fn arity(&self) -> usize { 2 }
    fn is_branching(&self) -> bool { true }
    fn apply(&self, args: &[f64]) -> f64 {
        safe_div(args[0], args[1])
    }
    fn generate_c(&self, args: &[String]) -> String {
        format!("SD({}, {})", args[0], args[1])
    }
}

/// The closed operator set expression trees are built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Max,
    Min,
    Abs,
    Lts,
    Sd,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Max,
        Operator::Min,
        Operator::Abs,
        Operator::Lts,
        Operator::Sd,
    ];

    pub fn primitive(self) -> &'static dyn Primitive {
        match self {
            Operator::Add => &Add,
            Operator::Sub => &Sub,
            Operator::Mul => &Mul,
            Operator::Max => &Max,
            Operator::Min => &Min,
            Operator::Abs => &Abs,
            Operator::Lts => &LessThanStep,
            Operator::Sd => &SafeDiv,
        }
    }

    pub fn alias(self) -> &'static str {
        self.primitive().alias()
    }

    pub fn arity(self) -> usize {
        self.primitive().arity()
    }

    /// Two-argument fast path, avoids building an argument slice per sample.
    #[inline]
    pub fn apply2(self, a: f64, b: f64) -> f64 {
        match self {
            Operator::Add => a + b,
            Operator::Sub => a - b,
            Operator::Mul => a * b,
            Operator::Max => a.max(b),
            Operator::Min => a.min(b),
            Operator::Abs => a.abs(),
            Operator::Lts => less_than_step(a, b),
            Operator::Sd => safe_div(a, b),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.alias())
    }
}
