pub mod ast;
pub mod hill_climb;
pub mod parser;
pub mod progress;
pub mod report_queue;
pub mod seeding;

pub use ast::ExpressionNode;
pub use hill_climb::{HillClimber, RefinementResult};
pub use parser::FormulaParser;
pub use progress::{LogReporter, SolutionReport};
pub use report_queue::{Improvement, ImprovementTracker, ReportConsumer, ReportQueue, ReportSender};
pub use seeding::{bisect_for_minimum, InitialValue, RankedSeed, SeedRanker, SeedingOutcome};
