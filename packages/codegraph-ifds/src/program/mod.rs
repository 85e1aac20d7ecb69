//! Small three-address program model analyzed by the bundled analyzers
//!
//! Methods are named `pkg.Class.method`, statements are instruction
//! indices. Calls resolve by name against the program's own methods; any
//! other callee (library code) has no body and no callees.

pub mod graph;
pub mod inst;

pub use graph::{MethodBody, MethodId, ProgramBuilder, ProgramGraph, StmtId};
pub use inst::{CallExpr, Condition, Inst, Operand, Place, Rvalue};

use crate::features::ifds::infrastructure::ReversedGraph;
use crate::features::ifds::ports::ApplicationGraph;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("method {0} is defined twice")]
    DuplicateMethod(String),

    #[error("{method}#{index}: jump target {target} is out of bounds")]
    InvalidJumpTarget {
        method: String,
        index: usize,
        target: usize,
    },
}

/// Instruction-level access on top of the control-flow view
pub trait ProgramView: ApplicationGraph<Method = MethodId, Statement = StmtId> {
    fn inst(&self, statement: &StmtId) -> Option<&Inst>;

    fn parameters(&self, method: &MethodId) -> &[String];
}

impl<G: ProgramView> ProgramView for ReversedGraph<G> {
    fn inst(&self, statement: &StmtId) -> Option<&Inst> {
        self.inner().inst(statement)
    }

    fn parameters(&self, method: &MethodId) -> &[String] {
        self.inner().parameters(method)
    }
}
