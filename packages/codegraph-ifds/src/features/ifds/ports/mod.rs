//! Ports: traits at the seams between the engine and its collaborators

pub mod analyzer;
pub mod application_graph;
pub mod flow;
pub mod manager_port;

pub use analyzer::{Analyzer, AnalyzerEvent, AnalyzerFactory, EventOf};
pub use application_graph::{ApplicationGraph, EdgeOf, ReasonOf, UnitResolver, VertexOf};
pub use flow::{
    BoxedFlowFunction, FlowFunction, FlowFunctions, IdentityFlowFunction, KillFlowFunction,
};
pub use manager_port::{ManagerPortRef, UnitManagerPort};
