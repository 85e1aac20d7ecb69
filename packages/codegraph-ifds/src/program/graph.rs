//! In-memory program graph

use super::inst::Inst;
use super::{ProgramError, ProgramView};
use crate::features::ifds::infrastructure::QualifiedMethod;
use crate::features::ifds::ports::ApplicationGraph;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Qualified method name, `pkg.Class.method`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(Arc<str>);

impl MethodId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Last dotted segment
    pub fn simple_name(&self) -> &str {
        let name: &str = &self.0;
        name.rsplit_once('.').map_or(name, |(_, simple)| simple)
    }
}

impl QualifiedMethod for MethodId {
    fn class_name(&self) -> &str {
        self.0.rsplit_once('.').map_or("", |(class, _)| class)
    }

    fn package_name(&self) -> &str {
        let class = self.class_name();
        class.rsplit_once('.').map_or("", |(package, _)| package)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Statement = instruction index inside a method
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId {
    pub method: MethodId,
    pub index: usize,
}

impl StmtId {
    pub fn new(method: MethodId, index: usize) -> Self {
        Self { method, index }
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.method, self.index)
    }
}

#[derive(Debug, Clone)]
pub struct MethodBody {
    pub id: MethodId,
    pub params: Vec<String>,
    pub insts: Vec<Inst>,
}

#[derive(Debug, Default)]
pub struct ProgramGraph {
    methods: FxHashMap<MethodId, MethodBody>,
    callers: FxHashMap<MethodId, Vec<StmtId>>,
    predecessors: FxHashMap<StmtId, Vec<StmtId>>,
}

impl ProgramGraph {
    pub fn method(&self, id: &MethodId) -> Option<&MethodBody> {
        self.methods.get(id)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodId> + '_ {
        self.methods.keys()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    fn successor_indices(inst: &Inst, index: usize, len: usize) -> Vec<usize> {
        match inst {
            Inst::Goto(target) => vec![*target],
            Inst::If {
                then_target,
                else_target,
                ..
            } if then_target == else_target => vec![*then_target],
            Inst::If {
                then_target,
                else_target,
                ..
            } => vec![*then_target, *else_target],
            Inst::Return(_) => Vec::new(),
            _ if index + 1 < len => vec![index + 1],
            _ => Vec::new(),
        }
    }

    fn resolve_callee(&self, inst: &Inst) -> Option<MethodId> {
        let call = inst.call_expr()?;
        let callee = MethodId::new(&call.callee);
        self.methods.contains_key(&callee).then_some(callee)
    }
}

impl ApplicationGraph for ProgramGraph {
    type Method = MethodId;
    type Statement = StmtId;

    fn successors(&self, statement: &StmtId) -> Vec<StmtId> {
        let Some(body) = self.methods.get(&statement.method) else {
            return Vec::new();
        };
        let Some(inst) = body.insts.get(statement.index) else {
            return Vec::new();
        };
        Self::successor_indices(inst, statement.index, body.insts.len())
            .into_iter()
            .map(|index| StmtId::new(statement.method.clone(), index))
            .collect()
    }

    fn predecessors(&self, statement: &StmtId) -> Vec<StmtId> {
        self.predecessors.get(statement).cloned().unwrap_or_default()
    }

    fn callees(&self, statement: &StmtId) -> Vec<MethodId> {
        self.inst(statement)
            .and_then(|inst| self.resolve_callee(inst))
            .into_iter()
            .collect()
    }

    fn callers(&self, method: &MethodId) -> Vec<StmtId> {
        self.callers.get(method).cloned().unwrap_or_default()
    }

    fn entry_points(&self, method: &MethodId) -> Vec<StmtId> {
        match self.methods.get(method) {
            Some(body) if !body.insts.is_empty() => vec![StmtId::new(method.clone(), 0)],
            _ => Vec::new(),
        }
    }

    fn exit_points(&self, method: &MethodId) -> Vec<StmtId> {
        let Some(body) = self.methods.get(method) else {
            return Vec::new();
        };
        body.insts
            .iter()
            .enumerate()
            .filter(|(_, inst)| matches!(inst, Inst::Return(_)))
            .map(|(index, _)| StmtId::new(method.clone(), index))
            .collect()
    }

    fn method_of(&self, statement: &StmtId) -> MethodId {
        statement.method.clone()
    }

    fn statements(&self, method: &MethodId) -> Vec<StmtId> {
        let len = self.methods.get(method).map_or(0, |body| body.insts.len());
        (0..len).map(|index| StmtId::new(method.clone(), index)).collect()
    }

    fn is_call(&self, statement: &StmtId) -> bool {
        self.inst(statement).is_some_and(Inst::is_call)
    }
}

impl ProgramView for ProgramGraph {
    fn inst(&self, statement: &StmtId) -> Option<&Inst> {
        self.methods.get(&statement.method)?.insts.get(statement.index)
    }

    fn parameters(&self, method: &MethodId) -> &[String] {
        self.methods
            .get(method)
            .map(|body| body.params.as_slice())
            .unwrap_or(&[])
    }
}

/// Builds a `ProgramGraph`; bodies without a trailing return get one
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    methods: Vec<MethodBody>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method; `this` as first parameter marks an instance method
    pub fn method(mut self, name: &str, params: &[&str], insts: Vec<Inst>) -> Self {
        self.methods.push(MethodBody {
            id: MethodId::new(name),
            params: params.iter().map(|p| p.to_string()).collect(),
            insts,
        });
        self
    }

    pub fn build(self) -> Result<ProgramGraph, ProgramError> {
        let mut graph = ProgramGraph::default();

        for mut body in self.methods {
            if body.insts.last().map_or(true, Inst::falls_through) {
                body.insts.push(Inst::Return(None));
            }
            let len = body.insts.len();
            for (index, inst) in body.insts.iter().enumerate() {
                let targets: &[usize] = match inst {
                    Inst::Goto(target) => std::slice::from_ref(target),
                    Inst::If {
                        then_target,
                        else_target,
                        ..
                    } => &[*then_target, *else_target],
                    _ => &[],
                };
                if let Some(target) = targets.iter().find(|target| **target >= len) {
                    return Err(ProgramError::InvalidJumpTarget {
                        method: body.id.to_string(),
                        index,
                        target: *target,
                    });
                }
            }
            if graph.methods.contains_key(&body.id) {
                return Err(ProgramError::DuplicateMethod(body.id.to_string()));
            }
            graph.methods.insert(body.id.clone(), body);
        }

        let mut callers: FxHashMap<MethodId, Vec<StmtId>> = FxHashMap::default();
        let mut predecessors: FxHashMap<StmtId, Vec<StmtId>> = FxHashMap::default();
        for body in graph.methods.values() {
            let len = body.insts.len();
            for (index, inst) in body.insts.iter().enumerate() {
                let statement = StmtId::new(body.id.clone(), index);
                if let Some(callee) = graph.resolve_callee(inst) {
                    callers.entry(callee).or_default().push(statement.clone());
                }
                for next in ProgramGraph::successor_indices(inst, index, len) {
                    predecessors
                        .entry(StmtId::new(body.id.clone(), next))
                        .or_default()
                        .push(statement.clone());
                }
            }
        }
        for statements in callers.values_mut() {
            statements.sort();
        }
        graph.callers = callers;
        graph.predecessors = predecessors;
        Ok(graph)
    }
}
