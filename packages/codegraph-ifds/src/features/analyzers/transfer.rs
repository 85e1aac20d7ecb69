//! Access-path transfer shared by the taint-style analyzers
//!
//! Locals are passed by value; only facts below a parameter's fields flow
//! back to the caller's argument.

use super::taint_fact::{AccessPath, TaintFact};
use crate::program::{CallExpr, Inst, Operand, Place, Rvalue};

/// Actual argument of a call as seen by a flow function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actual<'a> {
    Local(&'a str),
    Null,
    Constant,
}

/// Pairs every actual with its formal parameter
///
/// A callee whose first parameter is `this` takes the receiver there.
pub fn bind_arguments<'a>(call: &'a CallExpr, params: &'a [String]) -> Vec<(Actual<'a>, &'a str)> {
    let mut formals = params.iter().map(String::as_str).peekable();
    let mut bindings = Vec::with_capacity(params.len());
    if formals.peek() == Some(&"this") {
        formals.next();
        if let Some(receiver) = call.receiver.as_deref() {
            bindings.push((Actual::Local(receiver), "this"));
        }
    }
    for (arg, formal) in call.args.iter().zip(formals) {
        let actual = match arg {
            Operand::Local(local) => Actual::Local(local.as_str()),
            Operand::Null => Actual::Null,
            Operand::Const(_) => Actual::Constant,
        };
        bindings.push((actual, formal));
    }
    bindings
}

/// Facts after a non-call instruction
pub fn forward(inst: Option<&Inst>, fact: &TaintFact, max_len: usize) -> Vec<TaintFact> {
    let (Some(inst), Some(path)) = (inst, fact.path()) else {
        return vec![fact.clone()];
    };
    let Inst::Assign { place, value } = inst else {
        return vec![fact.clone()];
    };

    let mut out = Vec::with_capacity(2);
    match place {
        Place::Local(lhs) => {
            if !path.starts_with_local(lhs) {
                out.push(fact.clone());
            }
            match value {
                Rvalue::Use(Operand::Local(rhs)) if path.starts_with_local(rhs) => {
                    out.push(fact.with_path(path.rebase(lhs)));
                }
                Rvalue::Field { base, field } => {
                    if let Some(rest) = path.strip_field(base, field) {
                        out.push(fact.with_path(AccessPath::new(lhs.as_str(), rest, max_len)));
                    }
                }
                _ => {}
            }
        }
        Place::Field { base, field } => {
            if !path.is_under_field(base, field) {
                out.push(fact.clone());
            }
            if let Rvalue::Use(Operand::Local(rhs)) = value {
                if path.starts_with_local(rhs) {
                    out.push(fact.with_path(path.under_field(base, field, max_len)));
                }
            }
        }
    }
    out
}

/// Facts needed before a non-call instruction, given a fact needed after it
pub fn backward(inst: Option<&Inst>, fact: &TaintFact, max_len: usize) -> Vec<TaintFact> {
    let (Some(inst), Some(path)) = (inst, fact.path()) else {
        return vec![fact.clone()];
    };
    let Inst::Assign { place, value } = inst else {
        return vec![fact.clone()];
    };

    match place {
        Place::Local(lhs) => {
            if !path.starts_with_local(lhs) {
                return vec![fact.clone()];
            }
            match value {
                Rvalue::Use(Operand::Local(rhs)) => vec![fact.with_path(path.rebase(rhs))],
                Rvalue::Field { base, field } => {
                    vec![fact.with_path(path.under_field(base, field, max_len))]
                }
                _ => Vec::new(),
            }
        }
        Place::Field { base, field } => {
            let mut out = vec![fact.clone()];
            if let (Rvalue::Use(Operand::Local(rhs)), Some(rest)) = (value, path.strip_field(base, field)) {
                out.push(fact.with_path(AccessPath::new(rhs.as_str(), rest, max_len)));
            }
            out
        }
    }
}

/// Caller fact → callee start facts
pub fn to_callee(call: &CallExpr, params: &[String], fact: &TaintFact) -> Vec<TaintFact> {
    let Some(path) = fact.path() else {
        return vec![TaintFact::Zero];
    };
    bind_arguments(call, params)
        .into_iter()
        .filter_map(|(actual, formal)| match actual {
            Actual::Local(local) if path.starts_with_local(local) => {
                Some(fact.with_path(path.rebase(formal)))
            }
            _ => None,
        })
        .collect()
}

/// Callee exit fact → caller facts at the return site
pub fn to_caller(
    call: &CallExpr,
    result: Option<&str>,
    params: &[String],
    exit: Option<&Inst>,
    fact: &TaintFact,
) -> Vec<TaintFact> {
    let Some(path) = fact.path() else {
        return vec![TaintFact::Zero];
    };

    let mut out = Vec::new();
    if let (Some(Inst::Return(Some(Operand::Local(returned)))), Some(result)) = (exit, result) {
        if path.starts_with_local(returned) {
            out.push(fact.with_path(path.rebase(result)));
        }
    }
    if !path.fields.is_empty() {
        for (actual, formal) in bind_arguments(call, params) {
            if let Actual::Local(local) = actual {
                if path.starts_with_local(formal) {
                    out.push(fact.with_path(path.rebase(local)));
                }
            }
        }
    }
    out
}
