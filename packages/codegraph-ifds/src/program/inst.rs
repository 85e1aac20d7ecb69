//! Three-address instruction set of the reference program model

/// Value read by an instruction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Local(String),
    Null,
    Const(String),
}

impl Operand {
    pub fn local(name: impl Into<String>) -> Self {
        Operand::Local(name.into())
    }

    pub fn constant(value: impl Into<String>) -> Self {
        Operand::Const(value.into())
    }

    pub fn as_local(&self) -> Option<&str> {
        match self {
            Operand::Local(name) => Some(name),
            _ => None,
        }
    }
}

/// Assignment target
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Place {
    Local(String),
    Field { base: String, field: String },
}

impl Place {
    /// The local the place is rooted at
    pub fn base(&self) -> &str {
        match self {
            Place::Local(name) => name,
            Place::Field { base, .. } => base,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallExpr {
    /// Qualified callee name; resolved against the program's methods
    pub callee: String,
    pub receiver: Option<String>,
    pub args: Vec<Operand>,
}

impl CallExpr {
    /// Locals passed as arguments, in argument order
    pub fn arg_locals(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.args
            .iter()
            .enumerate()
            .filter_map(|(index, arg)| arg.as_local().map(|local| (index, local)))
    }

    /// Whether `local` flows into the call as receiver or argument
    pub fn uses_local(&self, local: &str) -> bool {
        self.receiver.as_deref() == Some(local) || self.arg_locals().any(|(_, arg)| arg == local)
    }
}

/// Right-hand side of an assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rvalue {
    Use(Operand),
    Field { base: String, field: String },
    New(String),
    Call(CallExpr),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    IsNull(String),
    NotNull(String),
    /// Any other branch condition over the listed locals
    Opaque(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Inst {
    Assign { place: Place, value: Rvalue },
    /// Call whose result is discarded
    Invoke(CallExpr),
    If {
        condition: Condition,
        then_target: usize,
        else_target: usize,
    },
    Goto(usize),
    Return(Option<Operand>),
    Nop,
}

impl Inst {
    pub fn assign(lhs: &str, value: Rvalue) -> Self {
        Inst::Assign {
            place: Place::Local(lhs.to_string()),
            value,
        }
    }

    /// `lhs = rhs`
    pub fn copy(lhs: &str, rhs: &str) -> Self {
        Self::assign(lhs, Rvalue::Use(Operand::local(rhs)))
    }

    /// `lhs = null`
    pub fn null(lhs: &str) -> Self {
        Self::assign(lhs, Rvalue::Use(Operand::Null))
    }

    /// `lhs = "value"`
    pub fn constant(lhs: &str, value: &str) -> Self {
        Self::assign(lhs, Rvalue::Use(Operand::constant(value)))
    }

    /// `lhs = new class()`
    pub fn new_object(lhs: &str, class: &str) -> Self {
        Self::assign(lhs, Rvalue::New(class.to_string()))
    }

    /// `lhs = base.field`
    pub fn load(lhs: &str, base: &str, field: &str) -> Self {
        Self::assign(
            lhs,
            Rvalue::Field {
                base: base.to_string(),
                field: field.to_string(),
            },
        )
    }

    /// `base.field = value`
    pub fn store(base: &str, field: &str, value: Operand) -> Self {
        Inst::Assign {
            place: Place::Field {
                base: base.to_string(),
                field: field.to_string(),
            },
            value: Rvalue::Use(value),
        }
    }

    /// `[result =] callee(args)`
    pub fn call(result: Option<&str>, callee: &str, args: Vec<Operand>) -> Self {
        Self::from_call(
            result,
            CallExpr {
                callee: callee.to_string(),
                receiver: None,
                args,
            },
        )
    }

    /// `[result =] receiver.callee(args)`
    pub fn virtual_call(result: Option<&str>, receiver: &str, callee: &str, args: Vec<Operand>) -> Self {
        Self::from_call(
            result,
            CallExpr {
                callee: callee.to_string(),
                receiver: Some(receiver.to_string()),
                args,
            },
        )
    }

    fn from_call(result: Option<&str>, call: CallExpr) -> Self {
        match result {
            Some(lhs) => Self::assign(lhs, Rvalue::Call(call)),
            None => Inst::Invoke(call),
        }
    }

    pub fn if_null(local: &str, then_target: usize, else_target: usize) -> Self {
        Inst::If {
            condition: Condition::IsNull(local.to_string()),
            then_target,
            else_target,
        }
    }

    pub fn if_not_null(local: &str, then_target: usize, else_target: usize) -> Self {
        Inst::If {
            condition: Condition::NotNull(local.to_string()),
            then_target,
            else_target,
        }
    }

    pub fn ret(local: &str) -> Self {
        Inst::Return(Some(Operand::local(local)))
    }

    pub fn ret_null() -> Self {
        Inst::Return(Some(Operand::Null))
    }

    pub fn ret_void() -> Self {
        Inst::Return(None)
    }

    pub fn call_expr(&self) -> Option<&CallExpr> {
        match self {
            Inst::Assign {
                value: Rvalue::Call(call),
                ..
            } => Some(call),
            Inst::Invoke(call) => Some(call),
            _ => None,
        }
    }

    pub fn is_call(&self) -> bool {
        self.call_expr().is_some()
    }

    /// Local receiving a call result
    pub fn result_local(&self) -> Option<&str> {
        match self {
            Inst::Assign {
                place: Place::Local(lhs),
                value: Rvalue::Call(_),
            } => Some(lhs),
            _ => None,
        }
    }

    /// Local (re)defined by the instruction
    pub fn defined_local(&self) -> Option<&str> {
        match self {
            Inst::Assign {
                place: Place::Local(lhs),
                ..
            } => Some(lhs),
            _ => None,
        }
    }

    /// Locals read by the instruction
    pub fn used_locals(&self) -> Vec<&str> {
        let mut used = Vec::new();
        match self {
            Inst::Assign { place, value } => {
                if let Place::Field { base, .. } = place {
                    used.push(base.as_str());
                }
                match value {
                    Rvalue::Use(operand) => used.extend(operand.as_local()),
                    Rvalue::Field { base, .. } => used.push(base.as_str()),
                    Rvalue::New(_) => {}
                    Rvalue::Call(call) => push_call_uses(&mut used, call),
                }
            }
            Inst::Invoke(call) => push_call_uses(&mut used, call),
            Inst::If { condition, .. } => match condition {
                Condition::IsNull(local) | Condition::NotNull(local) => used.push(local.as_str()),
                Condition::Opaque(locals) => used.extend(locals.iter().map(String::as_str)),
            },
            Inst::Return(Some(operand)) => used.extend(operand.as_local()),
            Inst::Return(None) | Inst::Goto(_) | Inst::Nop => {}
        }
        used
    }

    /// Locals dereferenced by the instruction: field access bases and receivers
    pub fn dereferenced_locals(&self) -> Vec<&str> {
        let mut bases = Vec::new();
        if let Inst::Assign { place, value } = self {
            if let Place::Field { base, .. } = place {
                bases.push(base.as_str());
            }
            if let Rvalue::Field { base, .. } = value {
                bases.push(base.as_str());
            }
        }
        if let Some(receiver) = self.call_expr().and_then(|call| call.receiver.as_deref()) {
            bases.push(receiver);
        }
        bases
    }

    /// Whether control can continue with the next instruction
    pub fn falls_through(&self) -> bool {
        !matches!(self, Inst::Goto(_) | Inst::If { .. } | Inst::Return(_))
    }
}

fn push_call_uses<'a>(used: &mut Vec<&'a str>, call: &'a CallExpr) {
    used.extend(call.receiver.as_deref());
    used.extend(call.arg_locals().map(|(_, local)| local));
}
