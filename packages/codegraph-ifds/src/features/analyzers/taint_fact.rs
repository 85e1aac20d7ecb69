/*
 * Access-path facts
 *
 * A fact says "the value reachable from `local.f1.f2...` carries `mark`".
 * A path covers its extensions: Tainted(x) also taints x.f.
 *
 * Example:
 *   x = source()     → Tainted { path: x, mark: TAINT }
 *   y.data = x       → Tainted { path: y.data, mark: TAINT }
 *   z = y.data       → Tainted { path: z, mark: TAINT }
 */

use crate::features::ifds::domain::DomainFact;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Taint label
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaintMark(Cow<'static, str>);

impl TaintMark {
    /// Mark carried by possibly-null values
    pub const NULLNESS: TaintMark = TaintMark(Cow::Borrowed("NULLNESS"));

    /// Default mark of taint sources
    pub const TAINT: TaintMark = TaintMark(Cow::Borrowed("TAINT"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaintMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `local.field1.field2...`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccessPath {
    pub local: String,
    pub fields: Vec<String>,
}

impl AccessPath {
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            fields: Vec::new(),
        }
    }

    /// Path with fields, truncated to `max_len` fields
    pub fn new(local: impl Into<String>, fields: Vec<String>, max_len: usize) -> Self {
        let mut path = Self {
            local: local.into(),
            fields,
        };
        path.fields.truncate(max_len);
        path
    }

    pub fn is_local(&self, local: &str) -> bool {
        self.local == local && self.fields.is_empty()
    }

    pub fn starts_with_local(&self, local: &str) -> bool {
        self.local == local
    }

    /// Same fields under another local
    pub fn rebase(&self, local: &str) -> Self {
        Self {
            local: local.to_string(),
            fields: self.fields.clone(),
        }
    }

    /// `local.field` prepended to our fields, for stores
    pub fn under_field(&self, base: &str, field: &str, max_len: usize) -> Self {
        let mut fields = Vec::with_capacity(self.fields.len() + 1);
        fields.push(field.to_string());
        fields.extend(self.fields.iter().cloned());
        Self::new(base, fields, max_len)
    }

    /// Whether the path lies under `base.field`
    pub fn is_under_field(&self, base: &str, field: &str) -> bool {
        self.local == base && self.fields.first().map(String::as_str) == Some(field)
    }

    /// Fields below `base.field`, for loads
    ///
    /// `None` when the path does not cover `base.field`. A bare `base`
    /// covers every field.
    pub fn strip_field(&self, base: &str, field: &str) -> Option<Vec<String>> {
        if self.local != base {
            return None;
        }
        match self.fields.split_first() {
            None => Some(Vec::new()),
            Some((first, rest)) if first == field => Some(rest.to_vec()),
            Some(_) => None,
        }
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.local)?;
        for field in &self.fields {
            write!(f, ".{field}")?;
        }
        Ok(())
    }
}

/// Fact of the taint and null-dereference analyses
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaintFact {
    Zero,
    Tainted { path: AccessPath, mark: TaintMark },
}

impl TaintFact {
    pub fn tainted(path: AccessPath, mark: TaintMark) -> Self {
        TaintFact::Tainted { path, mark }
    }

    pub fn local(local: impl Into<String>, mark: TaintMark) -> Self {
        TaintFact::Tainted {
            path: AccessPath::local(local),
            mark,
        }
    }

    pub fn path(&self) -> Option<&AccessPath> {
        match self {
            TaintFact::Zero => None,
            TaintFact::Tainted { path, .. } => Some(path),
        }
    }

    pub fn mark(&self) -> Option<&TaintMark> {
        match self {
            TaintFact::Zero => None,
            TaintFact::Tainted { mark, .. } => Some(mark),
        }
    }

    /// Same mark on another path
    pub fn with_path(&self, path: AccessPath) -> Self {
        match self {
            TaintFact::Zero => TaintFact::Zero,
            TaintFact::Tainted { mark, .. } => TaintFact::Tainted {
                path,
                mark: mark.clone(),
            },
        }
    }
}

impl DomainFact for TaintFact {
    fn is_zero(&self) -> bool {
        matches!(self, TaintFact::Zero)
    }

    fn zero() -> Self {
        TaintFact::Zero
    }
}

impl fmt::Display for TaintFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaintFact::Zero => f.write_str("0"),
            TaintFact::Tainted { path, mark } => write!(f, "{path}[{mark}]"),
        }
    }
}
