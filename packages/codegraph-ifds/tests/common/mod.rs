//! Common test utilities for codegraph-ifds
//!
//! Program fixtures, manager builders and assertions shared by the
//! end-to-end scenarios.

#![allow(dead_code)]

mod assertions;
mod builders;
mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
