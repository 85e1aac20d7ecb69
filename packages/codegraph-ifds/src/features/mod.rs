pub mod analyzers;
pub mod ifds;
