//! Command implementations

pub mod run;
pub mod tools;

pub use run::*;
pub use tools::*;
