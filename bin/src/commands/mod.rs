//! CLI command implementations.

pub(crate) mod export;
pub(crate) mod intervals;
pub(crate) mod print;
pub(crate) mod run;
