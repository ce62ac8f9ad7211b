//! Response output formatting

pub mod formatter;
