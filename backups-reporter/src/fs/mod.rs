//! File system helpers.

pub mod scanner;
