//! Runtime utilities for varscope.

pub mod shutdown;
