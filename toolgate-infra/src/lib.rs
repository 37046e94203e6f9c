//! Concrete settings and credential stores for toolgate.

pub mod infra;
