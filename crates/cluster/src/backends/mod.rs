//! Cluster backends.

pub mod bdr;
