//! DAG Builder (C6) and Plan Mode (C9): the two ways an `ExecutionTrace`'s
//! `graph` field is produced.

pub mod builder;
pub mod plan;
