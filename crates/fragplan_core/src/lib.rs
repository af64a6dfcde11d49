pub mod assembler;
pub mod catalog;
pub mod config;
pub mod dml_counts;
pub mod explain;
pub mod expr;
pub mod partitioning;
pub mod plan;
pub mod schema;
pub mod statement;
pub mod subplan;
pub mod types;
