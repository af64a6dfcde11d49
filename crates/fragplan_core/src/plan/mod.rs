//! Physical plan nodes.

pub mod compiled;
pub mod operator;
pub mod plan_aggregate;
pub mod plan_distinct;
pub mod plan_dml;
pub mod plan_exchange;
pub mod plan_limit;
pub mod plan_order;
pub mod plan_project;
pub mod plan_scan;
