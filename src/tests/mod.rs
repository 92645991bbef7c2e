//! Cross-module scenarios.
//!
//! `sql_pushdown` drives the push-down planner through a SQL-like backend;
//! `evaluation` runs configured in-memory evaluation over JSON-built entities.
