//! HTTP API: routing, authentication middleware, authorization gates.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
