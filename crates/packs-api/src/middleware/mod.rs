//! # Middleware
//!
//! HTTP-level Prometheus metrics. Request tracing comes from
//! `tower_http::trace::TraceLayer` and authentication from [`crate::auth`].

pub mod metrics;
