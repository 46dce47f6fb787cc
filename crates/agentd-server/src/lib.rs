//! HTTP surface for agentd: run endpoints, SSE framing, and shared state.

pub mod http;
pub mod service;
pub mod sse;
