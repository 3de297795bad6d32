//! Integration tests for the bridge.
//!
//! Every test starts its own server bound to `127.0.0.1:0` and talks raw
//! HTTP/1.1 over TCP.

mod harness;
mod limits;
mod mcp_workflow;
mod rest_workflow;
mod sse_workflow;
