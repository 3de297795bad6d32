//! JSON-RPC protocol engine.
//!
//! This module provides:
//! - [`RpcMessage`]: Classification of incoming messages
//! - [`RpcResponse`]: Outgoing response shape
//! - [`Dispatcher`]: Method dispatch and the tool-invocation pipeline

mod dispatcher;
mod message;

pub use dispatcher::{
    Dispatcher, NotificationEffect, ServerInfo, AUDIT_RESULT_EXECUTING, AUDIT_TIME_FORMAT,
};
pub use message::{
    is_accepted_version, RpcErrorObject, RpcMessage, RpcResponse, ACCEPTED_PROTOCOL_VERSIONS,
    JSONRPC_VERSION, SERVER_PROTOCOL_VERSION,
};
