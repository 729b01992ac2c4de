#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines
)]

//! # CodeDuel Server
//!
//! Realtime backend for a multiplayer competitive-coding platform: rooms,
//! lobbies, ready-up, synchronized battle start, submission judging with
//! ordered winner selection, Elo rankings, and background room reclamation.

/// Bearer token verification
pub mod auth;

/// Named-topic event bus for realtime fan-out
pub mod bus;

/// Server configuration and environment variables
pub mod config;

/// REST API surface
pub mod http;

/// External code judge client and language harnessing
pub mod judge;

/// Structured logging configuration
pub mod logging;

/// Metrics collection and reporting
pub mod metrics;

/// Wire protocol and core domain types
pub mod protocol;

/// Elo ranking engine
pub mod ranking;

/// Rate limiting implementation
pub mod rate_limit;

/// Room/battle engine orchestration
pub mod server;

/// Room store abstraction and in-memory backend
pub mod store;

/// Realtime WebSocket endpoints
pub mod websocket;
