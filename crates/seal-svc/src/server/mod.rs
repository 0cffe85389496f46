//! Axum HTTP server, routing, and middleware.
//!
//! # Responsibilities
//! - Define the Axum router with all routes and shared middleware.
//! - Parse request bodies and hand them to the dispatch layer.
//! - Map typed failures onto status codes without leaking crypto detail.

pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
