//! HTTP surface for the evaluation service

pub mod server;

pub use server::{build_router, serve, AppState};
