//! # Storekeep API Server Library
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and token authentication layer
//! - `config`: Configuration management
//! - `error`: Response envelope and error mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
