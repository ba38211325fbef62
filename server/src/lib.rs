//! Fundoo Notes library
//!
//! This library exposes the server's building blocks so the binary and the
//! integration tests share one router.

pub mod api;
pub mod app;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod services;
