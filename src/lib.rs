//! friendplay: rank games your Steam friends own and play that you don't
//!
//! Walks the friend list, aggregates owned and recently played games per
//! friend, and scores the games the user does not yet own.

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
