//! Kidsgames - a small kids' games portal
//!
//! This library provides:
//! - A SQLite game catalog, created and seeded on first start
//! - A JSON API listing the catalog and looking up single games
//! - A registry mapping catalog component paths to lazily built game units
//! - Server-rendered listing and game pages driven by explicit view states
//! - A typed HTTP client so the pages can read from a remote backend

pub mod api;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod games;
pub mod portal;
pub mod registry;
pub mod views;
