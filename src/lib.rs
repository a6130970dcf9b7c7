//! promptshelf: engagement state synchronization for the prompts catalogue.
//!
//! Keeps bookmarks, likes, bookmark categories and the trending list
//! consistent between the backend and every UI surface observing them,
//! with optimistic local updates. This library crate exposes all modules for
//! use by the RPC binary and integration tests.

pub mod app;
pub mod managers;
pub mod platform;
pub mod rpc_handler;
pub mod services;
pub mod types;
