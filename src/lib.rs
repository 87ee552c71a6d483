//! Pacer - request throttling and keyset pagination
//!
//! This crate implements the two pieces of infrastructure every handler of a
//! forum-style JSON service leans on: a multi-window abuse rate limiter that
//! runs before mutating actions, and opaque-cursor keyset pagination for
//! list, feed and notification responses.

pub mod clock;
pub mod config;
pub mod error;
pub mod pagination;
pub mod ratelimit;
pub mod runtime;
