//! Gatehouse - navigation gateway for a permission-driven admin console
//!
//! This library decides which parts of a statically authored route tree a
//! user may reach, builds the matching navigation menu, and gates every
//! navigation attempt against the user's roles and permissions.

pub mod errors;
pub mod identity;
pub mod nav;
pub mod settings;
pub mod web;
