//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and talk to the store traits so route
//! handlers can stay focused on protocol translation and auth plumbing.

pub mod ask;
pub mod chatlog;
pub mod email_auth;
pub mod expiry;
pub mod materials;
pub mod prompt;
pub mod session;
pub mod subscription;
pub mod usage;
