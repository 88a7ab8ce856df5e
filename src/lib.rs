//! Multi-tenant media queue and playback engine.
//!
//! Each tenant owns a [`Session`] with its own queue, history and player
//! state; sessions are created on demand by the [`Registry`] and share a
//! metadata cache and a bounded preload pool.

pub mod audio;
pub mod cache;
pub mod config;
pub mod console;
pub mod error;
pub mod sources;
pub mod ui;

#[cfg(test)]
mod testing;

pub use audio::{PlayerState, Registry, Session, TenantId};
pub use config::{Config, SessionConfig};
pub use error::{PlayerError, Result};
