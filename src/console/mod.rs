//! # Console Module
//!
//! Line-oriented command front-end used by the binary. Each line is parsed
//! into a [`Command`], optionally addressed to a tenant with `@N`, and
//! dispatched to that tenant's session.

pub mod commands;
pub mod handlers;

pub use commands::{parse, Command, Invocation, ParseError};
pub use handlers::{Console, Outcome};
