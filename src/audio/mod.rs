//! # Audio Module
//!
//! Per-tenant playback: queue, player state machine and the output port.
//!
//! ## Architecture
//!
//! ### [`playlist`] - Queue and History
//! - FIFO queue plus bounded, most-recent-first history
//! - Loop, shuffle, `previous` reordering and pagination
//!
//! ### [`session`] - Player
//! - One session per tenant, every command serialized on its state lock
//! - Epoch tickets make late completions and lost resolutions no-ops
//!
//! ### [`preloader`] / [`watchdog`]
//! - Shared, bounded background resolution of upcoming tracks
//! - Resettable idle timer that closes abandoned sessions
//!
//! ### [`sink`] / [`process_sink`]
//! - The output contract and its `ffplay` implementation
//!
//! ### [`registry`]
//! - Creates sessions on first use and forgets them on teardown

pub mod playlist;
pub mod preloader;
pub mod process_sink;
pub mod registry;
pub mod session;
pub mod sink;
pub mod watchdog;

pub use playlist::{HistoryPolicy, Page, PageSource, Playlist};
pub use preloader::Preloader;
pub use registry::{Registry, TenantId};
pub use session::{EnqueueReport, PlayerState, Session, SessionSnapshot};
pub use sink::{Completion, ReconnectPolicy, Sink, SinkError, SinkFactory};
