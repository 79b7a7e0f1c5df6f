//! # SnapKit Shell
//!
//! The command channel in front of the capture pipeline: JSON requests
//! (`capture`, `hideUI`, `restoreUI`) in, JSON responses out, with the
//! `hideUI` session state kept between requests.

pub mod commands;
pub mod protocol;
pub mod replay;

pub use commands::CommandHandler;
pub use protocol::{Request, Response};
pub use replay::ReplayClock;
