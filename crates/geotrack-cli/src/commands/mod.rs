//! Command implementations for the CLI.

mod config;
mod status;
mod trigger;
mod watch;

pub use config::cmd_config;
pub use status::cmd_status;
pub use trigger::{cmd_start, cmd_stop};
pub use watch::cmd_watch;
