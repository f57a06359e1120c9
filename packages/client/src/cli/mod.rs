//! Terminal client: prompt input, formatted room output and reconnection.

mod command;
mod formatter;
mod reconnect;
mod runner;
mod session;
mod ui;

pub use command::InputCommand;
pub use formatter::MessageFormatter;
pub use reconnect::{ReconnectPolicy, should_exit_immediately};
pub use runner::{ClientContext, Credentials, run_client};
