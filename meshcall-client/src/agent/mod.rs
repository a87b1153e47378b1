mod call_agent;
mod call_command;
mod call_handle;
mod room_roster;

pub use call_agent::*;
pub use call_command::*;
pub use call_handle::*;
pub use room_roster::*;
