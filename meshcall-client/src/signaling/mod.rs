mod relay_client;
mod signaling_output;

pub use relay_client::*;
pub use signaling_output::*;
