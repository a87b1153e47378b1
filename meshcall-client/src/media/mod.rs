mod local_stream;
mod media_devices;
mod media_track_controller;

pub use local_stream::*;
pub use media_devices::*;
pub use media_track_controller::*;
