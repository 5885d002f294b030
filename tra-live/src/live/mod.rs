//! Live positions and the departure boards derived from them.

mod board;
mod derive;

pub use board::{LiveBoard, LivePosition};
pub use derive::{
    DelayStatus, LiveStop, ServiceDay, StationLive, StationLiveTable, derive_station,
    reaches_destination,
};
