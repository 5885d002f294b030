//! Reference data: stations and train types.
//!
//! Both change rarely and are refreshed with the daily timetables.

mod stations;
mod train_types;

pub use stations::{StationDirectory, StationInfo};
pub use train_types::{Alias, TrainType, TrainTypeCatalog};

/// Language of a display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    /// Traditional Chinese.
    #[default]
    Zh,
    En,
}
