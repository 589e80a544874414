mod capture;
mod config;
mod error;
mod library;
mod logger;
mod pl1000;
mod reconnect;
mod registry;
mod session;
mod simulator;
mod timing;
mod trigger;
mod tui;
mod unit_info;
mod utils;
#[cfg(feature = "hdf5")]
mod writer;

pub use capture::*;
pub use config::*;
pub use error::*;
pub use library::*;
pub use logger::*;
pub use pl1000::*;
pub use reconnect::*;
pub use registry::*;
pub use session::*;
pub use simulator::*;
pub use timing::*;
pub use trigger::*;
pub use tui::*;
pub use unit_info::*;
pub use utils::*;
#[cfg(feature = "hdf5")]
pub use writer::*;
