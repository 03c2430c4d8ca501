pub mod beats;
pub mod config;
pub mod detectors;
pub mod error;
pub mod filter;
pub mod io;
pub mod plot;
pub mod resample;
pub mod signal;
pub mod wia;

pub use error::{Result, WiaError};
pub use signal::*;
