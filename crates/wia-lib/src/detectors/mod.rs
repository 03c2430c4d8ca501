pub mod ecg;
pub mod rwave;

pub use ecg::{detect_qrs, detect_qrs_in, find_start_of_qrs, QrsConfig, QrsMarker};
pub use rwave::{find_r_waves, marker_channel, RWave, RWaveConfig, RWaveMarker};
