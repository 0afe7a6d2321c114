//! Two/three-line element set (TLE) parsing and SGP4 propagation.
//!
//! ```no_run
//! use tlecore::OrbitalElementSet;
//!
//! let iss = OrbitalElementSet::parse(
//!     "0 ISS(ZARYA)",
//!     "1 25544U 98067A   21267.21567994  .00001839  00000-0  42318-4 0  9994",
//!     Some("2 25544  51.6435 213.0833 0003460  47.4035  50.6925 15.48430119303944"),
//! )?;
//! let state = iss.propagate(iss.epoch_julian_date())?;
//! println!("{:?} m, {:?} m/s", state.position, state.velocity);
//! # Ok::<(), tlecore::TleError>(())
//! ```

use std::sync::Once;

pub mod errors;
pub mod julian;
pub mod propagator;
pub mod tle;

pub use errors::{Result, TleError};
pub use julian::TimeInput;
pub use propagator::{BatchPropagation, GravityModel, InitializedPropagatorState, PropagationState};
pub use tle::{parse_catalog, OrbitalElementSet};

// ---------- Logging ----------

static INIT_LOGGER: Once = Once::new();

/// Install a logger for hosts that don't bring their own. Safe to call repeatedly.
#[cfg(target_os = "android")]
pub fn init_logger() {
    use android_logger::Config;
    use log::LevelFilter;
    INIT_LOGGER.call_once(|| {
        android_logger::init_once(
            Config::default()
                .with_max_level(LevelFilter::Debug)
                .with_tag("tlecore")
        );
    });
}

/// Install a logger for hosts that don't bring their own. Safe to call repeatedly.
/// The level defaults to Debug and can be overridden through `RUST_LOG`.
#[cfg(not(target_os = "android"))]
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .parse_default_env()
            .try_init();
    });
}
