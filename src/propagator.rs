use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use log::{debug, info, warn};
use serde::Serialize;
use sgp4::{Constants, Geopotential, MinutesSinceEpoch, Orbit};

use crate::errors::{propagation_failed, Result, TleError};
use crate::julian::{julian_years_since_j2000, TimeInput, MINUTES_PER_DAY};
use crate::tle::OrbitalElementSet;

// ---------- Constants ----------
const KM_TO_M: f64 = 1000.0;
const DEG_TO_RAD: f64 = PI / 180.0;
const MINUTES_PER_RADIAN: f64 = MINUTES_PER_DAY / (2.0 * PI);   // rev/day -> rad/min divisor

// ---------- Gravity model ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GravityModel {
    Wgs72,
    Wgs84,
}

impl GravityModel {
    pub fn geopotential(&self) -> Geopotential {
        match self {
            GravityModel::Wgs72 => sgp4::WGS72,
            GravityModel::Wgs84 => sgp4::WGS84,
        }
    }

    /// minutes per canonical time unit
    pub fn tumin(&self) -> f64 {
        1.0 / self.geopotential().ke
    }

    pub fn earth_radius_km(&self) -> f64 {
        self.geopotential().ae
    }
}

impl Default for GravityModel {
    #[cfg(feature = "wgs72")]
    fn default() -> Self { GravityModel::Wgs72 }

    #[cfg(not(feature = "wgs72"))]
    fn default() -> Self { GravityModel::Wgs84 }
}

impl FromStr for GravityModel {
    type Err = TleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wgs72" | "wgs-72" => Ok(GravityModel::Wgs72),
            "wgs84" | "wgs-84" => Ok(GravityModel::Wgs84),
            other => Err(TleError::UnknownGravityModel(other.to_string())),
        }
    }
}

impl fmt::Display for GravityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GravityModel::Wgs72 => write!(f, "WGS-72"),
            GravityModel::Wgs84 => write!(f, "WGS-84"),
        }
    }
}

// ---------- Output model ----------

/// Position (m) and velocity (m/s) in the TEME frame at `julian_date`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PropagationState {
    pub julian_date: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
}

impl PropagationState {
    /// distance from the Earth center in meters
    pub fn radius(&self) -> f64 {
        norm(&self.position)
    }

    pub fn speed(&self) -> f64 {
        norm(&self.velocity)
    }
}

/// parallel position/velocity sequences, in the order of the requested times
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchPropagation {
    pub positions: Vec<[f64; 3]>,
    pub velocities: Vec<[f64; 3]>,
}

impl BatchPropagation {
    pub fn len(&self) -> usize { self.positions.len() }
    pub fn is_empty(&self) -> bool { self.positions.is_empty() }
}

// ---------- Initialized SGP4 state ----------

/// The SGP4 initialization record derived from an element set. It only depends on the
/// elements and the gravity model, never on the query time.
pub struct InitializedPropagatorState {
    gravity_model: GravityModel,
    epoch_julian_date: f64,

    mean_motion: f64,       // rad/min (Kozai)
    mean_motion_dot: f64,   // rad/min²
    mean_motion_ddot: f64,  // rad/min³
    inclination: f64,       // rad
    raan: f64,              // rad
    arg_perigee: f64,       // rad
    mean_anomaly: f64,      // rad
    eccentricity: f64,
    bstar: f64,

    semi_major_axis: f64,   // earth radii
    apogee_altitude: f64,   // earth radii above the surface
    perigee_altitude: f64,  // earth radii above the surface

    constants: Constants,
}

impl InitializedPropagatorState {
    fn new(elements: &OrbitalElementSet, gravity_model: GravityModel) -> Result<Self> {
        let geopotential = gravity_model.geopotential();

        let mean_motion = elements.mean_motion_rev_per_day() / MINUTES_PER_RADIAN;
        if !(mean_motion > 0.0) {
            return Err(propagation_failed!("mean motion must be positive, got {} rev/day", elements.mean_motion_rev_per_day()));
        }
        let mean_motion_dot = elements.mean_motion_first_derivative() / (MINUTES_PER_DAY * MINUTES_PER_RADIAN);
        let mean_motion_ddot = elements.mean_motion_second_derivative() / (MINUTES_PER_DAY * MINUTES_PER_DAY * MINUTES_PER_RADIAN);

        let inclination = elements.inclination_deg() * DEG_TO_RAD;
        let raan = elements.raan_deg() * DEG_TO_RAD;
        let arg_perigee = elements.arg_perigee_deg() * DEG_TO_RAD;
        let mean_anomaly = elements.mean_anomaly_deg() * DEG_TO_RAD;
        let eccentricity = elements.eccentricity();
        let bstar = elements.bstar_drag_term();

        let semi_major_axis = (mean_motion * gravity_model.tumin()).powf(-2.0 / 3.0);
        let apogee_altitude = semi_major_axis * (1.0 + eccentricity) - 1.0;
        let perigee_altitude = semi_major_axis * (1.0 - eccentricity) - 1.0;

        let orbit_0 = Orbit::from_kozai_elements(
            &geopotential,
            inclination,
            raan,
            eccentricity,
            arg_perigee,
            mean_anomaly,
            mean_motion,
        ).map_err(|e| propagation_failed!("invalid orbit for {}: {}", elements.display_name(), e))?;

        // improved mode, i.e. IAU sidereal time
        let constants = Constants::new(
            geopotential,
            sgp4::iau_epoch_to_sidereal_time,
            julian_years_since_j2000(elements.epoch_julian_date()),
            bstar,
            orbit_0,
        ).map_err(|e| propagation_failed!("SGP4 initialization failed for {}: {}", elements.display_name(), e))?;

        Ok(InitializedPropagatorState {
            gravity_model,
            epoch_julian_date: elements.epoch_julian_date(),
            mean_motion,
            mean_motion_dot,
            mean_motion_ddot,
            inclination,
            raan,
            arg_perigee,
            mean_anomaly,
            eccentricity,
            bstar,
            semi_major_axis,
            apogee_altitude,
            perigee_altitude,
            constants,
        })
    }

    pub fn gravity_model(&self) -> GravityModel { self.gravity_model }
    pub fn epoch_julian_date(&self) -> f64 { self.epoch_julian_date }

    pub fn mean_motion_rad_per_min(&self) -> f64 { self.mean_motion }
    pub fn mean_motion_dot(&self) -> f64 { self.mean_motion_dot }
    pub fn mean_motion_ddot(&self) -> f64 { self.mean_motion_ddot }
    pub fn inclination_rad(&self) -> f64 { self.inclination }
    pub fn raan_rad(&self) -> f64 { self.raan }
    pub fn arg_perigee_rad(&self) -> f64 { self.arg_perigee }
    pub fn mean_anomaly_rad(&self) -> f64 { self.mean_anomaly }
    pub fn eccentricity(&self) -> f64 { self.eccentricity }
    pub fn bstar(&self) -> f64 { self.bstar }

    pub fn semi_major_axis_earth_radii(&self) -> f64 { self.semi_major_axis }
    pub fn apogee_altitude_earth_radii(&self) -> f64 { self.apogee_altitude }
    pub fn perigee_altitude_earth_radii(&self) -> f64 { self.perigee_altitude }

    pub fn semi_major_axis_km(&self) -> f64 { self.semi_major_axis * self.gravity_model.earth_radius_km() }
    pub fn apogee_altitude_km(&self) -> f64 { self.apogee_altitude * self.gravity_model.earth_radius_km() }
    pub fn perigee_altitude_km(&self) -> f64 { self.perigee_altitude * self.gravity_model.earth_radius_km() }

    pub fn minutes_since_epoch(&self, julian_date: f64) -> f64 {
        (julian_date - self.epoch_julian_date) * MINUTES_PER_DAY
    }

    fn propagate(&self, julian_date: f64) -> Result<PropagationState> {
        let minutes = self.minutes_since_epoch(julian_date);
        let prediction = self.constants
            .propagate(MinutesSinceEpoch(minutes))
            .map_err(|e| propagation_failed!("{} at {:.3} min from epoch", e, minutes))?;

        let position = prediction.position.map(|c| c * KM_TO_M);
        let velocity = prediction.velocity.map(|c| c * KM_TO_M);

        if !position.iter().chain(velocity.iter()).all(|c| c.is_finite()) {
            return Err(propagation_failed!("non-finite state at {:.3} min from epoch", minutes));
        }
        let radius_km = norm(&prediction.position);
        if radius_km < self.gravity_model.earth_radius_km() {
            return Err(propagation_failed!("position {:.1} km from the Earth center is below the surface at {:.3} min from epoch", radius_km, minutes));
        }

        Ok(PropagationState { julian_date, position, velocity })
    }
}

impl fmt::Debug for InitializedPropagatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitializedPropagatorState")
            .field("gravity_model", &self.gravity_model)
            .field("epoch_julian_date", &self.epoch_julian_date)
            .field("mean_motion", &self.mean_motion)
            .field("eccentricity", &self.eccentricity)
            .field("bstar", &self.bstar)
            .field("semi_major_axis", &self.semi_major_axis)
            .finish_non_exhaustive()
    }
}

/// memoized initialization, including the model it was built for. A failed initialization
/// is kept as well since it is a pure function of the elements.
#[derive(Debug)]
pub(crate) struct PropagatorCache {
    gravity_model: GravityModel,
    state: Result<InitializedPropagatorState>,
}

// ---------- Propagation ----------

impl OrbitalElementSet {
    /// Propagate to `time` with the default gravity model (WGS-84, or WGS-72 with the `wgs72` feature).
    pub fn propagate(&self, time: impl Into<TimeInput>) -> Result<PropagationState> {
        self.propagate_with(time, GravityModel::default())
    }

    /// Propagate to `time`. The SGP4 state is initialized on the first call and reused for
    /// all later calls. Asking for a different gravity model than the one the state was built
    /// with is an error until [`OrbitalElementSet::reset_propagator`] is called.
    pub fn propagate_with(&self, time: impl Into<TimeInput>, gravity_model: GravityModel) -> Result<PropagationState> {
        let julian_date = time.into().julian_date()?;
        let state = self.propagator_for(gravity_model)?;

        match state.propagate(julian_date) {
            Ok(ps) => {
                debug!("[propagate] {} at JD {:.6}: r = {:.1} m", self.display_name(), julian_date, ps.radius());
                Ok(ps)
            }
            Err(e) => {
                warn!("[propagate] {}: {}", self.display_name(), e);
                Err(e)
            }
        }
    }

    /// Propagate to each of `times`, stopping at the first failure.
    pub fn propagate_batch<I>(&self, times: I, gravity_model: GravityModel) -> Result<BatchPropagation>
    where
        I: IntoIterator,
        I::Item: Into<TimeInput>,
    {
        let mut batch = BatchPropagation::default();
        for time in times {
            let ps = self.propagate_with(time, gravity_model)?;
            batch.positions.push(ps.position);
            batch.velocities.push(ps.velocity);
        }
        Ok(batch)
    }

    /// the memoized SGP4 state, if a propagation already initialized it successfully
    pub fn propagator_state(&self) -> Option<&InitializedPropagatorState> {
        self.propagator.get().and_then(|cache| cache.state.as_ref().ok())
    }

    pub fn initialized_gravity_model(&self) -> Option<GravityModel> {
        self.propagator.get().map(|cache| cache.gravity_model)
    }

    /// drop the memoized SGP4 state so that the next propagation initializes it again
    pub fn reset_propagator(&mut self) {
        if let Some(cache) = self.propagator.take() {
            debug!("[reset_propagator] {} discarded {} state", self.display_name(), cache.gravity_model);
        }
    }

    fn propagator_for(&self, gravity_model: GravityModel) -> Result<&InitializedPropagatorState> {
        let cache = self.propagator.get_or_init(|| {
            let state = InitializedPropagatorState::new(self, gravity_model);
            match &state {
                Ok(s) => info!("[propagator_for] initialized {} SGP4 state for {}: a = {:.1} km, perigee {:.1} km",
                    gravity_model, self.display_name(), s.semi_major_axis_km(), s.perigee_altitude_km()),
                Err(e) => warn!("[propagator_for] {}", e),
            }
            PropagatorCache { gravity_model, state }
        });

        if cache.gravity_model != gravity_model {
            return Err(TleError::GravityModelMismatch { initialized: cache.gravity_model, requested: gravity_model });
        }
        cache.state.as_ref().map_err(|e| e.clone())
    }
}

// ---------- Utility math ----------

fn norm(v: &[f64; 3]) -> f64 {
    (v[0]*v[0] + v[1]*v[1] + v[2]*v[2]).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "wgs72")]
    #[test]
    fn default_model_follows_feature() {
        assert_eq!(GravityModel::default(), GravityModel::Wgs72);
    }

    #[cfg(not(feature = "wgs72"))]
    #[test]
    fn default_model_follows_feature() {
        assert_eq!(GravityModel::default(), GravityModel::Wgs84);
    }

    #[test]
    fn model_constants() {
        assert_eq!(GravityModel::Wgs72.earth_radius_km(), sgp4::WGS72.ae);
        assert!((GravityModel::Wgs84.tumin() * sgp4::WGS84.ke - 1.0).abs() < 1e-15);
    }
}
