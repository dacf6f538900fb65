//! Relaxation reference engine.
//!
//! A small deterministic engine for embedded use, tests, and as a reference
//! implementation of the engine traits. Every profile relaxes toward the
//! target prescribed for the current time at a fixed rate; geometry is
//! sampled from the configuration.

use std::collections::BTreeMap;

use crate::config::SimulationConfig;
use crate::error::{ActorResult, ConfigError};
use crate::record::{PhysicsRecord, RecordKind, RecordSlice};

use super::{EngineOutputs, EngineState, SimError, SimulationEngine, SimulationState, StepFunction};

const CODE_NAME: &str = "relaxation";

/// State of the relaxation model.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxationState {
    /// Simulation time.
    pub t: f64,
    /// Evolved profiles.
    pub profiles: BTreeMap<String, Vec<f64>>,
    /// Geometry scalars at `t`.
    pub geometry: BTreeMap<String, f64>,
    /// Timestep that produced this state (zero for the initial state).
    pub last_dt: f64,
}

impl SimulationState for RelaxationState {
    fn time(&self) -> f64 {
        self.t
    }
}

/// Post-processed outputs of the relaxation model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RelaxationOutputs {
    /// Steps taken since the initial state.
    pub step: u64,
    /// Mean over all profile values.
    pub profile_mean: f64,
}

/// Runtime parameters at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaxationParams {
    /// Nominal timestep.
    pub fixed_dt: f64,
    /// Final time.
    pub t_final: f64,
    /// Scalar conditions at the time.
    pub prescribed: BTreeMap<String, f64>,
}

/// Step function of the relaxation model.
#[derive(Debug, Clone)]
pub struct RelaxationStepFn {
    config: SimulationConfig,
    rate: f64,
}

#[allow(clippy::cast_precision_loss)]
fn profile_mean(profiles: &BTreeMap<String, Vec<f64>>) -> f64 {
    let (sum, count) = profiles
        .values()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

impl RelaxationStepFn {
    /// Configuration this step function was built from.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn tolerance(&self) -> f64 {
        1e-9 * self.config.numerics.t_final.abs().max(1.0)
    }

    /// Geometry scalars at `t`: parameters overlaid with the closest imported slice.
    #[must_use]
    pub fn geometry_at(&self, t: f64) -> BTreeMap<String, f64> {
        let mut geometry = self.config.geometry.params.clone();
        if let Some(slice) = self.config.geometry.time_slices.closest(t) {
            geometry.extend(slice.scalars.iter().map(|(k, v)| (k.clone(), *v)));
        }
        geometry
    }

    /// Geometry profiles at `t`, from the closest imported slice.
    #[must_use]
    pub fn geometry_profiles_at(&self, t: f64) -> BTreeMap<String, Vec<f64>> {
        self.config
            .geometry
            .time_slices
            .closest(t)
            .map(|slice| slice.profiles.clone())
            .unwrap_or_default()
    }

    /// Profile targets at `t`: prescribed profiles overlaid with the closest imported slice.
    #[must_use]
    pub fn targets_at(&self, t: f64) -> BTreeMap<String, Vec<f64>> {
        let conditions = &self.config.profile_conditions;
        let mut targets = conditions.profiles.clone();
        if let Some(slice) = conditions.time_slices.closest(t) {
            targets.extend(slice.profiles.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        targets
    }

    /// Scalar conditions at `t`.
    #[must_use]
    pub fn prescribed_at(&self, t: f64) -> BTreeMap<String, f64> {
        let conditions = &self.config.profile_conditions;
        let mut prescribed = conditions.prescribed.clone();
        if let Some(slice) = conditions.time_slices.closest(t) {
            prescribed.extend(slice.scalars.iter().map(|(k, v)| (k.clone(), *v)));
        }
        prescribed
    }
}

impl StepFunction for RelaxationStepFn {
    type State = RelaxationState;
    type Outputs = RelaxationOutputs;
    type Params = RelaxationParams;
    type Geometry = BTreeMap<String, f64>;

    fn step(&self, state: &RelaxationState, outputs: &RelaxationOutputs) -> (RelaxationState, RelaxationOutputs) {
        let (params, geometry) = self.params_and_geometry(state.t);
        let dt = self.next_dt(state.t, &params, &geometry, state);
        let mut t = state.t + dt;
        if self.is_done(t) {
            t = t.max(self.config.numerics.t_final);
        }

        let alpha = (self.rate * dt).min(1.0);
        let mut profiles = state.profiles.clone();
        for (name, target) in self.targets_at(t) {
            match profiles.get_mut(&name) {
                Some(current) if current.len() == target.len() => {
                    for (value, goal) in current.iter_mut().zip(&target) {
                        *value += alpha * (goal - *value);
                    }
                }
                _ => {
                    profiles.insert(name, target);
                }
            }
        }

        let next_outputs = RelaxationOutputs {
            step: outputs.step + 1,
            profile_mean: profile_mean(&profiles),
        };
        let next_state = RelaxationState {
            t,
            profiles,
            geometry: self.geometry_at(t),
            last_dt: dt,
        };
        (next_state, next_outputs)
    }

    fn check_errors(&self, state: &RelaxationState, _outputs: &RelaxationOutputs) -> SimError {
        if state.profiles.values().flatten().any(|v| !v.is_finite()) {
            return SimError::NonFinite;
        }
        if state.last_dt < self.config.numerics.min_dt && !self.is_done(state.t) {
            return SimError::DtTooSmall;
        }
        SimError::NoError
    }

    fn params_and_geometry(&self, t: f64) -> (RelaxationParams, BTreeMap<String, f64>) {
        let params = RelaxationParams {
            fixed_dt: self.config.numerics.fixed_dt,
            t_final: self.config.numerics.t_final,
            prescribed: self.prescribed_at(t),
        };
        (params, self.geometry_at(t))
    }

    fn next_dt(
        &self,
        t: f64,
        params: &RelaxationParams,
        _geometry: &BTreeMap<String, f64>,
        _state: &RelaxationState,
    ) -> f64 {
        params.fixed_dt.min(params.t_final - t).max(0.0)
    }

    fn is_done(&self, t: f64) -> bool {
        t >= self.config.numerics.t_final - self.tolerance()
    }

    fn t_final(&self) -> f64 {
        self.config.numerics.t_final
    }
}

/// The relaxation engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxationEngine {
    rate: f64,
}

impl Default for RelaxationEngine {
    fn default() -> Self {
        Self { rate: 5.0 }
    }
}

impl RelaxationEngine {
    /// Creates an engine relaxing at `rate` per unit time.
    #[must_use]
    pub const fn with_rate(rate: f64) -> Self {
        Self { rate }
    }
}

impl SimulationEngine for RelaxationEngine {
    type StepFn = RelaxationStepFn;

    fn build_step_fn(&self, config: &SimulationConfig) -> ActorResult<RelaxationStepFn> {
        config.numerics.validate()?;
        if !(self.rate >= 0.0) {
            return Err(ConfigError::InvalidNumerics {
                reason: format!("relaxation rate must be >= 0, got {}", self.rate),
            }
            .into());
        }
        Ok(RelaxationStepFn {
            config: config.clone(),
            rate: self.rate,
        })
    }

    fn initial_state(
        &self,
        step_fn: &RelaxationStepFn,
    ) -> ActorResult<(EngineState<Self>, EngineOutputs<Self>)> {
        let t = step_fn.config.numerics.t_initial;
        let profiles = step_fn.targets_at(t);
        let outputs = RelaxationOutputs {
            step: 0,
            profile_mean: profile_mean(&profiles),
        };
        let state = RelaxationState {
            t,
            profiles,
            geometry: step_fn.geometry_at(t),
            last_dt: 0.0,
        };
        Ok((state, outputs))
    }

    fn to_record(
        &self,
        kind: RecordKind,
        step_fn: &RelaxationStepFn,
        state: &RelaxationState,
        outputs: &RelaxationOutputs,
    ) -> ActorResult<PhysicsRecord> {
        let mut slice = RecordSlice::at(state.t);
        match kind {
            RecordKind::Equilibrium => {
                slice.scalars = state.geometry.clone();
                slice.profiles = step_fn.geometry_profiles_at(state.t);
            }
            RecordKind::CoreProfiles => {
                slice.scalars = step_fn.prescribed_at(state.t);
                slice.profiles = state.profiles.clone();
                slice.scalars.insert("profile_mean".to_string(), outputs.profile_mean);
            }
        }
        let mut record = PhysicsRecord::from_slices(kind, vec![slice]);
        record.code.name = Some(CODE_NAME.to_string());
        record.code.output_flag = vec![0];
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(t_final: f64, dt: f64) -> SimulationConfig {
        let json = format!(
            r#"{{
                "numerics": {{ "t_final": {t_final}, "fixed_dt": {dt} }},
                "geometry": {{ "params": {{ "r_major": 6.2 }} }},
                "profile_conditions": {{ "prescribed": {{ "ip": 15.0 }}, "profiles": {{ "t_e": [10.0, 1.0] }} }}
            }}"#
        );
        SimulationConfig::from_json(&json, "inline").unwrap()
    }

    #[test]
    fn steps_until_final_time() {
        let engine = RelaxationEngine::default();
        let step_fn = engine.build_step_fn(&config(0.3, 0.1)).unwrap();
        let (mut state, mut outputs) = engine.initial_state(&step_fn).unwrap();
        let mut steps = 0;
        while !step_fn.is_done(state.t) {
            let (s, o) = step_fn.step(&state, &outputs);
            assert!(step_fn.check_errors(&s, &o).is_ok());
            state = s;
            outputs = o;
            steps += 1;
        }
        assert_eq!(steps, 3);
        assert_eq!(outputs.step, 3);
        assert!((state.t - 0.3).abs() < 1e-12);
    }

    #[test]
    fn last_dt_is_clipped_to_final_time() {
        let engine = RelaxationEngine::default();
        let step_fn = engine.build_step_fn(&config(0.25, 0.1)).unwrap();
        let (state, _) = engine.initial_state(&step_fn).unwrap();
        let shifted = RelaxationState { t: 0.2, ..state };
        assert!((engine.next_dt(&step_fn, &shifted) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn profiles_relax_toward_imported_targets() {
        let engine = RelaxationEngine::with_rate(5.0);
        let mut cfg = config(1.0, 0.1);
        let step_fn = engine.build_step_fn(&cfg).unwrap();
        let (state, outputs) = engine.initial_state(&step_fn).unwrap();

        cfg.import_profile_conditions(vec![RecordSlice::at(0.0).with_profile("t_e", vec![20.0, 2.0])]);
        let step_fn = engine.build_step_fn(&cfg).unwrap();
        let (next, _) = step_fn.step(&state, &outputs);
        // alpha = 0.5
        assert!((next.profiles["t_e"][0] - 15.0).abs() < 1e-12);
        assert!((next.profiles["t_e"][1] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn non_finite_profiles_are_reported() {
        let engine = RelaxationEngine::default();
        let step_fn = engine.build_step_fn(&config(1.0, 0.1)).unwrap();
        let (mut state, outputs) = engine.initial_state(&step_fn).unwrap();
        state.profiles.insert("n_e".to_string(), vec![f64::NAN]);
        state.last_dt = 0.1;
        assert_eq!(step_fn.check_errors(&state, &outputs), SimError::NonFinite);
    }

    #[test]
    fn equilibrium_record_carries_geometry() {
        let engine = RelaxationEngine::default();
        let mut cfg = config(1.0, 0.1);
        cfg.import_geometry(vec![RecordSlice::at(0.0)
            .with_scalar("elongation", 1.7)
            .with_profile("r_boundary_outline", vec![4.0, 8.0])]);
        let step_fn = engine.build_step_fn(&cfg).unwrap();
        let (state, outputs) = engine.initial_state(&step_fn).unwrap();
        let record = engine
            .to_record(RecordKind::Equilibrium, &step_fn, &state, &outputs)
            .unwrap();
        assert_eq!(record.time, vec![0.0]);
        assert!(record.is_valid());
        assert_eq!(record.slices[0].scalars["r_major"], 6.2);
        assert_eq!(record.slices[0].scalars["elongation"], 1.7);
        assert_eq!(record.slices[0].profiles["r_boundary_outline"], vec![4.0, 8.0]);
    }
}
