#![allow(dead_code)]

use std::collections::BTreeMap;
use std::thread::{self, JoinHandle};

use tempfile::TempDir;

use torax_muscle3::engine::relaxation::{RelaxationOutputs, RelaxationParams, RelaxationState};
use torax_muscle3::engine::{EngineOutputs, EngineState, RelaxationStepFn};
use torax_muscle3::ports::declared_ports;
use torax_muscle3::{
    ActorResult, CouplingInstance, LoopbackInstance, Message, PhysicsRecord, RecordKind,
    RecordSlice, RelaxationEngine, SimError, SimulationConfig, SimulationEngine, StepFunction,
    Topology,
};

pub const ACTOR: &str = "torax";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn write_config(dir: &TempDir, t_final: f64, fixed_dt: f64) -> String {
    let path = dir.path().join("sim.json");
    let json = format!(
        r#"{{
            "numerics": {{ "t_final": {t_final}, "fixed_dt": {fixed_dt} }},
            "geometry": {{ "params": {{ "r_major": 6.2, "a_minor": 2.0 }} }},
            "profile_conditions": {{
                "prescribed": {{ "ip": 15.0 }},
                "profiles": {{ "t_e": [3.0, 2.0, 1.0] }}
            }}
        }}"#
    );
    std::fs::write(&path, json).unwrap();
    path.display().to_string()
}

/// Topology holding only the actor, with its settings.
pub fn actor_topology(config_source: &str, interval: f64) -> Topology {
    Topology::new()
        .component(ACTOR, declared_ports())
        .component_setting(ACTOR, "config_source", config_source)
        .component_setting(ACTOR, "equilibrium_interval", interval)
}

pub fn equilibrium_record(t: f64, r_major: f64) -> PhysicsRecord {
    let mut record = PhysicsRecord::from_slices(
        RecordKind::Equilibrium,
        vec![RecordSlice::at(t)
            .with_scalar("r_major", r_major)
            .with_scalar("kappa", 1.7)
            .with_profile("psi", vec![0.0, 0.5, 1.0])
            .with_profile("r_boundary_outline", vec![4.0, 6.0, 8.0])
            .with_profile("z_boundary_outline", vec![-3.0, 0.0, 3.0])],
    );
    record.code.name = Some("equilibrium-source".to_string());
    record.code.output_flag = vec![0];
    record
}

pub fn record_message(record: &PhysicsRecord, t: f64, next: Option<f64>) -> Message {
    Message::new(t, next, record.encode().unwrap())
}

/// Spawns a peer that, on every reuse, receives on each `(in, out)` pair and
/// sends `reply(in_port, message)` on the paired out port. Returns every
/// message it received, tagged with its port.
pub fn spawn_peer<F>(
    mut instance: LoopbackInstance,
    pairs: Vec<(&'static str, &'static str)>,
    mut reply: F,
) -> JoinHandle<Vec<(String, Message)>>
where
    F: FnMut(&str, &Message) -> Message + Send + 'static,
{
    thread::spawn(move || {
        let mut received = Vec::new();
        while instance.reuse_instance() {
            for (port_in, port_out) in &pairs {
                let message = instance.receive(port_in).unwrap();
                let answer = reply(port_in, &message);
                instance.send(port_out, answer).unwrap();
                received.push(((*port_in).to_string(), message));
            }
        }
        received
    })
}

/// Spawns a peer that echoes every message unchanged.
pub fn spawn_echo(
    instance: LoopbackInstance,
    pairs: Vec<(&'static str, &'static str)>,
) -> JoinHandle<Vec<(String, Message)>> {
    spawn_peer(instance, pairs, |_, message| message.clone())
}

/// Spawns a peer that collects everything arriving on `port`.
pub fn spawn_sink(mut instance: LoopbackInstance, ports: Vec<&'static str>) -> JoinHandle<Vec<(String, Message)>> {
    thread::spawn(move || {
        let mut received = Vec::new();
        while instance.reuse_instance() {
            for port in &ports {
                received.push(((*port).to_string(), instance.receive(port).unwrap()));
            }
        }
        received
    })
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Relaxation engine whose step function reports an error on a chosen step.
#[derive(Debug, Clone, Copy)]
pub struct FailingEngine {
    pub inner: RelaxationEngine,
    pub fail_on_step: u64,
}

pub struct FailingStepFn {
    inner: RelaxationStepFn,
    fail_on_step: u64,
}

impl StepFunction for FailingStepFn {
    type State = RelaxationState;
    type Outputs = RelaxationOutputs;
    type Params = RelaxationParams;
    type Geometry = BTreeMap<String, f64>;

    fn step(&self, state: &RelaxationState, outputs: &RelaxationOutputs) -> (RelaxationState, RelaxationOutputs) {
        self.inner.step(state, outputs)
    }

    fn check_errors(&self, state: &RelaxationState, outputs: &RelaxationOutputs) -> SimError {
        if outputs.step == self.fail_on_step {
            return SimError::Other {
                code: 3,
                message: "injected solver failure".to_string(),
            };
        }
        self.inner.check_errors(state, outputs)
    }

    fn params_and_geometry(&self, t: f64) -> (RelaxationParams, BTreeMap<String, f64>) {
        self.inner.params_and_geometry(t)
    }

    fn next_dt(
        &self,
        t: f64,
        params: &RelaxationParams,
        geometry: &BTreeMap<String, f64>,
        state: &RelaxationState,
    ) -> f64 {
        self.inner.next_dt(t, params, geometry, state)
    }

    fn is_done(&self, t: f64) -> bool {
        self.inner.is_done(t)
    }

    fn t_final(&self) -> f64 {
        self.inner.t_final()
    }
}

impl SimulationEngine for FailingEngine {
    type StepFn = FailingStepFn;

    fn build_step_fn(&self, config: &SimulationConfig) -> ActorResult<FailingStepFn> {
        Ok(FailingStepFn {
            inner: self.inner.build_step_fn(config)?,
            fail_on_step: self.fail_on_step,
        })
    }

    fn initial_state(&self, step_fn: &FailingStepFn) -> ActorResult<(EngineState<Self>, EngineOutputs<Self>)> {
        self.inner.initial_state(&step_fn.inner)
    }

    fn to_record(
        &self,
        kind: RecordKind,
        step_fn: &FailingStepFn,
        state: &RelaxationState,
        outputs: &RelaxationOutputs,
    ) -> ActorResult<PhysicsRecord> {
        self.inner.to_record(kind, &step_fn.inner, state, outputs)
    }
}
