mod common;

use common::{
    actor_topology, approx, equilibrium_record, init_logging, record_message, spawn_sink,
    write_config, ACTOR,
};

use torax_muscle3::{CouplingActor, Operator, PhysicsRecord, RecordKind, RelaxationEngine};
use torax_muscle3::CouplingInstance;

fn run_reused(full_history: bool) -> (torax_muscle3::SessionReport, Vec<PhysicsRecord>) {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, 0.3, 0.1);

    let mut instances = actor_topology(&config, 0.0)
        .component_setting(ACTOR, "output_all_timeslices", full_history)
        .component("source", [(Operator::OF, vec!["eq_out"])])
        .component("sink", [(Operator::FInit, vec!["eq_final"])])
        .conduit("source.eq_out", "torax.equilibrium_f_init")
        .conduit("torax.equilibrium_o_f", "sink.eq_final")
        .build()
        .unwrap();

    let mut source = instances.remove("source").unwrap();
    for r_major in [6.5, 7.5] {
        source
            .send("eq_out", record_message(&equilibrium_record(0.0, r_major), 0.0, None))
            .unwrap();
    }
    drop(source);
    let sink = spawn_sink(instances.remove("sink").unwrap(), vec!["eq_final"]);

    let mut actor = CouplingActor::new(RelaxationEngine::default(), instances.remove(ACTOR).unwrap());
    let report = actor.run().unwrap();
    drop(actor);

    let records = sink
        .join()
        .unwrap()
        .into_iter()
        .map(|(_, m)| PhysicsRecord::decode(RecordKind::Equilibrium, &m.data).unwrap())
        .collect();
    (report, records)
}

#[test]
fn each_initial_message_starts_a_new_iteration() {
    let (report, records) = run_reused(false);

    assert_eq!(report.iterations, 2);
    assert_eq!(report.steps, 6);
    assert_eq!(report.step_fn_version, Some(3));
    assert!(approx(report.final_time.unwrap(), 0.3));

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].slices[0].scalars["r_major"], 6.5);
    assert_eq!(records[1].slices[0].scalars["r_major"], 7.5);
    assert!(records.iter().all(|r| r.slices.len() == 1));
}

#[test]
fn full_history_sends_every_slice_of_each_iteration() {
    let (report, records) = run_reused(true);

    assert_eq!(report.iterations, 2);
    assert_eq!(records.len(), 2);
    for (record, r_major) in records.iter().zip([6.5, 7.5]) {
        // Initial state plus three steps.
        assert_eq!(record.slices.len(), 4);
        assert_eq!(record.time.len(), 4);
        assert!(approx(record.time[0], 0.0));
        assert!(approx(record.time[3], 0.3));
        assert!(record.slices.iter().all(|s| s.scalars["r_major"] == r_major));
        // Boundary outline is merged back only where it was recorded.
        assert!(record.slices[0].profiles.contains_key("r_boundary_outline"));
        assert!(!record.slices[1].profiles.contains_key("r_boundary_outline"));
    }
}
