use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use torax_muscle3::ports::declared_ports;
use torax_muscle3::{
    CouplingActor, CouplingInstance, ExtraValue, ExtraVarCollection, Message, Operator,
    RelaxationEngine, Topology,
};

fn sparse_collection(fields: usize, times: usize) -> ExtraVarCollection {
    let mut collection = ExtraVarCollection::new();
    for field in 0..fields {
        // Each field sees every other timestamp, offset by its index.
        for i in (field % 2..times).step_by(2) {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f64 * 0.01;
            collection.add(format!("field_{field}"), t, ExtraValue::Array(vec![t; 64]));
        }
    }
    collection
}

fn bench_pad(c: &mut Criterion) {
    let mut group = c.benchmark_group("extra_vars/pad");
    for times in [16usize, 128, 1024] {
        let collection = sparse_collection(4, times);
        group.bench_with_input(BenchmarkId::from_parameter(times), &collection, |b, collection| {
            b.iter(|| {
                let mut padded = collection.clone();
                padded.pad();
                black_box(padded)
            });
        });
    }
    group.finish();
}

fn bench_coupled_run(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("sim.json");
    std::fs::write(
        &config,
        r#"{ "numerics": { "t_final": 1.0, "fixed_dt": 0.01 },
             "geometry": { "params": { "r_major": 6.2 } },
             "profile_conditions": { "profiles": { "t_e": [10.0, 8.0, 6.0, 4.0, 2.0] } } }"#,
    )
    .unwrap();
    let config = config.display().to_string();

    c.bench_function("actor/coupled_run_100_rounds", |b| {
        b.iter(|| {
            let mut instances = Topology::new()
                .component("torax", declared_ports())
                .component("inner", [(Operator::FInit, vec!["eq_in"]), (Operator::OF, vec!["eq_out"])])
                .conduit("torax.equilibrium_o_i", "inner.eq_in")
                .conduit("inner.eq_out", "torax.equilibrium_s")
                .setting("config_source", config.as_str())
                .setting("equilibrium_interval", 0.0)
                .build()
                .unwrap();

            let mut inner = instances.remove("inner").unwrap();
            let peer = thread::spawn(move || {
                while inner.reuse_instance() {
                    let message = inner.receive("eq_in").unwrap();
                    inner
                        .send("eq_out", Message::new(message.timestamp, message.next_timestamp, message.data))
                        .unwrap();
                }
            });

            let mut actor = CouplingActor::new(RelaxationEngine::default(), instances.remove("torax").unwrap());
            let report = actor.run().unwrap();
            drop(actor);
            peer.join().unwrap();
            black_box(report)
        });
    });
}

criterion_group!(coupling, bench_pad, bench_coupled_run);
criterion_main!(coupling);
