#![allow(clippy::unwrap_used)]

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use netphys::config::{InterpolationConfig, SnapshotConfig};
use netphys::physics::controller::NetPhysicsController;
use netphys::physics::{BasicWorld, ObjectId, Obstacle, ObstacleWorld, Vec2};
use netphys::protocol::event::{EventMeta, ObjectDeltaEvent};

fn world_of(count: u32) -> BasicWorld {
    let mut world = BasicWorld::new();
    for seq in 0..count {
        let mut body = Obstacle::new(Vec2::new(seq as f32, 0.0));
        body.set_shared(true);
        world.insert(ObjectId::new(1, seq), body);
    }
    world
}

fn remote() -> EventMeta {
    EventMeta {
        sender_tick: 1,
        receive_tick: 1,
        source_id: "peer-0001".to_string(),
    }
}

fn bench_fixed_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixed_update");

    for &count in &[16u32, 256, 2048] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("blend_{count}"), |b| {
            b.iter_batched(
                || {
                    let mut world = world_of(count);
                    let mut engine = NetPhysicsController::new(
                        InterpolationConfig::default(),
                        SnapshotConfig::default(),
                    );
                    let meta = remote();
                    for seq in 0..count {
                        let delta = ObjectDeltaEvent::Position {
                            object_id: ObjectId::new(1, seq),
                            x: seq as f32 + 1.0,
                            y: 1.0,
                        };
                        engine.handle_delta(&mut world, delta, &meta);
                    }
                    (world, engine)
                },
                |(mut world, mut engine)| {
                    while engine.active_interpolations() > 0 {
                        engine.fixed_update(&mut world);
                    }
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

fn bench_pack_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_snapshot");

    for &count in &[16u32, 256, 2048] {
        let world = world_of(count);
        let mut engine =
            NetPhysicsController::new(InterpolationConfig::default(), SnapshotConfig::default());
        group.throughput(Throughput::Elements(count as u64));
        group.bench_function(format!("objects_{count}"), |b| {
            b.iter(|| engine.pack_snapshot(&world))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fixed_update, bench_pack_snapshot);
criterion_main!(benches);
