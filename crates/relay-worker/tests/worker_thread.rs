//! Integration tests for the worker thread.

use std::thread;
use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use relay_buffer::{ConsumerFrame, RecordStore, SharedBuffer, TransferBuffer};
use relay_core::{BodyId, BodyOptions, BodyType, ShapeOptions, ShapesId};
use relay_engine::WorldConfig;
use relay_worker::{BufferHandle, WorkerConfig, WorkerError, WorkerHandle, WorkerMessage, spawn};

const TIMEOUT: Duration = Duration::from_secs(5);

fn config(capacity: usize) -> WorkerConfig {
    WorkerConfig::default()
        .with_capacity(capacity)
        .with_simulation_rate(1.0 / 120.0)
}

fn start_shared(capacity: usize) -> (WorkerHandle, SharedBuffer) {
    let worker = spawn().unwrap();
    let buffer = SharedBuffer::new(capacity).unwrap();
    worker
        .init(config(capacity), BufferHandle::Shared(buffer.clone()))
        .unwrap();
    worker.wait_ready(TIMEOUT).unwrap();
    (worker, buffer)
}

fn at(x: f32, y: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(x, y, 0.0))
}

fn wait_body_ready(worker: &WorkerHandle, id: BodyId) -> usize {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if let Some(WorkerMessage::BodyReady { id: ready, slot }) =
            worker.recv_timeout(Duration::from_millis(50))
        {
            if ready == id {
                return slot;
            }
        }
    }
    panic!("body {id} never became ready");
}

/// Consume frames until `check` returns something or the timeout runs out.
fn poll<T>(buffer: &SharedBuffer, mut check: impl FnMut(&mut ConsumerFrame<'_>) -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        match buffer.try_consume() {
            Some(mut frame) => {
                let found = check(&mut frame);
                frame.release();
                if found.is_some() {
                    return found;
                }
            }
            None => thread::sleep(Duration::from_millis(1)),
        }
    }
    None
}

#[test]
fn init_reports_ready_and_shuts_down() {
    let (worker, buffer) = start_shared(8);
    assert!(poll(&buffer, |frame| Some(frame.step_duration_ms())).is_some());
    worker.shutdown();
}

#[test]
fn bad_world_config_reports_init_failed() {
    let worker = spawn().unwrap();
    let world = WorldConfig::default().with_fixed_time_step(0.0);
    worker
        .init(
            config(4).with_world(world),
            BufferHandle::Shared(SharedBuffer::new(4).unwrap()),
        )
        .unwrap();
    let err = worker.wait_ready(TIMEOUT).unwrap_err();
    assert!(matches!(err, WorkerError::InitFailed(_)), "{err}");
}

#[test]
fn messages_before_init_are_rejected() {
    let worker = spawn().unwrap();
    let id = BodyId::new();
    worker
        .add_body(id, Mat4::IDENTITY, BodyOptions::default())
        .unwrap();
    let buffer = SharedBuffer::new(4).unwrap();
    worker
        .init(config(4), BufferHandle::Shared(buffer.clone()))
        .unwrap();
    worker.wait_ready(TIMEOUT).unwrap();

    for _ in 0..5 {
        poll(&buffer, |_| Some(()));
    }
    while let Some(message) = worker.try_recv() {
        assert!(!matches!(message, WorkerMessage::BodyReady { .. }));
    }
}

#[test]
fn kinematic_bodies_follow_the_host() {
    let (worker, buffer) = start_shared(4);
    let id = BodyId::new();
    worker
        .add_body(id, at(0.0, 0.0), BodyOptions::of_type(BodyType::Kinematic))
        .unwrap();
    let slot = wait_body_ready(&worker, id);

    poll(&buffer, |frame| {
        frame.write_matrix(slot, &at(4.0, 0.0));
        Some(())
    });
    // The pose written by the host stays put across ticks.
    let x = poll(&buffer, |frame| {
        let x = frame.read_matrix(slot).w_axis.x;
        (x == 4.0).then_some(x)
    });
    assert_eq!(x, Some(4.0));
}

#[test]
fn dynamic_bodies_fall_and_collide() {
    let (worker, buffer) = start_shared(4);
    let ground = BodyId::new();
    let crate_body = BodyId::new();

    worker
        .add_body(ground, at(0.0, 0.0), BodyOptions::of_type(BodyType::Static))
        .unwrap();
    worker
        .add_shapes(
            ground,
            ShapesId::new(),
            ShapeOptions::boxed(Vec3::new(5.0, 0.5, 5.0)),
            None,
        )
        .unwrap();
    // Shapes may arrive before their body.
    worker
        .add_shapes(
            crate_body,
            ShapesId::new(),
            ShapeOptions::boxed(Vec3::splat(0.5)),
            None,
        )
        .unwrap();
    worker
        .add_body(crate_body, at(0.0, 2.0), BodyOptions::default())
        .unwrap();
    let ground_slot = wait_body_ready(&worker, ground);
    let crate_slot = wait_body_ready(&worker, crate_body);

    let touching = poll(&buffer, |frame| {
        let a = frame.read_record(ground_slot);
        let b = frame.read_record(crate_slot);
        let hit = a.colliding_slots().any(|s| s == crate_slot)
            || b.colliding_slots().any(|s| s == ground_slot);
        hit.then_some(frame.read_matrix(crate_slot).w_axis.y)
    });
    let y = touching.expect("crate never touched the ground");
    assert!(y < 2.0 && y > 0.5, "crate rests on the ground, y = {y}");

    worker.remove_body(crate_body).unwrap();
    let cleared = poll(&buffer, |frame| {
        frame
            .read_record(ground_slot)
            .colliding_slots()
            .next()
            .is_none()
            .then_some(())
    });
    assert!(cleared.is_some());
}

#[test]
fn transfer_mode_round_trips_the_buffer() {
    let worker = spawn().unwrap();
    let capacity = 2;
    worker
        .init(
            config(capacity),
            BufferHandle::Transfer(TransferBuffer::new(capacity).unwrap()),
        )
        .unwrap();
    worker.wait_ready(TIMEOUT).unwrap();

    let id = BodyId::new();
    worker
        .add_body(id, at(0.0, 10.0), BodyOptions::default())
        .unwrap();

    let mut slot = None;
    let mut frames = 0;
    let mut lowest = f32::MAX;
    let deadline = Instant::now() + TIMEOUT;
    while frames < 20 && Instant::now() < deadline {
        match worker.recv_timeout(Duration::from_millis(100)) {
            Some(WorkerMessage::BodyReady { slot: s, .. }) => slot = Some(s),
            Some(WorkerMessage::TransferData { buffer, .. }) => {
                frames += 1;
                if let Some(s) = slot {
                    lowest = lowest.min(buffer.read_matrix(s).w_axis.y);
                }
                worker.transfer_data(buffer, None).unwrap();
            }
            _ => {}
        }
    }
    assert_eq!(frames, 20);
    assert!(lowest < 10.0, "body should fall, lowest y = {lowest}");
}
