//! World stepping against the rapier adapter.

use glam::Vec3;
use realm_common::{AccountId, UserId};
use realm_input::InputCommand;
use realm_kernel::{PlatformMotion, RapierPhysics, World, WorldSettings};
use realm_common::PlatformId;

fn world_with_floor() -> World {
    let mut physics = RapierPhysics::new();
    physics.add_floor(0.0, 100.0);
    World::new(WorldSettings::default(), Box::new(physics))
}

fn press(sequence: u16, f: impl FnOnce(&mut InputCommand)) -> InputCommand {
    let mut c = InputCommand {
        sequence,
        ..Default::default()
    };
    f(&mut c);
    c
}

#[test]
fn player_settles_on_floor_then_jumps() {
    let mut world = world_with_floor();
    let snap = world.fresh_snapshot(AccountId(42));
    let id = world.spawn_player(UserId(1), &snap).unwrap();
    for _ in 0..60 {
        world.step();
    }
    let store = world.store();
    assert_eq!(store.grounded(id), Some(true));
    let y = store.transform(id).unwrap().position.y;
    assert!((y - 0.9).abs() < 0.05, "settled at {y}");

    world.apply_input(UserId(1), &[press(1, |c| c.jump_pressed = true)]);
    world.step();
    let store = world.store();
    assert_eq!(store.grounded(id), Some(false));
    assert_eq!(store.attached_platform(id), None);
    assert_eq!(store.velocity(id).unwrap().y, 7.2);
}

#[test]
fn walking_on_floor_stays_grounded_and_moves() {
    let mut world = world_with_floor();
    let snap = world.fresh_snapshot(AccountId(1));
    let id = world.spawn_player(UserId(1), &snap).unwrap();
    for _ in 0..30 {
        world.step();
    }
    let start = world.store().transform(id).unwrap().position;
    for seq in 1..=30u16 {
        world.apply_input(UserId(1), &[press(seq, |c| c.forward = 1.0)]);
        world.step();
    }
    let end = world.store().transform(id).unwrap().position;
    // Jog speed is 5 m/s; allow for controller offsets.
    assert!(end.z - start.z > 4.0, "moved {}", end.z - start.z);
    assert_eq!(world.store().grounded(id), Some(true));
}

#[test]
fn rider_stays_attached_to_moving_platform() {
    let mut physics = RapierPhysics::new();
    physics.add_floor(-20.0, 100.0);
    let mut world = World::new(WorldSettings::default(), Box::new(physics));
    world
        .add_platform(
            PlatformId(1),
            Vec3::new(3.0, 0.25, 3.0),
            PlatformMotion::linear(Vec3::ZERO, Vec3::new(6.0, 0.0, 0.0), 12.0),
        )
        .unwrap();
    let mut snap = world.fresh_snapshot(AccountId(1));
    snap.transform.position = Vec3::new(0.0, 1.2, 0.0);
    let id = world.spawn_player(UserId(1), &snap).unwrap();
    for _ in 0..20 {
        world.step();
    }
    assert_eq!(world.store().attached_platform(id), Some(PlatformId(1)));

    let before = world.store().transform(id).unwrap().position.x;
    for _ in 0..60 {
        world.step();
    }
    let after = world.store().transform(id).unwrap().position.x;
    let platform_x = world.platforms().get(PlatformId(1)).unwrap().current.position.x;
    assert!(after > before + 0.5, "carried from {before} to {after}");
    assert!((after - platform_x).abs() < 0.2);
    assert_eq!(world.store().grounded(id), Some(true));
}

#[test]
fn walker_is_stopped_by_another_player_and_a_dummy() {
    let mut world = world_with_floor();
    let spawn = |world: &mut World, user: u64, z: f32| {
        let mut snap = world.fresh_snapshot(AccountId(user));
        snap.transform.position = Vec3::new(0.0, 1.0, z);
        world.spawn_player(UserId(user), &snap).unwrap()
    };
    let walker = spawn(&mut world, 1, 0.0);
    let blocker = spawn(&mut world, 2, 3.0);
    world.spawn_dummy(Vec3::new(0.0, 0.9, 6.0), 100.0);
    for _ in 0..15 {
        world.step();
    }

    for seq in 1..=60u16 {
        world.apply_input(UserId(1), &[press(seq, |c| c.forward = 1.0)]);
        world.step();
    }
    let walker_z = world.store().transform(walker).unwrap().position.z;
    let blocker_z = world.store().transform(blocker).unwrap().position.z;
    // Capsule radius is 0.4, so centres stay at least 0.8 apart.
    assert!(walker_z < 2.3, "walker reached z = {walker_z}");
    assert!(walker_z > 1.5, "walker barely moved: {walker_z}");
    assert!((blocker_z - 3.0).abs() < 0.01, "blocker pushed to {blocker_z}");
}

#[test]
fn despawned_player_no_longer_blocks() {
    let mut world = world_with_floor();
    let mut snap = world.fresh_snapshot(AccountId(1));
    snap.transform.position = Vec3::new(0.0, 1.0, 0.0);
    let walker = world.spawn_player(UserId(1), &snap).unwrap();
    let mut other = world.fresh_snapshot(AccountId(2));
    other.transform.position = Vec3::new(0.0, 1.0, 2.0);
    world.spawn_player(UserId(2), &other).unwrap();
    for _ in 0..15 {
        world.step();
    }
    world.despawn_player(UserId(2)).unwrap();

    for seq in 1..=30u16 {
        world.apply_input(UserId(1), &[press(seq, |c| c.forward = 1.0)]);
        world.step();
    }
    let z = world.store().transform(walker).unwrap().position.z;
    assert!(z > 4.0, "walker stopped at {z}");
}

#[test]
fn players_sharing_the_spawn_point_can_separate() {
    let mut world = world_with_floor();
    let snap_a = world.fresh_snapshot(AccountId(1));
    let snap_b = world.fresh_snapshot(AccountId(2));
    let a = world.spawn_player(UserId(1), &snap_a).unwrap();
    let b = world.spawn_player(UserId(2), &snap_b).unwrap();
    for _ in 0..15 {
        world.step();
    }
    for seq in 1..=30u16 {
        world.apply_input(UserId(1), &[press(seq, |c| c.forward = 1.0)]);
        world.apply_input(UserId(2), &[press(seq, |c| c.forward = -1.0)]);
        world.step();
    }
    let za = world.store().transform(a).unwrap().position.z;
    let zb = world.store().transform(b).unwrap().position.z;
    assert!(za - zb > 4.0, "a at {za}, b at {zb}");
}
