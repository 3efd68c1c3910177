//! The demo arena used by `realmd run`.

use glam::Vec3;

use realm_common::{PlatformId, ServerConfig};
use realm_kernel::{KernelError, PlatformMotion, RapierPhysics, World, WorldSettings};

pub fn build_world(config: &ServerConfig) -> Result<World, KernelError> {
    let mut physics = RapierPhysics::new();
    physics.add_floor(0.0, 200.0);
    // A ledge to walk off.
    physics.add_static_box(Vec3::new(0.0, 0.5, -12.0), Vec3::new(4.0, 0.5, 4.0));

    let mut world = World::new(WorldSettings::from_config(config), Box::new(physics));
    world.add_platform(
        PlatformId(1),
        Vec3::new(2.0, 0.25, 2.0),
        PlatformMotion::linear(Vec3::new(10.0, 0.5, 0.0), Vec3::new(20.0, 0.5, 0.0), 8.0),
    )?;
    world.add_platform(
        PlatformId(2),
        Vec3::new(2.5, 0.25, 2.5),
        PlatformMotion::circular(Vec3::new(-12.0, 1.0, 0.0), 4.0, 12.0).with_spin(0.3),
    )?;
    world.add_platform(
        PlatformId(3),
        Vec3::new(3.0, 0.25, 3.0),
        PlatformMotion::fixed(Vec3::new(0.0, 0.25, 15.0)),
    )?;
    world.spawn_dummy(Vec3::new(5.0, 0.9, 5.0), 80.0);
    world.spawn_dummy(Vec3::new(-5.0, 0.9, 5.0), 80.0);
    Ok(world)
}
