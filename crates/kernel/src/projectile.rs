//! Kinematic projectile flight, world hits and target hits.

use glam::Vec3;

use crate::physics::CharacterPhysics;
use realm_common::{EntityId, NetworkId};
use realm_ecs::{EntityKind, EntityStore};

/// Why a projectile left the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DespawnReason {
    Expired,
    RangeExhausted,
    HitWorld,
    HitTarget,
}

/// One projectile striking one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectileHit {
    pub projectile: EntityId,
    pub owner: NetworkId,
    pub target: EntityId,
    pub damage: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectileReport {
    pub hits: Vec<ProjectileHit>,
    pub despawned: Vec<(EntityId, DespawnReason)>,
}

/// Advance every live projectile by `dt`, in id order.
///
/// Damage is applied to targets here; despawned projectiles are unregistered
/// before returning.
pub fn step_projectiles(
    store: &mut EntityStore,
    physics: &mut dyn CharacterPhysics,
    dt: f32,
) -> ProjectileReport {
    let mut report = ProjectileReport::default();
    let targets: Vec<EntityId> = store
        .live_ids()
        .into_iter()
        .filter(|id| {
            matches!(
                store.kind(*id),
                Some(EntityKind::Player | EntityKind::TrainingDummy)
            )
        })
        .collect();

    for id in store.ids_of(EntityKind::Projectile) {
        if let Some(reason) = step_one(store, physics, &targets, id, dt, &mut report.hits) {
            store.unregister(id);
            report.despawned.push((id, reason));
        }
    }
    report
}

fn step_one(
    store: &mut EntityStore,
    physics: &mut dyn CharacterPhysics,
    targets: &[EntityId],
    id: EntityId,
    dt: f32,
    hits: &mut Vec<ProjectileHit>,
) -> Option<DespawnReason> {
    let mut state = store.projectile(id)?.clone();
    let start = store.transform(id)?.position;
    let radius = store.shape(id)?.radius;
    let mut velocity = store.velocity(id)?;

    if state.ttl_ticks == 0 {
        return Some(DespawnReason::Expired);
    }
    state.ttl_ticks -= 1;

    velocity.y -= state.gravity * dt;
    velocity *= (1.0 - state.drag * dt).max(0.0);

    let mut step = velocity * dt;
    let mut dist = step.length();
    if dist > state.remaining_range {
        step *= state.remaining_range / dist;
        dist = state.remaining_range;
    }

    // Fraction of this tick's segment at which the world stops the projectile.
    let mut world_hit: Option<f32> = None;
    if dist > f32::EPSILON {
        let dir = step / dist;
        if let Some(toi) = physics.cast_world_ray(start, dir, dist) {
            world_hit = Some(toi / dist);
        }
    }

    let end = start + step;
    let mut candidates: Vec<(f32, EntityId)> = targets
        .iter()
        .copied()
        .filter_map(|t| {
            let net = store.network_id(t)?;
            if net == state.owner || state.hits.contains(&net) {
                return None;
            }
            let centre = store.transform(t)?.position;
            let shape = store.shape(t)?;
            let axis = Vec3::Y * shape.half_height;
            let (s, dist_sq) = closest_segments(start, end, centre - axis, centre + axis);
            let reach = radius + shape.radius;
            (dist_sq <= reach * reach).then_some((s, t))
        })
        .collect();
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    let mut travelled = 1.0;
    let mut outcome = None;
    for (s, target) in candidates {
        if world_hit.is_some_and(|w| w < s && state.despawn_on_world) {
            break;
        }
        let Some(health) = store.health_mut(target) else {
            continue;
        };
        let dealt = health.damage(state.damage);
        if let Some(net) = store.network_id(target) {
            state.hits.push(net);
        }
        hits.push(ProjectileHit {
            projectile: id,
            owner: state.owner,
            target,
            damage: dealt,
        });
        if state.pierce_remaining == 0 {
            if state.despawn_on_hit {
                travelled = s;
                outcome = Some(DespawnReason::HitTarget);
                break;
            }
        } else {
            state.pierce_remaining -= 1;
        }
    }

    if outcome.is_none() && state.despawn_on_world {
        if let Some(w) = world_hit {
            travelled = w;
            outcome = Some(DespawnReason::HitWorld);
        }
    }

    state.remaining_range -= dist * travelled;
    if outcome.is_none() && state.remaining_range <= f32::EPSILON {
        outcome = Some(DespawnReason::RangeExhausted);
    }

    if let Some(t) = store.transform_mut(id) {
        t.position = start + step * travelled;
    }
    store.set_velocity(id, velocity);
    if let Some(p) = store.projectile_mut(id) {
        *p = state;
    }
    outcome
}

/// Closest approach between segments `p1-q1` and `p2-q2`.
///
/// Returns the parameter along the first segment and the squared distance.
fn closest_segments(p1: Vec3, q1: Vec3, p2: Vec3, q2: Vec3) -> (f32, f32) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);
    let eps = 1e-8;

    let (s, t) = if a <= eps && e <= eps {
        (0.0, 0.0)
    } else if a <= eps {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= eps {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let mut s = if denom > eps {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (b * s + f) / e;
            if t < 0.0 {
                t = 0.0;
                s = (-c / a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((b - c) / a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };
    let c1 = p1 + d1 * s;
    let c2 = p2 + d2 * t;
    (s, (c1 - c2).length_squared())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::FlatGround;
    use realm_common::{AbilityId, Health, Transform};
    use realm_ecs::{BodyShape, ProjectileState};

    const DT: f32 = 1.0 / 30.0;

    fn bolt(store: &mut EntityStore, at: Vec3, velocity: Vec3, edit: impl FnOnce(&mut ProjectileState)) -> EntityId {
        let mut state = ProjectileState {
            owner: NetworkId(999),
            ability: AbilityId(1),
            gravity: 0.0,
            drag: 0.0,
            remaining_range: 100.0,
            ttl_ticks: 100,
            pierce_remaining: 0,
            damage: 10.0,
            despawn_on_hit: true,
            despawn_on_world: true,
            hits: Vec::new(),
        };
        edit(&mut state);
        store.register_projectile(state, Transform::at(at), velocity, 0.1)
    }

    fn dummy(store: &mut EntityStore, at: Vec3) -> EntityId {
        store.register_dummy(Transform::at(at), Health::new(100.0), BodyShape { radius: 0.4, half_height: 0.5 })
    }

    #[test]
    fn ttl_expiry_despawns() {
        let mut store = EntityStore::new();
        let p = bolt(&mut store, Vec3::new(0.0, 5.0, 0.0), Vec3::X, |s| s.ttl_ticks = 2);
        let mut ground = FlatGround::default();
        assert!(step_projectiles(&mut store, &mut ground, DT).despawned.is_empty());
        assert!(step_projectiles(&mut store, &mut ground, DT).despawned.is_empty());
        let report = step_projectiles(&mut store, &mut ground, DT);
        assert_eq!(report.despawned, vec![(p, DespawnReason::Expired)]);
        assert!(!store.is_live(p));
    }

    #[test]
    fn range_exhaustion_despawns_at_the_limit() {
        let mut store = EntityStore::new();
        let p = bolt(&mut store, Vec3::new(0.0, 5.0, 0.0), Vec3::new(30.0, 0.0, 0.0), |s| {
            s.remaining_range = 1.5
        });
        let mut ground = FlatGround::default();
        step_projectiles(&mut store, &mut ground, DT);
        assert!((store.projectile(p).unwrap().remaining_range - 0.5).abs() < 1e-4);
        let report = step_projectiles(&mut store, &mut ground, DT);
        assert_eq!(report.despawned, vec![(p, DespawnReason::RangeExhausted)]);
    }

    #[test]
    fn world_hit_despawns_when_flagged() {
        let mut store = EntityStore::new();
        let p = bolt(&mut store, Vec3::new(0.0, 0.2, 0.0), Vec3::new(0.0, -30.0, 0.0), |_| {});
        let mut ground = FlatGround::default();
        let report = step_projectiles(&mut store, &mut ground, DT);
        assert_eq!(report.despawned, vec![(p, DespawnReason::HitWorld)]);
    }

    #[test]
    fn ghost_projectile_passes_through_world() {
        let mut store = EntityStore::new();
        let p = bolt(&mut store, Vec3::new(0.0, 0.2, 0.0), Vec3::new(0.0, -30.0, 0.0), |s| {
            s.despawn_on_world = false
        });
        let mut ground = FlatGround::default();
        let report = step_projectiles(&mut store, &mut ground, DT);
        assert!(report.despawned.is_empty());
        assert!(store.transform(p).unwrap().position.y < 0.0);
    }

    #[test]
    fn terminal_hit_damages_once_and_despawns() {
        let mut store = EntityStore::new();
        let target = dummy(&mut store, Vec3::new(0.5, 1.0, 0.0));
        let p = bolt(&mut store, Vec3::new(0.0, 1.0, 0.0), Vec3::new(30.0, 0.0, 0.0), |_| {});
        let mut ground = FlatGround::default();
        let report = step_projectiles(&mut store, &mut ground, DT);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].target, target);
        assert_eq!(report.despawned, vec![(p, DespawnReason::HitTarget)]);
        assert_eq!(store.health(target).unwrap().current(), 90.0);
    }

    #[test]
    fn pierce_hits_each_target_once_in_path_order() {
        let mut store = EntityStore::new();
        let far = dummy(&mut store, Vec3::new(0.9, 1.0, 0.0));
        let near = dummy(&mut store, Vec3::new(0.3, 1.0, 0.0));
        let p = bolt(&mut store, Vec3::new(0.0, 1.0, 0.0), Vec3::new(30.0, 0.0, 0.0), |s| {
            s.pierce_remaining = 1
        });
        let mut ground = FlatGround::default();
        let report = step_projectiles(&mut store, &mut ground, DT);
        let order: Vec<EntityId> = report.hits.iter().map(|h| h.target).collect();
        assert_eq!(order, vec![near, far]);
        assert_eq!(report.despawned, vec![(p, DespawnReason::HitTarget)]);
    }

    #[test]
    fn piercing_projectile_survives_and_skips_already_hit_targets() {
        let mut store = EntityStore::new();
        let target = dummy(&mut store, Vec3::new(0.5, 1.0, 0.0));
        let p = bolt(&mut store, Vec3::new(0.0, 1.0, 0.0), Vec3::new(3.0, 0.0, 0.0), |s| {
            s.pierce_remaining = 3
        });
        let mut ground = FlatGround::default();
        for _ in 0..10 {
            step_projectiles(&mut store, &mut ground, DT);
        }
        assert!(store.is_live(p));
        assert_eq!(store.projectile(p).unwrap().hits, vec![store.network_id(target).unwrap()]);
        assert_eq!(store.health(target).unwrap().current(), 90.0);
    }

    #[test]
    fn owner_is_never_hit() {
        let mut store = EntityStore::new();
        let owner = dummy(&mut store, Vec3::new(0.0, 1.0, 0.0));
        let owner_net = store.network_id(owner).unwrap();
        bolt(&mut store, Vec3::new(0.0, 1.0, 0.0), Vec3::new(30.0, 0.0, 0.0), |s| s.owner = owner_net);
        let report = step_projectiles(&mut store, &mut FlatGround::default(), DT);
        assert!(report.hits.is_empty());
    }

    #[test]
    fn entity_reusing_the_owners_slot_can_be_hit() {
        let mut store = EntityStore::new();
        let owner = dummy(&mut store, Vec3::new(0.0, 1.0, -5.0));
        let owner_net = store.network_id(owner).unwrap();
        let p = bolt(&mut store, Vec3::new(0.0, 1.0, 0.0), Vec3::new(30.0, 0.0, 0.0), |s| s.owner = owner_net);
        store.unregister(owner);
        let newcomer = dummy(&mut store, Vec3::new(0.5, 1.0, 0.0));
        assert_eq!(newcomer, owner, "slot is recycled");

        let report = step_projectiles(&mut store, &mut FlatGround::default(), DT);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].target, newcomer);
        assert_eq!(report.hits[0].owner, owner_net);
        assert_eq!(report.despawned, vec![(p, DespawnReason::HitTarget)]);
    }

    #[test]
    fn gravity_and_drag_bend_the_path() {
        let mut store = EntityStore::new();
        let p = bolt(&mut store, Vec3::new(0.0, 50.0, 0.0), Vec3::new(10.0, 0.0, 0.0), |s| {
            s.gravity = 10.0;
            s.drag = 0.5;
        });
        step_projectiles(&mut store, &mut FlatGround::default(), DT);
        let v = store.velocity(p).unwrap();
        assert!(v.y < 0.0);
        assert!(v.x < 10.0);
    }

    #[test]
    fn closest_segments_crossing() {
        let (s, d2) = closest_segments(
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, -1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        );
        assert!((s - 0.5).abs() < 1e-6);
        assert!((d2 - 1.0).abs() < 1e-6);
    }
}
