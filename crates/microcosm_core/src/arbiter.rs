//! Action arbitration: the single path through which actors mutate
//! the world.
//!
//! Every proposal runs the same pipeline: liveness, preconditions,
//! permission, application, journal. Validation completes before any
//! state changes, so a rejection leaves no partial mutation, and the
//! outcome is journaled whether the proposal won or lost.

use microcosm_data::{
    ActionKind, ActionProposal, ActionResult, BlockPos, BoundingBox, EventOutcome, EventType,
    Facing, Position, ReasonCode, Structure, VoxelBlock, VoxelSpec, WorldEvent, WorldFeature,
    Zone,
};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::world::World;

impl World {
    /// Arbitrates one proposal and journals the outcome.
    pub fn process(&mut self, proposal: &ActionProposal) -> ActionResult {
        let result = self.arbitrate(proposal);
        if let Some(code) = result.reason_code {
            debug!(
                actor = %proposal.actor_id,
                action = proposal.action.name(),
                code = code.as_str(),
                "proposal rejected"
            );
        }
        self.journal(proposal, &result);
        result
    }

    fn arbitrate(&mut self, proposal: &ActionProposal) -> ActionResult {
        let Some(actor) = self.actors.get(&proposal.actor_id) else {
            return ActionResult::rejected(ReasonCode::EntityNotFound, "no such actor");
        };
        if !actor.alive {
            return ActionResult::rejected(ReasonCode::EntityDead, "actor is dead");
        }
        if actor.safety.in_cooldown(self.tick) {
            return ActionResult::rejected(
                ReasonCode::InCooldown,
                "actor is in a post-intervention cooldown",
            );
        }

        match &proposal.action {
            ActionKind::PlaceVoxel { voxels } => self.place_voxels(proposal.actor_id, voxels, None),
            ActionKind::DestroyVoxel { positions } => {
                self.destroy_voxels(proposal.actor_id, positions)
            }
            ActionKind::PlaceStructure { name, kind, voxels } => {
                self.place_structure(proposal.actor_id, name, kind, voxels)
            }
            ActionKind::ClaimZone {
                name,
                min,
                max,
                open_building,
            } => self.claim_zone(proposal.actor_id, name, *min, *max, *open_building),
            ActionKind::Move { x, y, z } => self.move_actor(proposal.actor_id, *x, *y, *z),
            ActionKind::Interact {
                target,
                verb,
                detail: _,
            } => self.interact(proposal.actor_id, *target, verb),
            ActionKind::Speak { message, target } => {
                self.speak(proposal.actor_id, message, *target)
            }
        }
    }

    /// Validates a voxel set against bounds, occupancy, and zone
    /// permissions. Returns the first violation, or None if the whole
    /// set is placeable.
    fn validate_voxel_set(&self, actor_id: Uuid, voxels: &[VoxelSpec]) -> Option<ActionResult> {
        if voxels.is_empty() {
            return Some(ActionResult::rejected(
                ReasonCode::MissingParams,
                "no voxels in proposal",
            ));
        }
        if voxels.len() > self.config.arbitration.max_voxels_per_action {
            return Some(ActionResult::rejected(
                ReasonCode::TooManyVoxels,
                format!(
                    "{} voxels exceeds the per-action limit of {}",
                    voxels.len(),
                    self.config.arbitration.max_voxels_per_action
                ),
            ));
        }

        let god = self.actors.get(&actor_id).is_some_and(|a| a.god);
        let mut seen = std::collections::HashSet::with_capacity(voxels.len());
        for spec in voxels {
            if !self.space.in_bounds(spec.pos) {
                return Some(ActionResult::rejected(
                    ReasonCode::OutOfBounds,
                    format!("({}, {}, {}) is outside the world", spec.pos.x, spec.pos.y, spec.pos.z),
                ));
            }
            if self.space.is_occupied(spec.pos) || !seen.insert(spec.pos) {
                return Some(ActionResult::rejected(
                    ReasonCode::PositionOccupied,
                    format!("({}, {}, {}) is occupied", spec.pos.x, spec.pos.y, spec.pos.z),
                ));
            }
            if !god {
                if let Some(zone) = self.space.zone_at(spec.pos) {
                    if !zone.open_building && zone.owner != actor_id {
                        return Some(ActionResult::rejected(
                            ReasonCode::NoPermission,
                            format!("zone '{}' does not allow building", zone.name),
                        ));
                    }
                }
            }
        }
        None
    }

    fn place_voxels(
        &mut self,
        actor_id: Uuid,
        voxels: &[VoxelSpec],
        structure_id: Option<Uuid>,
    ) -> ActionResult {
        if let Some(rejection) = self.validate_voxel_set(actor_id, voxels) {
            return rejection;
        }
        for spec in voxels {
            self.space.insert(VoxelBlock {
                pos: spec.pos,
                color: spec.color.clone(),
                material: spec.material.clone(),
                collidable: spec.collidable,
                placed_by: actor_id,
                structure_id,
                placed_tick: self.tick,
            });
        }
        ActionResult::accepted_with(json!({ "placed": voxels.len() }))
    }

    fn destroy_voxels(&mut self, actor_id: Uuid, positions: &[BlockPos]) -> ActionResult {
        if positions.is_empty() {
            return ActionResult::rejected(ReasonCode::MissingParams, "no positions in proposal");
        }
        // Repeated positions count once, in validation and in the tally.
        let mut seen = std::collections::HashSet::with_capacity(positions.len());
        let positions: Vec<BlockPos> = positions
            .iter()
            .copied()
            .filter(|pos| seen.insert(*pos))
            .collect();
        if positions.len() > self.config.arbitration.max_voxels_per_action {
            return ActionResult::rejected(
                ReasonCode::TooManyVoxels,
                format!(
                    "{} voxels exceeds the per-action limit of {}",
                    positions.len(),
                    self.config.arbitration.max_voxels_per_action
                ),
            );
        }
        let god = self.actors.get(&actor_id).is_some_and(|a| a.god);
        for &pos in &positions {
            let Some(block) = self.space.block_at(pos) else {
                return ActionResult::rejected(
                    ReasonCode::PositionEmpty,
                    format!("nothing at ({}, {}, {})", pos.x, pos.y, pos.z),
                );
            };
            if god || block.placed_by == actor_id {
                continue;
            }
            // Inside a zone the zone rules decide; outside, blocks are
            // fair game for anyone.
            if let Some(zone) = self.space.zone_at(pos) {
                if !zone.open_building && zone.owner != actor_id {
                    return ActionResult::rejected(
                        ReasonCode::NoPermission,
                        format!("zone '{}' protects this block", zone.name),
                    );
                }
            }
        }
        for &pos in &positions {
            self.space.remove(pos);
        }
        ActionResult::accepted_with(json!({ "destroyed": positions.len() }))
    }

    fn place_structure(
        &mut self,
        actor_id: Uuid,
        name: &str,
        kind: &str,
        voxels: &[VoxelSpec],
    ) -> ActionResult {
        if name.trim().is_empty() {
            return ActionResult::rejected(ReasonCode::MissingParams, "structure needs a name");
        }
        if let Some(rejection) = self.validate_voxel_set(actor_id, voxels) {
            return rejection;
        }
        let mut bounds = BoundingBox::from_corners(voxels[0].pos, voxels[0].pos);
        for spec in &voxels[1..] {
            bounds = BoundingBox::from_corners(
                BlockPos::new(
                    bounds.min.x.min(spec.pos.x),
                    bounds.min.y.min(spec.pos.y),
                    bounds.min.z.min(spec.pos.z),
                ),
                BlockPos::new(
                    bounds.max.x.max(spec.pos.x),
                    bounds.max.y.max(spec.pos.y),
                    bounds.max.z.max(spec.pos.z),
                ),
            );
        }
        if let Some(existing) = self.space.structures_overlapping(&bounds).next() {
            return ActionResult::rejected(
                ReasonCode::StructureOverlap,
                format!("overlaps structure '{}'", existing.name),
            );
        }

        let structure = Structure {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner: actor_id,
            kind: kind.to_string(),
            bounds,
            created_tick: self.tick,
        };
        let structure_id = structure.id;
        self.space.add_structure(structure);
        // Built architecture doubles as a landmark that widens the
        // encounter radius around it.
        let half_x = f64::from(bounds.max.x - bounds.min.x) / 2.0;
        let half_y = f64::from(bounds.max.y - bounds.min.y) / 2.0;
        self.space.add_feature(WorldFeature {
            id: structure_id,
            name: name.to_string(),
            x: f64::from(bounds.min.x) + half_x,
            y: f64::from(bounds.min.y) + half_y,
            z: f64::from(bounds.min.z + bounds.max.z) / 2.0,
            radius: (half_x * half_x + half_y * half_y).sqrt().max(1.0),
            amount: 0.0,
            capacity: 0.0,
            regen_rate: 0.0,
            architecture: true,
        });
        // Occupancy was validated above, so this cannot reject.
        self.place_voxels(actor_id, voxels, Some(structure_id));
        ActionResult::accepted_with(json!({
            "structure_id": structure_id,
            "placed": voxels.len(),
        }))
    }

    fn claim_zone(
        &mut self,
        actor_id: Uuid,
        name: &str,
        min: BlockPos,
        max: BlockPos,
        open_building: bool,
    ) -> ActionResult {
        if name.trim().is_empty() {
            return ActionResult::rejected(ReasonCode::MissingParams, "zone needs a name");
        }
        let bounds = BoundingBox::from_corners(min, max);
        if !self.space.in_bounds(bounds.min) || !self.space.in_bounds(bounds.max) {
            return ActionResult::rejected(ReasonCode::OutOfBounds, "zone leaves the world");
        }
        if bounds.cell_count() > self.config.arbitration.max_zone_cells {
            return ActionResult::rejected(
                ReasonCode::ZoneTooLarge,
                format!(
                    "{} cells exceeds the zone limit of {}",
                    bounds.cell_count(),
                    self.config.arbitration.max_zone_cells
                ),
            );
        }
        if let Some(existing) = self.space.zones_overlapping(&bounds).next() {
            return ActionResult::rejected(
                ReasonCode::ZoneOverlap,
                format!("overlaps zone '{}'", existing.name),
            );
        }
        let zone = Zone {
            id: Uuid::new_v4(),
            name: name.to_string(),
            owner: actor_id,
            bounds,
            open_building,
        };
        let zone_id = zone.id;
        self.space.add_zone(zone);
        ActionResult::accepted_with(json!({ "zone_id": zone_id }))
    }

    fn move_actor(&mut self, actor_id: Uuid, x: f64, y: f64, z: f64) -> ActionResult {
        if !x.is_finite() || !y.is_finite() || !z.is_finite() {
            return ActionResult::rejected(ReasonCode::MissingParams, "non-finite destination");
        }
        let destination = Position::new(x, y, z);
        let (dx, dy, dz) = destination.rounded();
        let cell = BlockPos::new(
            dx.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            dy.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            dz.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
        );
        if !self.space.in_bounds(cell) {
            return ActionResult::rejected(ReasonCode::OutOfBounds, "destination outside the world");
        }
        if self.space.is_solid(cell) {
            return ActionResult::rejected(
                ReasonCode::Collision,
                format!("a block occupies ({}, {}, {})", cell.x, cell.y, cell.z),
            );
        }
        let actor = self
            .actors
            .get_mut(&actor_id)
            .expect("liveness checked in arbitrate");
        let distance = actor.position.distance(&destination);
        if distance > self.config.arbitration.max_move_distance {
            return ActionResult::rejected(
                ReasonCode::MoveTooFar,
                format!(
                    "{distance:.1} exceeds the per-action move limit of {}",
                    self.config.arbitration.max_move_distance
                ),
            );
        }
        if distance > 0.0 {
            actor.facing = Facing((destination.y - actor.position.y)
                .atan2(destination.x - actor.position.x));
        }
        actor.position = destination;
        ActionResult::accepted()
    }

    fn interact(&mut self, actor_id: Uuid, target: Uuid, verb: &str) -> ActionResult {
        if verb.trim().is_empty() {
            return ActionResult::rejected(ReasonCode::MissingParams, "interaction needs a verb");
        }
        let Some(other) = self.actors.get(&target) else {
            return ActionResult::rejected(ReasonCode::EntityNotFound, "no such target");
        };
        if !other.alive {
            return ActionResult::rejected(ReasonCode::EntityDead, "target is dead");
        }
        let actor = &self.actors[&actor_id];
        let distance = actor.position.distance(&other.position);
        if distance > self.config.arbitration.interact_range {
            return ActionResult::rejected(
                ReasonCode::MoveTooFar,
                format!(
                    "target is {distance:.1} away, beyond reach {}",
                    self.config.arbitration.interact_range
                ),
            );
        }

        let valence = interaction_valence(verb);
        self.relationships
            .reinforce_mutual(actor_id, target, valence, self.tick);
        if valence < 0.0 {
            if let Some(other) = self.actors.get_mut(&target) {
                other.emotional.mood = (other.emotional.mood - 0.2).max(-1.0);
            }
        }
        if let Some(actor) = self.actors.get_mut(&actor_id) {
            actor.needs.social = (actor.needs.social + 5.0).min(100.0);
        }
        ActionResult::accepted()
    }

    fn speak(&mut self, actor_id: Uuid, message: &str, target: Option<Uuid>) -> ActionResult {
        if message.trim().is_empty() {
            return ActionResult::rejected(ReasonCode::MissingParams, "nothing to say");
        }
        if let Some(target) = target {
            let Some(other) = self.actors.get(&target) else {
                return ActionResult::rejected(ReasonCode::EntityNotFound, "no such listener");
            };
            if !other.alive {
                return ActionResult::rejected(ReasonCode::EntityDead, "listener is dead");
            }
            self.relationships
                .reinforce_mutual(actor_id, target, 0.05, self.tick);
        }
        if let Some(actor) = self.actors.get_mut(&actor_id) {
            actor.needs.social = (actor.needs.social + 2.0).min(100.0);
        }
        ActionResult::accepted()
    }

    fn journal(&mut self, proposal: &ActionProposal, result: &ActionResult) {
        let outcome = if result.is_accepted() {
            EventOutcome::Accepted
        } else {
            EventOutcome::Rejected
        };
        let event_type = match proposal.action {
            ActionKind::Speak { .. } => EventType::Speech,
            _ => EventType::Action,
        };
        let params = serde_json::to_value(&proposal.action).unwrap_or_default();
        let mut event = WorldEvent::new(self.tick, event_type, outcome)
            .with_actor(proposal.actor_id)
            .with_action(proposal.action.name(), params)
            .with_importance(if result.is_accepted() { 0.4 } else { 0.2 });
        if let Some(reason) = &result.reason {
            event = event.with_reason(reason.clone());
        }
        if let Some(actor) = self.actors.get(&proposal.actor_id) {
            event = event.with_position(actor.position);
        }
        self.events.append(event);
    }
}

/// Maps an interaction verb to a relationship valence.
fn interaction_valence(verb: &str) -> f32 {
    match verb {
        "attack" | "insult" | "threaten" | "steal" => -0.3,
        "greet" | "help" | "gift" | "comfort" => 0.2,
        _ => 0.05,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use microcosm_data::{ActionStatus, EventType};

    fn world_with_actor() -> (World, Uuid) {
        let mut config = AppConfig::default();
        config.world.seed = Some(1);
        let mut world = World::new(config);
        let id = world.spawn_actor("tess", Position::new(0.0, 0.0, 0.0));
        (world, id)
    }

    fn place_one(world: &mut World, actor: Uuid, pos: BlockPos) -> ActionResult {
        world.process(&ActionProposal {
            actor_id: actor,
            action: ActionKind::PlaceVoxel {
                voxels: vec![VoxelSpec {
                    pos,
                    color: "#ffffff".into(),
                    material: "stone".into(),
                    collidable: true,
                }],
            },
        })
    }

    #[test]
    fn test_place_then_conflict() {
        let (mut world, a) = world_with_actor();
        let b = world.spawn_actor("rival", Position::new(1.0, 0.0, 0.0));
        let base = world.events.last_id();

        let first = place_one(&mut world, a, BlockPos::new(0, 0, 0));
        assert_eq!(first.status, ActionStatus::Accepted);
        assert!(world.space.is_occupied(BlockPos::new(0, 0, 0)));

        let second = place_one(&mut world, b, BlockPos::new(0, 0, 0));
        assert_eq!(second.reason_code, Some(ReasonCode::PositionOccupied));
        assert_eq!(world.space.block_count(), 1);

        let events = world.events.since(base);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].result, EventOutcome::Accepted);
        assert_eq!(events[1].result, EventOutcome::Rejected);
    }

    #[test]
    fn test_unknown_and_dead_actors_are_rejected() {
        let (mut world, a) = world_with_actor();
        let ghost = place_one(&mut world, Uuid::new_v4(), BlockPos::new(0, 0, 0));
        assert_eq!(ghost.reason_code, Some(ReasonCode::EntityNotFound));

        world.kill_actor(a, "test");
        let dead = place_one(&mut world, a, BlockPos::new(0, 0, 0));
        assert_eq!(dead.reason_code, Some(ReasonCode::EntityDead));
        assert_eq!(world.space.block_count(), 0);
    }

    #[test]
    fn test_oversized_structure_writes_nothing() {
        let (mut world, a) = world_with_actor();
        let limit = world.config.arbitration.max_voxels_per_action;
        let voxels: Vec<VoxelSpec> = (0..=limit as i32)
            .map(|i| VoxelSpec {
                pos: BlockPos::new(i, 0, 0),
                color: "#ffffff".into(),
                material: "wood".into(),
                collidable: true,
            })
            .collect();
        let result = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::PlaceStructure {
                name: "wall".into(),
                kind: "barrier".into(),
                voxels,
            },
        });
        assert_eq!(result.reason_code, Some(ReasonCode::TooManyVoxels));
        assert_eq!(world.space.block_count(), 0);
    }

    #[test]
    fn test_structure_overlap_rejects_whole_proposal() {
        let (mut world, a) = world_with_actor();
        let spec = |x: i32| VoxelSpec {
            pos: BlockPos::new(x, 5, 0),
            color: "#ffffff".into(),
            material: "wood".into(),
            collidable: true,
        };
        let first = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::PlaceStructure {
                name: "hut".into(),
                kind: "home".into(),
                voxels: vec![spec(0), spec(1)],
            },
        });
        assert!(first.is_accepted());

        let before = world.space.block_count();
        let second = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::PlaceStructure {
                name: "annex".into(),
                kind: "home".into(),
                voxels: vec![spec(1), spec(2)],
            },
        });
        assert_eq!(second.reason_code, Some(ReasonCode::StructureOverlap));
        assert_eq!(world.space.block_count(), before);
    }

    #[test]
    fn test_destroy_counts_repeated_positions_once() {
        let (mut world, a) = world_with_actor();
        let spot = BlockPos::new(2, 2, 0);
        assert!(place_one(&mut world, a, spot).is_accepted());

        let result = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::DestroyVoxel {
                positions: vec![spot, spot, spot],
            },
        });
        assert!(result.is_accepted());
        assert_eq!(result.data.unwrap()["destroyed"], 1);
        assert_eq!(world.space.block_count(), 0);
    }

    #[test]
    fn test_placed_structure_becomes_a_landmark() {
        let (mut world, a) = world_with_actor();
        let spec = |x: i32| VoxelSpec {
            pos: BlockPos::new(x, 2, 0),
            color: "#ffffff".into(),
            material: "stone".into(),
            collidable: true,
        };
        let result = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::PlaceStructure {
                name: "obelisk".into(),
                kind: "monument".into(),
                voxels: vec![spec(0), spec(1)],
            },
        });
        assert!(result.is_accepted());
        let landmarks = world.space.landmarks_near(0.5, 2.0, 1.0);
        assert_eq!(landmarks.len(), 1);
        assert_eq!(landmarks[0].name, "obelisk");
    }

    #[test]
    fn test_zone_permissions() {
        let (mut world, owner) = world_with_actor();
        let intruder = world.spawn_actor("intruder", Position::new(1.0, 1.0, 0.0));
        let claim = world.process(&ActionProposal {
            actor_id: owner,
            action: ActionKind::ClaimZone {
                name: "garden".into(),
                min: BlockPos::new(0, 0, 0),
                max: BlockPos::new(7, 7, 7),
                open_building: false,
            },
        });
        assert!(claim.is_accepted());

        let denied = place_one(&mut world, intruder, BlockPos::new(1, 1, 1));
        assert_eq!(denied.reason_code, Some(ReasonCode::NoPermission));

        let allowed = place_one(&mut world, owner, BlockPos::new(1, 1, 1));
        assert!(allowed.is_accepted());
    }

    #[test]
    fn test_zone_overlap_and_size_limits() {
        let (mut world, a) = world_with_actor();
        let big = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::ClaimZone {
                name: "empire".into(),
                min: BlockPos::new(-100, -100, 0),
                max: BlockPos::new(100, 100, 10),
                open_building: true,
            },
        });
        assert_eq!(big.reason_code, Some(ReasonCode::ZoneTooLarge));

        let first = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::ClaimZone {
                name: "plot".into(),
                min: BlockPos::new(0, 0, 0),
                max: BlockPos::new(7, 7, 7),
                open_building: true,
            },
        });
        assert!(first.is_accepted());

        let overlapping = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::ClaimZone {
                name: "plot2".into(),
                min: BlockPos::new(5, 5, 0),
                max: BlockPos::new(12, 12, 7),
                open_building: true,
            },
        });
        assert_eq!(overlapping.reason_code, Some(ReasonCode::ZoneOverlap));
    }

    #[test]
    fn test_move_limits_and_collision() {
        let (mut world, a) = world_with_actor();
        let far = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::Move {
                x: 50.0,
                y: 0.0,
                z: 0.0,
            },
        });
        assert_eq!(far.reason_code, Some(ReasonCode::MoveTooFar));

        place_one(&mut world, a, BlockPos::new(3, 0, 0));
        let blocked = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::Move {
                x: 3.0,
                y: 0.0,
                z: 0.0,
            },
        });
        assert_eq!(blocked.reason_code, Some(ReasonCode::Collision));

        let ok = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::Move {
                x: 2.0,
                y: 0.0,
                z: 0.0,
            },
        });
        assert!(ok.is_accepted());
        assert_eq!(world.actor(a).unwrap().position.x, 2.0);
    }

    #[test]
    fn test_interact_reinforces_relationship() {
        let (mut world, a) = world_with_actor();
        let b = world.spawn_actor("pal", Position::new(1.0, 0.0, 0.0));
        let result = world.process(&ActionProposal {
            actor_id: a,
            action: ActionKind::Interact {
                target: b,
                verb: "greet".into(),
                detail: None,
            },
        });
        assert!(result.is_accepted());
        assert!(world.relationships.get(a, b).unwrap().affinity > 0.0);
        assert!(world.relationships.get(b, a).is_some());
    }

    #[test]
    fn test_cooldown_blocks_proposals() {
        let (mut world, a) = world_with_actor();
        world.actors.get_mut(&a).unwrap().safety.cooldown_until = Some(world.tick + 5);
        let result = place_one(&mut world, a, BlockPos::new(0, 0, 0));
        assert_eq!(result.reason_code, Some(ReasonCode::InCooldown));
    }
}
