//! End-to-end arbitration scenarios over a seeded world.

use microcosm_core::{AppConfig, World};
use microcosm_data::{
    ActionKind, ActionProposal, BlockPos, Position, ReasonCode, VoxelSpec,
};
use uuid::Uuid;

fn seeded_world() -> World {
    let mut config = AppConfig::default();
    config.world.seed = Some(7);
    World::new(config)
}

fn voxel(x: i32, y: i32, z: i32) -> VoxelSpec {
    VoxelSpec {
        pos: BlockPos::new(x, y, z),
        color: "#888888".into(),
        material: "stone".into(),
        collidable: true,
    }
}

fn propose(world: &mut World, actor_id: Uuid, action: ActionKind) -> microcosm_data::ActionResult {
    world.process(&ActionProposal { actor_id, action })
}

#[test]
fn test_settlement_lifecycle() {
    let mut world = seeded_world();
    let alice = world.spawn_actor("alice", Position::new(0.0, 0.0, 0.0));
    let bob = world.spawn_actor("bob", Position::new(3.0, 0.0, 0.0));

    // Alice claims a plot and builds a hut inside it.
    let result = propose(
        &mut world,
        alice,
        ActionKind::ClaimZone {
            name: "alice's plot".into(),
            min: BlockPos::new(-5, -5, 0),
            max: BlockPos::new(5, 5, 8),
            open_building: false,
        },
    );
    assert!(result.is_accepted(), "claim failed: {:?}", result.reason);

    let result = propose(
        &mut world,
        alice,
        ActionKind::PlaceStructure {
            name: "hut".into(),
            kind: "shelter".into(),
            voxels: vec![voxel(0, 0, 0), voxel(1, 0, 0), voxel(0, 1, 0)],
        },
    );
    assert!(result.is_accepted());
    assert_eq!(world.space.block_count(), 3);
    assert_eq!(world.space.structure_count(), 1);

    // Bob cannot build in Alice's closed zone.
    let result = propose(
        &mut world,
        bob,
        ActionKind::PlaceVoxel {
            voxels: vec![voxel(2, 2, 0)],
        },
    );
    assert_eq!(result.reason_code, Some(ReasonCode::NoPermission));
    assert_eq!(world.space.block_count(), 3);

    // Nor can he demolish her hut.
    let result = propose(
        &mut world,
        bob,
        ActionKind::DestroyVoxel {
            positions: vec![BlockPos::new(0, 0, 0)],
        },
    );
    assert_eq!(result.reason_code, Some(ReasonCode::NoPermission));

    // Alice remodels freely.
    let result = propose(
        &mut world,
        alice,
        ActionKind::DestroyVoxel {
            positions: vec![BlockPos::new(0, 1, 0)],
        },
    );
    assert!(result.is_accepted());
    assert_eq!(world.space.block_count(), 2);
}

#[test]
fn test_rejected_proposal_mutates_nothing() {
    let mut world = seeded_world();
    let alice = world.spawn_actor("alice", Position::default());

    // One voxel of the batch is occupied, so none may land.
    assert!(propose(
        &mut world,
        alice,
        ActionKind::PlaceVoxel {
            voxels: vec![voxel(4, 4, 0)],
        },
    )
    .is_accepted());

    let result = propose(
        &mut world,
        alice,
        ActionKind::PlaceVoxel {
            voxels: vec![voxel(5, 4, 0), voxel(4, 4, 0), voxel(6, 4, 0)],
        },
    );
    assert_eq!(result.reason_code, Some(ReasonCode::PositionOccupied));
    assert_eq!(world.space.block_count(), 1);
}

#[test]
fn test_every_proposal_is_journaled_in_order() {
    let mut world = seeded_world();
    let alice = world.spawn_actor("alice", Position::default());

    propose(
        &mut world,
        alice,
        ActionKind::Speak {
            message: "first".into(),
            target: None,
        },
    );
    propose(
        &mut world,
        Uuid::new_v4(),
        ActionKind::Speak {
            message: "ghost".into(),
            target: None,
        },
    );
    propose(
        &mut world,
        alice,
        ActionKind::Move {
            x: 1.0,
            y: 1.0,
            z: 0.0,
        },
    );

    let events = world.events.recent(100);
    // Birth plus the three proposals, accepted or not.
    assert_eq!(events.len(), 4);
    let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert!(events
        .iter()
        .any(|e| e.reason.as_deref().is_some_and(|r| r.contains("actor"))));
}

#[test]
fn test_speech_and_interaction_warm_relationships() {
    let mut world = seeded_world();
    let alice = world.spawn_actor("alice", Position::new(0.0, 0.0, 0.0));
    let bob = world.spawn_actor("bob", Position::new(1.0, 0.0, 0.0));

    assert!(propose(
        &mut world,
        alice,
        ActionKind::Interact {
            target: bob,
            verb: "greet".into(),
            detail: None,
        },
    )
    .is_accepted());
    assert!(propose(
        &mut world,
        bob,
        ActionKind::Speak {
            message: "hello alice".into(),
            target: Some(alice),
        },
    )
    .is_accepted());

    let tie = world.relationships.get(alice, bob).expect("tie exists");
    assert!(tie.affinity > 0.0);
    assert!(tie.familiarity > 0.0);
}
