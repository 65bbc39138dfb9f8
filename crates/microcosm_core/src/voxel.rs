//! Sparse voxel grid with structures, zones, and line-of-sight queries.

use std::collections::HashMap;

use microcosm_data::{BlockPos, BoundingBox, Structure, VoxelBlock, WorldFeature, Zone};
use uuid::Uuid;

use crate::config::WorldConfig;

/// Authoritative spatial state: block occupancy, structure and zone
/// registries, and world features. Only the arbiter mutates it.
#[derive(Debug, Default)]
pub struct VoxelSpace {
    blocks: HashMap<BlockPos, VoxelBlock>,
    structures: HashMap<Uuid, Structure>,
    zones: HashMap<Uuid, Zone>,
    features: HashMap<Uuid, WorldFeature>,
    half_extent: i32,
    build_height: i32,
}

impl VoxelSpace {
    #[must_use]
    pub fn new(world: &WorldConfig) -> Self {
        Self {
            half_extent: world.half_extent,
            build_height: world.build_height,
            ..Self::default()
        }
    }

    /// Whether `pos` lies inside the buildable volume.
    #[must_use]
    pub fn in_bounds(&self, pos: BlockPos) -> bool {
        pos.x.abs() <= self.half_extent
            && pos.y.abs() <= self.half_extent
            && pos.z >= 0
            && pos.z <= self.build_height
    }

    #[must_use]
    pub fn block_at(&self, pos: BlockPos) -> Option<&VoxelBlock> {
        self.blocks.get(&pos)
    }

    #[must_use]
    pub fn is_occupied(&self, pos: BlockPos) -> bool {
        self.blocks.contains_key(&pos)
    }

    /// True if a collidable block sits at `pos`.
    #[must_use]
    pub fn is_solid(&self, pos: BlockPos) -> bool {
        self.blocks.get(&pos).is_some_and(|b| b.collidable)
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks whose position falls inside `bounds`.
    #[must_use]
    pub fn blocks_in_range(&self, bounds: &BoundingBox) -> Vec<&VoxelBlock> {
        self.blocks
            .values()
            .filter(|b| bounds.contains(b.pos))
            .collect()
    }

    /// Inserts a block. The caller must have verified vacancy and bounds;
    /// an existing occupant is a logic error and is not overwritten.
    pub fn insert(&mut self, block: VoxelBlock) {
        debug_assert!(self.in_bounds(block.pos));
        self.blocks.entry(block.pos).or_insert(block);
    }

    /// Removes and returns the block at `pos`, if any.
    pub fn remove(&mut self, pos: BlockPos) -> Option<VoxelBlock> {
        self.blocks.remove(&pos)
    }

    pub fn add_structure(&mut self, structure: Structure) {
        self.structures.insert(structure.id, structure);
    }

    #[must_use]
    pub fn structure(&self, id: Uuid) -> Option<&Structure> {
        self.structures.get(&id)
    }

    /// Structures whose bounds overlap `bounds`.
    pub fn structures_overlapping<'a>(
        &'a self,
        bounds: &'a BoundingBox,
    ) -> impl Iterator<Item = &'a Structure> {
        self.structures
            .values()
            .filter(move |s| s.bounds.overlaps(bounds))
    }

    /// Structures within `radius` of a point, for neighborhood summaries.
    #[must_use]
    pub fn structures_near(&self, x: f64, y: f64, z: f64, radius: f64) -> Vec<&Structure> {
        self.structures
            .values()
            .filter(|s| s.bounds.intersects_sphere(x, y, z, radius))
            .collect()
    }

    #[must_use]
    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    pub fn add_zone(&mut self, zone: Zone) {
        self.zones.insert(zone.id, zone);
    }

    #[must_use]
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Zones whose bounds overlap `bounds`.
    pub fn zones_overlapping<'a>(
        &'a self,
        bounds: &'a BoundingBox,
    ) -> impl Iterator<Item = &'a Zone> {
        self.zones.values().filter(move |z| z.bounds.overlaps(bounds))
    }

    /// The zone containing `pos`, if any. Zones never overlap, so at most
    /// one matches.
    #[must_use]
    pub fn zone_at(&self, pos: BlockPos) -> Option<&Zone> {
        self.zones.values().find(|z| z.bounds.contains(pos))
    }

    pub fn add_feature(&mut self, feature: WorldFeature) {
        self.features.insert(feature.id, feature);
    }

    #[must_use]
    pub fn feature(&self, id: Uuid) -> Option<&WorldFeature> {
        self.features.get(&id)
    }

    pub fn features_mut(&mut self) -> impl Iterator<Item = &mut WorldFeature> {
        self.features.values_mut()
    }

    pub fn features(&self) -> impl Iterator<Item = &WorldFeature> {
        self.features.values()
    }

    /// Architecture landmarks within `radius` of a point.
    #[must_use]
    pub fn landmarks_near(&self, x: f64, y: f64, radius: f64) -> Vec<&WorldFeature> {
        self.features
            .values()
            .filter(|f| {
                f.architecture && {
                    let dx = f.x - x;
                    let dy = f.y - y;
                    (dx * dx + dy * dy).sqrt() <= radius + f.radius
                }
            })
            .collect()
    }

    /// Line of sight between two integer positions.
    ///
    /// Walks the 3D Bresenham line from `from` to `to`, excluding both
    /// endpoints, and reports false if any intermediate cell holds a
    /// collidable block. The candidate cells are collected first and
    /// checked in one pass over the map.
    #[must_use]
    pub fn line_of_sight(&self, from: BlockPos, to: BlockPos) -> bool {
        let cells = bresenham_3d(from, to);
        cells
            .iter()
            .skip(1)
            .take(cells.len().saturating_sub(2))
            .all(|pos| !self.is_solid(*pos))
    }
}

/// All integer cells on the 3D Bresenham line from `a` to `b`, inclusive
/// of both endpoints, in traversal order.
#[must_use]
pub fn bresenham_3d(a: BlockPos, b: BlockPos) -> Vec<BlockPos> {
    let (mut x, mut y, mut z) = (a.x, a.y, a.z);
    let dx = (b.x - a.x).abs();
    let dy = (b.y - a.y).abs();
    let dz = (b.z - a.z).abs();
    let sx = if b.x > a.x { 1 } else { -1 };
    let sy = if b.y > a.y { 1 } else { -1 };
    let sz = if b.z > a.z { 1 } else { -1 };

    let mut out = Vec::with_capacity((dx.max(dy).max(dz) + 1) as usize);
    out.push(a);

    if dx >= dy && dx >= dz {
        let mut p1 = 2 * dy - dx;
        let mut p2 = 2 * dz - dx;
        while x != b.x {
            x += sx;
            if p1 >= 0 {
                y += sy;
                p1 -= 2 * dx;
            }
            if p2 >= 0 {
                z += sz;
                p2 -= 2 * dx;
            }
            p1 += 2 * dy;
            p2 += 2 * dz;
            out.push(BlockPos::new(x, y, z));
        }
    } else if dy >= dx && dy >= dz {
        let mut p1 = 2 * dx - dy;
        let mut p2 = 2 * dz - dy;
        while y != b.y {
            y += sy;
            if p1 >= 0 {
                x += sx;
                p1 -= 2 * dy;
            }
            if p2 >= 0 {
                z += sz;
                p2 -= 2 * dy;
            }
            p1 += 2 * dx;
            p2 += 2 * dz;
            out.push(BlockPos::new(x, y, z));
        }
    } else {
        let mut p1 = 2 * dy - dz;
        let mut p2 = 2 * dx - dz;
        while z != b.z {
            z += sz;
            if p1 >= 0 {
                y += sy;
                p1 -= 2 * dz;
            }
            if p2 >= 0 {
                x += sx;
                p2 -= 2 * dz;
            }
            p1 += 2 * dy;
            p2 += 2 * dx;
            out.push(BlockPos::new(x, y, z));
        }
    }

    out
}
