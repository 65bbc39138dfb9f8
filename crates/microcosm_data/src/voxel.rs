use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Integer voxel coordinate. Exactly one block can occupy a `BlockPos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[must_use]
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn distance(&self, other: &BlockPos) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        let dz = f64::from(self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A unit cube in the world grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoxelBlock {
    pub pos: BlockPos,
    pub color: String,
    pub material: String,
    /// Whether the block obstructs movement and line of sight.
    pub collidable: bool,
    pub placed_by: Uuid,
    pub structure_id: Option<Uuid>,
    pub placed_tick: u64,
}

/// Inclusive axis-aligned bounding box over integer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: BlockPos,
    pub max: BlockPos,
}

impl BoundingBox {
    /// Builds a box from two arbitrary corners.
    #[must_use]
    pub fn from_corners(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    #[must_use]
    pub fn contains(&self, p: BlockPos) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    #[must_use]
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Box-to-sphere overlap: true if the sphere at `(cx, cy, cz)` with
    /// `radius` touches the box. Used for "nearby structures" queries.
    #[must_use]
    pub fn intersects_sphere(&self, cx: f64, cy: f64, cz: f64, radius: f64) -> bool {
        let nx = cx.clamp(f64::from(self.min.x), f64::from(self.max.x));
        let ny = cy.clamp(f64::from(self.min.y), f64::from(self.max.y));
        let nz = cz.clamp(f64::from(self.min.z), f64::from(self.max.z));
        let dx = cx - nx;
        let dy = cy - ny;
        let dz = cz - nz;
        dx * dx + dy * dy + dz * dz <= radius * radius
    }

    /// Number of integer cells the box spans.
    #[must_use]
    pub fn cell_count(&self) -> u64 {
        let dx = u64::try_from(self.max.x - self.min.x + 1).unwrap_or(0);
        let dy = u64::try_from(self.max.y - self.min.y + 1).unwrap_or(0);
        let dz = u64::try_from(self.max.z - self.min.z + 1).unwrap_or(0);
        dx * dy * dz
    }
}

/// Named bounding-box grouping of voxels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub id: Uuid,
    pub name: String,
    pub owner: Uuid,
    pub kind: String,
    pub bounds: BoundingBox,
    pub created_tick: u64,
}

/// Named region with behavioral rules, independent of voxel occupancy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: Uuid,
    pub name: String,
    pub owner: Uuid,
    pub bounds: BoundingBox,
    /// Whether non-owners may place or destroy blocks inside the zone.
    pub open_building: bool,
}

/// Resource node or terrain zone, mutated only by the maintenance
/// subsystem, never by direct actor action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldFeature {
    pub id: Uuid,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub radius: f64,
    /// Remaining resource amount in [0, capacity].
    pub amount: f64,
    pub capacity: f64,
    /// Amount regenerated per tick.
    pub regen_rate: f64,
    /// True for architecture landmarks that widen encounter radii.
    #[serde(default)]
    pub architecture: bool,
}

impl WorldFeature {
    /// Applies one tick of regeneration, saturating at capacity.
    pub fn regenerate(&mut self) {
        self.amount = (self.amount + self.regen_rate).min(self.capacity);
    }
}
