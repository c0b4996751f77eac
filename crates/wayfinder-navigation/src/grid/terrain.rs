//! Ground probing: how the grid learns the height and walkability of a cell.

use std::fmt;

use wayfinder_common::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bitmask over the 32 terrain layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct LayerMask(pub u32);

impl LayerMask {
    /// Layer index of regular ground.
    pub const GROUND_LAYER: u8 = 0;
    /// Layer index of obstacles.
    pub const OBSTACLE_LAYER: u8 = 1;

    /// Mask containing only the ground layer.
    pub const GROUND: LayerMask = LayerMask(1 << Self::GROUND_LAYER);
    /// Mask containing no layer.
    pub const NONE: LayerMask = LayerMask(0);

    /// Builds a mask containing a single layer. Layers above 31 are ignored.
    pub const fn from_layer(layer: u8) -> Self {
        if layer < 32 {
            LayerMask(1 << layer)
        } else {
            LayerMask::NONE
        }
    }

    /// Returns true when `layer` is part of the mask.
    pub const fn contains(&self, layer: u8) -> bool {
        layer < 32 && self.0 & (1 << layer) != 0
    }

    /// Union of two masks.
    pub const fn with(self, other: LayerMask) -> Self {
        LayerMask(self.0 | other.0)
    }
}

impl fmt::Display for LayerMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#034b}", self.0)
    }
}

/// Surface found by a ground probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundHit {
    /// World height of the surface.
    pub height: f32,
    /// Layer index of the surface.
    pub layer: u8,
}

/// Terrain collaborator used to classify new cells.
///
/// A probe casts a sphere of `radius` straight down from `origin` and reports
/// the first surface it touches, or `None` when nothing is below.
pub trait GroundProbe: Send + Sync {
    /// Casts downwards from `origin`.
    fn probe(&self, origin: &Vector3, radius: f32) -> Option<GroundHit>;
}

impl<F> GroundProbe for F
where
    F: Fn(&Vector3, f32) -> Option<GroundHit> + Send + Sync,
{
    fn probe(&self, origin: &Vector3, radius: f32) -> Option<GroundHit> {
        self(origin, radius)
    }
}

/// An infinite flat plane on a single layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatGround {
    /// Plane height.
    pub height: f32,
    /// Plane layer.
    pub layer: u8,
}

impl Default for FlatGround {
    fn default() -> Self {
        FlatGround {
            height: 0.0,
            layer: LayerMask::GROUND_LAYER,
        }
    }
}

impl GroundProbe for FlatGround {
    fn probe(&self, origin: &Vector3, _radius: f32) -> Option<GroundHit> {
        (origin.y >= self.height).then_some(GroundHit {
            height: self.height,
            layer: self.layer,
        })
    }
}

/// Axis-aligned rectangle on the horizontal plane, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    /// Smallest x.
    pub min_x: f32,
    /// Smallest z.
    pub min_z: f32,
    /// Largest x.
    pub max_x: f32,
    /// Largest z.
    pub max_z: f32,
}

impl Region {
    /// Builds a region from two opposite corners, in any order.
    pub fn new(x0: f32, z0: f32, x1: f32, z1: f32) -> Self {
        Region {
            min_x: x0.min(x1),
            min_z: z0.min(z1),
            max_x: x0.max(x1),
            max_z: z0.max(z1),
        }
    }

    /// Returns true when `(x, z)` lies within `margin` of the region.
    pub fn contains(&self, x: f32, z: f32, margin: f32) -> bool {
        let dx = (self.min_x - x).max(0.0).max(x - self.max_x);
        let dz = (self.min_z - z).max(0.0).max(z - self.max_z);
        dx * dx + dz * dz <= margin * margin
    }
}

/// Flat ground with box obstacles and holes.
///
/// Obstacles stand `obstacle_height` above the ground on `obstacle_layer` and
/// are hit whenever the probe sphere overlaps them. Holes have no ground at all;
/// a probe only falls through when its center is inside the hole.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TerrainLayout {
    /// Height of the ground plane.
    pub ground_height: f32,
    /// Layer of the ground plane.
    pub ground_layer: u8,
    /// Height of obstacle tops above the ground.
    pub obstacle_height: f32,
    /// Layer of obstacles.
    pub obstacle_layer: u8,
    /// Obstacle footprints.
    pub obstacles: Vec<Region>,
    /// Areas without ground.
    pub holes: Vec<Region>,
}

impl Default for TerrainLayout {
    fn default() -> Self {
        TerrainLayout {
            ground_height: 0.0,
            ground_layer: LayerMask::GROUND_LAYER,
            obstacle_height: 2.0,
            obstacle_layer: LayerMask::OBSTACLE_LAYER,
            obstacles: Vec::new(),
            holes: Vec::new(),
        }
    }
}

impl TerrainLayout {
    /// Adds an obstacle footprint.
    pub fn with_obstacle(mut self, region: Region) -> Self {
        self.obstacles.push(region);
        self
    }

    /// Adds a hole.
    pub fn with_hole(mut self, region: Region) -> Self {
        self.holes.push(region);
        self
    }
}

impl GroundProbe for TerrainLayout {
    fn probe(&self, origin: &Vector3, radius: f32) -> Option<GroundHit> {
        let obstacle_top = self.ground_height + self.obstacle_height;
        if origin.y >= obstacle_top
            && self
                .obstacles
                .iter()
                .any(|r| r.contains(origin.x, origin.z, radius))
        {
            return Some(GroundHit {
                height: obstacle_top,
                layer: self.obstacle_layer,
            });
        }
        if origin.y < self.ground_height
            || self.holes.iter().any(|r| r.contains(origin.x, origin.z, 0.0))
        {
            return None;
        }
        Some(GroundHit {
            height: self.ground_height,
            layer: self.ground_layer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_mask() {
        let mask = LayerMask::GROUND.with(LayerMask::from_layer(4));
        assert!(mask.contains(0));
        assert!(mask.contains(4));
        assert!(!mask.contains(1));
        assert!(!mask.contains(40));
        assert_eq!(LayerMask::from_layer(40), LayerMask::NONE);
    }

    #[test]
    fn test_flat_ground() {
        let ground = FlatGround::default();
        let hit = ground.probe(&Vector3::new(3.0, 1000.0, -2.0), 1.0).unwrap();
        assert_eq!(hit.height, 0.0);
        assert_eq!(hit.layer, LayerMask::GROUND_LAYER);
        assert!(ground.probe(&Vector3::new(0.0, -1.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn test_region_contains_with_margin() {
        let region = Region::new(2.0, 2.0, 0.0, 0.0);
        assert!(region.contains(1.0, 1.0, 0.0));
        assert!(!region.contains(2.5, 1.0, 0.0));
        assert!(region.contains(2.5, 1.0, 0.5));
        // Corner distance is sqrt(0.5)
        assert!(!region.contains(2.5, 2.5, 0.5));
    }

    #[test]
    fn test_terrain_layout() {
        let terrain = TerrainLayout::default()
            .with_obstacle(Region::new(4.0, -1.0, 5.0, 1.0))
            .with_hole(Region::new(-5.0, -5.0, -3.0, -3.0));

        let ground = terrain.probe(&Vector3::new(0.0, 1000.0, 0.0), 0.0).unwrap();
        assert_eq!(ground.layer, LayerMask::GROUND_LAYER);

        let wall = terrain.probe(&Vector3::new(4.5, 1000.0, 0.0), 0.0).unwrap();
        assert_eq!(wall.layer, LayerMask::OBSTACLE_LAYER);
        assert_eq!(wall.height, 2.0);

        // Thick probes clip the obstacle from a neighboring cell
        assert_eq!(terrain.probe(&Vector3::new(3.0, 1000.0, 0.0), 1.0).unwrap().layer, 1);
        assert_eq!(terrain.probe(&Vector3::new(3.0, 1000.0, 0.0), 0.5).unwrap().layer, 0);

        assert!(terrain.probe(&Vector3::new(-4.0, 1000.0, -4.0), 1.0).is_none());
    }

    #[test]
    fn test_closure_probe() {
        let probe = |origin: &Vector3, _radius: f32| {
            (origin.x < 0.0).then_some(GroundHit {
                height: 1.5,
                layer: 0,
            })
        };
        assert_eq!(probe.probe(&Vector3::new(-1.0, 10.0, 0.0), 1.0).unwrap().height, 1.5);
        assert!(probe.probe(&Vector3::new(1.0, 10.0, 0.0), 1.0).is_none());
    }
}
