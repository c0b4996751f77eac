use std::collections::HashSet;

use wayfinder_common::{GridCoordinate, Vector3};
use wayfinder_navigation::astar;
use wayfinder_navigation::grid::{GroundHit, LayerMask, SpatialGrid};
use wayfinder_navigation::GridConfig;

// 0 = ground
// 1 = obstacle
// Row 0 is z = -4, column 0 is x = -4
const MAP: [[u8; 9]; 9] = [
    [0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 1, 1, 0],
    [0, 0, 0, 0, 1, 0, 0, 0, 0],
    [0, 0, 1, 1, 1, 1, 0, 1, 0],
    [0, 0, 0, 0, 0, 1, 0, 1, 0],
    [0, 1, 1, 1, 0, 1, 0, 1, 1],
    [0, 0, 0, 1, 0, 0, 0, 0, 0],
    [0, 1, 0, 1, 0, 1, 1, 1, 0],
    [0, 1, 0, 0, 0, 0, 0, 0, 0],
];

fn main() {
    let probe = |origin: &Vector3, _radius: f32| {
        let col = (origin.x.round() as i32 + 4) as usize;
        let row = (origin.z.round() as i32 + 4) as usize;
        let layer = match MAP.get(row).and_then(|r| r.get(col)) {
            Some(0) => LayerMask::GROUND_LAYER,
            _ => LayerMask::OBSTACLE_LAYER,
        };
        Some(GroundHit { height: 0.0, layer })
    };
    let config = GridConfig {
        half_extent: 4,
        bake_on_start: true,
        ..GridConfig::default()
    };
    let mut grid = SpatialGrid::new(config, probe).expect("valid grid configuration");

    let start = Vector3::new(-4.0, 0.0, -4.0);
    let goal = Vector3::new(4.0, 0.0, 4.0);

    println!("Grid:\n{}", grid);
    println!("Start: {}, Goal: {}", grid.world_to_grid(&start), grid.world_to_grid(&goal));

    let result = astar::find_path(&mut grid, &start, &goal);
    println!("\n{}", result);
    if result.is_empty() {
        println!("\nNo path found.");
        return;
    }

    let on_path: HashSet<GridCoordinate> = result.coordinates().into_iter().collect();
    println!("\nGrid with path:");
    for z in (-4..=4).rev() {
        for x in -4..=4 {
            let coord = GridCoordinate::new(x, z);
            let glyph = match grid.get(coord) {
                _ if coord == grid.world_to_grid(&start) => 'S',
                _ if coord == grid.world_to_grid(&goal) => 'G',
                _ if on_path.contains(&coord) => '*',
                Some(cell) if !cell.is_walkable() => 'X',
                _ => '.',
            };
            print!("{} ", glyph);
        }
        println!();
    }
}
