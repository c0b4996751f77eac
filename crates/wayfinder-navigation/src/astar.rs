/*

A* over the sparse spatial grid.

    f(n) = g(n) + h(n)

    g(n) = cost of the best known route from the start to n
    h(n) = Manhattan distance from n to the target (in cells)

Edges connect the 8 surrounding cells that are materialized and walkable.
An edge costs the Manhattan distance between its two cells: 1 for an axis
step, 2 for a diagonal one. This keeps every cost an integer and makes
diagonal shortcuts no cheaper than the two axis steps they replace.

Loop:
    - pop the open cell with the lowest (f, h)
    - move it to the closed set
    - if it is the target, walk parents back to the start
    - relax each usable neighbor that is not closed

If the open set runs dry, the closed cell nearest to the target (squared
distance) becomes the endpoint of a partial path.

*/

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::trace;
use wayfinder_common::{GridCoordinate, Vector3};

use crate::grid::{Cell, SpatialGrid};
use crate::heap::{IndexedHeap, SearchPriority};

/// Outcome of a path search.
///
/// A complete path starts on the start cell and ends on the target cell. A
/// partial path leads from the start towards the explored cell closest to the
/// target and leaves out the start cell itself, so it is empty when no explored
/// cell is closer than the start.
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    /// True when the path reaches the target cell.
    pub is_complete: bool,
    /// Cells to traverse, in order.
    pub path: Vec<Cell>,
    /// Number of cells expanded by the search.
    pub nodes_explored: usize,
    /// Accumulated edge cost of the path.
    pub total_cost: u32,
}

impl PathResult {
    /// Creates a result for a path that reaches the target.
    pub fn complete(path: Vec<Cell>, total_cost: u32, nodes_explored: usize) -> Self {
        Self {
            is_complete: true,
            path,
            nodes_explored,
            total_cost,
        }
    }

    /// Creates a result for a best-effort path.
    pub fn partial(path: Vec<Cell>, total_cost: u32, nodes_explored: usize) -> Self {
        Self {
            is_complete: false,
            path,
            nodes_explored,
            total_cost,
        }
    }

    /// An empty partial result, used when a search could not run at all.
    pub fn empty() -> Self {
        Self::partial(Vec::new(), 0, 0)
    }

    /// Returns true when the path has no cells.
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// World positions of the path cells.
    pub fn waypoints(&self) -> Vec<Vector3> {
        self.path.iter().map(Cell::world_position).collect()
    }

    /// Coordinates of the path cells.
    pub fn coordinates(&self) -> Vec<GridCoordinate> {
        self.path.iter().map(Cell::coordinate).collect()
    }
}

impl fmt::Display for PathResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PathResult {{ complete: {}, path_length: {}, total_cost: {}, nodes_explored: {} }}",
            self.is_complete,
            self.path.len(),
            self.total_cost,
            self.nodes_explored
        )
    }
}

/// Per-search bookkeeping for one reached cell.
#[derive(Debug, Clone, Copy)]
struct SearchNode {
    parent: Option<GridCoordinate>,
    g_cost: u32,
}

/// Heuristic and step cost: Manhattan distance in cells.
pub fn heuristic(a: GridCoordinate, b: GridCoordinate) -> u32 {
    a.manhattan_distance(&b)
}

/// Searches a path between two world positions.
///
/// The start and target cells are materialized first, so both always exist;
/// every other cell must already be in the grid to be traversed.
///
/// # Arguments
/// * `grid` - The grid to plan in.
/// * `start` - Starting point in world coordinates.
/// * `target` - Destination in world coordinates.
pub fn find_path(grid: &mut SpatialGrid, start: &Vector3, target: &Vector3) -> PathResult {
    let start = grid.get_or_create(grid.world_to_grid(start)).coordinate();
    let target = grid.get_or_create(grid.world_to_grid(target)).coordinate();
    search(grid, start, target)
}

/// Searches a path between two grid coordinates on the grid as it is.
///
/// Neither endpoint is created. A missing start yields an empty partial path.
pub fn search(grid: &SpatialGrid, start: GridCoordinate, target: GridCoordinate) -> PathResult {
    if grid.get(start).is_none() {
        return PathResult::empty();
    }

    let mut open_set: IndexedHeap<GridCoordinate, SearchPriority> = IndexedHeap::new();
    let mut nodes: HashMap<GridCoordinate, SearchNode> = HashMap::new();
    // Closed cells in expansion order, so the partial endpoint is deterministic
    let mut closed_order: Vec<GridCoordinate> = Vec::new();
    let mut closed: HashSet<GridCoordinate> = HashSet::new();

    nodes.insert(
        start,
        SearchNode {
            parent: None,
            g_cost: 0,
        },
    );
    open_set.add(start, SearchPriority::new(0, heuristic(start, target)));

    while let Some((current, _)) = open_set.remove_first() {
        closed.insert(current);
        closed_order.push(current);

        let current_g = nodes.get(&current).map_or(0, |n| n.g_cost);

        if current == target {
            let path = retrace(grid, &nodes, start, current, true);
            trace!(%start, %target, nodes_explored = closed_order.len(), "Complete path found");
            return PathResult::complete(path, current_g, closed_order.len());
        }

        for neighbor in grid.neighbors(current) {
            let coord = neighbor.coordinate();
            if !neighbor.is_walkable() || closed.contains(&coord) {
                continue;
            }

            let tentative_g = current_g + heuristic(current, coord);
            let queued = open_set.contains(&coord);
            let known_g = nodes.get(&coord).map_or(u32::MAX, |n| n.g_cost);
            if tentative_g < known_g || !queued {
                nodes.insert(
                    coord,
                    SearchNode {
                        parent: Some(current),
                        g_cost: tentative_g,
                    },
                );
                let priority = SearchPriority::new(tentative_g, heuristic(coord, target));
                if queued {
                    open_set.update(&coord, priority);
                } else {
                    open_set.add(coord, priority);
                }
            }
        }
    }

    // First cell at the minimum distance wins ties
    let mut closest = start;
    let mut closest_distance = i64::MAX;
    for coord in &closed_order {
        let distance = coord.distance_squared(&target);
        if distance < closest_distance {
            closest = *coord;
            closest_distance = distance;
        }
    }
    let total_cost = nodes.get(&closest).map_or(0, |n| n.g_cost);
    let path = retrace(grid, &nodes, start, closest, false);
    trace!(
        %start,
        %target,
        %closest,
        nodes_explored = closed_order.len(),
        "No complete path, returning partial path"
    );
    PathResult::partial(path, total_cost, closed_order.len())
}

/// Walks parent links from `end` back to `start`.
fn retrace(
    grid: &SpatialGrid,
    nodes: &HashMap<GridCoordinate, SearchNode>,
    start: GridCoordinate,
    end: GridCoordinate,
    include_start: bool,
) -> Vec<Cell> {
    let mut path = Vec::new();
    let mut current = end;
    while current != start {
        if let Some(cell) = grid.get(current) {
            path.push(*cell);
        }
        match nodes.get(&current).and_then(|n| n.parent) {
            Some(parent) => current = parent,
            None => break,
        }
    }
    if include_start {
        if let Some(cell) = grid.get(start) {
            path.push(*cell);
        }
    }
    path.reverse();
    path
}
