//! Battle grid
//!
//! Fixed-size cell matrix with terrain and occupancy. Distance follows the
//! 5e convention where diagonal movement costs the same as orthogonal
//! (Chebyshev squares times the square size).

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use super::EngineError;

/// Size of one grid square in feet
pub const FEET_PER_SQUARE: u32 = 5;

/// A grid coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Terrain kind for a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    #[default]
    Open,
    Wall,
    /// Costs double movement to enter
    Difficult,
}

/// A single cell on the battle grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridCell {
    pub x: u32,
    pub y: u32,
    pub terrain: Terrain,
    /// Occupying character, at most one; walls are never occupied
    pub occupant_id: Option<String>,
}

/// Distance in feet between two positions (diagonals cost the same as
/// orthogonal steps)
pub fn distance(a: Position, b: Position) -> u32 {
    let dx = a.x.abs_diff(b.x);
    let dy = a.y.abs_diff(b.y);
    dx.max(dy) * FEET_PER_SQUARE
}

/// Whether two positions are within 5ft of each other, diagonals included
pub fn is_adjacent(a: Position, b: Position) -> bool {
    distance(a, b) <= FEET_PER_SQUARE
}

/// A reachable cell from a movement flood fill
#[derive(Debug, Clone)]
pub struct Reachable {
    /// Minimal movement cost in feet to enter this cell
    pub cost: u32,
    /// Minimal-cost path, starting cell first, destination last
    pub path: Vec<Position>,
}

/// The battle grid: a width x height cell matrix, fixed at game creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    /// Row-major cells, indexed y * width + x
    cells: Vec<GridCell>,
}

impl Grid {
    /// Create an all-open grid
    pub fn new(width: u32, height: u32) -> Self {
        let mut cells = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(GridCell {
                    x,
                    y,
                    terrain: Terrain::Open,
                    occupant_id: None,
                });
            }
        }
        Self { width, height, cells }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether a position lies within the grid
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Get the cell at a position, if in bounds
    pub fn cell(&self, pos: Position) -> Option<&GridCell> {
        if self.in_bounds(pos) {
            self.cells.get((pos.y * self.width + pos.x) as usize)
        } else {
            None
        }
    }

    /// Get the cell at a position mutably, if in bounds
    pub fn cell_mut(&mut self, pos: Position) -> Option<&mut GridCell> {
        if self.in_bounds(pos) {
            self.cells.get_mut((pos.y * self.width + pos.x) as usize)
        } else {
            None
        }
    }

    /// Set the terrain of a cell (used when building arenas)
    pub fn set_terrain(&mut self, pos: Position, terrain: Terrain) -> Result<(), EngineError> {
        let cell = self
            .cell_mut(pos)
            .ok_or(EngineError::OutOfBounds(pos.x, pos.y))?;
        cell.terrain = terrain;
        Ok(())
    }

    /// Check line of sight between two positions
    ///
    /// Traces a Bresenham line; blocked only if an interior traced cell is a
    /// wall. The endpoints themselves never block.
    pub fn line_of_sight(&self, from: Position, to: Position) -> bool {
        let (mut x0, mut y0) = (from.x as i64, from.y as i64);
        let (x1, y1) = (to.x as i64, to.y as i64);

        let dx = (x1 - x0).abs();
        let dy = (y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx - dy;

        loop {
            let here = Position::new(x0 as u32, y0 as u32);
            if here != from && here != to {
                if let Some(cell) = self.cell(here) {
                    if cell.terrain == Terrain::Wall {
                        return false;
                    }
                }
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 > -dy {
                err -= dy;
                x0 += sx;
            }
            if e2 < dx {
                err += dx;
                y0 += sy;
            }
        }

        true
    }

    /// All cells reachable from `start` within `budget` feet of movement
    ///
    /// Cost-relaxing flood fill: entering an open cell costs 5ft, difficult
    /// terrain 10ft. Walls and occupied cells are not traversable. Each
    /// entry carries the minimal cost and the minimal-cost path. The
    /// starting cell itself is not included.
    pub fn valid_moves(&self, start: Position, budget: u32) -> HashMap<Position, Reachable> {
        let mut best: HashMap<Position, u32> = HashMap::new();
        let mut prev: HashMap<Position, Position> = HashMap::new();
        best.insert(start, 0);

        let mut queue: VecDeque<Position> = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let cost = best[&current];
            for dx in -1i64..=1 {
                for dy in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = current.x as i64 + dx;
                    let ny = current.y as i64 + dy;
                    if nx < 0 || ny < 0 {
                        continue;
                    }
                    let next = Position::new(nx as u32, ny as u32);
                    let Some(cell) = self.cell(next) else {
                        continue;
                    };
                    if cell.terrain == Terrain::Wall {
                        continue;
                    }
                    if cell.occupant_id.is_some() && next != start {
                        continue;
                    }
                    let step = match cell.terrain {
                        Terrain::Difficult => 2 * FEET_PER_SQUARE,
                        _ => FEET_PER_SQUARE,
                    };
                    let next_cost = cost + step;
                    if next_cost > budget {
                        continue;
                    }
                    if best.get(&next).is_none_or(|&c| c > next_cost) {
                        best.insert(next, next_cost);
                        prev.insert(next, current);
                        queue.push_back(next);
                    }
                }
            }
        }

        let mut reachable = HashMap::new();
        for (&pos, &cost) in &best {
            if pos == start {
                continue;
            }
            let mut path = vec![pos];
            let mut cursor = pos;
            while let Some(&p) = prev.get(&cursor) {
                path.push(p);
                cursor = p;
            }
            path.reverse();
            reachable.insert(pos, Reachable { cost, path });
        }
        reachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_diagonal_rule() {
        // 4 squares of separation regardless of the diagonal component
        assert_eq!(distance(Position::new(0, 0), Position::new(3, 4)), 20);
        assert_eq!(distance(Position::new(0, 0), Position::new(4, 4)), 20);
        assert_eq!(distance(Position::new(0, 0), Position::new(0, 0)), 0);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = Position::new(2, 7);
        let b = Position::new(9, 3);
        assert_eq!(distance(a, b), distance(b, a));
    }

    #[test]
    fn test_adjacency() {
        let center = Position::new(5, 5);
        assert!(is_adjacent(center, Position::new(6, 6)));
        assert!(is_adjacent(center, Position::new(5, 4)));
        assert!(is_adjacent(center, center));
        assert!(!is_adjacent(center, Position::new(7, 5)));
    }

    #[test]
    fn test_line_of_sight_open() {
        let grid = Grid::new(10, 10);
        assert!(grid.line_of_sight(Position::new(0, 0), Position::new(9, 9)));
    }

    #[test]
    fn test_line_of_sight_blocked_by_wall() {
        let mut grid = Grid::new(10, 10);
        grid.set_terrain(Position::new(5, 5), Terrain::Wall).unwrap();
        assert!(!grid.line_of_sight(Position::new(0, 0), Position::new(9, 9)));
    }

    #[test]
    fn test_line_of_sight_endpoints_never_block() {
        let mut grid = Grid::new(10, 10);
        grid.set_terrain(Position::new(0, 0), Terrain::Wall).unwrap();
        grid.set_terrain(Position::new(3, 0), Terrain::Wall).unwrap();
        assert!(grid.line_of_sight(Position::new(0, 0), Position::new(3, 0)));
    }

    #[test]
    fn test_adjacent_cells_always_visible() {
        let mut grid = Grid::new(10, 10);
        grid.set_terrain(Position::new(4, 4), Terrain::Wall).unwrap();
        assert!(grid.line_of_sight(Position::new(3, 4), Position::new(4, 5)));
    }

    #[test]
    fn test_valid_moves_budget() {
        let grid = Grid::new(10, 10);
        let moves = grid.valid_moves(Position::new(5, 5), 10);
        // Two squares of movement in every direction: a 5x5 block minus start
        assert_eq!(moves.len(), 24);
        assert!(moves.contains_key(&Position::new(7, 7)));
        assert!(!moves.contains_key(&Position::new(8, 5)));
        assert!(!moves.contains_key(&Position::new(5, 5)));
    }

    #[test]
    fn test_valid_moves_difficult_terrain_costs_double() {
        let mut grid = Grid::new(10, 10);
        grid.set_terrain(Position::new(1, 0), Terrain::Difficult).unwrap();
        // 5ft budget cannot enter the difficult cell straight ahead
        let moves = grid.valid_moves(Position::new(0, 0), 5);
        assert!(!moves.contains_key(&Position::new(1, 0)));
        // 10ft can, at cost 10
        let moves = grid.valid_moves(Position::new(0, 0), 10);
        assert_eq!(moves[&Position::new(1, 0)].cost, 10);
    }

    #[test]
    fn test_valid_moves_blocked_by_wall_and_occupant() {
        let mut grid = Grid::new(3, 1);
        grid.set_terrain(Position::new(1, 0), Terrain::Wall).unwrap();
        let moves = grid.valid_moves(Position::new(0, 0), 30);
        // The wall seals off the corridor entirely
        assert!(moves.is_empty());

        let mut grid = Grid::new(3, 1);
        grid.cell_mut(Position::new(1, 0)).unwrap().occupant_id = Some("blocker".into());
        let moves = grid.valid_moves(Position::new(0, 0), 30);
        assert!(moves.is_empty());
    }

    #[test]
    fn test_valid_moves_paths_are_minimal() {
        let grid = Grid::new(10, 10);
        let moves = grid.valid_moves(Position::new(0, 0), 20);
        let reach = &moves[&Position::new(4, 4)];
        assert_eq!(reach.cost, 20);
        // Diagonal path: 5 cells including the start
        assert_eq!(reach.path.len(), 5);
        assert_eq!(reach.path[0], Position::new(0, 0));
        assert_eq!(*reach.path.last().unwrap(), Position::new(4, 4));
    }
}
