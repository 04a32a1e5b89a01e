// maze.rs - Grid maze and the seeded backtracking generator
use crate::error_handling::{ExplorerError, Result};
use crate::types::{CellKind, Direction, Position};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

/// Smallest grid edge that still fits a start and a distinct goal.
pub const MIN_DIMENSION: i32 = 5;

/// Largest grid edge accepted from callers or documents.
pub const MAX_DIMENSION: i32 = 4095;

/// Lattice steps used while carving: up, right, down, left.
const CARVE_OFFSETS: [(i32, i32); 4] = [(0, -2), (2, 0), (0, 2), (-2, 0)];

/// One extra opening attempt per this many cells.
const OPENING_DENSITY: i32 = 30;

/// Immutable walled grid with exactly one start and one goal cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Maze {
    width: i32,
    height: i32,
    cells: Vec<CellKind>,
    start: Position,
    goal: Position,
}

impl Maze {
    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn goal(&self) -> Position {
        self.goal
    }

    #[inline]
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    #[inline]
    pub fn cell(&self, pos: Position) -> Option<CellKind> {
        if self.in_bounds(pos) {
            Some(self.cells[index(self.width, pos)])
        } else {
            None
        }
    }

    #[inline]
    pub fn is_walkable(&self, pos: Position) -> bool {
        self.cell(pos).map_or(false, CellKind::is_walkable)
    }

    pub fn count(&self, kind: CellKind) -> usize {
        self.cells.iter().filter(|&&c| c == kind).count()
    }

    /// Row-major cell codes, one inner vector per row.
    pub fn rows(&self) -> Vec<Vec<u8>> {
        self.cells
            .chunks(self.width as usize)
            .map(|row| row.iter().map(|c| c.code()).collect())
            .collect()
    }

    /// Rebuild a maze from persisted rows, checking that the grid agrees
    /// with the recorded dimensions and start/goal positions.
    pub fn from_rows(
        rows: &[Vec<u8>],
        width: i32,
        height: i32,
        start: Position,
        goal: Position,
    ) -> Result<Maze> {
        let in_range = |d: i32| (MIN_DIMENSION..=MAX_DIMENSION).contains(&d) && d % 2 == 1;
        if !in_range(width) || !in_range(height) {
            return Err(ExplorerError::corrupt(format!(
                "maze dimensions {width}x{height} are not odd values in {MIN_DIMENSION}..={MAX_DIMENSION}"
            )));
        }
        if rows.len() != height as usize {
            return Err(ExplorerError::corrupt(format!(
                "maze has {} rows, metadata says {height}",
                rows.len()
            )));
        }

        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width as usize {
                return Err(ExplorerError::corrupt(format!(
                    "maze row {y} has {} cells, metadata says {width}",
                    row.len()
                )));
            }
            for &code in row {
                let kind = CellKind::from_code(code).ok_or_else(|| {
                    ExplorerError::corrupt(format!("unknown cell code {code} in row {y}"))
                })?;
                cells.push(kind);
            }
        }

        let maze = Maze {
            width,
            height,
            cells,
            start,
            goal,
        };
        if maze.count(CellKind::Start) != 1 || maze.cell(start) != Some(CellKind::Start) {
            return Err(ExplorerError::corrupt(format!(
                "maze must hold exactly one start cell at {start}"
            )));
        }
        if maze.count(CellKind::Goal) != 1 || maze.cell(goal) != Some(CellKind::Goal) {
            return Err(ExplorerError::corrupt(format!(
                "maze must hold exactly one goal cell at {goal}"
            )));
        }
        Ok(maze)
    }
}

#[inline]
fn index(width: i32, pos: Position) -> usize {
    (pos.y * width + pos.x) as usize
}

/// Round up to odd, then lift to the minimum usable edge.
fn normalize_dimension(requested: i32) -> i32 {
    let odd = if requested % 2 == 0 { requested + 1 } else { requested };
    odd.max(MIN_DIMENSION)
}

/// Randomized depth-first maze generator.
pub struct MazeGenerator;

impl MazeGenerator {
    /// Deterministic for a given `(width, height, seed)`.
    pub fn generate(width: i32, height: i32, seed: u64) -> Result<Maze> {
        if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
            return Err(ExplorerError::InvalidGeometry { width, height });
        }
        let width = normalize_dimension(width);
        let height = normalize_dimension(height);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut cells = vec![CellKind::Wall; width as usize * height as usize];

        for y in (1..height - 1).step_by(2) {
            for x in (1..width - 1).step_by(2) {
                cells[index(width, Position::new(x, y))] = CellKind::Path;
            }
        }

        // Carve corridors between lattice cells
        let origin = Position::new(1, 1);
        let mut stack = vec![origin];
        let mut visited: HashSet<Position> = HashSet::from([origin]);

        while let Some(&current) = stack.last() {
            let neighbors: Vec<Position> = CARVE_OFFSETS
                .iter()
                .map(|&(dx, dy)| Position::new(current.x + dx, current.y + dy))
                .filter(|p| {
                    p.x >= 1 && p.x < width - 1 && p.y >= 1 && p.y < height - 1 && !visited.contains(p)
                })
                .collect();

            if neighbors.is_empty() {
                stack.pop();
                continue;
            }

            let next = neighbors[rng.random_range(0..neighbors.len())];
            visited.insert(next);
            let wall = Position::new(
                current.x + (next.x - current.x) / 2,
                current.y + (next.y - current.y) / 2,
            );
            cells[index(width, wall)] = CellKind::Path;
            stack.push(next);
        }

        // Open some pillar cells next to corridors so the maze is no longer perfect
        let pillar_cols = (width - 3) / 2;
        let pillar_rows = (height - 3) / 2;
        for _ in 0..(width * height / OPENING_DENSITY) {
            let pillar = Position::new(
                2 + 2 * rng.random_range(0..pillar_cols),
                2 + 2 * rng.random_range(0..pillar_rows),
            );
            let touches_path = Direction::ALL.iter().any(|&d| {
                let n = pillar.step(d);
                n.x >= 0
                    && n.x < width
                    && n.y >= 0
                    && n.y < height
                    && cells[index(width, n)] == CellKind::Path
            });
            if touches_path {
                cells[index(width, pillar)] = CellKind::Path;
            }
        }

        cells[index(width, origin)] = CellKind::Start;

        // Goal: first lattice path cell furthest from the start
        let mut best_distance = 0;
        let mut goal = Position::new(width - 2, height - 2);
        for y in (1..height - 1).step_by(2) {
            for x in (1..width - 1).step_by(2) {
                let pos = Position::new(x, y);
                if cells[index(width, pos)] == CellKind::Path {
                    let distance = pos.manhattan(origin);
                    if distance > best_distance {
                        best_distance = distance;
                        goal = pos;
                    }
                }
            }
        }
        cells[index(width, goal)] = CellKind::Goal;

        log::debug!(
            "Generated {}x{} maze (seed {}), goal at {} distance {}",
            width,
            height,
            seed,
            goal,
            best_distance
        );

        Ok(Maze {
            width,
            height,
            cells,
            start: origin,
            goal,
        })
    }
}
