// types.rs - Shared value types for the grid and the exploration tree
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid coordinate. `x` is the column, `y` the row; (0, 0) is the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn step(self, direction: Direction) -> Position {
        let (dx, dy) = direction.offset();
        Position::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    #[inline]
    pub fn manhattan(self, other: Position) -> u32 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Orthogonal moves. `ALL` fixes the order in which neighbors are examined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    #[inline]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    Wall,
    Path,
    Start,
    Goal,
}

impl CellKind {
    /// Integer code used by the persisted `maze` grid.
    pub const fn code(self) -> u8 {
        match self {
            CellKind::Wall => 0,
            CellKind::Path => 1,
            CellKind::Start => 2,
            CellKind::Goal => 3,
        }
    }

    pub const fn from_code(code: u8) -> Option<CellKind> {
        match code {
            0 => Some(CellKind::Wall),
            1 => Some(CellKind::Path),
            2 => Some(CellKind::Start),
            3 => Some(CellKind::Goal),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_walkable(self) -> bool {
        !matches!(self, CellKind::Wall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_offsets_are_unit_moves() {
        let origin = Position::new(3, 3);
        for direction in Direction::ALL {
            assert_eq!(origin.manhattan(origin.step(direction)), 1);
        }
        assert_eq!(origin.step(Direction::Up), Position::new(3, 2));
        assert_eq!(origin.step(Direction::Right), Position::new(4, 3));
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let far = Position::new(i32::MIN, 1);
        let near = Position::new(i32::MAX, 1);
        assert_eq!(far.manhattan(near), u32::MAX);
        assert_eq!(Position::new(i32::MIN, i32::MIN).manhattan(near), u32::MAX);
        assert_eq!(far.step(Direction::Left), far);
        assert_eq!(near.step(Direction::Right), near);
    }

    #[test]
    fn test_cell_codes() {
        for kind in [CellKind::Wall, CellKind::Path, CellKind::Start, CellKind::Goal] {
            assert_eq!(CellKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(CellKind::from_code(4), None);
        assert!(!CellKind::Wall.is_walkable());
        assert!(CellKind::Goal.is_walkable());
    }

    #[test]
    fn test_position_json_shape() {
        let json = serde_json::to_value(Position::new(5, 7)).unwrap();
        assert_eq!(json, serde_json::json!({ "x": 5, "y": 7 }));
    }
}
