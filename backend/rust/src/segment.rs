// segment.rs - Path segments: straight corridor runs between junctions
use crate::error_handling::{ExplorerError, Result};
use crate::types::Position;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Arena key for a segment. Ordering is processing order inside a step:
/// the root first, then children in allocation order.
///
/// On the wire and in logs an id is `root` or `s<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentId {
    Root,
    Child(u32),
}

impl SegmentId {
    pub const ROOT: SegmentId = SegmentId::Root;

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }

    /// Allocation index of a child; `None` for the root.
    pub fn index(self) -> Option<u32> {
        match self {
            SegmentId::Root => None,
            SegmentId::Child(n) => Some(n),
        }
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentId::Root => write!(f, "root"),
            SegmentId::Child(n) => write!(f, "s{n}"),
        }
    }
}

impl FromStr for SegmentId {
    type Err = ExplorerError;

    /// Accepts `root` or `s<n>`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "root" {
            return Ok(SegmentId::ROOT);
        }
        s.strip_prefix('s')
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<u32>().ok())
            .map(SegmentId::Child)
            .ok_or_else(|| ExplorerError::not_found(format!("segment '{s}'")))
    }
}

impl Serialize for SegmentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SegmentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid segment id '{raw}'")))
    }
}

/// Terminal and non-terminal segment states, derived from the status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentState {
    Active,
    Dead,
    Branched,
    Goal,
}

/// A node of the exploration tree.
///
/// `path_positions` is never empty: it starts at `start_position` and ends
/// at `current_position`, and only grows while the segment is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    id: SegmentId,
    start_position: Position,
    current_position: Position,
    path_positions: Vec<Position>,
    parent_id: Option<SegmentId>,
    child_ids: Vec<SegmentId>,
    is_active: bool,
    is_complete: bool,
    is_dead: bool,
    found_goal: bool,
    fixed_color_index: u32,
    generation: u32,
}

/// Plain field set used when a segment is rebuilt from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub id: SegmentId,
    pub start_position: Position,
    pub current_position: Position,
    pub path_positions: Vec<Position>,
    pub parent_id: Option<SegmentId>,
    pub child_ids: Vec<SegmentId>,
    pub is_active: bool,
    pub is_complete: bool,
    pub is_dead: bool,
    pub found_goal: bool,
    pub fixed_color_index: u32,
    pub generation: u32,
}

impl Segment {
    /// The root sits on the maze start and has no parent.
    pub fn root(start: Position) -> Self {
        Self {
            id: SegmentId::ROOT,
            start_position: start,
            current_position: start,
            path_positions: vec![start],
            parent_id: None,
            child_ids: Vec::new(),
            is_active: true,
            is_complete: false,
            is_dead: false,
            found_goal: false,
            fixed_color_index: 0,
            generation: 0,
        }
    }

    /// A branch leaving `parent`'s junction cell towards `first_cell`.
    pub fn child(id: SegmentId, parent: &Segment, first_cell: Position, fixed_color_index: u32) -> Self {
        let start = parent.current_position;
        Self {
            id,
            start_position: start,
            current_position: first_cell,
            path_positions: vec![start, first_cell],
            parent_id: Some(parent.id),
            child_ids: Vec::new(),
            is_active: true,
            is_complete: false,
            is_dead: false,
            found_goal: false,
            fixed_color_index,
            generation: parent.generation + 1,
        }
    }

    /// Rebuild from persisted fields, rejecting records that break the
    /// path or flag invariants. Tree links are checked by the codec.
    pub fn from_record(record: SegmentRecord) -> Result<Self> {
        let id = record.id;
        let (first, last) = match (record.path_positions.first(), record.path_positions.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(ExplorerError::corrupt(format!(
                    "segment {id} has an empty path"
                )))
            }
        };
        if first != record.start_position || last != record.current_position {
            return Err(ExplorerError::corrupt(format!(
                "segment {id} path does not run from its start to its current position"
            )));
        }
        if record.is_active && (record.is_complete || record.is_dead || record.found_goal) {
            return Err(ExplorerError::corrupt(format!(
                "segment {id} is active but flagged terminal"
            )));
        }
        if !record.is_active && !record.is_complete {
            return Err(ExplorerError::corrupt(format!(
                "segment {id} is neither active nor complete"
            )));
        }
        if record.is_dead && record.found_goal {
            return Err(ExplorerError::corrupt(format!(
                "segment {id} is both dead and the goal finder"
            )));
        }
        if record.parent_id.is_none() != id.is_root() {
            return Err(ExplorerError::corrupt(format!(
                "segment {id}: only the root may lack a parent"
            )));
        }

        Ok(Self {
            id,
            start_position: record.start_position,
            current_position: record.current_position,
            path_positions: record.path_positions,
            parent_id: record.parent_id,
            child_ids: record.child_ids,
            is_active: record.is_active,
            is_complete: record.is_complete,
            is_dead: record.is_dead,
            found_goal: record.found_goal,
            fixed_color_index: record.fixed_color_index,
            generation: record.generation,
        })
    }

    pub fn to_record(&self) -> SegmentRecord {
        SegmentRecord {
            id: self.id,
            start_position: self.start_position,
            current_position: self.current_position,
            path_positions: self.path_positions.clone(),
            parent_id: self.parent_id,
            child_ids: self.child_ids.clone(),
            is_active: self.is_active,
            is_complete: self.is_complete,
            is_dead: self.is_dead,
            found_goal: self.found_goal,
            fixed_color_index: self.fixed_color_index,
            generation: self.generation,
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn start_position(&self) -> Position {
        self.start_position
    }

    pub fn current_position(&self) -> Position {
        self.current_position
    }

    pub fn path_positions(&self) -> &[Position] {
        &self.path_positions
    }

    pub fn parent_id(&self) -> Option<SegmentId> {
        self.parent_id
    }

    pub fn child_ids(&self) -> &[SegmentId] {
        &self.child_ids
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn is_dead(&self) -> bool {
        self.is_dead
    }

    pub fn found_goal(&self) -> bool {
        self.found_goal
    }

    /// Opaque presentation tag; carried for renderers, never interpreted.
    pub fn fixed_color_index(&self) -> u32 {
        self.fixed_color_index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn state(&self) -> SegmentState {
        if self.is_active {
            SegmentState::Active
        } else if self.found_goal {
            SegmentState::Goal
        } else if self.is_dead {
            SegmentState::Dead
        } else {
            SegmentState::Branched
        }
    }

    pub(crate) fn advance_to(&mut self, pos: Position) {
        assert!(self.is_active, "segment {} advanced after it terminated", self.id);
        self.current_position = pos;
        self.path_positions.push(pos);
    }

    pub(crate) fn link_child(&mut self, child: SegmentId) {
        assert!(
            !self.child_ids.contains(&child),
            "segment {} already lists child {}",
            self.id,
            child
        );
        self.child_ids.push(child);
    }

    fn terminate(&mut self) {
        self.is_active = false;
        self.is_complete = true;
    }

    pub(crate) fn mark_dead(&mut self) {
        self.terminate();
        self.is_dead = true;
    }

    pub(crate) fn mark_branched(&mut self) {
        self.terminate();
    }

    pub(crate) fn mark_goal(&mut self) {
        self.terminate();
        self.found_goal = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_id_display_and_parse() {
        assert_eq!(SegmentId::ROOT.to_string(), "root");
        assert_eq!(SegmentId::Child(12).to_string(), "s12");
        assert_eq!("root".parse::<SegmentId>().unwrap(), SegmentId::ROOT);
        assert_eq!("s0".parse::<SegmentId>().unwrap(), SegmentId::Child(0));
        assert_eq!("s7".parse::<SegmentId>().unwrap(), SegmentId::Child(7));
        for bad in ["branch", "7", "s", "s+1", "s-2"] {
            assert!(bad.parse::<SegmentId>().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_segment_id_wire_form_is_display_string() {
        assert_eq!(serde_json::to_string(&SegmentId::ROOT).unwrap(), "\"root\"");
        assert_eq!(serde_json::to_string(&SegmentId::Child(3)).unwrap(), "\"s3\"");
        assert_eq!(serde_json::from_str::<SegmentId>("\"s3\"").unwrap(), SegmentId::Child(3));
        assert!(serde_json::from_str::<SegmentId>("3").is_err());
        assert!(SegmentId::ROOT < SegmentId::Child(0));
        assert!(SegmentId::Child(2) < SegmentId::Child(10));
    }

    #[test]
    fn test_child_path_starts_at_parent_junction() {
        let mut root = Segment::root(Position::new(1, 1));
        root.advance_to(Position::new(1, 2));
        root.advance_to(Position::new(1, 3));
        let child = Segment::child(SegmentId::Child(0), &root, Position::new(2, 3), 2);

        assert_eq!(child.start_position(), Position::new(1, 3));
        assert_eq!(child.path_positions(), &[Position::new(1, 3), Position::new(2, 3)]);
        assert_eq!(child.parent_id(), Some(SegmentId::ROOT));
        assert_eq!(child.generation(), 1);
        assert_eq!(child.state(), SegmentState::Active);
    }

    #[test]
    fn test_terminal_states() {
        let mut dead = Segment::root(Position::new(1, 1));
        dead.mark_dead();
        assert_eq!(dead.state(), SegmentState::Dead);
        assert!(dead.is_complete() && !dead.is_active());

        let mut branched = Segment::root(Position::new(1, 1));
        branched.mark_branched();
        assert_eq!(branched.state(), SegmentState::Branched);
        assert!(!branched.is_dead());

        let mut winner = Segment::root(Position::new(1, 1));
        winner.mark_goal();
        assert_eq!(winner.state(), SegmentState::Goal);
    }

    #[test]
    #[should_panic(expected = "advanced after it terminated")]
    fn test_terminated_segment_cannot_grow() {
        let mut seg = Segment::root(Position::new(1, 1));
        seg.mark_dead();
        seg.advance_to(Position::new(1, 2));
    }

    #[test]
    fn test_record_validation() {
        let root = Segment::root(Position::new(1, 1));
        let record = root.to_record();
        assert_eq!(Segment::from_record(record.clone()).unwrap(), root);

        let mut empty = record.clone();
        empty.path_positions.clear();
        assert!(matches!(Segment::from_record(empty), Err(ExplorerError::Corrupt { .. })));

        let mut detached = record.clone();
        detached.current_position = Position::new(3, 1);
        assert!(Segment::from_record(detached).is_err());

        let mut contradictory = record.clone();
        contradictory.is_dead = true;
        assert!(Segment::from_record(contradictory).is_err());

        let mut orphan_root = record;
        orphan_root.parent_id = Some(SegmentId::Child(4));
        assert!(Segment::from_record(orphan_root).is_err());
    }
}
