// persistence.rs - Snapshot document for the full exploration state
//
// The document layout is stable: external viewers reload it to draw the
// maze and query lineages without re-running exploration.

use crate::engine::ExplorationEngine;
use crate::error_handling::{ExplorerError, Result};
use crate::maze::Maze;
use crate::query::PathQuery;
use crate::segment::{Segment, SegmentId, SegmentRecord, SegmentState};
use crate::types::Position;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeMetadata {
    pub width: i32,
    pub height: i32,
    pub start: Position,
    pub goal: Position,
    pub goal_found: bool,
    // present-but-null is allowed, absent is not
    #[serde(deserialize_with = "Option::deserialize")]
    pub winning_segment: Option<SegmentId>,
    pub show_only_winner: bool,
    pub total_steps: u64,
    pub max_concurrent_segments: usize,
    pub next_id: u32,
}

/// Persisted segment record; `parent_id` must be written even when null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SegmentEntry {
    id: SegmentId,
    start_position: Position,
    current_position: Position,
    path_positions: Vec<Position>,
    #[serde(deserialize_with = "Option::deserialize")]
    parent_id: Option<SegmentId>,
    child_ids: Vec<SegmentId>,
    is_active: bool,
    is_complete: bool,
    is_dead: bool,
    found_goal: bool,
    fixed_color_index: u32,
    generation: u32,
}

impl From<SegmentRecord> for SegmentEntry {
    fn from(r: SegmentRecord) -> Self {
        Self {
            id: r.id,
            start_position: r.start_position,
            current_position: r.current_position,
            path_positions: r.path_positions,
            parent_id: r.parent_id,
            child_ids: r.child_ids,
            is_active: r.is_active,
            is_complete: r.is_complete,
            is_dead: r.is_dead,
            found_goal: r.found_goal,
            fixed_color_index: r.fixed_color_index,
            generation: r.generation,
        }
    }
}

impl From<SegmentEntry> for SegmentRecord {
    fn from(e: SegmentEntry) -> Self {
        Self {
            id: e.id,
            start_position: e.start_position,
            current_position: e.current_position,
            path_positions: e.path_positions,
            parent_id: e.parent_id,
            child_ids: e.child_ids,
            is_active: e.is_active,
            is_complete: e.is_complete,
            is_dead: e.is_dead,
            found_goal: e.found_goal,
            fixed_color_index: e.fixed_color_index,
            generation: e.generation,
        }
    }
}

/// The `segments` object, keyed by decimal id. Entries are kept in
/// document order so repeated keys survive parsing and can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SegmentTable {
    entries: Vec<(String, SegmentEntry)>,
}

impl Serialize for SegmentTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, entry) in &self.entries {
            map.serialize_entry(key, entry)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SegmentTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = SegmentTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of segment id to segment record")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, entry)) = access.next_entry::<String, SegmentEntry>()? {
                    entries.push((key, entry));
                }
                Ok(SegmentTable { entries })
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDocument {
    pub metadata: TreeMetadata,
    pub maze: Vec<Vec<u8>>,
    pub segments: SegmentTable,
    pub global_visited_positions: Vec<Position>,
}

/// Converts engines to and from [`TreeDocument`]s, JSON text and files.
pub struct PersistenceCodec;

impl PersistenceCodec {
    pub fn save(engine: &ExplorationEngine) -> TreeDocument {
        let maze = engine.maze();
        let mut visited: Vec<Position> = engine.occupancy().iter().copied().collect();
        visited.sort();

        TreeDocument {
            metadata: TreeMetadata {
                width: maze.width(),
                height: maze.height(),
                start: maze.start(),
                goal: maze.goal(),
                goal_found: engine.goal_found(),
                winning_segment: engine.winning_segment(),
                show_only_winner: engine.show_only_winner(),
                total_steps: engine.total_steps(),
                max_concurrent_segments: engine.max_concurrent_segments(),
                next_id: engine.next_id(),
            },
            maze: maze.rows(),
            segments: SegmentTable {
                entries: engine
                    .segments()
                    .map(|s| (s.id().to_string(), SegmentEntry::from(s.to_record())))
                    .collect(),
            },
            global_visited_positions: visited,
        }
    }

    /// Rebuild an engine, rejecting any document whose tree, flags or
    /// occupancy set are inconsistent.
    pub fn load(document: TreeDocument) -> Result<ExplorationEngine> {
        let meta = document.metadata;
        let maze = Maze::from_rows(&document.maze, meta.width, meta.height, meta.start, meta.goal)?;

        let mut segments: BTreeMap<SegmentId, Segment> = BTreeMap::new();
        for (key, entry) in document.segments.entries {
            let keyed = key
                .parse::<SegmentId>()
                .map_err(|_| ExplorerError::corrupt(format!("segment key '{key}' is not a segment id")))?;
            if keyed != entry.id {
                return Err(ExplorerError::corrupt(format!(
                    "segment key '{key}' holds record for {}",
                    entry.id
                )));
            }
            let segment = Segment::from_record(SegmentRecord::from(entry))?;
            let id = segment.id();
            if segments.insert(id, segment).is_some() {
                return Err(ExplorerError::corrupt(format!("duplicate segment id {id}")));
            }
        }

        validate_tree(&segments, &maze, meta.next_id)?;
        validate_outcome(&segments, &meta)?;

        let occupancy: HashSet<Position> = document.global_visited_positions.into_iter().collect();
        let union: HashSet<Position> = segments
            .values()
            .flat_map(|s| s.path_positions().iter().copied())
            .collect();
        if union != occupancy {
            return Err(ExplorerError::corrupt(
                "global_visited_positions differs from the union of segment paths",
            ));
        }

        Ok(ExplorationEngine {
            maze,
            segments,
            occupancy,
            next_id: meta.next_id,
            goal_found: meta.goal_found,
            winning_segment: meta.winning_segment,
            show_only_winner: meta.show_only_winner,
            total_steps: meta.total_steps,
            max_concurrent_segments: meta.max_concurrent_segments,
        })
    }

    pub fn to_json(engine: &ExplorationEngine) -> Result<String> {
        Ok(serde_json::to_string_pretty(&Self::save(engine))?)
    }

    pub fn from_json(json: &str) -> Result<ExplorationEngine> {
        let document: TreeDocument = serde_json::from_str(json)
            .map_err(|e| ExplorerError::corrupt(format!("malformed tree document: {e}")))?;
        Self::load(document)
    }

    pub fn save_to_file(engine: &ExplorationEngine, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::to_json(engine)?)?;
        log::info!(
            "Saved segment tree to {} ({} segments, {} visited positions)",
            path.display(),
            engine.segment_count(),
            engine.occupancy().len()
        );
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<ExplorationEngine> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ExplorerError::from_read(e, path))?;
        let engine = Self::from_json(&text)?;
        log::info!(
            "Loaded segment tree from {} ({} segments, {} visited positions)",
            path.display(),
            engine.segment_count(),
            engine.occupancy().len()
        );
        Ok(engine)
    }
}

fn validate_tree(segments: &BTreeMap<SegmentId, Segment>, maze: &Maze, next_id: u32) -> Result<()> {
    let root = segments
        .get(&SegmentId::ROOT)
        .ok_or_else(|| ExplorerError::corrupt("document has no root segment"))?;
    if root.start_position() != maze.start() || root.generation() != 0 {
        return Err(ExplorerError::corrupt("root segment does not start on the maze start"));
    }

    for segment in segments.values() {
        let id = segment.id();
        if id.index().map_or(false, |n| n >= next_id) {
            return Err(ExplorerError::corrupt(format!("segment {id} is not below next_id {next_id}")));
        }

        if let Some(pos) = segment.path_positions().iter().find(|p| !maze.is_walkable(**p)) {
            return Err(ExplorerError::corrupt(format!("segment {id} path crosses wall {pos}")));
        }
        for pair in segment.path_positions().windows(2) {
            if pair[0].manhattan(pair[1]) != 1 {
                return Err(ExplorerError::corrupt(format!("segment {id} path jumps at {}", pair[1])));
            }
        }

        if let Some(parent_id) = segment.parent_id() {
            let parent = segments.get(&parent_id).ok_or_else(|| {
                ExplorerError::corrupt(format!("segment {id} references missing parent {parent_id}"))
            })?;
            let listed = parent.child_ids().iter().filter(|&&c| c == id).count();
            if listed != 1 {
                return Err(ExplorerError::corrupt(format!(
                    "parent {parent_id} lists segment {id} {listed} times"
                )));
            }
            if segment.generation() != parent.generation() + 1 {
                return Err(ExplorerError::corrupt(format!("segment {id} has the wrong generation")));
            }
            if segment.start_position() != parent.current_position() {
                return Err(ExplorerError::corrupt(format!(
                    "segment {id} does not start at its parent's junction"
                )));
            }
        }

        if !segment.child_ids().is_empty() && segment.state() != SegmentState::Branched {
            return Err(ExplorerError::corrupt(format!(
                "segment {id} has children but did not branch"
            )));
        }
        for child_id in segment.child_ids() {
            let points_back = segments
                .get(child_id)
                .map_or(false, |child| child.parent_id() == Some(id));
            if !points_back {
                return Err(ExplorerError::corrupt(format!(
                    "segment {id} lists child {child_id} that does not point back"
                )));
            }
        }
    }

    // Every segment must reach the root without revisiting anything
    let query = PathQuery::new(segments, None);
    for id in segments.keys() {
        query.lineage(*id)?;
    }
    Ok(())
}

fn validate_outcome(segments: &BTreeMap<SegmentId, Segment>, meta: &TreeMetadata) -> Result<()> {
    let finders: Vec<SegmentId> = segments
        .values()
        .filter(|s| s.found_goal())
        .map(Segment::id)
        .collect();

    match meta.winning_segment {
        Some(winner) => {
            if !meta.goal_found || finders != [winner] {
                return Err(ExplorerError::corrupt(format!(
                    "winning segment {winner} is not the unique goal finder"
                )));
            }
            let tip = segments.get(&winner).map(Segment::current_position);
            if tip != Some(meta.goal) {
                return Err(ExplorerError::corrupt(format!(
                    "winning segment {winner} does not end on the goal"
                )));
            }
        }
        None => {
            if meta.goal_found || !finders.is_empty() || meta.show_only_winner {
                return Err(ExplorerError::corrupt(
                    "goal flags are set but no winning segment is recorded",
                ));
            }
        }
    }
    Ok(())
}
