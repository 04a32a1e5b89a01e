// lib.rs - Segment-tree maze exploration engine
// Generation, layered exploration, snapshot persistence and lineage queries.

pub mod config;
pub mod engine;
pub mod error_handling;
pub mod maze;
pub mod persistence;
pub mod query;
pub mod segment;
pub mod types;

// Re-export commonly used types
pub use config::{EngineConfig, RunConfig};
pub use engine::{AvailableMove, CellStatus, ExplorationEngine, ExplorationStats, RunOutcome};
pub use error_handling::{ExplorerError, Result};
pub use maze::{Maze, MazeGenerator};
pub use persistence::{PersistenceCodec, TreeDocument, TreeMetadata};
pub use query::PathQuery;
pub use segment::{Segment, SegmentId, SegmentRecord, SegmentState};
pub use types::{CellKind, Direction, Position};
