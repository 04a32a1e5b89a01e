// query.rs - Read-only lineage queries over a segment arena
use crate::error_handling::{ExplorerError, Result};
use crate::segment::{Segment, SegmentId};
use crate::types::Position;
use std::collections::{BTreeMap, HashSet};

/// Borrowed view used by viewers and renderers to walk the tree.
#[derive(Debug, Clone, Copy)]
pub struct PathQuery<'a> {
    segments: &'a BTreeMap<SegmentId, Segment>,
    winner: Option<SegmentId>,
}

impl<'a> PathQuery<'a> {
    pub fn new(segments: &'a BTreeMap<SegmentId, Segment>, winner: Option<SegmentId>) -> Self {
        Self { segments, winner }
    }

    /// Root-first chain of segments ending at `id`.
    ///
    /// The walk is bounded by the arena size, so a corrupted arena with a
    /// parent cycle or a dangling parent reports `Corrupt` instead of
    /// looping.
    pub fn lineage(&self, id: SegmentId) -> Result<Vec<&'a Segment>> {
        let target = self
            .segments
            .get(&id)
            .ok_or_else(|| ExplorerError::not_found(format!("segment {id}")))?;

        let mut chain = vec![target];
        let mut seen = HashSet::from([id]);
        let mut cursor = target.parent_id();

        while let Some(parent_id) = cursor {
            if chain.len() >= self.segments.len() || !seen.insert(parent_id) {
                return Err(ExplorerError::corrupt(format!(
                    "parent cycle detected while tracing segment {id}"
                )));
            }
            let parent = self.segments.get(&parent_id).ok_or_else(|| {
                ExplorerError::corrupt(format!(
                    "segment {} references missing parent {parent_id}",
                    chain[chain.len() - 1].id()
                ))
            })?;
            chain.push(parent);
            cursor = parent.parent_id();
        }

        chain.reverse();
        Ok(chain)
    }

    /// Cell route from the maze start to the tip of `id`. Junction cells
    /// shared between a parent and its child appear once.
    pub fn lineage_positions(&self, id: SegmentId) -> Result<Vec<Position>> {
        let chain = self.lineage(id)?;
        let mut route = Vec::new();
        for (i, segment) in chain.iter().enumerate() {
            let skip = if i == 0 { 0 } else { 1 };
            route.extend(segment.path_positions().iter().skip(skip).copied());
        }
        Ok(route)
    }

    pub fn winning_lineage(&self) -> Result<Option<Vec<&'a Segment>>> {
        self.winner.map(|id| self.lineage(id)).transpose()
    }

    /// Segments grouped by generation; ids ascend within a group.
    pub fn by_generation(&self) -> BTreeMap<u32, Vec<&'a Segment>> {
        let mut groups: BTreeMap<u32, Vec<&'a Segment>> = BTreeMap::new();
        for segment in self.segments.values() {
            groups.entry(segment.generation()).or_default().push(segment);
        }
        groups
    }

    /// Segments a renderer should draw. With the winner-only hint on and a
    /// winner present this is the winning lineage, otherwise every segment.
    pub fn visible_segments(&self, show_only_winner: bool) -> Result<Vec<&'a Segment>> {
        if show_only_winner {
            if let Some(chain) = self.winning_lineage()? {
                return Ok(chain);
            }
        }
        Ok(self.segments.values().collect())
    }
}
