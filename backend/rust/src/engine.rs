// engine.rs - Layered segment-tree exploration over a generated maze
use crate::config::EngineConfig;
use crate::error_handling::Result;
use crate::maze::{Maze, MazeGenerator};
use crate::query::PathQuery;
use crate::segment::{Segment, SegmentId};
use crate::types::{Direction, Position};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Number of presentation tags cycled through as children are created.
pub const PALETTE_SIZE: u32 = 6;

/// Owns the maze, the segment arena and the occupancy set.
///
/// Each `step()` advances every active segment once, in ascending id
/// order. Cells are claimed as soon as a segment moves onto them, so a
/// segment processed earlier in a step wins any cell it shares with a
/// later one. Children created at a junction only start moving on the
/// following step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorationEngine {
    pub(crate) maze: Maze,
    pub(crate) segments: BTreeMap<SegmentId, Segment>,
    pub(crate) occupancy: HashSet<Position>,
    pub(crate) next_id: u32,
    pub(crate) goal_found: bool,
    pub(crate) winning_segment: Option<SegmentId>,
    pub(crate) show_only_winner: bool,
    pub(crate) total_steps: u64,
    pub(crate) max_concurrent_segments: usize,
}

/// Summary returned by [`ExplorationEngine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub steps: u64,
    pub goal_found: bool,
    pub winning_segment: Option<SegmentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationStats {
    pub total_segments: usize,
    pub active_segments: usize,
    pub complete_segments: usize,
    pub dead_segments: usize,
    pub successful_segments: usize,
    pub total_steps: u64,
    pub max_concurrent: usize,
    pub goal_found: bool,
    pub winning_segment: Option<SegmentId>,
    pub show_only_winner: bool,
    pub visited_positions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableMove {
    pub direction: Direction,
    pub target_position: Position,
}

/// What an explorer standing on a cell could do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellStatus {
    pub is_explored: bool,
    pub is_junction: bool,
    pub available_moves: Vec<AvailableMove>,
    pub is_goal: bool,
    pub goal_reached_by_any: bool,
}

impl ExplorationEngine {
    /// Seed the tree with a root segment on the maze start.
    pub fn new(maze: Maze) -> Self {
        let root = Segment::root(maze.start());
        let occupancy = HashSet::from([maze.start()]);
        let mut segments = BTreeMap::new();
        segments.insert(root.id(), root);

        Self {
            maze,
            segments,
            occupancy,
            next_id: 0,
            goal_found: false,
            winning_segment: None,
            show_only_winner: false,
            total_steps: 0,
            max_concurrent_segments: 0,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let maze = MazeGenerator::generate(config.width, config.height, config.seed)?;
        Ok(Self::new(maze))
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    /// Segments in ascending id order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.segments.values()
    }

    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(&id)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn occupancy(&self) -> &HashSet<Position> {
        &self.occupancy
    }

    pub fn is_occupied(&self, pos: Position) -> bool {
        self.occupancy.contains(&pos)
    }

    pub fn goal_found(&self) -> bool {
        self.goal_found
    }

    pub fn winning_segment(&self) -> Option<SegmentId> {
        self.winning_segment
    }

    pub fn show_only_winner(&self) -> bool {
        self.show_only_winner
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn max_concurrent_segments(&self) -> usize {
        self.max_concurrent_segments
    }

    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    pub fn active_ids(&self) -> Vec<SegmentId> {
        self.segments
            .values()
            .filter(|s| s.is_active())
            .map(Segment::id)
            .collect()
    }

    pub fn query(&self) -> PathQuery<'_> {
        PathQuery::new(&self.segments, self.winning_segment)
    }

    /// Walkable, unclaimed neighbors of `pos` in `Direction::ALL` order.
    pub fn available_moves(&self, pos: Position) -> Vec<AvailableMove> {
        Direction::ALL
            .iter()
            .map(|&direction| AvailableMove {
                direction,
                target_position: pos.step(direction),
            })
            .filter(|m| self.maze.is_walkable(m.target_position) && !self.is_occupied(m.target_position))
            .collect()
    }

    /// Advance one layer. Returns whether another step can make progress.
    pub fn step(&mut self) -> bool {
        if self.goal_found {
            return false;
        }
        let layer = self.active_ids();
        if layer.is_empty() {
            return false;
        }

        self.total_steps += 1;
        self.max_concurrent_segments = self.max_concurrent_segments.max(layer.len());

        let mut spawned = 0;
        for id in &layer {
            if self.goal_found {
                break;
            }
            spawned += self.advance(*id);
        }

        log::debug!(
            "Step {}: {} active, {} spawned, {} segments total",
            self.total_steps,
            layer.len(),
            spawned,
            self.segments.len()
        );

        !self.goal_found && self.segments.values().any(Segment::is_active)
    }

    /// Step until no progress is possible or `max_steps` layers have run.
    pub fn run(&mut self, max_steps: u64) -> RunOutcome {
        let mut steps = 0;
        while steps < max_steps {
            let before = self.total_steps;
            let more = self.step();
            if self.total_steps > before {
                steps += 1;
            }
            if !more {
                break;
            }
        }
        RunOutcome {
            steps,
            goal_found: self.goal_found,
            winning_segment: self.winning_segment,
        }
    }

    /// Process one active segment; returns how many children it spawned.
    fn advance(&mut self, id: SegmentId) -> usize {
        let current = {
            let segment = self.segment_ref(id);
            assert!(
                segment.is_active() && segment.path_positions().last() == Some(&segment.current_position()),
                "segment {id} entered a step in an inconsistent state"
            );
            segment.current_position()
        };

        let moves = self.available_moves(current);
        match moves.as_slice() {
            [] => {
                self.segment_mut(id).mark_dead();
                0
            }
            [only] => {
                let next = only.target_position;
                self.segment_mut(id).advance_to(next);
                self.occupancy.insert(next);
                if next == self.maze.goal() {
                    self.segment_mut(id).mark_goal();
                    self.record_winner(id);
                }
                0
            }
            _ => {
                self.segment_mut(id).mark_branched();
                for m in &moves {
                    self.spawn_child(id, m.target_position);
                }
                moves.len()
            }
        }
    }

    fn spawn_child(&mut self, parent_id: SegmentId, cell: Position) {
        let child_id = SegmentId::Child(self.next_id);
        self.next_id += 1;
        let color = self.next_id % PALETTE_SIZE;

        let mut child = Segment::child(child_id, self.segment_ref(parent_id), cell, color);
        self.occupancy.insert(cell);
        self.segment_mut(parent_id).link_child(child_id);

        let reached_goal = cell == self.maze.goal();
        if reached_goal {
            child.mark_goal();
        }
        self.segments.insert(child_id, child);
        if reached_goal {
            self.record_winner(child_id);
        }
    }

    fn record_winner(&mut self, id: SegmentId) {
        if self.goal_found {
            return;
        }
        self.goal_found = true;
        self.winning_segment = Some(id);
        let segment = self.segment_ref(id);
        log::info!(
            "Goal reached by segment {} in {} cells (generation {}, step {})",
            id,
            segment.path_positions().len(),
            segment.generation(),
            self.total_steps
        );
    }

    fn segment_ref(&self, id: SegmentId) -> &Segment {
        match self.segments.get(&id) {
            Some(segment) => segment,
            None => panic!("segment {id} missing from arena"),
        }
    }

    fn segment_mut(&mut self, id: SegmentId) -> &mut Segment {
        match self.segments.get_mut(&id) {
            Some(segment) => segment,
            None => panic!("segment {id} missing from arena"),
        }
    }

    /// Direct children of `id`; empty for unknown ids.
    pub fn child_segments(&self, id: SegmentId) -> Vec<&Segment> {
        self.segments
            .get(&id)
            .map(|s| s.child_ids().iter().filter_map(|c| self.segments.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn cell_status(&self, pos: Position) -> CellStatus {
        let available_moves = self.available_moves(pos);
        CellStatus {
            is_explored: self.is_occupied(pos),
            is_junction: available_moves.len() > 1,
            available_moves,
            is_goal: pos == self.maze.goal(),
            goal_reached_by_any: self.goal_found,
        }
    }

    pub fn statistics(&self) -> ExplorationStats {
        let count = |pred: fn(&Segment) -> bool| self.segments.values().filter(|s| pred(s)).count();
        ExplorationStats {
            total_segments: self.segments.len(),
            active_segments: count(Segment::is_active),
            complete_segments: count(Segment::is_complete),
            dead_segments: count(Segment::is_dead),
            successful_segments: count(Segment::found_goal),
            total_steps: self.total_steps,
            max_concurrent: self.max_concurrent_segments,
            goal_found: self.goal_found,
            winning_segment: self.winning_segment,
            show_only_winner: self.show_only_winner,
            visited_positions: self.occupancy.len(),
        }
    }

    /// Display hint for renderers; leaves the tree untouched. Returns
    /// `false` when there is no winner yet.
    pub fn enable_winner_only_mode(&mut self) -> bool {
        match self.winning_segment {
            Some(winner) if self.goal_found => {
                self.show_only_winner = true;
                log::info!("Winner-only mode enabled (segment {})", winner);
                true
            }
            _ => {
                log::warn!("Cannot enable winner-only mode: no winner found yet");
                false
            }
        }
    }

    pub fn disable_winner_only_mode(&mut self) {
        self.show_only_winner = false;
    }

    /// Occupancy equals the union of every segment's path.
    pub fn occupancy_matches_paths(&self) -> bool {
        let union: HashSet<Position> = self
            .segments
            .values()
            .flat_map(|s| s.path_positions().iter().copied())
            .collect();
        union == self.occupancy
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::segment::SegmentState;
    use crate::types::CellKind;

    /// Build a maze from ASCII art: `#` wall, `.` path, `S` start, `G` goal.
    pub(crate) fn maze_from_ascii(lines: &[&str]) -> Maze {
        let mut start = Position::new(0, 0);
        let mut goal = Position::new(0, 0);
        let rows: Vec<Vec<u8>> = lines
            .iter()
            .enumerate()
            .map(|(y, line)| {
                line.chars()
                    .enumerate()
                    .map(|(x, ch)| {
                        let kind = match ch {
                            '#' => CellKind::Wall,
                            'S' => {
                                start = Position::new(x as i32, y as i32);
                                CellKind::Start
                            }
                            'G' => {
                                goal = Position::new(x as i32, y as i32);
                                CellKind::Goal
                            }
                            _ => CellKind::Path,
                        };
                        kind.code()
                    })
                    .collect()
            })
            .collect();
        Maze::from_rows(&rows, lines[0].len() as i32, lines.len() as i32, start, goal).unwrap()
    }

    /// A corridor into a three-way junction; the south arm reaches the goal.
    pub(crate) fn cross_maze() -> Maze {
        maze_from_ascii(&[
            "#######",
            "###S###",
            "###.###",
            "#.....#",
            "###.###",
            "###.###",
            "###.###",
            "###G###",
            "#######",
        ])
    }

    fn assert_tree_consistent(engine: &ExplorationEngine) {
        let roots: Vec<_> = engine.segments().filter(|s| s.parent_id().is_none()).collect();
        assert_eq!(roots.len(), 1);
        for segment in engine.segments() {
            if let Some(parent_id) = segment.parent_id() {
                let parent = engine.segment(parent_id).expect("parent exists");
                let listed = parent.child_ids().iter().filter(|&&c| c == segment.id()).count();
                assert_eq!(listed, 1, "{} listed {} times", segment.id(), listed);
                assert_eq!(segment.generation(), parent.generation() + 1);
            }
        }
        assert!(engine.occupancy_matches_paths());
    }

    #[test]
    fn test_root_segment_on_start() {
        let engine = ExplorationEngine::new(cross_maze());
        let root = engine.segment(SegmentId::ROOT).unwrap();
        assert_eq!(root.path_positions(), &[Position::new(3, 1)]);
        assert!(root.is_active());
        assert_eq!(engine.segment_count(), 1);
        assert_eq!(engine.next_id(), 0);
        assert!(engine.is_occupied(Position::new(3, 1)));
    }

    #[test]
    fn test_corridor_following_extends_one_segment() {
        let mut engine = ExplorationEngine::new(cross_maze());
        assert!(engine.step());
        assert!(engine.step());
        let root = engine.segment(SegmentId::ROOT).unwrap();
        assert_eq!(root.current_position(), Position::new(3, 3));
        assert_eq!(root.path_positions().len(), 3);
        assert_eq!(engine.segment_count(), 1);
        assert_tree_consistent(&engine);
    }

    #[test]
    fn test_junction_spawns_one_child_per_candidate() {
        let mut engine = ExplorationEngine::new(cross_maze());
        engine.step();
        engine.step();
        assert!(engine.step());

        let root = engine.segment(SegmentId::ROOT).unwrap();
        assert_eq!(root.state(), SegmentState::Branched);
        assert_eq!(root.child_ids(), &[SegmentId::Child(0), SegmentId::Child(1), SegmentId::Child(2)]);

        // Down, Left, Right in direction order
        let expected = [Position::new(3, 4), Position::new(2, 3), Position::new(4, 3)];
        for (child_id, cell) in root.child_ids().iter().zip(expected) {
            let child = engine.segment(*child_id).unwrap();
            assert_eq!(child.generation(), 1);
            assert_eq!(child.start_position(), Position::new(3, 3));
            assert_eq!(child.current_position(), cell);
            assert!(child.is_active());
            // children wait for the next layer
            assert_eq!(child.path_positions().len(), 2);
        }
        assert_eq!(engine.segment(SegmentId::Child(0)).unwrap().fixed_color_index(), 1);
        assert_eq!(engine.segment(SegmentId::Child(2)).unwrap().fixed_color_index(), 3);
        assert_eq!(engine.next_id(), 3);
        assert_tree_consistent(&engine);
    }

    #[test]
    fn test_dead_end_terminates_without_children() {
        let mut engine = ExplorationEngine::new(cross_maze());
        for _ in 0..5 {
            engine.step();
        }
        for id in [SegmentId::Child(1), SegmentId::Child(2)] {
            let arm = engine.segment(id).unwrap();
            assert!(arm.is_dead() && arm.is_complete() && !arm.is_active());
            assert!(arm.child_ids().is_empty());
            assert_eq!(arm.path_positions().len(), 3);
        }
        assert_eq!(engine.segment_count(), 4);
        assert_tree_consistent(&engine);
    }

    #[test]
    fn test_goal_stops_exploration() {
        let mut engine = ExplorationEngine::new(cross_maze());
        let outcome = engine.run(100);
        assert!(outcome.goal_found);
        assert_eq!(outcome.steps, 6);
        assert_eq!(outcome.winning_segment, Some(SegmentId::Child(0)));

        let winner = engine.segment(SegmentId::Child(0)).unwrap();
        assert!(winner.found_goal());
        assert_eq!(winner.current_position(), engine.maze().goal());

        let frozen = engine.clone();
        assert!(!engine.step());
        assert_eq!(engine, frozen);
    }

    #[test]
    fn test_dead_end_without_goal_exhausts() {
        let maze = maze_from_ascii(&["#####", "#S#G#", "#.###", "#.###", "#####"]);
        let mut engine = ExplorationEngine::new(maze);
        assert!(engine.step());
        assert!(engine.step());
        assert!(!engine.step());

        let root = engine.segment(SegmentId::ROOT).unwrap();
        assert_eq!(root.state(), SegmentState::Dead);
        assert!(!engine.goal_found());
        assert_eq!(engine.total_steps(), 3);
        assert!(!engine.step());
        assert_eq!(engine.total_steps(), 3);
    }

    #[test]
    fn test_contested_cell_goes_to_lower_id() {
        let maze = maze_from_ascii(&[
            "#######",
            "#..S..#",
            "#.###.#",
            "#.....#",
            "###.###",
            "###G###",
            "#######",
        ]);
        let mut engine = ExplorationEngine::new(maze);
        for _ in 0..6 {
            engine.step();
        }
        let left = engine.segment(SegmentId::Child(0)).unwrap();
        let right = engine.segment(SegmentId::Child(1)).unwrap();
        assert_eq!(left.current_position(), Position::new(3, 3));
        assert!(left.is_active());
        assert!(right.is_dead());
        assert_tree_consistent(&engine);

        let outcome = engine.run(10);
        assert_eq!(outcome.winning_segment, Some(SegmentId::Child(0)));
    }

    #[test]
    fn test_goal_freezes_later_segments_in_same_step() {
        let maze = maze_from_ascii(&[
            "#########",
            "#########",
            "#G..S...#",
            "#########",
            "#########",
        ]);
        let mut engine = ExplorationEngine::new(maze);
        assert!(engine.step());
        let west = SegmentId::Child(0);
        let east = SegmentId::Child(1);
        assert_eq!(engine.segment(west).unwrap().current_position(), Position::new(3, 2));
        assert_eq!(engine.segment(east).unwrap().current_position(), Position::new(5, 2));

        assert!(engine.step());
        let east_before = engine.segment(east).unwrap().clone();
        assert_eq!(east_before.path_positions().len(), 3);

        // west reaches the goal first; east is processed later in the same layer
        assert!(!engine.step());
        assert_eq!(engine.winning_segment(), Some(west));
        assert_eq!(engine.segment(east).unwrap(), &east_before);
        assert!(engine.segment(east).unwrap().is_active());
        assert!(!engine.is_occupied(Position::new(7, 2)));
        assert_tree_consistent(&engine);
    }

    #[test]
    fn test_child_spawned_on_goal_wins_immediately() {
        let maze = maze_from_ascii(&[
            "#######",
            "###S###",
            "###.###",
            "##G..##",
            "#######",
        ]);
        let mut engine = ExplorationEngine::new(maze);
        assert!(engine.step());
        assert!(engine.step());
        assert!(!engine.step());

        // Left arm lands on the goal at creation; the right sibling still exists
        assert_eq!(engine.winning_segment(), Some(SegmentId::Child(0)));
        let winner = engine.segment(SegmentId::Child(0)).unwrap();
        assert!(winner.found_goal() && !winner.is_active());
        assert_eq!(engine.segment(SegmentId::ROOT).unwrap().child_ids().len(), 2);
        assert!(engine.segment(SegmentId::Child(1)).unwrap().is_active());
        assert!(!engine.step());
    }

    #[test]
    fn test_winner_only_mode_requires_winner() {
        let mut engine = ExplorationEngine::new(cross_maze());
        assert!(!engine.enable_winner_only_mode());
        assert!(!engine.show_only_winner());

        engine.run(100);
        let before = engine.segments().cloned().collect::<Vec<_>>();
        assert!(engine.enable_winner_only_mode());
        assert!(engine.show_only_winner());
        assert_eq!(engine.segments().cloned().collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_statistics_and_cell_status() {
        let mut engine = ExplorationEngine::new(cross_maze());
        engine.step();
        engine.step();

        let junction = engine.cell_status(Position::new(3, 3));
        assert!(junction.is_explored);
        assert!(junction.is_junction);
        assert_eq!(junction.available_moves.len(), 3);
        assert_eq!(junction.available_moves[0].direction, Direction::Down);

        engine.run(100);
        let stats = engine.statistics();
        assert_eq!(stats.total_segments, 4);
        assert_eq!(stats.dead_segments, 2);
        assert_eq!(stats.successful_segments, 1);
        assert_eq!(stats.complete_segments, 4);
        assert_eq!(stats.max_concurrent, 3);
        assert_eq!(stats.visited_positions, engine.occupancy().len());
        assert_eq!(engine.child_segments(SegmentId::ROOT).len(), 3);
        assert!(engine.child_segments(SegmentId::Child(99)).is_empty());
    }

    #[test]
    fn test_generated_maze_exploration_is_reproducible() {
        let config = EngineConfig::default();
        let mut a = ExplorationEngine::from_config(&config).unwrap();
        let mut b = ExplorationEngine::from_config(&config).unwrap();
        let ra = a.run(2_000);
        let rb = b.run(2_000);
        assert_eq!(ra, rb);
        assert!(ra.goal_found);
        assert_eq!(a, b);
        assert_tree_consistent(&a);
    }
}
