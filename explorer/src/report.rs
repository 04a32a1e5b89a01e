// report.rs - Plain-text views of an exploration tree for the CLI
use maze_segment_engine::{ExplorationEngine, ExplorationStats, Result, Segment, SegmentId, SegmentState};

fn marker(state: SegmentState) -> &'static str {
    match state {
        SegmentState::Active => "active",
        SegmentState::Dead => "dead",
        SegmentState::Branched => "branched",
        SegmentState::Goal => "GOAL",
    }
}

pub fn segment_line(segment: &Segment) -> String {
    let parent = segment
        .parent_id()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<6} gen {:<3} {:<8} {} -> {} ({} cells, parent {}, children {})",
        segment.id().to_string(),
        segment.generation(),
        marker(segment.state()),
        segment.start_position(),
        segment.current_position(),
        segment.path_positions().len(),
        parent,
        segment.child_ids().len(),
    )
}

/// Root-first chain for `id`, one segment per line, then the full cell route.
pub fn lineage_report(engine: &ExplorationEngine, id: SegmentId) -> Result<String> {
    let query = engine.query();
    let chain = query.lineage(id)?;
    let route = query.lineage_positions(id)?;

    let mut out = format!("Lineage of {} ({} segments)\n", id, chain.len());
    for (depth, segment) in chain.iter().enumerate() {
        out.push_str(&format!("{}{}\n", "  ".repeat(depth), segment_line(segment)));
    }
    let cells: Vec<String> = route.iter().map(|p| p.to_string()).collect();
    out.push_str(&format!("Route ({} cells): {}\n", route.len(), cells.join(" ")));
    Ok(out)
}

pub fn generation_listing(engine: &ExplorationEngine) -> String {
    let mut out = String::new();
    for (generation, segments) in engine.query().by_generation() {
        out.push_str(&format!("Generation {} ({} segments)\n", generation, segments.len()));
        for segment in segments {
            out.push_str(&format!("  {}\n", segment_line(segment)));
        }
    }
    out
}

pub fn summary(stats: &ExplorationStats) -> String {
    let winner = stats
        .winning_segment
        .map(|id| id.to_string())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "Segments: {} total, {} active, {} complete, {} dead, {} successful\n\
         Steps: {} (max {} concurrent)\n\
         Visited cells: {}\n\
         Goal found: {} (winner {}, winner-only {})\n",
        stats.total_segments,
        stats.active_segments,
        stats.complete_segments,
        stats.dead_segments,
        stats.successful_segments,
        stats.total_steps,
        stats.max_concurrent,
        stats.visited_positions,
        stats.goal_found,
        winner,
        stats.show_only_winner,
    )
}
