// explorer/src/http_server.rs
// Query service over one exploration engine: cell status, tree, lineage,
// snapshots, and step/reset controls for external viewers.
use anyhow::Result;
use maze_segment_engine::{
    CellStatus, EngineConfig, ExplorationEngine, ExplorationStats, ExplorerError, PersistenceCodec,
    Position, Segment, SegmentId, SegmentRecord, SegmentState,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::RwLock;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

// ============= Request/Response Models =============

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusQuery {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CellStatusResponse {
    pub position: Position,
    #[serde(flatten)]
    pub status: CellStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentView {
    pub label: String,
    pub state: SegmentState,
    #[serde(flatten)]
    pub record: SegmentRecord,
}

impl From<&Segment> for SegmentView {
    fn from(segment: &Segment) -> Self {
        Self {
            label: segment.id().to_string(),
            state: segment.state(),
            record: segment.to_record(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_segments: usize,
    pub active_segments: usize,
    pub goal_found: bool,
    pub visited_positions_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TreeResponse {
    pub segments: Vec<SegmentView>,
    pub global_stats: GlobalStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LineageResponse {
    pub target: String,
    pub segments: Vec<SegmentView>,
    pub route: Vec<Position>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StepResponse {
    pub progressed: bool,
    pub stats: ExplorationStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WinnerOnlyResponse {
    pub show_only_winner: bool,
    pub winning_segment: Option<SegmentId>,
}

// ============= Custom Error Handling =============

#[derive(Debug)]
struct ServiceError {
    message: String,
    status_code: StatusCode,
}

impl warp::reject::Reject for ServiceError {}

fn reject(err: ExplorerError) -> Rejection {
    let status_code = match &err {
        ExplorerError::NotFound { .. } => StatusCode::NOT_FOUND,
        ExplorerError::Corrupt { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ExplorerError::InvalidGeometry { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warp::reject::custom(ServiceError {
        message: err.to_string(),
        status_code,
    })
}

pub async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found".to_string();
    } else if let Some(service_err) = err.find::<ServiceError>() {
        code = service_err.status_code;
        message = service_err.message.clone();
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Invalid query string".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed".to_string();
    } else {
        log::error!("unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error".to_string();
    }

    let json = warp::reply::json(&serde_json::json!({
        "error": message,
        "status_code": code.as_u16(),
    }));

    Ok(warp::reply::with_status(json, code))
}

// ============= Shared State =============

#[derive(Clone)]
pub struct ServerState {
    engine: Arc<RwLock<ExplorationEngine>>,
    config: EngineConfig,
}

impl ServerState {
    /// `config` is what `POST /reset` regenerates from.
    pub fn new(engine: ExplorationEngine, config: EngineConfig) -> Self {
        Self {
            engine: Arc::new(RwLock::new(engine)),
            config,
        }
    }

    pub fn from_config(config: EngineConfig) -> std::result::Result<Self, ExplorerError> {
        Ok(Self::new(ExplorationEngine::from_config(&config)?, config))
    }

    pub fn engine(&self) -> Arc<RwLock<ExplorationEngine>> {
        self.engine.clone()
    }
}

// ============= Middleware & Filters =============

fn with_cors() -> warp::cors::Builder {
    warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["Accept", "Content-Type", "X-Requested-With"])
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .max_age(3600)
}

fn with_state(state: ServerState) -> impl Filter<Extract = (ServerState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

// ============= Request Handlers =============

async fn handle_health() -> std::result::Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "healthy",
        "service": "maze-segment-explorer",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

async fn handle_status(query: StatusQuery, state: ServerState) -> std::result::Result<impl Reply, Rejection> {
    let engine = state.engine.read().await;
    let position = Position::new(query.x, query.y);
    if !engine.maze().in_bounds(position) {
        return Err(reject(ExplorerError::not_found(format!("cell {position}"))));
    }
    Ok(warp::reply::json(&CellStatusResponse {
        position,
        status: engine.cell_status(position),
    }))
}

async fn handle_tree(state: ServerState) -> std::result::Result<impl Reply, Rejection> {
    let engine = state.engine.read().await;
    let stats = engine.statistics();
    Ok(warp::reply::json(&TreeResponse {
        segments: engine.segments().map(SegmentView::from).collect(),
        global_stats: GlobalStats {
            total_segments: stats.total_segments,
            active_segments: stats.active_segments,
            goal_found: stats.goal_found,
            visited_positions_count: stats.visited_positions,
        },
    }))
}

async fn handle_lineage(raw_id: String, state: ServerState) -> std::result::Result<impl Reply, Rejection> {
    let id: SegmentId = raw_id.parse().map_err(reject)?;
    let engine = state.engine.read().await;
    let query = engine.query();
    let chain = query.lineage(id).map_err(reject)?;
    let route = query.lineage_positions(id).map_err(reject)?;

    Ok(warp::reply::json(&LineageResponse {
        target: id.to_string(),
        segments: chain.into_iter().map(SegmentView::from).collect(),
        route,
    }))
}

async fn handle_snapshot(state: ServerState) -> std::result::Result<impl Reply, Rejection> {
    let engine = state.engine.read().await;
    Ok(warp::reply::json(&PersistenceCodec::save(&engine)))
}

async fn handle_step(state: ServerState) -> std::result::Result<impl Reply, Rejection> {
    let mut engine = state.engine.write().await;
    let progressed = engine.step();
    log::debug!("Step requested: total {} steps, progressed={}", engine.total_steps(), progressed);
    Ok(warp::reply::json(&StepResponse {
        progressed,
        stats: engine.statistics(),
    }))
}

async fn handle_reset(state: ServerState) -> std::result::Result<impl Reply, Rejection> {
    let fresh = ExplorationEngine::from_config(&state.config).map_err(reject)?;
    let mut engine = state.engine.write().await;
    *engine = fresh;
    log::info!("Exploration reset (seed {})", state.config.seed);
    Ok(warp::reply::json(&engine.statistics()))
}

async fn handle_winner_only(state: ServerState) -> std::result::Result<impl Reply, Rejection> {
    let mut engine = state.engine.write().await;
    if engine.show_only_winner() {
        engine.disable_winner_only_mode();
    } else if !engine.enable_winner_only_mode() {
        return Err(warp::reject::custom(ServiceError {
            message: "No winning segment yet".to_string(),
            status_code: StatusCode::CONFLICT,
        }));
    }
    Ok(warp::reply::json(&WinnerOnlyResponse {
        show_only_winner: engine.show_only_winner(),
        winning_segment: engine.winning_segment(),
    }))
}

// ============= Routes =============

/// All endpoints, without error recovery.
pub fn api(state: ServerState) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path!("health").and(warp::get()).and_then(handle_health);

    let status = warp::path!("maze" / "status")
        .and(warp::get())
        .and(warp::query::<StatusQuery>())
        .and(with_state(state.clone()))
        .and_then(handle_status);

    let tree = warp::path!("tree")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_tree);

    let lineage = warp::path!("segments" / String / "lineage")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_lineage);

    let snapshot = warp::path!("snapshot")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_snapshot);

    let step = warp::path!("step")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(handle_step);

    let reset = warp::path!("reset")
        .and(warp::post())
        .and(with_state(state.clone()))
        .and_then(handle_reset);

    let winner_only = warp::path!("winner-only")
        .and(warp::post())
        .and(with_state(state))
        .and_then(handle_winner_only);

    health
        .or(status)
        .or(tree)
        .or(lineage)
        .or(snapshot)
        .or(step)
        .or(reset)
        .or(winner_only)
}

/// Endpoints with JSON error bodies.
pub fn routes(state: ServerState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    api(state).recover(handle_rejection)
}

/// `PORT` from the environment unless given explicitly; 3030 by default.
pub fn resolve_port(explicit: Option<u16>) -> u16 {
    explicit.unwrap_or_else(|| {
        std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3030)
    })
}

// ============= Server Initialization =============

pub async fn start_server(state: ServerState, port: u16) -> Result<()> {
    let routes = routes(state)
        .with(with_cors())
        .with(warp::log("maze_explorer"));

    log::info!("Starting maze explorer HTTP server on port {}", port);

    let addr = ([0, 0, 0, 0], port);
    warp::serve(routes).run(addr).await;

    Ok(())
}
