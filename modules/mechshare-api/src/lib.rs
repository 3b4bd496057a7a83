//! HTTP boundary for the mechanism sharing platform's interaction tracking.
//!
//! Handlers check mechanism existence, resolve the optional caller, and map
//! core results to status codes. All dedup and counting lives in
//! `mechshare-events`.

use std::path::PathBuf;
use std::sync::Arc;

use mechshare_events::{InteractionRecorder, LikeStore, StatsAggregator};

pub mod auth;
pub mod error;
pub mod gateway;
pub mod jwt;
pub mod rest;
pub mod routes;

pub use error::ApiError;
pub use gateway::{MemorySubjectGateway, PgSubjectGateway, SubjectGateway};
pub use jwt::JwtService;
pub use routes::build_router;

pub struct AppState {
    pub recorder: InteractionRecorder,
    pub stats: StatsAggregator,
    pub likes: Arc<dyn LikeStore>,
    pub subjects: Arc<dyn SubjectGateway>,
    pub jwt: JwtService,
    pub upload_dir: PathBuf,
    pub max_batch_ids: usize,
}
