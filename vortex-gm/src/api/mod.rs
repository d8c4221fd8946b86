//! HTTP API handlers for vortex-gm
//!
//! JSON over HTTP plus an SSE stream of scoring events. Catalog rejections of
//! submitted metrics are reported in a 200 body (`recorded: false`), invalid
//! parameters as 400.

pub mod catalog;
pub mod health;
pub mod leaderboard;
pub mod metrics;
pub mod overview;
pub mod sse;
pub mod users;

pub use catalog::catalog_routes;
pub use health::health_routes;
pub use leaderboard::leaderboard_routes;
pub use metrics::metric_routes;
pub use overview::overview_routes;
pub use sse::event_stream;
pub use users::user_routes;
