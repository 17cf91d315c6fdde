/// Environment Monitor Dashboard - Shared Library
///
/// Terminal dashboard for a temperature/humidity backend. The library
/// includes:
/// - Core sample type and JSON decoding
/// - REST client for the history endpoints
/// - STOMP-over-WebSocket live feed with auto-reconnect
/// - Bounded history buffer and the load/live sequencer
/// - Pure view model projection and the ratatui renderer
pub mod shared;

// Re-export commonly used types for convenience
pub use shared::types::{Sample, SampleError};

pub use shared::api::{ApiClient, ApiError};
pub use shared::config::DashboardConfig;
pub use shared::websocket::{ConnectionStatus, FeedConfig, FeedEvent, FeedHandle, LiveFeed};

pub use shared::current::CurrentReading;
pub use shared::history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
pub use shared::ingestion::{Ingestion, Phase};
pub use shared::session::{DashboardEvent, DashboardSession};

pub use shared::projector::{project, project_local, ChartSeries, ViewModel, PLACEHOLDER};
pub use shared::widget::render_dashboard;
