//! Dashboard session: wires the history request and the live feed into one
//! event queue drained by the UI task.
//!
//! Background tasks never touch dashboard state. They only send
//! [`DashboardEvent`]s; [`DashboardSession::drain`] applies them on the
//! owning task, so all state changes happen sequentially.

use std::fmt::Display;

use chrono::TimeZone;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::api::{ApiClient, ApiError};
use super::config::DashboardConfig;
use super::ingestion::Ingestion;
use super::projector::ViewModel;
use super::types::Sample;
use super::websocket::{ConnectionStatus, FeedEvent, FeedHandle, LiveFeed};

/// Everything that can change dashboard state
#[derive(Debug)]
pub enum DashboardEvent {
    /// Result of history request `generation`
    History {
        generation: u64,
        result: Result<Vec<Sample>, ApiError>,
    },
    /// Live feed sample or connection status
    Feed(FeedEvent),
}

impl From<FeedEvent> for DashboardEvent {
    fn from(event: FeedEvent) -> Self {
        DashboardEvent::Feed(event)
    }
}

pub struct DashboardSession {
    ingestion: Ingestion,
    status: ConnectionStatus,
    api: Option<ApiClient>,
    history_limit: usize,
    events_tx: mpsc::Sender<DashboardEvent>,
    events_rx: mpsc::Receiver<DashboardEvent>,
    history_task: Option<JoinHandle<()>>,
    feed: Option<FeedHandle>,
}

impl DashboardSession {
    /// Request history and connect the live feed concurrently.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(config: &DashboardConfig) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config.api_url)?;

        let mut session =
            Self::detached(config.history_capacity, config.feed.channel_buffer_size);
        session.api = Some(api);
        session.history_limit = config.history_limit;

        info!(
            "Starting session (api: {}, feed: {} {})",
            config.api_url, config.feed.url, config.feed.topic
        );
        let generation = session.ingestion.generation();
        session.request_history(generation);
        session.feed = Some(LiveFeed::new(config.feed.clone()).spawn(session.events_tx.clone()));

        Ok(session)
    }

    /// Session without network sources. Events are injected through
    /// [`DashboardSession::sender`].
    pub fn detached(history_capacity: usize, buffer_size: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel(buffer_size.max(1));
        Self {
            ingestion: Ingestion::new(history_capacity),
            status: ConnectionStatus::Disconnected,
            api: None,
            history_limit: 0,
            events_tx,
            events_rx,
            history_task: None,
            feed: None,
        }
    }

    pub fn sender(&self) -> mpsc::Sender<DashboardEvent> {
        self.events_tx.clone()
    }

    /// Apply every queued event. Returns how many were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next event and apply it
    pub async fn next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(event) => {
                self.apply(event);
                true
            }
            None => false,
        }
    }

    pub fn apply(&mut self, event: DashboardEvent) {
        match event {
            DashboardEvent::History {
                generation,
                result: Ok(samples),
            } => self.ingestion.on_history_loaded(generation, samples),
            DashboardEvent::History {
                generation,
                result: Err(e),
            } => {
                warn!("History request failed: {}", e);
                self.ingestion.on_history_failed(generation);
            }
            DashboardEvent::Feed(FeedEvent::Sample(sample)) => self.ingestion.on_live(sample),
            DashboardEvent::Feed(FeedEvent::Status(status)) => {
                debug!("Live feed status: {:?}", status);
                self.status = status;
            }
        }
    }

    /// Discard pending history results and fetch history again.
    /// Returns the generation of the outstanding request.
    ///
    /// A detached session has nothing to fetch from and is left untouched.
    pub fn reload(&mut self) -> u64 {
        if self.api.is_none() {
            debug!("No history source, ignoring reload");
            return self.ingestion.generation();
        }
        let generation = self.ingestion.begin_reload();
        info!("Reloading history (generation {})", generation);
        self.request_history(generation);
        generation
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn ingestion(&self) -> &Ingestion {
        &self.ingestion
    }

    pub fn view_model<Tz>(&self, tz: &Tz) -> ViewModel
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        self.ingestion.view_model(tz)
    }

    /// Stop the live feed and any outstanding history request.
    ///
    /// Nothing mutates the dashboard afterwards: events still in flight are
    /// dropped along with the session.
    pub async fn teardown(mut self) {
        self.ingestion.teardown();
        self.events_rx.close();

        if let Some(task) = self.history_task.take() {
            task.abort();
        }
        if let Some(feed) = self.feed.take() {
            feed.shutdown().await;
        }
        info!("Session closed");
    }

    fn request_history(&mut self, generation: u64) {
        let Some(api) = self.api.clone() else {
            return;
        };

        if let Some(previous) = self.history_task.take() {
            previous.abort();
        }

        let tx = self.events_tx.clone();
        let limit = self.history_limit;
        self.history_task = Some(tokio::spawn(async move {
            let result = api.history(limit).await;
            let _ = tx.send(DashboardEvent::History { generation, result }).await;
        }));
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        if let Some(task) = self.history_task.take() {
            task.abort();
        }
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::types::fixtures::sample;
    use reqwest::StatusCode;

    fn ids(session: &DashboardSession) -> Vec<String> {
        session
            .ingestion()
            .history()
            .iter()
            .map(|s| s.id.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_live_sample_before_history_is_kept() {
        let mut session = DashboardSession::detached(30, 16);
        let tx = session.sender();

        tx.send(FeedEvent::Sample(sample("E", 5)).into()).await.unwrap();
        tx.send(DashboardEvent::History {
            generation: 0,
            result: Ok(vec![sample("B", 2), sample("A", 1)]),
        })
        .await
        .unwrap();

        assert_eq!(session.drain(), 2);
        assert_eq!(ids(&session), vec!["A", "B", "E"]);
        assert_eq!(session.ingestion().current().unwrap().id, "E");
    }

    #[tokio::test]
    async fn test_history_error_falls_back_to_live() {
        let mut session = DashboardSession::detached(30, 16);
        let tx = session.sender();

        tx.send(DashboardEvent::History {
            generation: 0,
            result: Err(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
        })
        .await
        .unwrap();
        tx.send(FeedEvent::Sample(sample("A", 1)).into()).await.unwrap();
        session.drain();

        assert!(session.ingestion().is_initialized());
        assert_eq!(ids(&session), vec!["A"]);
    }

    #[tokio::test]
    async fn test_status_events_update_status() {
        let mut session = DashboardSession::detached(30, 16);
        assert_eq!(session.status(), ConnectionStatus::Disconnected);

        session.apply(FeedEvent::Status(ConnectionStatus::Connected).into());
        assert_eq!(session.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_history_result_applied_once() {
        let mut session = DashboardSession::detached(30, 16);
        session.apply(DashboardEvent::History {
            generation: 0,
            result: Ok(vec![sample("A", 1)]),
        });
        session.apply(DashboardEvent::History {
            generation: 0,
            result: Ok(vec![sample("X", 9)]),
        });
        assert_eq!(ids(&session), vec!["A"]);
    }

    #[tokio::test]
    async fn test_detached_reload_keeps_live_phase() {
        let mut session = DashboardSession::detached(30, 16);
        session.apply(DashboardEvent::History {
            generation: 0,
            result: Ok(vec![sample("A", 1)]),
        });

        assert_eq!(session.reload(), 0);
        assert!(session.ingestion().is_initialized());

        session.apply(FeedEvent::Sample(sample("B", 2)).into());
        assert_eq!(ids(&session), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_next_event_applies_one_event() {
        let mut session = DashboardSession::detached(30, 16);
        session
            .sender()
            .send(FeedEvent::Status(ConnectionStatus::Reconnecting).into())
            .await
            .unwrap();

        assert!(session.next_event().await);
        assert_eq!(session.status(), ConnectionStatus::Reconnecting);
    }

    #[tokio::test]
    async fn test_teardown_closes_queue() {
        let session = DashboardSession::detached(30, 16);
        let tx = session.sender();
        session.teardown().await;

        assert!(tx.send(FeedEvent::Sample(sample("A", 1)).into()).await.is_err());
    }
}
