use std::collections::HashMap;
use std::sync::Arc;

use log::{info, warn};

use super::client::{AdminClient, HttpTransport, Transport};
use super::{HealOpts, HealResultItem, HealStartSuccess, HealStopSuccess, HealTaskStatus};
use crate::config;
use crate::errors::AdminError;
use crate::utils;

// Summaries reported by the server for a heal sequence.
pub const HEAL_NOT_STARTED_STATUS: &str = "not started";
pub const HEAL_RUNNING_STATUS: &str = "running";
pub const HEAL_STOPPED_STATUS: &str = "stopped";
pub const HEAL_FINISHED_STATUS: &str = "finished";
pub const HEAL_FAILED_STATUS: &str = "failed";

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum HealSequenceState {
    NotStarted,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl HealSequenceState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HealSequenceState::Completed | HealSequenceState::Stopped | HealSequenceState::Failed
        )
    }

    // A sequence stopped by an error carries the error as failure detail.
    fn from_status(status: &HealTaskStatus) -> Self {
        match status.summary.as_str() {
            HEAL_FINISHED_STATUS => HealSequenceState::Completed,
            HEAL_STOPPED_STATUS if !status.failure_detail.is_empty() => HealSequenceState::Failed,
            HEAL_STOPPED_STATUS => HealSequenceState::Stopped,
            HEAL_FAILED_STATUS => HealSequenceState::Failed,
            // "not started" only means queued once the server accepted it.
            _ => HealSequenceState::Running,
        }
    }
}

/// Client side record of one heal sequence.
#[derive(Clone, Debug)]
pub struct HealSequence {
    pub bucket: String,
    pub prefix: String,
    pub opts: HealOpts,
    pub client_token: String,
    pub client_address: String,
    pub start_time: utils::DateTime,
    pub state: HealSequenceState,
    pub summary: String,
    pub failure_detail: String,
    // Results of every poll so far, in arrival order.
    pub items: Vec<HealResultItem>,
    pub last_update: Option<utils::DateTime>,
}

impl HealSequence {
    fn new(bucket: &str, prefix: &str, opts: HealOpts) -> Self {
        HealSequence {
            bucket: bucket.to_owned(),
            prefix: prefix.to_owned(),
            opts,
            client_token: String::new(),
            client_address: String::new(),
            start_time: utils::epoch(),
            state: HealSequenceState::NotStarted,
            summary: HEAL_NOT_STARTED_STATUS.to_owned(),
            failure_detail: String::new(),
            items: Vec::new(),
            last_update: None,
        }
    }

    fn on_started(&mut self, started: &HealStartSuccess) {
        self.client_token = started.client_token.clone();
        self.client_address = started.client_address.clone();
        self.start_time = started.start_time;
        self.state = HealSequenceState::Running;
        self.summary = HEAL_RUNNING_STATUS.to_owned();
        self.last_update = Some(utils::now());
    }

    fn on_status(&mut self, status: HealTaskStatus) {
        self.state = HealSequenceState::from_status(&status);
        self.summary = status.summary;
        self.failure_detail = status.failure_detail;
        self.items.extend(status.items);
        self.last_update = Some(utils::now());
    }

    fn on_error(&mut self, err: &AdminError) {
        self.state = HealSequenceState::Failed;
        self.failure_detail = err.to_string();
        self.last_update = Some(utils::now());
    }
}

/// Heal sequences started by this caller, keyed by client token.
///
/// Sequences are added on start and evicted once they reach a terminal
/// state. Not synchronized, callers sharing it across tasks wrap it in a lock.
pub struct HealSessions<T = HttpTransport> {
    client: Arc<AdminClient<T>>,
    sessions: HashMap<String, HealSequence>,
    poll_interval: utils::Duration,
}

impl HealSessions<HttpTransport> {
    pub fn from_config(config: &config::admin::Config) -> anyhow::Result<Self> {
        Ok(HealSessions::new(
            Arc::new(AdminClient::from_config(config)?),
            config.poll_interval,
        ))
    }
}

impl<T: Transport> HealSessions<T> {
    /// `poll_interval` bounds the wait between two polls of `poll_until_done`.
    pub fn new(client: Arc<AdminClient<T>>, poll_interval: utils::Duration) -> Self {
        HealSessions {
            client,
            sessions: HashMap::new(),
            poll_interval,
        }
    }

    pub fn poll_interval(&self) -> utils::Duration {
        self.poll_interval
    }

    pub fn get(&self, client_token: &str) -> Option<&HealSequence> {
        self.sessions.get(client_token)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.sessions.keys().map(String::as_str)
    }

    pub async fn start(
        &mut self,
        bucket: &str,
        prefix: &str,
        opts: HealOpts,
        force_start: bool,
    ) -> Result<HealStartSuccess, AdminError> {
        let mut seq = HealSequence::new(bucket, prefix, opts);
        let started = self
            .client
            .start_heal(bucket, prefix, &seq.opts, force_start)
            .await?;
        seq.on_started(&started);
        if force_start {
            // The server dropped whatever ran on the same path.
            let replaced: Vec<String> = self
                .sessions
                .iter()
                .filter(|(_, s)| s.bucket == bucket && s.prefix == prefix)
                .map(|(token, _)| token.clone())
                .collect();
            for token in replaced {
                if let Some(old) = self.sessions.get_mut(&token) {
                    old.state = HealSequenceState::Stopped;
                }
                self.evict(&token);
            }
        }
        info!(
            "heal sequence {} started on {}/{} from {}",
            started.client_token, bucket, prefix, started.client_address
        );
        self.sessions.insert(started.client_token.clone(), seq);
        Ok(started)
    }

    /// Fetches the latest status of a sequence. The returned record is
    /// evicted if the sequence reached a terminal state.
    ///
    /// A transport failure leaves the record as it was, the next poll tells
    /// what happened.
    pub async fn poll(&mut self, client_token: &str) -> Result<HealSequence, AdminError> {
        let (bucket, prefix) = self.lookup(client_token)?;
        let result = self
            .client
            .heal_status(&bucket, &prefix, client_token)
            .await;
        self.update(client_token, result)
    }

    /// Stops a sequence and returns its final record.
    pub async fn stop(&mut self, client_token: &str) -> Result<HealSequence, AdminError> {
        let (bucket, prefix) = self.lookup(client_token)?;
        let result = self
            .client
            .stop_heal(&bucket, &prefix, client_token)
            .await;
        let seq = self.update(client_token, result)?;
        if seq.state.is_terminal() {
            return Ok(seq);
        }
        if let Some(entry) = self.sessions.get_mut(client_token) {
            entry.state = HealSequenceState::Stopped;
        }
        Ok(self.evict(client_token).unwrap_or(seq))
    }

    /// Stops whatever sequence runs on `bucket`/`prefix`, including ones
    /// not started through this table.
    pub async fn force_stop(
        &mut self,
        bucket: &str,
        prefix: &str,
    ) -> Result<HealStopSuccess, AdminError> {
        let stopped = self.client.force_stop_heal(bucket, prefix).await?;
        info!(
            "heal sequence {} on {}/{} force stopped",
            stopped.client_token, bucket, prefix
        );
        self.evict(&stopped.client_token);
        Ok(stopped)
    }

    /// Polls until the sequence reaches a terminal state, waiting up to the
    /// poll interval between two polls.
    pub async fn poll_until_done(&mut self, client_token: &str) -> Result<HealSequence, AdminError> {
        let interval = self.poll_interval;
        let mut rng = utils::rng_seed_now();
        loop {
            let seq = self.poll(client_token).await?;
            if seq.state.is_terminal() {
                return Ok(seq);
            }
            utils::sleep(interval, Some(&mut rng)).await;
        }
    }

    fn lookup(&self, client_token: &str) -> Result<(String, String), AdminError> {
        self.sessions
            .get(client_token)
            .map(|seq| (seq.bucket.clone(), seq.prefix.clone()))
            .ok_or_else(|| {
                AdminError::invalid_argument(format!("unknown heal sequence '{}'", client_token))
            })
    }

    fn update(
        &mut self,
        client_token: &str,
        result: Result<HealTaskStatus, AdminError>,
    ) -> Result<HealSequence, AdminError> {
        let seq = match self.sessions.get_mut(client_token) {
            Some(seq) => seq,
            None => {
                return Err(AdminError::invalid_argument(format!(
                    "unknown heal sequence '{}'",
                    client_token
                )))
            }
        };
        match result {
            Ok(status) => seq.on_status(status),
            Err(err @ AdminError::Server(_)) => {
                warn!("heal sequence {} failed: {}", client_token, err);
                seq.on_error(&err);
                self.evict(client_token);
                return Err(err);
            }
            Err(err) => return Err(err),
        }

        let seq = seq.clone();
        if seq.state.is_terminal() {
            self.evict(client_token);
        }
        Ok(seq)
    }

    fn evict(&mut self, client_token: &str) -> Option<HealSequence> {
        let seq = self.sessions.remove(client_token)?;
        info!(
            "heal sequence {} on {}/{} ended: {}",
            client_token, seq.bucket, seq.prefix, seq.state
        );
        Some(seq)
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::admin::mock::{FakeHealServer, ScriptedTransport};
    use crate::admin::HealScanMode;

    fn deep() -> HealOpts {
        HealOpts {
            recursive: true,
            scan_mode: HealScanMode::Deep,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_and_poll_to_completion() {
        let client = Arc::new(AdminClient::new(FakeHealServer::new(3)));
        let mut sessions = HealSessions::new(client.clone(), utils::millis(1));

        let started = sessions.start("photos", "", deep(), false).await.unwrap();
        assert!(!started.client_token.is_empty());
        let seq = sessions.get(&started.client_token).unwrap();
        assert_eq!(seq.state, HealSequenceState::Running);

        let seq = sessions.poll(&started.client_token).await.unwrap();
        assert_eq!(seq.state, HealSequenceState::Running);
        assert_eq!(seq.items.len(), 1);
        assert_eq!(seq.items[0].missing_counts(), (1, 0));

        let seq = sessions.poll_until_done(&started.client_token).await.unwrap();
        assert_eq!(seq.state, HealSequenceState::Completed);
        assert_eq!(seq.items.len(), 3);
        assert!(sessions.is_empty());
        assert_eq!(client.transport().running(), 0);
    }

    #[tokio::test]
    async fn test_both_force_flags_not_sent() {
        let client = Arc::new(AdminClient::new(FakeHealServer::new(1)));
        let err = client
            .heal("photos", "", &deep(), "", true, true)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::InvalidArgument(_)));
        assert_eq!(client.transport().request_count(), 0);
    }

    #[tokio::test]
    async fn test_stop() {
        let client = Arc::new(AdminClient::new(FakeHealServer::new(10)));
        let mut sessions = HealSessions::new(client.clone(), utils::millis(1));
        let started = sessions.start("photos", "2021", deep(), false).await.unwrap();
        sessions.poll(&started.client_token).await.unwrap();

        let seq = sessions.stop(&started.client_token).await.unwrap();
        assert_eq!(seq.state, HealSequenceState::Stopped);
        assert_eq!(seq.items.len(), 1);
        assert!(sessions.get(&started.client_token).is_none());
        assert_eq!(client.transport().running(), 0);

        let err = sessions.poll(&started.client_token).await.unwrap_err();
        assert!(matches!(err, AdminError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_force_stop_and_restart() {
        let client = Arc::new(AdminClient::new(FakeHealServer::new(10)));
        let mut sessions = HealSessions::new(client.clone(), utils::millis(1));
        let first = sessions.start("photos", "", deep(), false).await.unwrap();

        let err = sessions.start("photos", "", deep(), false).await.unwrap_err();
        assert_eq!(err.server_code(), Some("XHulkHealAlreadyRunning"));
        assert_eq!(sessions.len(), 1);

        let other = sessions.start("videos", "", deep(), false).await.unwrap();
        let second = sessions.start("photos", "", deep(), true).await.unwrap();
        assert_ne!(first.client_token, second.client_token);

        // The forced start replaced the first sequence on the server.
        assert!(sessions.get(&first.client_token).is_none());
        let mut tokens = sessions.tokens().collect::<Vec<_>>();
        tokens.sort_unstable();
        let mut expected = vec![other.client_token.as_str(), second.client_token.as_str()];
        expected.sort_unstable();
        assert_eq!(tokens, expected);
        let err = sessions.poll(&first.client_token).await.unwrap_err();
        assert!(matches!(err, AdminError::InvalidArgument(_)));

        let stopped = sessions.force_stop("photos", "").await.unwrap();
        assert_eq!(stopped.client_token, second.client_token);
        assert!(sessions.get(&second.client_token).is_none());
        assert_eq!(
            sessions.tokens().collect::<Vec<_>>(),
            vec![other.client_token.as_str()]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_session() {
        let client = Arc::new(AdminClient::new(ScriptedTransport::new(vec![
            ScriptedTransport::ok(r#"{"clientToken":"t1","clientAddress":"","startTime":"2021-08-01T10:00:00Z"}"#),
            Err(anyhow::anyhow!("connection reset by peer")),
            ScriptedTransport::ok(r#"{"summary":"stopped","detail":"disk not found","startTime":"2021-08-01T10:00:00Z","settings":{}}"#),
        ])));
        let mut sessions = HealSessions::new(client, utils::millis(1));
        sessions.start("photos", "", deep(), false).await.unwrap();

        let err = sessions.poll("t1").await.unwrap_err();
        assert!(matches!(err, AdminError::Transport(_)));
        assert_eq!(sessions.get("t1").unwrap().state, HealSequenceState::Running);

        let seq = sessions.poll("t1").await.unwrap();
        assert_eq!(seq.state, HealSequenceState::Failed);
        assert_eq!(seq.failure_detail, "disk not found");
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_stop_still_running() {
        let client = Arc::new(AdminClient::new(ScriptedTransport::new(vec![
            ScriptedTransport::ok(r#"{"clientToken":"t1","clientAddress":"","startTime":"2021-08-01T10:00:00Z"}"#),
            ScriptedTransport::ok(r#"{"summary":"running","detail":"","startTime":"2021-08-01T10:00:00Z","settings":{},"items":[{"type":"object","object":"a.png"}]}"#),
        ])));
        let mut sessions = HealSessions::new(client, utils::millis(1));
        sessions.start("photos", "", deep(), false).await.unwrap();

        // The evicted table entry is returned, so it carries the final state.
        let seq = sessions.stop("t1").await.unwrap();
        assert_eq!(seq.state, HealSequenceState::Stopped);
        assert_eq!(seq.summary, "running");
        assert_eq!(seq.items.len(), 1);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_from_config() {
        let mut config = config::admin::Config::default();
        config.poll_interval = utils::millis(500);
        let sessions = HealSessions::from_config(&config).unwrap();
        assert_eq!(sessions.poll_interval(), utils::millis(500));
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_fails_session() {
        let client = Arc::new(AdminClient::new(ScriptedTransport::new(vec![
            ScriptedTransport::ok(r#"{"clientToken":"t1","clientAddress":"","startTime":"2021-08-01T10:00:00Z"}"#),
            ScriptedTransport::status(StatusCode::INTERNAL_SERVER_ERROR, r#"{"Code":"InternalError","Message":"We encountered an internal error, please try again."}"#),
        ])));
        let mut sessions = HealSessions::new(client, utils::millis(1));
        sessions.start("photos", "", deep(), false).await.unwrap();
        let err = sessions.poll("t1").await.unwrap_err();
        assert_eq!(err.server_code(), Some("InternalError"));
        assert!(sessions.get("t1").is_none());
    }

    #[test]
    fn test_state_from_status() {
        let status = |summary: &str, detail: &str| HealTaskStatus {
            summary: summary.to_owned(),
            failure_detail: detail.to_owned(),
            ..Default::default()
        };
        let state = |summary, detail| HealSequenceState::from_status(&status(summary, detail));
        assert_eq!(state("not started", ""), HealSequenceState::Running);
        assert_eq!(state("running", ""), HealSequenceState::Running);
        assert_eq!(state("finished", ""), HealSequenceState::Completed);
        assert_eq!(state("stopped", ""), HealSequenceState::Stopped);
        assert_eq!(state("stopped", "disk offline"), HealSequenceState::Failed);
        assert_eq!(state("failed", ""), HealSequenceState::Failed);
        assert!(!HealSequenceState::NotStarted.is_terminal());
        assert!(HealSequenceState::Stopped.is_terminal());
        assert_eq!(HealSequenceState::NotStarted.to_string(), "not_started");
    }
}
