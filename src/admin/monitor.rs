use futures_util::future::join_all;
use log::warn;
use url::Url;

use super::client::{AdminClient, HttpTransport, Transport};
use super::BgHealState;
use crate::config;
use crate::errors::AdminError;
use crate::utils;

/// Collects the background heal status of every node and merges them into
/// one cluster wide view.
pub struct HealStatusMonitor<T = HttpTransport> {
    nodes: Vec<(String, AdminClient<T>)>,
    timeout: utils::Duration,
}

impl HealStatusMonitor<HttpTransport> {
    /// One client per endpoint, sharing the auth token and timeouts of `config`.
    pub fn from_config(endpoints: &[Url], config: &config::admin::Config) -> anyhow::Result<Self> {
        let mut monitor = HealStatusMonitor::new(config.status_timeout);
        for endpoint in endpoints {
            let transport = HttpTransport::new(
                endpoint.clone(),
                config.auth_token.clone(),
                config.timeout,
            )?;
            monitor.add_node(endpoint.as_str(), AdminClient::new(transport));
        }
        Ok(monitor)
    }
}

impl<T: Transport> HealStatusMonitor<T> {
    pub fn new(timeout: utils::Duration) -> Self {
        HealStatusMonitor {
            nodes: Vec::new(),
            timeout,
        }
    }

    pub fn add_node(&mut self, endpoint: &str, client: AdminClient<T>) {
        self.nodes.push((endpoint.to_owned(), client));
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|(endpoint, _)| endpoint.as_str())
    }

    /// Queries all nodes concurrently. A node that fails or does not answer
    /// within the timeout is reported in `offline_endpoints`, the others are
    /// merged in node order.
    pub async fn collect(&self) -> BgHealState {
        let timeout = self.timeout;
        let results = join_all(self.nodes.iter().map(|(endpoint, client)| async move {
            let result = match tokio::time::timeout(timeout, client.background_heal_status()).await
            {
                Ok(result) => result,
                Err(elapsed) => Err(AdminError::Transport(anyhow::Error::new(elapsed))),
            };
            (endpoint, result)
        }))
        .await;

        let mut state = BgHealState::default();
        let mut snapshots = Vec::with_capacity(results.len());
        for (endpoint, result) in results {
            match result {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(err) => {
                    if err.is_timeout() {
                        warn!("{} did not report its heal status in {:?}", endpoint, timeout);
                    } else {
                        warn!("unable to get heal status of {}: {}", endpoint, err);
                    }
                    state.offline_endpoints.push(endpoint.clone());
                }
            }
        }
        state.merge(&snapshots);
        state
    }
}
