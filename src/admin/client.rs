use async_trait::async_trait;
use bytes::Bytes;
use http::{header, HeaderValue, Method, StatusCode};
use log::debug;
use serde::de::DeserializeOwned;
use url::Url;

use super::{BgHealState, HealOpts, HealStartSuccess, HealStopSuccess, HealTaskStatus};
use crate::config;
use crate::errors::{AdminError, ErrorResponse};
use crate::globals::{ADMIN_API_PREFIX, HULK_USER_AGENT};
use crate::utils;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestData {
    pub rel_path: String,
    pub query_values: Vec<(String, String)>,
    pub content: Vec<u8>,
}

impl RequestData {
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query_values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct ResponseData {
    pub status: StatusCode,
    pub body: Bytes,
}

/// One round trip to the admin API of a node. Implementations keep no
/// state between calls.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, method: Method, req: RequestData) -> anyhow::Result<ResponseData>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    auth_token: Option<String>,
}

impl HttpTransport {
    pub fn new(
        endpoint: Url,
        auth_token: Option<String>,
        timeout: utils::Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(utils::seconds(15))
            .timeout(timeout)
            .tcp_keepalive(Some(utils::seconds(15)))
            .build()?;
        Ok(HttpTransport {
            client,
            endpoint,
            auth_token,
        })
    }

    pub fn from_config(config: &config::admin::Config) -> anyhow::Result<Self> {
        Self::new(
            config.endpoint.clone(),
            config.auth_token.clone(),
            config.timeout,
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, method: Method, req: RequestData) -> anyhow::Result<ResponseData> {
        let mut url = self.endpoint.join(&req.rel_path)?;
        if !req.query_values.is_empty() {
            url.query_pairs_mut().extend_pairs(req.query_values.iter());
        }
        debug!("{} {}", method, url);

        let mut builder = self
            .client
            .request(method, url)
            .header(header::USER_AGENT, HeaderValue::from_static(HULK_USER_AGENT))
            .body(req.content);
        if let Some(auth_token) = &self.auth_token {
            builder = builder.bearer_auth(auth_token);
        }

        let rep = builder.send().await?;
        let status = rep.status();
        let body = rep.bytes().await?;
        Ok(ResponseData { status, body })
    }
}

/// Response of the heal API, its shape depends on whether a client token
/// was sent.
#[derive(Clone, Debug)]
pub enum HealResponse {
    // No token: a new sequence was started, or a force-stop stopped one.
    Started(HealStartSuccess),
    Status(HealTaskStatus),
}

impl HealResponse {
    pub fn into_started(self) -> Option<HealStartSuccess> {
        match self {
            HealResponse::Started(started) => Some(started),
            HealResponse::Status(_) => None,
        }
    }

    pub fn into_status(self) -> Option<HealTaskStatus> {
        match self {
            HealResponse::Status(status) => Some(status),
            HealResponse::Started(_) => None,
        }
    }
}

pub struct AdminClient<T = HttpTransport> {
    transport: T,
}

impl AdminClient<HttpTransport> {
    pub fn from_config(config: &config::admin::Config) -> anyhow::Result<Self> {
        Ok(AdminClient::new(HttpTransport::from_config(config)?))
    }
}

impl<T: Transport> AdminClient<T> {
    pub fn new(transport: T) -> Self {
        AdminClient { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn execute_method(
        &self,
        method: Method,
        req: RequestData,
    ) -> Result<ResponseData, AdminError> {
        self.transport
            .execute(method, req)
            .await
            .map_err(AdminError::Transport)
    }

    /// Starts a heal sequence on `bucket`/`prefix`, or with a non-empty
    /// `client_token`, fetches the status of a running one.
    ///
    /// `force_start` and `force_stop` are mutually exclusive. Without a token
    /// `force_stop` stops the sequence running on `bucket`/`prefix` and the
    /// response describes it.
    pub async fn heal(
        &self,
        bucket: &str,
        prefix: &str,
        opts: &HealOpts,
        client_token: &str,
        force_start: bool,
        force_stop: bool,
    ) -> Result<HealResponse, AdminError> {
        let body = self
            .send_heal(bucket, prefix, opts, client_token, force_start, force_stop)
            .await?;
        if client_token.is_empty() {
            decode_response(&body).map(HealResponse::Started)
        } else {
            decode_response(&body).map(HealResponse::Status)
        }
    }

    pub async fn start_heal(
        &self,
        bucket: &str,
        prefix: &str,
        opts: &HealOpts,
        force_start: bool,
    ) -> Result<HealStartSuccess, AdminError> {
        let body = self
            .send_heal(bucket, prefix, opts, "", force_start, false)
            .await?;
        decode_response(&body)
    }

    pub async fn heal_status(
        &self,
        bucket: &str,
        prefix: &str,
        client_token: &str,
    ) -> Result<HealTaskStatus, AdminError> {
        if client_token.is_empty() {
            return Err(AdminError::invalid_argument("client token is required"));
        }
        let body = self
            .send_heal(bucket, prefix, &HealOpts::default(), client_token, false, false)
            .await?;
        decode_response(&body)
    }

    /// Stops the sequence identified by `client_token`, returning its final status.
    pub async fn stop_heal(
        &self,
        bucket: &str,
        prefix: &str,
        client_token: &str,
    ) -> Result<HealTaskStatus, AdminError> {
        if client_token.is_empty() {
            return Err(AdminError::invalid_argument("client token is required"));
        }
        let body = self
            .send_heal(bucket, prefix, &HealOpts::default(), client_token, false, true)
            .await?;
        decode_response(&body)
    }

    /// Stops whatever sequence runs on `bucket`/`prefix`.
    pub async fn force_stop_heal(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<HealStopSuccess, AdminError> {
        let body = self
            .send_heal(bucket, prefix, &HealOpts::default(), "", false, true)
            .await?;
        decode_response(&body)
    }

    async fn send_heal(
        &self,
        bucket: &str,
        prefix: &str,
        opts: &HealOpts,
        client_token: &str,
        force_start: bool,
        force_stop: bool,
    ) -> Result<Bytes, AdminError> {
        if force_start && force_stop {
            return Err(AdminError::invalid_argument(
                "forceStart and forceStop set to true is not allowed",
            ));
        }

        let mut rel_path = format!("{}/heal/{}", ADMIN_API_PREFIX, bucket);
        if !bucket.is_empty() && !prefix.is_empty() {
            rel_path.push('/');
            rel_path.push_str(prefix);
        }

        // A token fully identifies the sequence, options are not re-sent.
        let mut query_values = Vec::new();
        let content = if client_token.is_empty() {
            serde_json::to_vec(opts)?
        } else {
            query_values.push(("clientToken".to_owned(), client_token.to_owned()));
            Vec::new()
        };
        if force_start {
            query_values.push(("forceStart".to_owned(), "true".to_owned()));
        } else if force_stop {
            query_values.push(("forceStop".to_owned(), "true".to_owned()));
        }

        let rep = self
            .execute_method(
                Method::POST,
                RequestData {
                    rel_path,
                    query_values,
                    content,
                },
            )
            .await?;
        if rep.status != StatusCode::OK {
            return Err(ErrorResponse::from_http_response(rep.status, &rep.body).into());
        }
        Ok(rep.body)
    }

    /// Returns the background heal status of the server, or of the whole
    /// cluster when the server aggregates its peers.
    pub async fn background_heal_status(&self) -> Result<BgHealState, AdminError> {
        let rep = self
            .execute_method(
                Method::POST,
                RequestData {
                    rel_path: format!("{}/background-heal/status", ADMIN_API_PREFIX),
                    ..Default::default()
                },
            )
            .await?;
        if rep.status != StatusCode::OK {
            return Err(ErrorResponse::from_http_response(rep.status, &rep.body).into());
        }
        Ok(serde_json::from_slice(&rep.body)?)
    }
}

// The server may answer 200 and still send an error payload if it failed
// after the status line went out.
fn decode_response<R: DeserializeOwned>(body: &[u8]) -> Result<R, AdminError> {
    match serde_json::from_slice::<R>(body) {
        Ok(rep) => Ok(rep),
        Err(err) => match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(err_resp) => Err(AdminError::Server(err_resp)),
            Err(_) => Err(AdminError::Decode(err)),
        },
    }
}
