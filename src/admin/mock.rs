use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, StatusCode};

use super::client::{RequestData, ResponseData, Transport};
use super::{
    BgHealState, DriveState, HealDriveInfo, HealDrives, HealItemType, HealOpts, HealResultItem,
    HealStartSuccess, HealTaskStatus,
};
use crate::errors::ErrorResponse;
use crate::globals::ADMIN_API_PREFIX;
use crate::utils;

type Requests = Vec<(Method, RequestData)>;

/// Answers requests with canned responses, in order.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<anyhow::Result<ResponseData>>>,
    requests: Mutex<Requests>,
}

impl ScriptedTransport {
    pub fn new(responses: Vec<anyhow::Result<ResponseData>>) -> Self {
        ScriptedTransport {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(body: &str) -> anyhow::Result<ResponseData> {
        Self::status(StatusCode::OK, body)
    }

    pub fn status(status: StatusCode, body: &str) -> anyhow::Result<ResponseData> {
        Ok(ResponseData {
            status,
            body: Bytes::copy_from_slice(body.as_bytes()),
        })
    }

    pub fn requests(&self) -> Requests {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, method: Method, req: RequestData) -> anyhow::Result<ResponseData> {
        self.requests.lock().unwrap().push((method, req));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted response left")))
    }
}

struct Sequence {
    path: String,
    opts: HealOpts,
    started: HealStartSuccess,
    polls: usize,
}

#[derive(Default)]
struct ServerState {
    next_token: usize,
    sequences: HashMap<String, Sequence>,
    requests: usize,
}

/// Minimal in-memory heal API: every poll heals one object, a sequence
/// finishes after `finish_after` polls.
pub struct FakeHealServer {
    finish_after: usize,
    bg_heal_state: Option<BgHealState>,
    state: Mutex<ServerState>,
}

impl FakeHealServer {
    pub fn new(finish_after: usize) -> Self {
        FakeHealServer {
            finish_after,
            bg_heal_state: None,
            state: Mutex::new(ServerState::default()),
        }
    }

    pub fn with_bg_heal_state(mut self, state: BgHealState) -> Self {
        self.bg_heal_state = Some(state);
        self
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests
    }

    pub fn running(&self) -> usize {
        self.state.lock().unwrap().sequences.len()
    }

    fn json<T: serde::Serialize>(status: StatusCode, v: &T) -> ResponseData {
        ResponseData {
            status,
            body: Bytes::from(serde_json::to_vec(v).unwrap()),
        }
    }

    fn error(status: StatusCode, code: &str, message: &str) -> ResponseData {
        Self::json(
            status,
            &ErrorResponse {
                code: code.to_owned(),
                message: message.to_owned(),
                ..Default::default()
            },
        )
    }

    fn status_of(seq: &Sequence, summary: &str, items: Vec<HealResultItem>) -> HealTaskStatus {
        HealTaskStatus {
            summary: summary.to_owned(),
            start_time: seq.started.start_time,
            heal_settings: seq.opts.clone(),
            items,
            ..Default::default()
        }
    }

    fn heal(&self, path: &str, req: &RequestData) -> ResponseData {
        let mut state = self.state.lock().unwrap();
        let force_stop = req.query("forceStop") == Some("true");
        let force_start = req.query("forceStart") == Some("true");

        match req.query("clientToken") {
            None if force_stop => {
                let token = state
                    .sequences
                    .iter()
                    .find(|(_, seq)| seq.path == path)
                    .map(|(token, _)| token.clone());
                match token.and_then(|token| state.sequences.remove(&token)) {
                    Some(seq) => Self::json(StatusCode::OK, &seq.started),
                    None => Self::error(
                        StatusCode::NOT_FOUND,
                        "XHulkHealNoSuchProcess",
                        "No such heal process is running on the server",
                    ),
                }
            }
            None => {
                let running = state.sequences.values().any(|seq| seq.path == path);
                if running && !force_start {
                    return Self::error(
                        StatusCode::BAD_REQUEST,
                        "XHulkHealAlreadyRunning",
                        "heal is already running on the given path",
                    );
                }
                state.sequences.retain(|_, seq| seq.path != path);
                let opts: HealOpts = match serde_json::from_slice(&req.content) {
                    Ok(opts) => opts,
                    Err(_) => {
                        return Self::error(
                            StatusCode::BAD_REQUEST,
                            "XHulkHealInvalidOptions",
                            "invalid heal options",
                        )
                    }
                };
                state.next_token += 1;
                let started = HealStartSuccess {
                    client_token: format!("heal-token-{}", state.next_token),
                    client_address: "127.0.0.1".to_owned(),
                    start_time: utils::now(),
                };
                state.sequences.insert(
                    started.client_token.clone(),
                    Sequence {
                        path: path.to_owned(),
                        opts,
                        started: started.clone(),
                        polls: 0,
                    },
                );
                Self::json(StatusCode::OK, &started)
            }
            Some(token) => {
                let finish_after = self.finish_after;
                let seq = match state.sequences.get_mut(token) {
                    Some(seq) => seq,
                    None => {
                        return Self::error(
                            StatusCode::BAD_REQUEST,
                            "XHulkHealInvalidClientToken",
                            "Client token mismatch",
                        )
                    }
                };
                if force_stop {
                    let status = Self::status_of(seq, "stopped", vec![]);
                    state.sequences.remove(token);
                    return Self::json(StatusCode::OK, &status);
                }
                seq.polls += 1;
                let item = HealResultItem {
                    result_index: seq.polls as i64,
                    heal_item_type: HealItemType::Object,
                    object: format!("object-{}", seq.polls),
                    before: HealDrives {
                        drives: vec![HealDriveInfo {
                            uuid: "d1".to_owned(),
                            endpoint: "http://node1:9000/d1".to_owned(),
                            state: DriveState::Missing,
                        }],
                    },
                    after: HealDrives {
                        drives: vec![HealDriveInfo {
                            uuid: "d1".to_owned(),
                            endpoint: "http://node1:9000/d1".to_owned(),
                            state: DriveState::Ok,
                        }],
                    },
                    ..Default::default()
                };
                let summary = if seq.polls >= finish_after {
                    "finished"
                } else {
                    "running"
                };
                let status = Self::status_of(seq, summary, vec![item]);
                if summary == "finished" {
                    state.sequences.remove(token);
                }
                Self::json(StatusCode::OK, &status)
            }
        }
    }
}

#[async_trait]
impl Transport for FakeHealServer {
    async fn execute(&self, method: Method, req: RequestData) -> anyhow::Result<ResponseData> {
        self.state.lock().unwrap().requests += 1;
        if method != Method::POST {
            return Ok(Self::error(
                StatusCode::METHOD_NOT_ALLOWED,
                "MethodNotAllowed",
                "The specified method is not allowed against this resource.",
            ));
        }
        let rel_path = req
            .rel_path
            .strip_prefix(ADMIN_API_PREFIX)
            .unwrap_or(&req.rel_path);
        if rel_path == "/background-heal/status" {
            return match &self.bg_heal_state {
                Some(state) => Ok(Self::json(StatusCode::OK, state)),
                None => Err(anyhow::anyhow!("connection refused")),
            };
        }
        match rel_path.strip_prefix("/heal/") {
            Some(path) => Ok(self.heal(path, &req)),
            None => Ok(Self::error(
                StatusCode::NOT_FOUND,
                "XHulkAdminNotFound",
                "unknown admin API",
            )),
        }
    }
}
