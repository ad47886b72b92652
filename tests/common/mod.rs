//! Shared test utilities and fixtures
//!
//! Stateful mock services for the registry (JSON-RPC), the governance
//! backend (REST), and the content store (add endpoint), so scenarios can
//! exercise the real HTTP clients end to end.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lockstone_config::{Settings, SignerToken};
use lockstone_types::{Address, ContentId, Name, NodeId};

pub fn parent_name() -> Name {
    Name::parse("demo.site").unwrap()
}

pub fn governance_account() -> Address {
    Address::parse("0x00000000000000000000000000000000000000a1").unwrap()
}

pub fn individual_account() -> Address {
    Address::parse("0x00000000000000000000000000000000000000b2").unwrap()
}

pub fn sample_content_id() -> ContentId {
    let mut multihash = vec![0x12, 0x20];
    multihash.extend_from_slice(&[0x42; 32]);
    ContentId::Current {
        codec: 0x70,
        multihash,
    }
}

/// Settings pointing every endpoint at the given mock servers.
pub fn settings_for(
    registry: &MockRegistry,
    governance: &MockGovernance,
    storage: &MockStorage,
) -> Settings {
    Settings {
        registry_endpoint: url::Url::parse(&registry.server.uri()).unwrap(),
        governance_endpoint: url::Url::parse(&governance.server.uri()).unwrap(),
        storage_endpoint: url::Url::parse(&storage.server.uri()).unwrap(),
        parent_name: parent_name(),
        governance_account: governance_account(),
        signer_token: SignerToken::new("approver-token"),
        max_version_scan: 50,
        request_timeout_secs: 5,
        max_retries: 0,
    }
}

/// A site directory with a couple of files to upload.
pub fn site_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<html>v-next</html>").unwrap();
    std::fs::write(dir.path().join("style.css"), "body{}").unwrap();
    dir
}

// ── Registry mock ────────────────────────────────────────────

/// A stateful JSON-RPC registry: owners keyed by node id, atomic
/// create-child with "node already exists" conflicts.
pub struct MockRegistry {
    pub server: MockServer,
    owners: Arc<Mutex<HashMap<String, String>>>,
    creates: Arc<Mutex<Vec<serde_json::Value>>>,
    race_labels: Arc<Mutex<Vec<String>>>,
}

impl MockRegistry {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let owners: Arc<Mutex<HashMap<String, String>>> = Arc::new(Mutex::new(HashMap::new()));
        let creates: Arc<Mutex<Vec<serde_json::Value>>> = Arc::new(Mutex::new(Vec::new()));
        let race_labels: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let owners_handle = owners.clone();
        let creates_handle = creates.clone();
        let race_handle = race_labels.clone();
        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(move |req: &wiremock::Request| {
                let body: serde_json::Value =
                    serde_json::from_slice(&req.body).expect("JSON-RPC body");
                let id = body["id"].clone();
                let rpc_method = body["method"].as_str().unwrap_or_default();

                let respond = |value: serde_json::Value| {
                    ResponseTemplate::new(200).set_body_json(json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": value,
                    }))
                };

                match rpc_method {
                    "registry_getOwner" => {
                        let node = body["params"][0].as_str().unwrap_or_default();
                        match owners_handle.lock().unwrap().get(node) {
                            Some(owner) => respond(json!(owner)),
                            None => respond(json!(null)),
                        }
                    }
                    "registry_createChild" => {
                        let params = &body["params"][0];
                        let parent: NodeId =
                            serde_json::from_value(params["parent"].clone()).expect("parent node");
                        let label = params["label"].as_str().unwrap_or_default();
                        let child = parent.child(label).to_string();

                        let mut owners = owners_handle.lock().unwrap();

                        // One-shot race simulation: a concurrent deployment
                        // claims the label at the instant we try to create it.
                        let raced = {
                            let mut races = race_handle.lock().unwrap();
                            match races.iter().position(|raced| raced == label) {
                                Some(index) => {
                                    races.remove(index);
                                    true
                                }
                                None => false,
                            }
                        };
                        if raced {
                            owners.insert(child, individual_account().to_string());
                            return ResponseTemplate::new(200).set_body_json(json!({
                                "jsonrpc": "2.0",
                                "id": body["id"],
                                "error": { "code": -32040, "message": "node already exists" },
                            }));
                        }

                        if owners.contains_key(&child) {
                            return ResponseTemplate::new(200).set_body_json(json!({
                                "jsonrpc": "2.0",
                                "id": body["id"],
                                "error": { "code": -32040, "message": "node already exists" },
                            }));
                        }
                        owners.insert(
                            child.clone(),
                            params["owner"].as_str().unwrap_or_default().to_string(),
                        );
                        creates_handle.lock().unwrap().push(params.clone());
                        respond(json!({ "node": child, "tx": format!("0xtx-{label}") }))
                    }
                    "registry_setContentPointer" => {
                        let params = &body["params"][0];
                        respond(json!({ "node": params["node"], "tx": "0xtx-pointer" }))
                    }
                    other => ResponseTemplate::new(200).set_body_json(json!({
                        "jsonrpc": "2.0",
                        "id": body["id"],
                        "error": { "code": -32601, "message": format!("unknown method {other}") },
                    })),
                }
            })
            .mount(&server)
            .await;

        Self {
            server,
            owners,
            creates,
            race_labels,
        }
    }

    /// The next create of `label` loses a race to a concurrent deployment.
    pub fn race_once_on(&self, label: &str) {
        self.race_labels.lock().unwrap().push(label.to_string());
    }

    pub fn set_owner(&self, name: &Name, owner: &Address) {
        self.owners
            .lock()
            .unwrap()
            .insert(name.node().to_string(), owner.to_string());
    }

    pub fn occupy(&self, label: &str, owner: &Address) {
        let child = parent_name().child(label).unwrap();
        self.set_owner(&child, owner);
    }

    pub fn created_labels(&self) -> Vec<String> {
        self.creates
            .lock()
            .unwrap()
            .iter()
            .map(|params| params["label"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn owner_of(&self, name: &Name) -> Option<String> {
        self.owners
            .lock()
            .unwrap()
            .get(&name.node().to_string())
            .cloned()
    }
}

// ── Governance mock ──────────────────────────────────────────

/// A stateful governance backend: records proposals, serves status queries.
pub struct MockGovernance {
    pub server: MockServer,
    proposals: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
}

impl MockGovernance {
    /// `reject_with`: respond to every submission with this HTTP status
    /// instead of accepting.
    pub async fn start(required: u32, reject_with: Option<u16>) -> Self {
        let server = MockServer::start().await;
        let proposals: Arc<Mutex<Vec<(String, serde_json::Value)>>> =
            Arc::new(Mutex::new(Vec::new()));

        let submit_handle = proposals.clone();
        Mock::given(method("POST"))
            .and(path("/v1/proposals"))
            .respond_with(move |req: &wiremock::Request| {
                if let Some(status) = reject_with {
                    return ResponseTemplate::new(status)
                        .set_body_string("signer is not an approver");
                }
                let body: serde_json::Value =
                    serde_json::from_slice(&req.body).expect("proposal body");
                let mut proposals = submit_handle.lock().unwrap();
                let id = format!("prop-{}", proposals.len());
                proposals.push((id.clone(), body["operations"].clone()));
                ResponseTemplate::new(201).set_body_json(json!({
                    "id": id,
                    "approved": 1,
                    "required": required,
                }))
            })
            .mount(&server)
            .await;

        let status_handle = proposals.clone();
        Mock::given(method("GET"))
            .and(path_regex(r"^/v1/proposals/[^/]+$"))
            .respond_with(move |req: &wiremock::Request| {
                let id = req
                    .url
                    .path()
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                let known = status_handle
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|(pid, _)| *pid == id);
                if known {
                    ResponseTemplate::new(200).set_body_json(json!({
                        "id": id,
                        "approved": 1,
                        "required": required,
                    }))
                } else {
                    ResponseTemplate::new(404).set_body_string("unknown proposal")
                }
            })
            .mount(&server)
            .await;

        Self { server, proposals }
    }

    pub fn proposals(&self) -> Vec<(String, serde_json::Value)> {
        self.proposals.lock().unwrap().clone()
    }
}

// ── Storage mock ─────────────────────────────────────────────

pub struct MockStorage {
    pub server: MockServer,
}

impl MockStorage {
    /// Serves the add endpoint, answering with `root` as the wrapping
    /// directory identifier.
    pub async fn start(root: &ContentId) -> Self {
        let server = MockServer::start().await;
        let ndjson = format!(
            "{}\n{}\n",
            json!({ "Name": "index.html", "Hash": "QmIGNORED", "Size": "18" }),
            json!({ "Name": "", "Hash": root.to_string(), "Size": "1204" }),
        );

        Mock::given(method("POST"))
            .and(path("/api/v0/add"))
            .respond_with(ResponseTemplate::new(200).set_body_string(ndjson))
            .mount(&server)
            .await;

        Self { server }
    }
}
