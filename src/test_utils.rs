// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test doubles for the Kubernetes API, the AppOptics API and the cluster writer.

use crate::error::{OperatorError, Result};
use crate::kubernetes::watch::Caches;
use crate::kubernetes::writer::{ApiWriter, ResourceEvent, SecretReader};
use crate::remote::{self, AppOpticsApi, ClientFactory, RemoteConfig, RemoteError};
use crate::types::remote::{Alert, AlertDefinition, Chart, RemoteService, Space};
use crate::types::{AppOpticsAlert, AppOpticsDashboard, AppOpticsService, ManagedResource};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::{Client, ResourceExt};
use kube_runtime::reflector::{self, store::Writer};
use kube_runtime::watcher;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

type RequestLog = Arc<Mutex<Vec<(String, String, String)>>>;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
    requests: RequestLog,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (status, body.to_string()),
        );
        self
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for PUT requests matching the exact path
    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    /// Requests seen so far as (method, path, body)
    pub fn requests(&self) -> RequestLog {
        self.requests.clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "https://kubernetes.default.svc")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let responses = self.responses.lock().unwrap();

        if let Some(resp) = responses.get(&(method.to_string(), path.to_string())) {
            return Some(resp.clone());
        }

        // Prefix match, e.g. for list requests carrying query parameters
        for ((m, p), resp) in responses.iter() {
            if m == method && path.starts_with(p) {
                return Some(resp.clone());
            }
        }

        None
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let body = req.into_body().collect().await?.to_bytes();
            requests.lock().unwrap().push((
                method,
                path,
                String::from_utf8_lossy(&body).into_owned(),
            ));

            let (status, body) = response.unwrap_or_else(|| {
                (404, not_found_json("resource", "unknown"))
            });
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

fn kube_api_error(code: u16, reason: &str, message: &str) -> OperatorError {
    let response = serde_json::json!({
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    });
    OperatorError::KubeError(kube::Error::Api(serde_json::from_value(response).unwrap()))
}

/// A request received by [`serve_http`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// JSON body, `Null` when empty
    pub body: Value,
    pub authorization: Option<String>,
}

/// A route answered by [`serve_http`]: (method, path, status, body)
pub type Route = (&'static str, &'static str, u16, &'static str);

/// Serve canned responses on a local port.
///
/// Returns the base URL (with trailing slash) and the log of received requests.
/// Unrouted requests get a plain-text 404.
pub async fn serve_http(routes: Vec<Route>) -> (String, Arc<Mutex<Vec<RecordedRequest>>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let routes = Arc::new(routes);

    let recorded = requests.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let routes = routes.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| answer(req, routes.clone(), recorded.clone()));
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (format!("http://{}/", addr), requests)
}

async fn answer(
    req: Request<Incoming>,
    routes: Arc<Vec<Route>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let authorization = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = req.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    let (status, payload) = routes
        .iter()
        .find(|(m, p, _, _)| *m == method && *p == path)
        .map(|(_, _, status, body)| (*status, *body))
        .unwrap_or((404, "404 page not found"));

    recorded.lock().unwrap().push(RecordedRequest {
        method,
        path,
        body,
        authorization,
    });

    Ok(Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from_static(payload.as_bytes())))
        .unwrap())
}

#[derive(Default)]
struct FakeState {
    last_id: i64,
    clock: i64,
    spaces: BTreeMap<i64, Space>,
    charts: BTreeMap<i64, Vec<Chart>>,
    services: BTreeMap<i64, RemoteService>,
    alerts: BTreeMap<i64, Alert>,
    calls: Vec<String>,
    failing: Option<&'static str>,
    tokens: Vec<String>,
}

impl FakeState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    /// Log a call, failing it when it matches the injected failure
    fn call(&mut self, name: &str, detail: String) -> remote::Result<()> {
        self.calls.push(format!("{} {}", name, detail).trim_end().to_string());
        match self.failing {
            Some(failing) if failing == name => Err(RemoteError::Api {
                status: 500,
                body: r#"{"errors":{"request":["Test Error"]}}"#.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

fn not_found(path: String) -> RemoteError {
    RemoteError::NotFound { path }
}

/// In-memory AppOptics account.
///
/// Clones share the same account; ids are handed out from a single counter.
#[derive(Clone, Default)]
pub struct FakeAppOptics {
    state: Arc<Mutex<FakeState>>,
}

const MUTATING: [&str; 5] = ["create_", "update_", "delete_", "associate_", "disassociate_"];

impl FakeAppOptics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call so far, as `"<method> <args>"`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change the remote account
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| MUTATING.iter().any(|m| c.starts_with(m)))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// Make every call of the named method fail with a 500
    pub fn fail_on(&self, method: &'static str) {
        self.state.lock().unwrap().failing = Some(method);
    }

    /// Tokens handed to [`ClientFactory::client`]
    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().tokens.clone()
    }

    pub fn insert_space(&self, id: i64, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.last_id = state.last_id.max(id);
        state.spaces.insert(
            id,
            Space {
                id: Some(id),
                name: name.to_string(),
            },
        );
        state.charts.entry(id).or_default();
    }

    pub fn insert_chart(&self, space_id: i64, mut chart: Chart) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        chart.id = Some(id);
        state.charts.entry(space_id).or_default().push(chart);
        id
    }

    pub fn insert_service(&self, mut service: RemoteService) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = match service.id {
            Some(id) => {
                state.last_id = state.last_id.max(id);
                id
            }
            None => state.next_id(),
        };
        service.id = Some(id);
        state.services.insert(id, service);
        id
    }

    pub fn insert_alert(&self, mut alert: Alert) {
        let mut state = self.state.lock().unwrap();
        state.last_id = state.last_id.max(alert.id);
        if alert.updated_at.is_none() {
            alert.updated_at = Some(state.tick());
        }
        state.alerts.insert(alert.id, alert);
    }

    pub fn space(&self, id: i64) -> Option<Space> {
        self.state.lock().unwrap().spaces.get(&id).cloned()
    }

    pub fn charts(&self, space_id: i64) -> Vec<Chart> {
        self.state
            .lock()
            .unwrap()
            .charts
            .get(&space_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn service(&self, id: i64) -> Option<RemoteService> {
        self.state.lock().unwrap().services.get(&id).cloned()
    }

    pub fn alert(&self, id: i64) -> Option<Alert> {
        self.state.lock().unwrap().alerts.get(&id).cloned()
    }

    /// Simulate an edit made outside the operator
    pub fn touch_alert(&self, id: i64, name: &str) {
        let mut state = self.state.lock().unwrap();
        let now = state.tick();
        if let Some(alert) = state.alerts.get_mut(&id) {
            alert.name = name.to_string();
            alert.updated_at = Some(now);
        }
    }

    pub fn remove_remote_service(&self, id: i64) {
        self.state.lock().unwrap().services.remove(&id);
    }
}

#[async_trait]
impl AppOpticsApi for FakeAppOptics {
    async fn create_space(&self, name: &str) -> remote::Result<Space> {
        let mut state = self.state.lock().unwrap();
        state.call("create_space", name.to_string())?;
        let id = state.next_id();
        let space = Space {
            id: Some(id),
            name: name.to_string(),
        };
        state.spaces.insert(id, space.clone());
        state.charts.insert(id, Vec::new());
        Ok(space)
    }

    async fn retrieve_space(&self, id: i64) -> remote::Result<Space> {
        let mut state = self.state.lock().unwrap();
        state.call("retrieve_space", id.to_string())?;
        state
            .spaces
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("spaces/{}", id)))
    }

    async fn update_space(&self, id: i64, name: &str) -> remote::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call("update_space", format!("{} {}", id, name))?;
        let space = state
            .spaces
            .get_mut(&id)
            .ok_or_else(|| not_found(format!("spaces/{}", id)))?;
        space.name = name.to_string();
        Ok(())
    }

    async fn delete_space(&self, id: i64) -> remote::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call("delete_space", id.to_string())?;
        state.charts.remove(&id);
        state
            .spaces
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("spaces/{}", id)))
    }

    async fn list_charts(&self, space_id: i64) -> remote::Result<Vec<Chart>> {
        let mut state = self.state.lock().unwrap();
        state.call("list_charts", space_id.to_string())?;
        state
            .charts
            .get(&space_id)
            .cloned()
            .ok_or_else(|| not_found(format!("spaces/{}/charts", space_id)))
    }

    async fn create_chart(&self, space_id: i64, chart: &Chart) -> remote::Result<Chart> {
        let mut state = self.state.lock().unwrap();
        state.call("create_chart", format!("{} {}", space_id, chart.name))?;
        if !state.spaces.contains_key(&space_id) {
            return Err(not_found(format!("spaces/{}/charts", space_id)));
        }
        let mut created = chart.clone();
        created.id = Some(state.next_id());
        state
            .charts
            .entry(space_id)
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn delete_chart(&self, space_id: i64, chart_id: i64) -> remote::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call("delete_chart", format!("{} {}", space_id, chart_id))?;
        let charts = state.charts.entry(space_id).or_default();
        let before = charts.len();
        charts.retain(|c| c.id != Some(chart_id));
        if charts.len() == before {
            return Err(not_found(format!("spaces/{}/charts/{}", space_id, chart_id)));
        }
        Ok(())
    }

    async fn create_service(&self, service: &RemoteService) -> remote::Result<RemoteService> {
        let mut state = self.state.lock().unwrap();
        state.call("create_service", service.title.clone())?;
        let mut created = service.clone();
        created.id = Some(state.next_id());
        state.services.insert(created.id.unwrap_or_default(), created.clone());
        Ok(created)
    }

    async fn retrieve_service(&self, id: i64) -> remote::Result<RemoteService> {
        let mut state = self.state.lock().unwrap();
        state.call("retrieve_service", id.to_string())?;
        state
            .services
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("services/{}", id)))
    }

    async fn update_service(&self, id: i64, service: &RemoteService) -> remote::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call("update_service", id.to_string())?;
        if !state.services.contains_key(&id) {
            return Err(not_found(format!("services/{}", id)));
        }
        let mut updated = service.clone();
        updated.id = Some(id);
        state.services.insert(id, updated);
        Ok(())
    }

    async fn delete_service(&self, id: i64) -> remote::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call("delete_service", id.to_string())?;
        state
            .services
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("services/{}", id)))
    }

    async fn create_alert(&self, alert: &AlertDefinition) -> remote::Result<Alert> {
        let mut state = self.state.lock().unwrap();
        state.call("create_alert", alert.name.clone())?;
        let id = state.next_id();
        let now = state.tick();
        let created = Alert {
            id,
            name: alert.name.clone(),
            description: alert.description.clone(),
            conditions: alert.conditions.clone(),
            services: Vec::new(),
            attributes: alert.attributes.clone(),
            active: alert.active,
            rearm_seconds: alert.rearm_seconds,
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.alerts.insert(id, created.clone());
        Ok(created)
    }

    async fn retrieve_alert(&self, id: i64) -> remote::Result<Alert> {
        let mut state = self.state.lock().unwrap();
        state.call("retrieve_alert", id.to_string())?;
        state
            .alerts
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(format!("alerts/{}", id)))
    }

    async fn update_alert(&self, id: i64, alert: &AlertDefinition) -> remote::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call("update_alert", id.to_string())?;
        let now = state.tick();
        let existing = state
            .alerts
            .get_mut(&id)
            .ok_or_else(|| not_found(format!("alerts/{}", id)))?;
        existing.name = alert.name.clone();
        existing.description = alert.description.clone();
        existing.conditions = alert.conditions.clone();
        existing.attributes = alert.attributes.clone();
        existing.active = alert.active;
        existing.rearm_seconds = alert.rearm_seconds;
        existing.updated_at = Some(now);
        Ok(())
    }

    async fn delete_alert(&self, id: i64) -> remote::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call("delete_alert", id.to_string())?;
        state
            .alerts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(format!("alerts/{}", id)))
    }

    async fn associate_service(&self, alert_id: i64, service_id: i64) -> remote::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call("associate_service", format!("{} {}", alert_id, service_id))?;
        let service = state.services.get(&service_id).cloned().unwrap_or(RemoteService {
            id: Some(service_id),
            ..Default::default()
        });
        let alert = state
            .alerts
            .get_mut(&alert_id)
            .ok_or_else(|| not_found(format!("alerts/{}", alert_id)))?;
        if !alert.services.iter().any(|s| s.id == Some(service_id)) {
            alert.services.push(service);
        }
        Ok(())
    }

    async fn disassociate_service(&self, alert_id: i64, service_id: i64) -> remote::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.call("disassociate_service", format!("{} {}", alert_id, service_id))?;
        let alert = state
            .alerts
            .get_mut(&alert_id)
            .ok_or_else(|| not_found(format!("alerts/{}", alert_id)))?;
        alert.services.retain(|s| s.id != Some(service_id));
        Ok(())
    }
}

impl ClientFactory for FakeAppOptics {
    type Client = FakeAppOptics;

    fn client(&self, config: RemoteConfig) -> FakeAppOptics {
        self.state.lock().unwrap().tokens.push(config.token);
        self.clone()
    }
}

/// Records writes and events instead of sending them to a cluster.
#[derive(Default)]
pub struct RecordingWriter {
    /// Objects passed to `replace`, as JSON
    pub replaced: Mutex<Vec<Value>>,
    /// Objects passed to `replace_status`, as JSON
    pub status_writes: Mutex<Vec<Value>>,
    /// (object name, event)
    pub events: Mutex<Vec<(String, ResourceEvent)>>,
    secrets: Mutex<BTreeMap<(String, String), BTreeMap<String, ByteString>>>,
    fail_status: Mutex<bool>,
    secret_reads: Mutex<Vec<(String, String)>>,
}

impl RecordingWriter {
    pub fn with_secret(self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        let data = data
            .iter()
            .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
            .collect();
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name.to_string()), data);
        self
    }

    /// Make every status write fail with a conflict
    pub fn failing_status(self) -> Self {
        *self.fail_status.lock().unwrap() = true;
        self
    }

    pub fn event_reasons(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, e)| e.reason)
            .collect()
    }

    pub fn secret_reads(&self) -> Vec<(String, String)> {
        self.secret_reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApiWriter for RecordingWriter {
    async fn replace<K: ManagedResource>(&self, obj: &K) -> Result<K> {
        self.replaced.lock().unwrap().push(serde_json::to_value(obj)?);
        Ok(obj.clone())
    }

    async fn replace_status<K: ManagedResource>(&self, obj: &K) -> Result<K> {
        if *self.fail_status.lock().unwrap() {
            return Err(kube_api_error(
                409,
                "Conflict",
                "the object has been modified",
            ));
        }
        self.status_writes
            .lock()
            .unwrap()
            .push(serde_json::to_value(obj)?);
        Ok(obj.clone())
    }

    async fn record<K: ManagedResource>(&self, obj: &K, event: ResourceEvent) {
        self.events.lock().unwrap().push((obj.name_any(), event));
    }
}

#[async_trait]
impl SecretReader for RecordingWriter {
    async fn secret_data(&self, namespace: &str, name: &str) -> Result<BTreeMap<String, ByteString>> {
        self.secret_reads
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string()));
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| kube_api_error(404, "NotFound", &format!("secrets \"{}\" not found", name)))
    }
}

/// Caches plus the reflector writers that fill them
pub struct TestCaches {
    pub caches: Caches,
    pub dashboards: Writer<AppOpticsDashboard>,
    pub services: Writer<AppOpticsService>,
    pub alerts: Writer<AppOpticsAlert>,
}

impl TestCaches {
    pub fn new() -> Self {
        let (dashboards_reader, dashboards) = reflector::store();
        let (services_reader, services) = reflector::store();
        let (alerts_reader, alerts) = reflector::store();
        Self {
            caches: Caches {
                dashboards: dashboards_reader,
                services: services_reader,
                alerts: alerts_reader,
            },
            dashboards,
            services,
            alerts,
        }
    }

    pub fn apply_dashboard(&mut self, obj: AppOpticsDashboard) {
        self.dashboards.apply_watcher_event(&watcher::Event::Apply(obj));
    }

    pub fn apply_service(&mut self, obj: AppOpticsService) {
        self.services.apply_watcher_event(&watcher::Event::Apply(obj));
    }

    pub fn apply_alert(&mut self, obj: AppOpticsAlert) {
        self.alerts.apply_watcher_event(&watcher::Event::Apply(obj));
    }
}

pub fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}
