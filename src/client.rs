use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::TokenProvider;
use crate::bundle::{Bundle, BundleResponse};
use crate::config::load_config;
use crate::error::{Error, Result, http_error};
use crate::geometry::Geometry;
use crate::payload::{TaskParams, TaskRequest, build_task_request, layer_names};
use crate::status::{
    Clock, MonitorOutcome, PollOptions, ProgressReporter, StatusSnapshot, SystemClock, monitor,
};
use crate::task::{SubmittedTask, Task, TaskRecord, group_by_status};
use crate::util::urljoin;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base API URL, typically `https://appeears.earthdatacloud.nasa.gov/api`.
    pub url: String,
    /// How to obtain a bearer token. Only task endpoints need one.
    pub token: Option<TokenProvider>,
}

#[derive(Debug, Clone)]
pub struct Client {
    url: String,
    token: Option<TokenProvider>,

    timeout: Duration,
    pub(crate) progress: bool,

    pub(crate) http: HttpClient,
}

/// What `task-info --tid` found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusReport {
    /// Queued; nothing to wait for yet.
    Pending,
    /// Flat status other than pending, joined with the task listing.
    Finished { status: String, task: Option<Task> },
    /// Was processing; we waited for it.
    Monitored(MonitorOutcome),
}

impl Client {
    /// Creates a client using environment variables and/or `~/appeears.json`.
    pub fn from_env() -> Result<Self> {
        Self::new(None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`token` arguments
    /// - `APPEEARS_URL`, `APPEEARS_TOKEN`, `APPEEARS_USERNAME`/`APPEEARS_PASSWORD`
    /// - the credential file (`APPEEARS_CREDENTIALS` or `~/appeears.json`)
    pub fn new(url: Option<String>, token: Option<TokenProvider>) -> Result<Self> {
        Self::from_config(load_config(url, token)?)
    }

    pub fn from_config(cfg: ClientConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("appeears-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("appeears-rs")),
        );

        let timeout = Duration::from_secs(60);
        let http = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            url: cfg.url,
            token: cfg.token,
            timeout,
            progress: true,
            http,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_token_provider(mut self, token: TokenProvider) -> Self {
        self.token = Some(token);
        self
    }

    pub fn has_token_provider(&self) -> bool {
        self.token.is_some()
    }

    /// A fresh bearer token; called once per top-level operation.
    pub(crate) fn bearer(&self) -> Result<String> {
        let provider = self.token.as_ref().ok_or_else(|| {
            Error::Credentials("no credentials configured: run `appeears auth` first".into())
        })?;
        provider.token(&self.http, &self.url)
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        urljoin(&self.url, path)
    }

    /// All products, `ProductAndVersion` renamed to `product_id`.
    ///
    /// With a keyword, keeps products where some field equals it
    /// (case-insensitive).
    pub fn products(&self, keyword: Option<&str>) -> Result<Vec<Value>> {
        let url = self.endpoint("product");
        let listing: Vec<Value> = self.api_json::<Value, _>("GET", &url, None, None)?;
        let keyword = keyword.map(str::to_lowercase);

        Ok(listing
            .into_iter()
            .filter(|product| match (&keyword, product.as_object()) {
                (None, _) => true,
                (Some(kw), Some(fields)) => fields.values().any(|v| field_text(v) == *kw),
                (Some(_), None) => false,
            })
            .map(|mut product| {
                if let Some(fields) = product.as_object_mut() {
                    if let Some(id) = fields.shift_remove("ProductAndVersion") {
                        fields.insert("product_id".to_string(), id);
                    }
                }
                product
            })
            .collect())
    }

    /// Layer names for a product id such as `MOD11A1.061`, in service order.
    pub fn layers(&self, product_id: &str) -> Result<Vec<String>> {
        let url = self.endpoint(&format!("product/{}", product_id));
        let resp: Value = self.api_json::<Value, _>("GET", &url, None, None)?;
        Ok(layer_names(&resp))
    }

    pub fn spatial_projections(&self) -> Result<Value> {
        let url = self.endpoint("spatial/proj");
        self.api_json::<Value, _>("GET", &url, None, None)
    }

    /// Builds a submission document, resolving the product's layers.
    ///
    /// Dates are checked before any request goes out.
    pub fn build_task(&self, params: &TaskParams, geometry: &Geometry) -> Result<TaskRequest> {
        params.service_dates()?;
        let layers = self.layers(&params.product)?;
        debug!(product = %params.product, layers = layers.len(), "resolved layers");
        build_task_request(params, &layers, geometry)
    }

    /// Builds and submits a task. Every call creates a new task server-side.
    pub fn submit(&self, params: &TaskParams, geometry: &Geometry) -> Result<SubmittedTask> {
        let request = self.build_task(params, geometry)?;
        self.submit_task(&request)
    }

    pub fn submit_task(&self, request: &TaskRequest) -> Result<SubmittedTask> {
        let token = self.bearer()?;
        let url = self.endpoint("task");
        let submitted: SubmittedTask =
            self.api_json("POST", &url, Some(token.as_str()), Some(request))?;
        debug!(task_id = %submitted.task_id, "task submitted");
        Ok(submitted)
    }

    pub fn delete_task(&self, task_id: &str) -> Result<()> {
        let token = self.bearer()?;
        let url = self.endpoint(&format!("task/{}", task_id));
        self.send::<Value>("DELETE", &url, Some(token.as_str()), None)?;
        debug!(%task_id, "task deleted");
        Ok(())
    }

    pub fn tasks(&self) -> Result<Vec<TaskRecord>> {
        let token = self.bearer()?;
        self.tasks_with(&token)
    }

    /// `task-info` without a task id: every task, grouped by status.
    pub fn tasks_by_status(
        &self,
        status: Option<&str>,
    ) -> Result<std::collections::BTreeMap<String, Vec<Task>>> {
        group_by_status(self.tasks()?, status)
    }

    pub fn status(&self, task_id: &str) -> Result<StatusSnapshot> {
        let token = self.bearer()?;
        self.status_with(&token, task_id)
    }

    /// `task-info --tid`: report a flat status, or wait out processing.
    pub fn task_status(&self, task_id: &str, opts: &PollOptions) -> Result<StatusReport> {
        self.task_status_with_clock(task_id, opts, &SystemClock)
    }

    pub fn task_status_with_clock(
        &self,
        task_id: &str,
        opts: &PollOptions,
        clock: &dyn Clock,
    ) -> Result<StatusReport> {
        let token = self.bearer()?;

        match self.status_with(&token, task_id)? {
            snapshot if snapshot.is_pending() => {
                debug!(%task_id, "task is queued");
                Ok(StatusReport::Pending)
            }
            StatusSnapshot::Status(status) => {
                debug!(%task_id, %status, "task has a final status");
                let task = self
                    .tasks_with(&token)?
                    .into_iter()
                    .find(|t| t.task_id == task_id)
                    .map(Task::from);
                Ok(StatusReport::Finished { status, task })
            }
            StatusSnapshot::Progress(pct) => {
                info!(
                    "Task {} processing : creating progress bar for task completion",
                    task_id
                );
                let mut bar = self.percent_bar();
                let outcome = monitor(
                    pct,
                    || self.status_with(&token, task_id),
                    clock,
                    bar.as_mut(),
                    opts,
                )?;
                Ok(StatusReport::Monitored(outcome))
            }
        }
    }

    /// File manifest of a finished task.
    pub fn bundle(&self, task_id: &str) -> Result<Bundle> {
        let token = self.bearer()?;
        self.bundle_with(&token, task_id)
    }

    pub(crate) fn bundle_with(&self, token: &str, task_id: &str) -> Result<Bundle> {
        let url = self.endpoint(&format!("bundle/{}", task_id));
        let resp: BundleResponse = self.api_json::<Value, _>("GET", &url, Some(token), None)?;
        let bundle = Bundle::new(task_id, resp.files);
        info!(
            "Estimated Download Size for order: {}",
            bundle.total_size()
        );
        Ok(bundle)
    }

    pub(crate) fn status_with(&self, token: &str, task_id: &str) -> Result<StatusSnapshot> {
        let url = self.endpoint(&format!("status/{}", task_id));
        let value: Value = self.api_json::<Value, _>("GET", &url, Some(token), None)?;
        StatusSnapshot::from_value(&value)
    }

    fn tasks_with(&self, token: &str) -> Result<Vec<TaskRecord>> {
        let url = self.endpoint("task");
        self.api_json::<Value, _>("GET", &url, Some(token), None)
    }

    fn percent_bar(&self) -> Box<dyn ProgressReporter> {
        if !self.progress {
            return Box::new(());
        }
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {wide_bar} {pos}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Box::new(pb)
    }

    pub(crate) fn apply_auth(&self, req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    /// Sends a request and maps any non-success status through the error table.
    pub(crate) fn send<TReq: Serialize>(
        &self,
        method: &str,
        url: &str,
        token: Option<&str>,
        body: Option<&TReq>,
    ) -> Result<Response> {
        let req = match method {
            "GET" => self.http.get(url),
            "DELETE" => self.http.delete(url),
            _ => self.http.post(url),
        };
        let mut req = self.apply_auth(req, token).timeout(self.timeout);
        if let Some(body) = body {
            req = req.json(body);
        }

        debug!(%method, %url, "request");
        let resp = req.send()?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(http_error(status, url, &text));
        }
        Ok(resp)
    }

    fn api_json<TReq: Serialize, TResp: DeserializeOwned>(
        &self,
        method: &str,
        url: &str,
        token: Option<&str>,
        body: Option<&TReq>,
    ) -> Result<TResp> {
        let text = self.send(method, url, token, body)?.text()?;
        Ok(serde_json::from_str::<TResp>(&text)?)
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    }
}
