use std::sync::Arc;

use crate::{
    config::Config,
    core::{TaskRegistry, TransportClient, TtsAdapter},
    error::ClientError,
    events::Bus,
    listeners::Listener,
    transport::{HttpTaskApi, SseTransport, TaskApi, Transport},
};

/// Builder for constructing a [`TtsAdapter`] with optional replacements.
///
/// Without overrides the adapter talks to `cfg.base_url` over `reqwest`
/// (event stream for pushes, JSON for requests).
pub struct ClientBuilder {
    cfg: Config,
    listeners: Vec<Arc<dyn Listener>>,
    http: Option<reqwest::Client>,
    transport: Option<Arc<dyn Transport>>,
    api: Option<Arc<dyn TaskApi>>,
}

impl ClientBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            listeners: Vec::new(),
            http: None,
            transport: None,
            api: None,
        }
    }

    /// Sets global listeners registered before the first event.
    ///
    /// Listeners receive every task update through dedicated workers with
    /// bounded queues.
    pub fn with_listeners(mut self, listeners: Vec<Arc<dyn Listener>>) -> Self {
        self.listeners = listeners;
        self
    }

    /// Uses `http` for the default transport and API.
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    /// Replaces the push channel transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the request/response API.
    pub fn with_api(mut self, api: Arc<dyn TaskApi>) -> Self {
        self.api = Some(api);
        self
    }

    /// Builds the adapter.
    ///
    /// Spawns the workers of the initial listeners, so it must be called from
    /// within a tokio runtime. The push channel is not opened here; the first
    /// operation (or an explicit `connect()`) opens it.
    ///
    /// # Errors
    /// [`ClientError::Http`] if the default `reqwest` client cannot be built.
    pub fn build(self) -> Result<TtsAdapter, ClientError> {
        let http = match self.http {
            Some(http) => http,
            None => default_http(&self.cfg)?,
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(SseTransport::new(http.clone(), &self.cfg)),
        };
        let api: Arc<dyn TaskApi> = match self.api {
            Some(api) => api,
            None => Arc::new(HttpTaskApi::new(http, &self.cfg)),
        };

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let registry = TaskRegistry::new(
            bus.clone(),
            self.cfg.listener_queue_capacity_clamped(),
            self.cfg.finished_task_memory,
            self.listeners,
        );
        let client = TransportClient::new(transport, registry, bus, self.cfg.reconnect_policy());

        Ok(TtsAdapter::new(client, api, self.cfg.default_task_timeout()))
    }
}

fn default_http(cfg: &Config) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder();
    if let Some(limit) = cfg.connect_timeout_opt() {
        builder = builder.connect_timeout(limit);
    }
    Ok(builder.build()?)
}
