//! Request entry points
//!
//! Each `on_*` handler resolves its datastore, runs the operation and fills
//! the response with data, `<ok/>` or errors. Nothing escapes a handler:
//! domain errors become `<rpc-error>`s and a panic inside an operation
//! becomes an `operation-failed` error naming the panic.

use std::any::Any;
use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Once};
use std::time::Instant;

use netconf_core::cache::ResponseCache;
use netconf_core::change_router::ConfigChangeSink;
use netconf_core::edit::EditConfigRequest;
use netconf_core::errors::{NetconfError, Result, RpcError};
use netconf_core::schema::SchemaLookup;
use netconf_core::subsystem::SubsystemRegistry;
use netconf_core::validator::Validator;
use netconf_core::{log_op_end, log_op_error, log_op_start};
use netconf_core_types::correlation::RequestContext;
use netconf_core_types::{ClientInfo, SessionId};

use crate::config::ServerConfig;
use crate::datastore::Datastore;
use crate::in_memory::InMemoryAggregator;
use crate::rpc::{
    CloseSessionRequest, CopyConfigRequest, CopySource, GetConfigRequest, GetRequest,
    KillSessionRequest, LockRequest, NetconfRequest, NetconfResponse, UnlockRequest,
};

/// Datastore `<get>` reads from
pub const RUNNING: &str = "running";

thread_local! {
    static LAST_PANIC_TRACE: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_TRACE_HOOK: Once = Once::new();

/// Chain a panic hook that records the panic location and stack for the
/// current thread, then defers to the hook that was installed before
fn install_panic_trace_hook() {
    PANIC_TRACE_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|location| format!("{}:{}", location.file(), location.line()))
                .unwrap_or_else(|| "unknown location".to_string());
            let trace = format!("at {location}\n{}", Backtrace::force_capture());
            LAST_PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(trace));
            previous(info);
        }));
    });
}

pub struct NetconfServer {
    config: ServerConfig,
    datastores: BTreeMap<String, Arc<Datastore>>,
}

impl NetconfServer {
    /// A server with no datastores yet
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            datastores: BTreeMap::new(),
        }
    }

    /// In-memory datastores for every configured name
    pub fn builder(
        config: ServerConfig,
        schema: Arc<dyn SchemaLookup>,
        registry: Arc<SubsystemRegistry>,
    ) -> NetconfServerBuilder {
        NetconfServerBuilder {
            config,
            schema,
            registry,
            validator: None,
            sink: None,
        }
    }

    /// Add or replace a datastore under its own name
    pub fn add_datastore(&mut self, datastore: Datastore) {
        self.datastores
            .insert(datastore.name().to_string(), Arc::new(datastore));
    }

    pub fn with_datastore(mut self, datastore: Datastore) -> Self {
        self.add_datastore(datastore);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn datastore_names(&self) -> Vec<&str> {
        self.datastores.keys().map(String::as_str).collect()
    }

    /// # Errors
    ///
    /// `InvalidTargetDatastore` for unknown names.
    pub fn datastore(&self, name: &str) -> Result<Arc<Datastore>> {
        self.datastores
            .get(name)
            .cloned()
            .ok_or_else(|| NetconfError::InvalidTargetDatastore {
                datastore: name.to_string(),
            })
    }

    /// Run any request and return its reply
    pub fn handle(
        &self,
        client: &ClientInfo,
        request: &NetconfRequest,
        message_id: Option<String>,
    ) -> NetconfResponse {
        let mut response = NetconfResponse {
            message_id,
            ..NetconfResponse::default()
        };
        match request {
            NetconfRequest::Lock(r) => self.on_lock(client, r, &mut response),
            NetconfRequest::Unlock(r) => self.on_unlock(client, r, &mut response),
            NetconfRequest::KillSession(r) => self.on_kill_session(client, r, &mut response),
            NetconfRequest::CloseSession(r) => self.on_close_session(client, r, &mut response),
            NetconfRequest::Get(r) => self.on_get(client, r, &mut response),
            NetconfRequest::GetConfig(r) => self.on_get_config(client, r, &mut response),
            NetconfRequest::EditConfig(r) => self.on_edit_config(client, r, &mut response),
            NetconfRequest::CopyConfig(r) => self.on_copy_config(client, r, &mut response),
        }
        response
    }

    pub fn on_lock(&self, client: &ClientInfo, request: &LockRequest, response: &mut NetconfResponse) {
        self.dispatch("lock", client, response, || {
            self.datastore(&request.target)?.lock(client.session_id)
        });
    }

    pub fn on_unlock(
        &self,
        client: &ClientInfo,
        request: &UnlockRequest,
        response: &mut NetconfResponse,
    ) {
        self.dispatch("unlock", client, response, || {
            self.datastore(&request.target)?.unlock(client.session_id)
        });
    }

    pub fn on_kill_session(
        &self,
        client: &ClientInfo,
        request: &KillSessionRequest,
        response: &mut NetconfResponse,
    ) {
        self.dispatch("kill_session", client, response, || {
            if request.session_id == client.session_id {
                return Err(NetconfError::OperationFailed {
                    message: "a session cannot kill itself, use close-session".to_string(),
                });
            }
            self.release_session(request.session_id);
            Ok(())
        });
    }

    pub fn on_close_session(
        &self,
        client: &ClientInfo,
        _request: &CloseSessionRequest,
        response: &mut NetconfResponse,
    ) {
        self.dispatch("close_session", client, response, || {
            self.release_session(client.session_id);
            Ok(())
        });
    }

    pub fn on_get(&self, client: &ClientInfo, request: &GetRequest, response: &mut NetconfResponse) {
        let data = self.dispatch("get", client, response, || {
            let mut cache = ResponseCache::new();
            let data = self
                .datastore(RUNNING)?
                .get(&request.query(), client, &mut cache)?;
            tracing::debug!(
                subsystem_calls = cache.subsystem_calls(),
                cache_hits = cache.hits(),
                "state retrieval done"
            );
            Ok(data)
        });
        if let Some(data) = data {
            response.data = data;
        }
    }

    pub fn on_get_config(
        &self,
        client: &ClientInfo,
        request: &GetConfigRequest,
        response: &mut NetconfResponse,
    ) {
        let data = self.dispatch("get_config", client, response, || {
            self.datastore(&request.source)?.get_config(&request.query())
        });
        if let Some(data) = data {
            response.data = data;
        }
    }

    pub fn on_edit_config(
        &self,
        client: &ClientInfo,
        request: &EditConfigRequest,
        response: &mut NetconfResponse,
    ) {
        // The rpc message-id travels with the change notifications
        let request = match (&request.message_id, &response.message_id) {
            (None, Some(message_id)) => {
                Cow::Owned(request.clone().with_message_id(message_id.clone()))
            }
            _ => Cow::Borrowed(request),
        };
        self.dispatch("edit_config", client, response, || {
            self.datastore(&request.target)?.edit(&request, client)?;
            Ok(())
        });
    }

    pub fn on_copy_config(
        &self,
        client: &ClientInfo,
        request: &CopyConfigRequest,
        response: &mut NetconfResponse,
    ) {
        self.dispatch("copy_config", client, response, || {
            let target = self.datastore(&request.target)?;
            match &request.source {
                CopySource::Datastore(name) => {
                    let source = self.datastore(name)?;
                    target.copy_from(client, &source)?;
                }
                CopySource::Config(content) => {
                    target.copy_from_content(client, content.clone())?;
                }
            }
            Ok(())
        });
    }

    /// Release every lock `session_id` holds
    pub fn release_session(&self, session_id: SessionId) {
        for datastore in self.datastores.values() {
            datastore.release_session(session_id);
        }
    }

    // Runs `body` at the request boundary: logs start/end, turns errors and
    // panics into response errors. Returns the value on success; `ok` is set
    // for operations that produce no data.
    fn dispatch<T>(
        &self,
        op: &'static str,
        client: &ClientInfo,
        response: &mut NetconfResponse,
        body: impl FnOnce() -> Result<T>,
    ) -> Option<T> {
        let mut ctx = RequestContext::new(client.session_id);
        if let Some(message_id) = &response.message_id {
            ctx = ctx.with_message_id(message_id.clone());
        }
        log_op_start!(
            op,
            request_id = ctx.request_id.as_str(),
            session_id = client.session_id
        );
        let start = Instant::now();

        install_panic_trace_hook();
        LAST_PANIC_TRACE.with(|slot| slot.borrow_mut().take());
        let result = panic::catch_unwind(AssertUnwindSafe(body))
            .unwrap_or_else(|payload| Err(self.panic_error(&*payload)));
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(value) => {
                log_op_end!(
                    op,
                    duration_ms = duration_ms,
                    request_id = ctx.request_id.as_str(),
                    session_id = client.session_id
                );
                response.ok = response.errors.is_empty();
                Some(value)
            }
            Err(err) => {
                log_op_error!(
                    op,
                    err,
                    duration_ms = duration_ms,
                    request_id = ctx.request_id.as_str(),
                    session_id = client.session_id
                );
                response.add_error(RpcError::from(err));
                None
            }
        }
    }

    fn panic_error(&self, payload: &(dyn Any + Send)) -> NetconfError {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        let trace = LAST_PANIC_TRACE
            .with(|slot| slot.borrow_mut().take())
            .unwrap_or_default();
        let limit = self.config.max_error_detail_len;
        NetconfError::Internal {
            class: "panic".to_string(),
            detail: detail.chars().take(limit).collect(),
            trace: trace.chars().take(limit).collect(),
        }
    }
}

impl std::fmt::Debug for NetconfServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetconfServer")
            .field("datastores", &self.datastore_names())
            .finish()
    }
}

/// Builds a server whose datastores are [`InMemoryAggregator`]s
pub struct NetconfServerBuilder {
    config: ServerConfig,
    schema: Arc<dyn SchemaLookup>,
    registry: Arc<SubsystemRegistry>,
    validator: Option<Arc<dyn Validator>>,
    sink: Option<Arc<dyn ConfigChangeSink>>,
}

impl NetconfServerBuilder {
    /// Post-edit validator shared by all datastores
    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Receiver of config-change notifications from all datastores
    pub fn sink(mut self, sink: Arc<dyn ConfigChangeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> NetconfServer {
        let mut server = NetconfServer::new(self.config.clone());
        for datastore_config in &self.config.datastores {
            let mut datastore = Datastore::new(
                datastore_config.clone(),
                Box::new(InMemoryAggregator::new(Arc::clone(&self.schema))),
                Arc::clone(&self.schema),
                Arc::clone(&self.registry),
            );
            if let Some(validator) = &self.validator {
                datastore = datastore.with_validator(Arc::clone(validator));
            }
            if let Some(sink) = &self.sink {
                datastore = datastore.with_sink(Arc::clone(sink));
            }
            server.add_datastore(datastore);
        }
        server
    }
}
