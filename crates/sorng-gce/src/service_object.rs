//! Generic resource client composed by every Compute Engine resource handle.
//!
//! A [`ServiceObject`] knows a parent [`RequestScope`], a collection path
//! (`/autoscalers`) and an id (`my-autoscaler`). From those it provides the
//! generic create/exists/get/get_metadata/set_metadata/delete calls. Which of
//! them a handle exposes is declared through a [`Methods`] table; calling a
//! method that is not enabled fails with `UNIMPLEMENTED` and sends nothing.
//!
//! Handles needing special response handling call [`ServiceObject::request`]
//! directly instead of the generic method.

use crate::client::ApiRequest;
use crate::error::{GcpError, GcpResult};
use crate::operation::Operation;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

const SERVICE: &str = "compute";

/// Anything that can execute a request relative to itself.
#[async_trait]
pub trait RequestScope: Send + Sync {
    async fn request(&self, request: ApiRequest) -> GcpResult<Value>;
}

/// Delegate used by `create` and by `get` with auto-create.
///
/// Receives the creation config and yields the server operation with the raw
/// response.
pub type CreateMethod = Arc<dyn Fn(Value) -> BoxFuture<'static, GcpResult<(Operation, Value)>> + Send + Sync>;

/// Capability table: which generic methods a handle enables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Methods {
    pub create: bool,
    pub exists: bool,
    pub get: bool,
    pub get_metadata: bool,
    pub set_metadata: bool,
    pub delete: bool,
}

/// Options for [`ServiceObject::get`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Create the resource when the lookup reports not-found.
    pub auto_create: bool,
    /// Creation config used when `auto_create` kicks in.
    pub config: Value,
}

impl GetOptions {
    pub fn auto_create(config: Value) -> Self {
        Self {
            auto_create: true,
            config,
        }
    }
}

#[derive(Clone)]
pub struct ServiceObject {
    scope: Arc<dyn RequestScope>,
    base_url: String,
    id: String,
    methods: Methods,
    create_method: Option<CreateMethod>,
    metadata: Arc<RwLock<Option<Value>>>,
}

impl std::fmt::Debug for ServiceObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceObject")
            .field("base_url", &self.base_url)
            .field("id", &self.id)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

impl ServiceObject {
    /// No request is made until a method is called.
    pub fn new(
        scope: Arc<dyn RequestScope>,
        base_url: impl Into<String>,
        id: impl Into<String>,
        methods: Methods,
    ) -> Self {
        Self {
            scope,
            base_url: base_url.into(),
            id: id.into(),
            methods,
            create_method: None,
            metadata: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_create_method(mut self, create_method: CreateMethod) -> Self {
        self.create_method = Some(create_method);
        self
    }

    /// Seed the metadata snapshot, e.g. from a list or operation response.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Arc::new(RwLock::new(Some(metadata)));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn methods(&self) -> Methods {
        self.methods
    }

    /// Resource path relative to the parent scope.
    pub fn path(&self) -> String {
        format!("{}/{}", self.base_url, self.id)
    }

    /// Last metadata seen for this resource, if any.
    pub async fn metadata(&self) -> Option<Value> {
        self.metadata.read().await.clone()
    }

    async fn store_metadata(&self, metadata: &Value) {
        *self.metadata.write().await = Some(metadata.clone());
    }

    /// Send a request whose `uri` is relative to this resource's path.
    pub async fn request(&self, request: ApiRequest) -> GcpResult<Value> {
        let path = self.path();
        self.scope.request(request.prefixed(&path)).await
    }

    fn require(&self, enabled: bool, method: &str) -> GcpResult<()> {
        if enabled {
            Ok(())
        } else {
            Err(GcpError::unimplemented(SERVICE, method))
        }
    }

    pub async fn create(&self, config: Value) -> GcpResult<(Operation, Value)> {
        self.require(self.methods.create, "create")?;
        let create = self
            .create_method
            .as_ref()
            .ok_or_else(|| GcpError::unimplemented(SERVICE, "create"))?;
        create(config).await
    }

    /// `Ok(false)` when the lookup reports not-found; other errors propagate.
    pub async fn exists(&self) -> GcpResult<bool> {
        self.require(self.methods.exists, "exists")?;
        match self.fetch_metadata().await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch the resource, creating it first when `options.auto_create` is
    /// set and it does not exist yet.
    pub async fn get(&self, options: GetOptions) -> GcpResult<Value> {
        self.require(self.methods.get, "get")?;
        let can_create = options.auto_create && self.methods.create && self.create_method.is_some();

        let err = match self.fetch_metadata().await {
            Ok(metadata) => return Ok(metadata),
            Err(e) => e,
        };
        if !(can_create && err.is_not_found()) {
            return Err(err);
        }

        log::debug!("{} not found, creating it", self.path());
        let config = if options.config.is_null() {
            Value::Object(Default::default())
        } else {
            options.config
        };
        match self.create(config).await {
            Ok(_) => {}
            // Someone else created it in the meantime.
            Err(e) if e.is_conflict() => {}
            Err(e) => return Err(e),
        }
        self.fetch_metadata().await
    }

    pub async fn get_metadata(&self) -> GcpResult<Value> {
        self.require(self.methods.get_metadata, "getMetadata")?;
        self.fetch_metadata().await
    }

    /// PATCH the resource path with `metadata` and keep the response as the
    /// new snapshot.
    ///
    /// Generic capability for resources whose patch endpoint is addressed by
    /// path. Neither shipped handle enables it: [`Autoscaler`] patches by query
    /// parameter through its own `set_metadata`, and [`Operation`] has no
    /// patch call.
    ///
    /// Sent once, without retries.
    ///
    /// [`Autoscaler`]: crate::autoscaler::Autoscaler
    pub async fn set_metadata(&self, metadata: Value) -> GcpResult<Value> {
        self.require(self.methods.set_metadata, "setMetadata")?;
        let response = self.request(ApiRequest::patch("", metadata)).await?;
        self.store_metadata(&response).await;
        Ok(response)
    }

    pub async fn delete(&self) -> GcpResult<Value> {
        self.require(self.methods.delete, "delete")?;
        self.request(ApiRequest::delete("")).await
    }

    async fn fetch_metadata(&self) -> GcpResult<Value> {
        let metadata = self.request(ApiRequest::get("")).await?;
        self.store_metadata(&metadata).await;
        Ok(metadata)
    }
}
