//! # sorng-gce – Compute Engine autoscaler resource handles
//!
//! Lightweight handles over the Compute Engine REST API for autoscalers
//! attached to managed instance groups. Handles are cheap to build and make
//! no request until a method is called; every mutating call hands back an
//! [`Operation`] bound to the zone it ran in.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │  Compute  (compute.rs)        project scope      │
//! │  └── Zone  (zone.rs)          zone scope         │
//! │       ├── Autoscaler  (autoscaler.rs)            │
//! │       └── Operation   (operation.rs)             │
//! │            both compose a ServiceObject          │
//! │            (service_object.rs)                   │
//! ├──────────────────────────────────────────────────┤
//! │  GcpClient  (client.rs)                          │
//! │  ├── URL resolution + bearer token               │
//! │  ├── error envelope parsing                      │
//! │  └── retry with jittered backoff                 │
//! ├──────────────────────────────────────────────────┤
//! │  Transport (transport.rs) · TokenProvider (auth) │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use sorng_gce::{AutoscalerConfig, Compute, GcpConnectionConfig, PollOptions};
//!
//! let compute = Compute::connect(&config)?;
//! let zone = compute.zone("us-central1-a");
//! let (autoscaler, op, _) = zone
//!     .create_autoscaler("web", AutoscalerConfig::for_target("web-igm"))
//!     .await?;
//! op.wait(PollOptions::default()).await?;
//! let (op, _) = autoscaler.set_metadata(Some(serde_json::json!({"description": "web tier"}))).await?;
//! ```

pub mod error;
pub mod config;
pub mod auth;
pub mod transport;
pub mod client;

pub mod service_object;
pub mod compute;
pub mod zone;
pub mod autoscaler;
pub mod operation;

pub use auth::{StaticToken, TokenManager, TokenProvider};
pub use autoscaler::{Autoscaler, AutoscalerConfig};
pub use client::{ApiRequest, GcpClient};
pub use compute::{AutoscalerPage, Compute, ListOptions};
pub use config::{GcpConnectionConfig, RetryConfig, ServiceAccountKey};
pub use error::{GcpError, GcpResult};
pub use operation::{Operation, PollOptions};
pub use service_object::{GetOptions, Methods, RequestScope, ServiceObject};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
pub use zone::Zone;
