//! # claw-alertmanager-server
//!
//! HTTP API for the Clawbernetes alertmanager, built on axum.
//!
//! Receivers can be added, replaced and removed at runtime; each change is
//! applied by the reconfiguration actor in `claw-alertmanager` without
//! restarting the process.
//!
//! ## Example
//!
//! ```rust,no_run
//! use claw_alertmanager::Config;
//! use claw_alertmanager_server::{AlertmanagerServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let alerting = Config::from_file("alertmanager.yml")?;
//!     let server = AlertmanagerServer::new(ServerConfig::default(), alerting)?;
//!     server.serve().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## API Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/v1/status` | GET | Configuration, version info and cluster view |
//! | `/api/v1/receivers` | GET | Receiver names |
//! | `/api/v1/receivers` | POST | Add a receiver |
//! | `/api/v1/receivers/` | PUT | Replace a receiver |
//! | `/api/v1/receivers/` | DELETE | Delete a receiver by name |
//! | `/api/v1/alerts` | GET | Query alerts |
//! | `/api/v1/alerts` | POST | Ingest alerts |
//! | `/api/v1/silences` | GET | Query silences |
//! | `/api/v1/silences` | POST | Create or update a silence |
//! | `/api/v1/silence/{id}` | GET | Fetch a silence |
//! | `/api/v1/silence/{id}` | DELETE | Expire a silence |
//! | `/metrics` | GET | Prometheus metrics |

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;
pub mod types;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use server::AlertmanagerServer;
pub use state::AppState;
pub use types::{Envelope, ResponseStatus};
