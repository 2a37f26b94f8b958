//! rollvet rollout driver — control plane client and trigger/wait loop.
//!
//! # Components
//!
//! - **`control_plane`** — the seam to the external orchestration
//!   platform: trigger an update, read rollout status, read ready
//!   replicas
//! - **`http`** — HTTP client implementation of that seam
//! - **`driver`** — trigger the rollout, then poll to a tri-state
//!   result under a deadline

pub mod control_plane;
pub mod driver;
pub mod http;

pub use control_plane::{ControlPlane, ControlPlaneStatus, DriverError};
pub use driver::RolloutDriver;
pub use http::HttpControlPlane;
