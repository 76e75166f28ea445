//! Gate session controller: loads a gate tree from the flowgate service,
//! tracks the current gate, applies edits, and keeps the server-rendered
//! background plot in step with every semantic change.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`session`] | [`session::GateSession`] load/select/edit operations |
//! | [`events`] | Typed [`events::GateEvent`] notifications |
//! | [`refresh`] | Background save-and-render pipeline |
//! | [`api`] | Remote service trait, HTTP client and wire types |
//! | [`config`] | Environment and launch-query configuration |
//! | [`error`] | [`error::SessionError`] |

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod refresh;
pub mod session;

pub use api::{ApiError, GateApi, HttpGateApi};
pub use config::{CanvasConfig, LaunchParams, SessionConfig};
pub use error::SessionError;
pub use events::{GateEvent, GateField};
pub use session::GateSession;
