//! Lifecycle services between the HTTP handlers and the stores.
//!
//! Services take an authenticated principal plus plain data and return plain
//! results or a [`ServiceError`]. Nothing HTTP-specific crosses this boundary.

pub mod auth;
pub mod error;
pub mod manuals;
pub mod users;
pub mod views;

pub use auth::{AuthService, Registration, Session};
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use manuals::{ManualInput, ManualService, StepInput, Upload};
pub use users::{ProfileInput, UserService};
pub use views::{ManualDetail, StepDetail, UserProfile};
