//! HTTP request handlers.

pub mod auth;
pub mod common;
pub mod images;
pub mod manuals;
pub mod steps;
pub mod users;

pub use auth::*;
pub use images::*;
pub use manuals::*;
pub use steps::*;
pub use users::*;
