//! Core domain types and shared logic for guideforge.
//!
//! This crate holds everything that does not need a database or a blob store:
//! - Configuration shared by all crates
//! - The ownership guard (who may read or mutate a manual)
//! - The step ordering planner (contiguous `0..count-1` order numbers)
//! - Pagination bounds and page metadata
//! - Blob key construction for step images and profile pictures
//! - Password hashing and JWT token primitives
//! - Request field validation

pub mod config;
pub mod error;
pub mod ordering;
pub mod ownership;
pub mod pagination;
pub mod password;
pub mod paths;
pub mod token;
pub mod validation;

pub use error::{Error, Result};
pub use ordering::{OrderingError, StepOrder};
pub use ownership::{Access, AccessDenied, OwnedResource, Principal, authorize_manual};
pub use pagination::{Page, PageInfo, PageRequest};
pub use token::{Claims, TokenIssuer};

/// Default maximum upload size for images: 5 MiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 5 * 1024 * 1024;
