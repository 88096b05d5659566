//! Repository traits for metadata operations.

pub mod images;
pub mod manuals;
pub mod steps;
pub mod users;

pub use images::ImageRepo;
pub use manuals::ManualRepo;
pub use steps::StepRepo;
pub use users::UserRepo;
