//! Bus handlers, one per pipeline stage.

pub mod load;
pub mod notify;
pub mod observe;
pub mod transform;

pub use load::LoadStage;
pub use notify::NotifyStage;
pub use observe::ObserverStage;
pub use transform::{transform_location, TransformStage};
