pub mod id;
pub mod cache;
pub mod pose;
pub mod clip;

pub use id::*;
pub use cache::*;
pub use pose::*;
pub use clip::*;
