//! Handbind - Hand Tracking Retargeting Core
//!
//! Maps tracked hand bones onto arbitrary skeletons, matches finger poses
//! against gesture templates and packs hand state for replication.

pub mod bone;
pub mod calibration;
pub mod error;
pub mod evaluator;
pub mod frame;
pub mod gesture;
mod hand_constants;
pub mod mapping;
pub mod math;
pub mod node;
pub mod replication;
pub mod skeleton;
pub mod state;

#[cfg(target_arch = "wasm32")]
pub mod bindings;

pub use bone::{BoneId, ComponentPose, Finger, HandSide, PoseBuffer, ReferencePose};
pub use error::{Error, Result};
pub use evaluator::{EvaluationMode, EvaluationPolicy};
pub use frame::{FingerSummary, HandFrame, SourceFrame, TrackingLevel};
pub use gesture::{GestureEvent, GestureLibrary, GestureMatcher, GestureTemplate};
pub use mapping::{BoneMappingEntry, MappingTable, SkeletonConvention};
pub use math::{BoneTransform, Quat, Vec3};
pub use node::{HandRetargetNode, NodeSettings};
pub use replication::{RepContainer, ReplicationMode, ReplicationSettings, ReplicationSmoother};
pub use skeleton::{ReferenceSkeleton, SkeletonQuery};
pub use state::{HandSession, SessionHandle};

/// Route `log` output to the browser console and install the panic hook.
/// Does nothing off the web; hosts bring their own logger.
pub fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            console_error_panic_hook::set_once();
            console_log::init_with_level(log::Level::Info).ok();
        }
    }
}
