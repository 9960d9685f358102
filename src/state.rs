//! Hand sessions and the handle registry used by the bindings.
//!
//! A `HandSession` bundles everything one hand on one skeleton needs across
//! ticks. Core logic lives on the session and takes explicit arguments; the
//! thread-local registry is a thin layer for callers that can only hold an
//! integer handle.

use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::bone::{estimate_frame, ComponentPose, ReferencePose};
use crate::error::Result;
use crate::evaluator::{BonePairs, EvaluationPolicy};
use crate::frame::{Decompressor, HandFrame, SourceFrame};
use crate::gesture::{GestureDetection, GestureLibrary, GestureMatcher, GestureTemplate};
use crate::node::{HandRetargetNode, NodeSettings};
use crate::replication::{RepContainer, RepPayload, ReplicationSettings, ReplicationSmoother};
use crate::skeleton::{ReferenceSkeleton, SkeletonQuery};

/// Per-hand state that survives between ticks
pub struct HandSession {
    pub node: HandRetargetNode,
    pub skeleton: ReferenceSkeleton,
    /// Output pose, reset to the bind pose before every evaluation with data
    pub pose: ComponentPose,
    /// Most recent frame, local or replicated
    pub latest: HandFrame,
    /// Bones of the frame before `latest`
    pub previous: SourceFrame,
    pub gestures: GestureLibrary,
    pub matcher: GestureMatcher,
    pub smoother: ReplicationSmoother,
    /// Open hand and fist used when only curls are known
    pub references: (ReferencePose, ReferencePose),
    /// Bones are driven by replicated transforms
    remote_transforms: bool,
}

impl HandSession {
    /// Bind a new session to `skeleton` with the built-in gestures and
    /// reference poses
    pub fn new(settings: NodeSettings, skeleton: ReferenceSkeleton) -> Result<Self> {
        let mut node = HandRetargetNode::new(settings);
        if !node.initialize_bone_references(&skeleton) {
            log::warn!("Session for {} starts without a usable mapping", skeleton.asset_id());
        }

        Ok(Self {
            node,
            pose: ComponentPose::from_skeleton(&skeleton),
            skeleton,
            latest: HandFrame::invalid(settings.side),
            previous: SourceFrame::empty(),
            gestures: GestureLibrary::builtin()?,
            matcher: GestureMatcher::new(settings.side),
            smoother: ReplicationSmoother::new(ReplicationSettings::default()),
            references: (ReferencePose::open_hand()?, ReferencePose::fist()?),
            remote_transforms: false,
        })
    }

    pub fn set_policy(&mut self, policy: EvaluationPolicy) {
        self.node.set_policy(policy);
    }

    /// Store a freshly acquired local frame
    pub fn push_frame(&mut self, frame: HandFrame) {
        self.previous = std::mem::replace(&mut self.latest, frame).bones;
        self.remote_transforms = false;
    }

    /// Bones to evaluate this tick. Frames without bones but with curls are
    /// estimated from the reference poses, in whichever space the policy
    /// reads.
    pub fn effective_frame(&self) -> SourceFrame {
        if !self.latest.valid {
            return SourceFrame::empty();
        }
        if !self.latest.bones.is_empty() {
            return self.latest.bones.clone();
        }
        if !self.latest.fingers.curls.is_empty() {
            let (open, fist) = &self.references;
            let estimated = estimate_frame(open, fist, &self.latest.fingers);
            if self.node.policy().source_is_parent_space {
                return estimated;
            }
            return estimated.to_component_space();
        }
        SourceFrame::empty()
    }

    /// Retarget the latest frame onto the bind pose. A tick without data
    /// leaves the last pose in place.
    pub fn evaluate(&mut self, alpha: f32) -> BonePairs {
        let frame = self.effective_frame();
        if !frame.is_empty() {
            self.pose.reset_to(&self.skeleton);
        }
        self.node.evaluate(&frame, &mut self.pose, alpha)
    }

    /// Advance replication smoothing by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        if self.remote_transforms {
            self.latest.bones = self.smoother.update(dt).clone();
        }
    }

    pub fn detect_gesture(&mut self) -> GestureDetection {
        self.matcher
            .detect(&self.gestures, &self.latest.fingers, self.latest.tracking_level)
    }

    /// Save the current finger pose as a gesture template
    pub fn record_gesture(&mut self, name: &str, curl_only: bool) -> Result<()> {
        let template = GestureTemplate::record(name, &self.latest.fingers, curl_only);
        self.gestures.insert(template)?;
        log::info!("Recorded gesture {} ({} channels)", name, self.gestures.len());
        Ok(())
    }

    /// Encode the latest frame for sending
    pub fn replicate(&self) -> Vec<u8> {
        let settings = self.smoother.settings();
        RepContainer::copy_for_replication(
            &self.latest,
            settings.mode,
            self.node.policy().allow_deforming_mesh,
        )
        .encode()
    }

    /// Apply a payload received from a peer. Returns whether the session
    /// holds valid data afterwards.
    pub fn receive(&mut self, bytes: &[u8], decompressor: Option<&dyn Decompressor>) -> Result<bool> {
        let container = RepContainer::decode(bytes)?;

        if let Some(deforming) = container.allow_deforming_mesh() {
            if deforming != self.node.policy().allow_deforming_mesh {
                let policy = EvaluationPolicy {
                    allow_deforming_mesh: deforming,
                    ..*self.node.policy()
                };
                self.node.set_policy(policy);
            }
        }

        self.previous = self.latest.bones.clone();
        let valid = container.apply_to(&mut self.latest, decompressor);

        self.remote_transforms = valid && matches!(
            container.payload,
            RepPayload::Transforms { .. } | RepPayload::Compressed { .. }
        );
        if self.remote_transforms {
            self.smoother.notify_new_data(self.latest.bones.clone());
            self.latest.bones = self.smoother.current().clone();
        } else if container.mode.carries_fingers() {
            // Curls alone: let the reference poses drive the bones
            self.latest.bones = SourceFrame::empty();
        }

        Ok(valid)
    }
}

// ============================================================================
// Handle registry
// ============================================================================

pub type SessionHandle = u32;

/// Owned sessions addressed by handle. Handles are never reused.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionHandle, HandSession>,
    next_handle: SessionHandle,
}

impl SessionRegistry {
    pub const fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
            next_handle: 1,
        }
    }

    pub fn insert(&mut self, session: HandSession) -> SessionHandle {
        let handle = self.next_handle.max(1);
        self.next_handle = handle.wrapping_add(1);
        self.sessions.insert(handle, session);
        handle
    }

    pub fn remove(&mut self, handle: SessionHandle) -> Option<HandSession> {
        self.sessions.remove(&handle)
    }

    pub fn get(&self, handle: SessionHandle) -> Option<&HandSession> {
        self.sessions.get(&handle)
    }

    pub fn get_mut(&mut self, handle: SessionHandle) -> Option<&mut HandSession> {
        self.sessions.get_mut(&handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// Global registry, thin wrapper for the bindings only
thread_local! {
    static SESSIONS: RefCell<SessionRegistry> = const { RefCell::new(SessionRegistry::new()) };
}

/// Register a session and return its handle
pub fn create_session(session: HandSession) -> SessionHandle {
    SESSIONS.with(|sessions| sessions.borrow_mut().insert(session))
}

/// Drop a session. Returns false for unknown handles.
pub fn destroy_session(handle: SessionHandle) -> bool {
    SESSIONS.with(|sessions| sessions.borrow_mut().remove(handle).is_some())
}

/// Execute a closure with immutable access to a session
///
/// Returns None if the handle is unknown
pub fn with_session<F, R>(handle: SessionHandle, f: F) -> Option<R>
where
    F: FnOnce(&HandSession) -> R,
{
    SESSIONS.with(|sessions| sessions.borrow().get(handle).map(f))
}

/// Execute a closure with mutable access to a session
///
/// Returns None if the handle is unknown
pub fn with_session_mut<F, R>(handle: SessionHandle, f: F) -> Option<R>
where
    F: FnOnce(&mut HandSession) -> R,
{
    SESSIONS.with(|sessions| sessions.borrow_mut().get_mut(handle).map(f))
}
