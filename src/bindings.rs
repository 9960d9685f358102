//! Handle-based JS API over the session registry.
//!
//! Every function takes the handle returned by `create_hand_session` and
//! degrades to a neutral value when the handle is unknown.

use crate::bone::HandSide;
use crate::evaluator::EvaluationPolicy;
use crate::frame::{FingerSummary, HandFrame, SourceFrame, TrackingLevel};
use crate::gesture::GestureLibrary;
use crate::math::{packed_as_floats, BoneTransform, PackedBoneTransform};
use crate::node::NodeSettings;
use crate::replication::ReplicationSettings;
use crate::skeleton::ReferenceSkeleton;
use crate::state::{self, HandSession, SessionHandle};
use wasm_bindgen::prelude::*;

const FLOATS_PER_BONE: usize = std::mem::size_of::<PackedBoneTransform>() / std::mem::size_of::<f32>();

/// Install the panic hook and console logger
#[wasm_bindgen(start)]
pub fn start() {
    crate::init_logging();
}

/// Bind a new hand session to a skeleton described in JSON.
///
/// `settings` is a `NodeSettings` object; `undefined` uses the defaults.
/// Returns 0 on failure.
#[wasm_bindgen]
pub fn create_hand_session(skeleton_json: &str, settings: JsValue) -> SessionHandle {
    let settings: NodeSettings = if settings.is_undefined() || settings.is_null() {
        NodeSettings::default()
    } else {
        match serde_wasm_bindgen::from_value(settings) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Invalid node settings: {}", e);
                return 0;
            }
        }
    };

    let session = ReferenceSkeleton::from_json(skeleton_json)
        .and_then(|skeleton| HandSession::new(settings, skeleton));
    match session {
        Ok(session) => {
            let handle = state::create_session(session);
            log::info!("Created {:?} hand session {}", settings.side, handle);
            handle
        }
        Err(e) => {
            log::error!("Failed to create hand session: {}", e);
            0
        }
    }
}

#[wasm_bindgen]
pub fn destroy_hand_session(handle: SessionHandle) -> bool {
    state::destroy_session(handle)
}

/// Push a full `HandFrame` object
#[wasm_bindgen]
pub fn push_hand_frame(handle: SessionHandle, frame: JsValue) -> bool {
    let frame: HandFrame = match serde_wasm_bindgen::from_value(frame) {
        Ok(frame) => frame,
        Err(e) => {
            log::warn!("Invalid hand frame: {}", e);
            return false;
        }
    };
    state::with_session_mut(handle, |session| session.push_frame(frame)).is_some()
}

/// Push tracked bones as packed floats (10 per bone) plus finger curls.
///
/// An empty `bones` slice with curls yields an estimated frame.
#[wasm_bindgen]
pub fn push_packed_frame(handle: SessionHandle, bones: &[f32], curls: &[f32], splays: &[f32]) -> bool {
    if bones.len() % FLOATS_PER_BONE != 0 {
        log::warn!("Packed frame length {} is not a multiple of {}", bones.len(), FLOATS_PER_BONE);
        return false;
    }

    let transforms: Vec<BoneTransform> = bytemuck::cast_slice::<f32, PackedBoneTransform>(bones)
        .iter()
        .map(|packed| BoneTransform::from(*packed))
        .collect();

    state::with_session_mut(handle, |session| {
        let side = session.node.settings().side;
        let fingers = FingerSummary::new(curls.to_vec(), splays.to_vec());
        let tracking_level = match (transforms.is_empty(), fingers.has_splays()) {
            (true, _) => TrackingLevel::Estimated,
            (false, false) => TrackingLevel::Partial,
            (false, true) => TrackingLevel::Full,
        };
        let valid = !transforms.is_empty() || !fingers.is_empty();
        session.push_frame(HandFrame {
            side,
            bones: SourceFrame::new(transforms),
            fingers,
            tracking_level,
            valid,
        });
    })
    .is_some()
}

/// Retarget the latest frame and return the packed component-space pose
#[wasm_bindgen]
pub fn evaluate_hand(handle: SessionHandle, alpha: f32) -> Vec<f32> {
    state::with_session_mut(handle, |session| {
        session.evaluate(alpha);
        packed_as_floats(&session.pose.to_packed()).to_vec()
    })
    .unwrap_or_default()
}

/// Advance replication smoothing
#[wasm_bindgen]
pub fn advance_hand(handle: SessionHandle, dt: f32) {
    state::with_session_mut(handle, |session| session.advance(dt));
}

#[wasm_bindgen]
pub fn set_evaluation_policy(handle: SessionHandle, policy: JsValue) -> bool {
    match serde_wasm_bindgen::from_value::<EvaluationPolicy>(policy) {
        Ok(policy) => state::with_session_mut(handle, |session| session.set_policy(policy)).is_some(),
        Err(e) => {
            log::warn!("Invalid evaluation policy: {}", e);
            false
        }
    }
}

#[wasm_bindgen]
pub fn set_replication_settings(handle: SessionHandle, settings: JsValue) -> bool {
    match serde_wasm_bindgen::from_value::<ReplicationSettings>(settings) {
        Ok(settings) => {
            state::with_session_mut(handle, |session| session.smoother.set_settings(settings)).is_some()
        }
        Err(e) => {
            log::warn!("Invalid replication settings: {}", e);
            false
        }
    }
}

/// Run gesture detection on the latest frame; returns the fired events
#[wasm_bindgen]
pub fn detect_gesture(handle: SessionHandle) -> JsValue {
    let events = state::with_session_mut(handle, |session| session.detect_gesture().events)
        .unwrap_or_default();
    serde_wasm_bindgen::to_value(&events).unwrap_or(JsValue::NULL)
}

/// Name of the active gesture, if any
#[wasm_bindgen]
pub fn active_gesture(handle: SessionHandle) -> Option<String> {
    state::with_session(handle, |session| session.matcher.state.name.clone()).flatten()
}

#[wasm_bindgen]
pub fn load_gesture_library(handle: SessionHandle, json: &str) -> bool {
    match GestureLibrary::from_json(json) {
        Ok(library) => state::with_session_mut(handle, |session| {
            session.gestures = library;
            session.matcher.reset();
        })
        .is_some(),
        Err(e) => {
            log::warn!("Rejected gesture library: {}", e);
            false
        }
    }
}

#[wasm_bindgen]
pub fn export_gesture_library(handle: SessionHandle) -> String {
    state::with_session(handle, |session| {
        session.gestures.to_json().unwrap_or_else(|e| {
            log::error!("Failed to export gestures: {}", e);
            String::from("{}")
        })
    })
    .unwrap_or_else(|| String::from("{}"))
}

#[wasm_bindgen]
pub fn record_gesture(handle: SessionHandle, name: &str, curl_only: bool) -> bool {
    state::with_session_mut(handle, |session| match session.record_gesture(name, curl_only) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Could not record gesture {}: {}", name, e);
            false
        }
    })
    .unwrap_or(false)
}

/// Encode the latest frame for the network
#[wasm_bindgen]
pub fn encode_replication(handle: SessionHandle) -> Vec<u8> {
    state::with_session(handle, HandSession::replicate).unwrap_or_default()
}

/// Apply a payload from a peer. Compressed payloads are dropped since no
/// decompressor is bound on this side.
#[wasm_bindgen]
pub fn apply_replication(handle: SessionHandle, bytes: &[u8]) -> bool {
    state::with_session_mut(handle, |session| match session.receive(bytes, None) {
        Ok(valid) => valid,
        Err(e) => {
            log::warn!("Dropping replicated payload: {}", e);
            false
        }
    })
    .unwrap_or(false)
}

/// Side of the hand a session drives, "left" or "right"
#[wasm_bindgen]
pub fn hand_side(handle: SessionHandle) -> Option<String> {
    state::with_session(handle, |session| match session.node.settings().side {
        HandSide::Left => "left".to_string(),
        HandSide::Right => "right".to_string(),
    })
}
