//! Per-frame tracking data and the acquisition boundary.
//!
//! The tracking runtime and its compressor are external; they are reached
//! through the `TrackingSource` and `Decompressor` traits. Everything the
//! evaluator sees has already been disambiguated per hand here.

use crate::bone::{BoneId, Finger, HandSide};
use crate::error::Result;
use crate::hand_constants::{CURL_CHANNEL_COUNT, SPLAY_CHANNEL_COUNT};
use crate::math::{BoneTransform, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Ordered bone transforms for one tick, one per catalog bone, each in its
/// parent's space. May hold fewer than `BoneId::COUNT` bones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceFrame {
    transforms: Vec<BoneTransform>,
}

impl SourceFrame {
    pub fn new(transforms: Vec<BoneTransform>) -> Self {
        Self { transforms }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Full-size frame with every bone at identity
    pub fn identity() -> Self {
        Self {
            transforms: vec![BoneTransform::IDENTITY; BoneId::COUNT],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&BoneTransform> {
        self.transforms.get(index)
    }

    #[inline]
    pub fn bone(&self, bone: BoneId) -> Option<&BoneTransform> {
        self.get(bone.index())
    }

    /// Overwrite `bone`; ignored if the frame is too short to hold it
    pub fn set(&mut self, bone: BoneId, transform: BoneTransform) {
        if let Some(slot) = self.transforms.get_mut(bone.index()) {
            *slot = transform;
        }
    }

    pub fn transforms(&self) -> &[BoneTransform] {
        &self.transforms
    }

    pub fn into_transforms(self) -> Vec<BoneTransform> {
        self.transforms
    }

    /// Copy each finger's last real joint into its tip and aux bones.
    /// Used when a frame was rebuilt from a reduced bone set.
    pub fn fill_tip_bones(&mut self) {
        for finger in Finger::ALL {
            let Some(last) = self.bone(finger.last_joint()).copied() else {
                continue;
            };
            self.set(finger.tip(), last);
            self.set(finger.aux(), last);
        }
    }

    /// Reinterpret a stream recorded for one hand as the other hand.
    ///
    /// Metacarpals get a full mirror with a quaternion component swap, the
    /// wrist and aux bones negate X and the Y/Z rotation components, every
    /// other joint only negates its position.
    pub fn mirrored_left_right(&self) -> SourceFrame {
        let mut mirrored = self.clone();
        for (index, transform) in mirrored.transforms.iter_mut().enumerate() {
            let Some(bone) = BoneId::from_index(index) else {
                continue;
            };
            *transform = mirror_tracking_bone(bone, transform);
        }
        mirrored
    }

    /// Compose parent-space bones up the catalog hierarchy into the space
    /// of the root bone
    pub fn to_component_space(&self) -> SourceFrame {
        let mut out: Vec<BoneTransform> = Vec::with_capacity(self.transforms.len());
        for (index, local) in self.transforms.iter().enumerate() {
            let parent = BoneId::from_index(index)
                .and_then(BoneId::parent)
                .and_then(|p| out.get(p.index()).copied())
                .unwrap_or(BoneTransform::IDENTITY);
            out.push(parent * *local);
        }
        SourceFrame { transforms: out }
    }

    /// Blend two frames bone by bone; the shorter frame bounds the result
    pub fn blend(a: &SourceFrame, b: &SourceFrame, t: f32) -> SourceFrame {
        SourceFrame {
            transforms: a
                .transforms
                .iter()
                .zip(&b.transforms)
                .map(|(from, to)| BoneTransform::blend(from, to, t))
                .collect(),
        }
    }
}

fn mirror_tracking_bone(bone: BoneId, t: &BoneTransform) -> BoneTransform {
    let p = t.translation;
    let q = t.rotation;

    if bone == BoneId::Root {
        *t
    } else if bone == BoneId::Wrist || bone.is_aux() {
        BoneTransform {
            translation: Vec3::new(-p.x, p.y, p.z),
            rotation: Quat::from_xyzw(q.x, -q.y, -q.z, q.w),
            scale: t.scale,
        }
    } else if bone.is_metacarpal() {
        BoneTransform {
            translation: Vec3::new(-p.x, p.y, p.z),
            rotation: Quat::from_xyzw(-q.w, q.z, -q.y, q.x),
            scale: t.scale,
        }
    } else {
        BoneTransform {
            translation: -p,
            ..*t
        }
    }
}

/// How much of the hand the tracker actually observes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingLevel {
    /// Finger poses are inferred from buttons and triggers
    #[default]
    Estimated,
    /// Some fingers are tracked
    Partial,
    /// Every finger is tracked
    Full,
}

impl TrackingLevel {
    pub const fn supports_splay(self) -> bool {
        matches!(self, TrackingLevel::Partial | TrackingLevel::Full)
    }
}

/// Per-frame curl and splay summary, values in [-1, 1]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FingerSummary {
    /// Thumb, index, middle, ring, pinky
    pub curls: Vec<f32>,
    /// Thumb/index, index/middle, middle/ring, ring/pinky. Empty when unavailable.
    #[serde(default)]
    pub splays: Vec<f32>,
}

impl FingerSummary {
    pub fn new(curls: Vec<f32>, splays: Vec<f32>) -> Self {
        Self { curls, splays }
    }

    pub fn from_curls(curls: [f32; CURL_CHANNEL_COUNT]) -> Self {
        Self {
            curls: curls.to_vec(),
            splays: Vec::new(),
        }
    }

    pub fn with_splays(self, splays: [f32; SPLAY_CHANNEL_COUNT]) -> Self {
        Self {
            splays: splays.to_vec(),
            ..self
        }
    }

    pub fn curl(&self, finger: Finger) -> Option<f32> {
        self.curls.get(finger.index()).copied()
    }

    pub fn has_splays(&self) -> bool {
        !self.splays.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.curls.is_empty() && self.splays.is_empty()
    }
}

/// Everything known about one hand for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandFrame {
    pub side: HandSide,
    pub bones: SourceFrame,
    pub fingers: FingerSummary,
    pub tracking_level: TrackingLevel,
    pub valid: bool,
}

impl HandFrame {
    /// Frame with no usable data; the evaluator passes the pose through
    pub fn invalid(side: HandSide) -> Self {
        Self {
            side,
            ..Self::default()
        }
    }
}

/// Bone data as delivered by the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Transforms(Vec<BoneTransform>),
    Compressed { bytes: Vec<u8>, bone_count: usize },
}

/// Raw result of one runtime query
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub payload: FramePayload,
    pub fingers: Option<FingerSummary>,
    pub tracking_level: TrackingLevel,
    pub valid: bool,
}

/// The tracking runtime
pub trait TrackingSource {
    /// Latest data for `side`, or `None` if the runtime has nothing
    fn get_frame(
        &mut self,
        side: HandSide,
        want_compressed: bool,
        want_gesture_summary: bool,
    ) -> Option<RawFrame>;
}

/// The runtime's bone compressor
pub trait Decompressor {
    fn decompress(&self, bytes: &[u8], bone_count: usize) -> Result<Vec<BoneTransform>>;
}

/// Options for `acquire`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AcquireOptions {
    pub want_compressed: bool,
    pub want_gesture_summary: bool,
    /// Feed this hand from the opposite hand's stream, mirrored
    pub mirror_left_right: bool,
}

/// Fetch one hand's frame from the runtime.
///
/// Failures of any kind yield an invalid frame with no bones, which the
/// evaluator treats as missing data.
pub fn acquire(
    source: &mut dyn TrackingSource,
    decompressor: Option<&dyn Decompressor>,
    side: HandSide,
    options: AcquireOptions,
) -> HandFrame {
    let stream_side = if options.mirror_left_right {
        side.opposite()
    } else {
        side
    };

    let Some(raw) = source.get_frame(
        stream_side,
        options.want_compressed,
        options.want_gesture_summary,
    ) else {
        log::trace!("No tracking data for {:?}", stream_side);
        return HandFrame::invalid(side);
    };

    if !raw.valid {
        return HandFrame::invalid(side);
    }

    let transforms = match raw.payload {
        FramePayload::Transforms(transforms) => transforms,
        FramePayload::Compressed { bytes, bone_count } => match decompressor {
            Some(decompressor) => match decompressor.decompress(&bytes, bone_count) {
                Ok(transforms) => transforms,
                Err(e) => {
                    log::warn!("Dropping compressed frame for {:?}: {}", side, e);
                    return HandFrame::invalid(side);
                }
            },
            None => {
                log::warn!("Compressed frame for {:?} but no decompressor bound", side);
                return HandFrame::invalid(side);
            }
        },
    };

    let mut bones = SourceFrame::new(transforms);
    if options.mirror_left_right {
        bones = bones.mirrored_left_right();
    }

    HandFrame {
        side,
        bones,
        fingers: raw.fingers.unwrap_or_default(),
        tracking_level: raw.tracking_level,
        valid: true,
    }
}
