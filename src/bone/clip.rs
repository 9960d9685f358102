use super::id::{BoneId, Finger};
use crate::error::{Error, Result};
use crate::frame::{FingerSummary, SourceFrame};
use crate::math::{BoneTransform, EulerAngles, Vec3};
use serde::{Deserialize, Serialize};

// ============================================================================
// Reference hand poses
// ============================================================================

const OPEN_HAND: &str = include_str!("../../assets/poses/open.json");
const FIST: &str = include_str!("../../assets/poses/fist.json");

/// A single bone in JSON format (parent space, Euler degrees)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReferenceBoneJson {
    pub bone: BoneId,

    #[serde(default)]
    pub translation: [f32; 3],

    #[serde(default, skip_serializing_if = "is_zero_rotation")]
    pub rotation: EulerAngles,
}

fn is_zero_rotation(rotation: &EulerAngles) -> bool {
    *rotation == EulerAngles::default()
}

/// JSON form of a reference pose
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReferencePoseJson {
    pub name: String,
    #[serde(default)]
    pub bones: Vec<ReferenceBoneJson>,
}

/// A complete tracking-catalog frame authored by hand, such as a fully
/// open hand or a closed fist. Bones missing from the JSON are identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePose {
    pub name: String,
    pub frame: SourceFrame,
}

impl ReferencePose {
    /// Load from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: ReferencePoseJson = serde_json::from_str(json)?;

        let mut frame = SourceFrame::identity();
        for (i, bone) in parsed.bones.iter().enumerate() {
            if parsed.bones[..i].iter().any(|b| b.bone == bone.bone) {
                return Err(Error::InvalidSkeleton(format!(
                    "reference pose {} lists {:?} twice",
                    parsed.name, bone.bone
                )));
            }
            frame.set(
                bone.bone,
                BoneTransform::from_rotation_translation(
                    bone.rotation.to_quat(),
                    Vec3::from_array(bone.translation),
                ),
            );
        }

        Ok(Self {
            name: parsed.name,
            frame,
        })
    }

    /// Save to JSON string (pretty-printed)
    pub fn to_json_string(&self) -> Result<String> {
        let bones = BoneId::ALL
            .iter()
            .filter_map(|bone| {
                let transform = self.frame.bone(*bone)?;
                Some(ReferenceBoneJson {
                    bone: *bone,
                    translation: transform.translation.to_array(),
                    rotation: EulerAngles::from_quat(transform.rotation),
                })
            })
            .collect();

        let json = ReferencePoseJson {
            name: self.name.clone(),
            bones,
        };
        Ok(serde_json::to_string_pretty(&json)?)
    }

    /// Fully extended hand shipped in `assets/poses/open.json`
    pub fn open_hand() -> Result<Self> {
        Self::from_json(OPEN_HAND)
    }

    /// Closed fist shipped in `assets/poses/fist.json`
    pub fn fist() -> Result<Self> {
        Self::from_json(FIST)
    }
}

/// Build a frame from finger curls alone.
///
/// Each finger's bones (aux included) are blended from `open` toward `fist`
/// by that finger's curl, clamped to [0, 1]. Root and wrist come from
/// `open`; a missing curl counts as fully open.
pub fn estimate_frame(open: &ReferencePose, fist: &ReferencePose, fingers: &FingerSummary) -> SourceFrame {
    let mut frame = open.frame.clone();

    for bone in BoneId::ALL {
        let Some(finger) = bone.finger() else {
            continue;
        };
        let (Some(from), Some(to)) = (open.frame.bone(bone), fist.frame.bone(bone)) else {
            continue;
        };
        let curl = curl_weight(fingers, finger);
        frame.set(bone, BoneTransform::blend(from, to, curl));
    }

    frame
}

#[inline]
fn curl_weight(fingers: &FingerSummary, finger: Finger) -> f32 {
    match fingers.curl(finger) {
        Some(curl) if !curl.is_nan() => curl.clamp(0.0, 1.0),
        _ => 0.0,
    }
}
