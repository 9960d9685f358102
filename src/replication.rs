//! Data shapes moved between peers for multiplayer hand poses.
//!
//! A `RepContainer` is built from the local `HandFrame`, encoded into a
//! compact byte payload, decoded on the remote side and applied to that
//! peer's `HandFrame`. Transport timing and reliability live elsewhere; the
//! `ReplicationSmoother` only hides the gaps between updates.
//!
//! Wire layout (little endian):
//!
//! | field          | size | notes                                       |
//! |----------------|------|---------------------------------------------|
//! | header         | 1    | bit 0 side, bits 1-2 mode, bit 3 has data, bit 4 deforming |
//! | curls/splays   | 1+2n | count, then 16-bit fixed point over [-1, 1] |
//! | transforms     | 1+.. | count, then per bone [3 x f16 translation] + 3 x i16 quaternion |
//! | compressed     | 1+4+n| bone count, byte length, opaque bytes       |

use crate::bone::{BoneId, Finger, HandSide};
use crate::error::{Error, Result};
use crate::frame::{Decompressor, FingerSummary, HandFrame, SourceFrame};
use crate::hand_constants::{
    CHANNEL_VALUE_MAX, CHANNEL_VALUE_MIN, DEFAULT_REPLICATION_RATE_HZ, REPLICATED_BONE_COUNT,
};
use crate::math::{BoneTransform, Quat, Vec3};
use half::f16;
use serde::{Deserialize, Serialize};

const HEADER_SIDE_BIT: u8 = 0b0000_0001;
const HEADER_MODE_SHIFT: u8 = 1;
const HEADER_MODE_MASK: u8 = 0b0000_0110;
const HEADER_HAS_DATA_BIT: u8 = 0b0000_1000;
const HEADER_DEFORMING_BIT: u8 = 0b0001_0000;

/// Bones carried by a reduced transform payload, in wire order.
/// Root is always identity; tips and aux bones are rebuilt on receipt.
pub const REPLICATED_BONES: [BoneId; REPLICATED_BONE_COUNT] = [
    BoneId::Wrist,
    BoneId::Thumb0,
    BoneId::Thumb1,
    BoneId::Thumb2,
    BoneId::Index0,
    BoneId::Index1,
    BoneId::Index2,
    BoneId::Index3,
    BoneId::Middle0,
    BoneId::Middle1,
    BoneId::Middle2,
    BoneId::Middle3,
    BoneId::Ring0,
    BoneId::Ring1,
    BoneId::Ring2,
    BoneId::Ring3,
    BoneId::Pinky0,
    BoneId::Pinky1,
    BoneId::Pinky2,
    BoneId::Pinky3,
];

// ============================================================================
// Mode and settings
// ============================================================================

/// What a replicated hand carries
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReplicationMode {
    /// Five finger curls; receivers estimate the pose
    CurlOnly = 0,
    /// Curls plus the four splay values
    #[default]
    CurlAndSplay = 1,
    /// The 20-bone reduced transform set
    HardTransforms = 2,
    /// The tracking runtime's own compressed bone blob
    CompressedNative = 3,
}

impl ReplicationMode {
    pub const ALL: [ReplicationMode; 4] = [
        ReplicationMode::CurlOnly,
        ReplicationMode::CurlAndSplay,
        ReplicationMode::HardTransforms,
        ReplicationMode::CompressedNative,
    ];

    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub const fn carries_fingers(self) -> bool {
        matches!(self, ReplicationMode::CurlOnly | ReplicationMode::CurlAndSplay)
    }
}

impl TryFrom<u8> for ReplicationMode {
    type Error = Error;

    fn try_from(tag: u8) -> Result<Self> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(Error::UnknownReplicationMode(tag))
    }
}

/// Sender and receiver configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationSettings {
    pub mode: ReplicationMode,
    /// Updates per second
    pub rate_hz: f32,
    /// Blend between updates instead of snapping
    pub smoothing: bool,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            mode: ReplicationMode::default(),
            rate_hz: DEFAULT_REPLICATION_RATE_HZ,
            smoothing: true,
        }
    }
}

impl ReplicationSettings {
    /// Seconds between updates; zero when the rate is not positive
    pub fn interval(&self) -> f32 {
        if self.rate_hz > 0.0 {
            1.0 / self.rate_hz
        } else {
            0.0
        }
    }
}

// ============================================================================
// Container
// ============================================================================

/// Replicated content of one hand
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RepPayload {
    /// Nothing valid to send
    #[default]
    Empty,
    Fingers(FingerSummary),
    Transforms {
        allow_deforming_mesh: bool,
        transforms: Vec<BoneTransform>,
    },
    Compressed {
        bone_count: u8,
        bytes: Vec<u8>,
    },
}

/// One hand's replicated state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepContainer {
    pub side: HandSide,
    pub mode: ReplicationMode,
    pub payload: RepPayload,
}

impl RepContainer {
    /// Snapshot the local frame for sending.
    ///
    /// An invalid frame, or a transform frame shorter than the full catalog,
    /// produces an empty payload. `CompressedNative` needs the runtime's blob,
    /// see `from_compressed`.
    pub fn copy_for_replication(
        frame: &HandFrame,
        mode: ReplicationMode,
        allow_deforming_mesh: bool,
    ) -> Self {
        let mut container = Self {
            side: frame.side,
            mode,
            payload: RepPayload::Empty,
        };

        if !frame.valid {
            return container;
        }

        container.payload = match mode {
            ReplicationMode::CurlOnly => {
                RepPayload::Fingers(FingerSummary::new(frame.fingers.curls.clone(), Vec::new()))
            }
            ReplicationMode::CurlAndSplay => RepPayload::Fingers(frame.fingers.clone()),
            ReplicationMode::HardTransforms => {
                if frame.bones.len() < BoneId::COUNT {
                    log::debug!(
                        "Not replicating {:?} transforms: {} of {} bones",
                        frame.side,
                        frame.bones.len(),
                        BoneId::COUNT
                    );
                    RepPayload::Empty
                } else {
                    let transforms = REPLICATED_BONES
                        .iter()
                        .filter_map(|bone| frame.bones.bone(*bone).copied())
                        .collect();
                    RepPayload::Transforms {
                        allow_deforming_mesh,
                        transforms,
                    }
                }
            }
            ReplicationMode::CompressedNative => {
                log::debug!("Compressed replication for {:?} needs the runtime blob", frame.side);
                RepPayload::Empty
            }
        };

        container
    }

    /// Wrap the runtime's compressed bone blob
    pub fn from_compressed(side: HandSide, bytes: Vec<u8>, bone_count: usize) -> Self {
        Self {
            side,
            mode: ReplicationMode::CompressedNative,
            payload: RepPayload::Compressed {
                bone_count: bone_count.min(u8::MAX as usize) as u8,
                bytes,
            },
        }
    }

    pub fn has_valid_data(&self) -> bool {
        match &self.payload {
            RepPayload::Empty => false,
            RepPayload::Fingers(summary) => !summary.curls.is_empty(),
            RepPayload::Transforms { transforms, .. } => !transforms.is_empty(),
            RepPayload::Compressed { bytes, .. } => !bytes.is_empty(),
        }
    }

    /// Whether the sender's mesh deforms; receivers should match it
    pub fn allow_deforming_mesh(&self) -> Option<bool> {
        match self.payload {
            RepPayload::Transforms {
                allow_deforming_mesh,
                ..
            } => Some(allow_deforming_mesh),
            _ => None,
        }
    }

    /// Write the replicated state into the receiver's frame.
    ///
    /// Finger payloads only replace the finger summary. Transform payloads
    /// rebuild a full catalog frame with an identity root and tips and aux
    /// bones copied from each finger's last joint. Returns whether `target`
    /// holds valid data afterwards.
    pub fn apply_to(&self, target: &mut HandFrame, decompressor: Option<&dyn Decompressor>) -> bool {
        target.side = self.side;

        match &self.payload {
            RepPayload::Empty => {
                target.valid = false;
            }
            RepPayload::Fingers(summary) => {
                target.fingers = summary.clone();
                if self.mode == ReplicationMode::CurlOnly {
                    target.fingers.splays.clear();
                }
                target.valid = !target.fingers.curls.is_empty();
            }
            RepPayload::Transforms { transforms, .. } => {
                if transforms.len() < REPLICATED_BONE_COUNT {
                    target.bones = SourceFrame::empty();
                    target.valid = false;
                } else {
                    target.bones = restore_full_frame(transforms);
                    target.valid = true;
                }
            }
            RepPayload::Compressed { bone_count, bytes } => {
                let Some(decompressor) = decompressor else {
                    log::warn!("Compressed replication for {:?} but no decompressor bound", self.side);
                    target.valid = false;
                    return false;
                };
                match decompressor.decompress(bytes, *bone_count as usize) {
                    Ok(transforms) => {
                        target.bones = SourceFrame::new(transforms);
                        target.valid = !target.bones.is_empty();
                    }
                    Err(e) => {
                        log::warn!("Dropping replicated frame for {:?}: {}", self.side, e);
                        target.valid = false;
                    }
                }
            }
        }

        target.valid
    }

    // ========================================================================
    // Wire format
    // ========================================================================

    pub fn encode(&self) -> Vec<u8> {
        let mut header = self.side.as_bit() & HEADER_SIDE_BIT;
        header |= (self.mode.tag() << HEADER_MODE_SHIFT) & HEADER_MODE_MASK;
        if self.has_valid_data() {
            header |= HEADER_HAS_DATA_BIT;
        }
        if self.allow_deforming_mesh() == Some(true) {
            header |= HEADER_DEFORMING_BIT;
        }

        let mut out = vec![header];
        if !self.has_valid_data() {
            return out;
        }

        match &self.payload {
            RepPayload::Empty => {}
            RepPayload::Fingers(summary) => {
                write_channels(&mut out, &summary.curls);
                if self.mode == ReplicationMode::CurlAndSplay {
                    write_channels(&mut out, &summary.splays);
                }
            }
            RepPayload::Transforms {
                allow_deforming_mesh,
                transforms,
            } => {
                let count = transforms.len().min(u8::MAX as usize);
                out.push(count as u8);
                for transform in &transforms[..count] {
                    if *allow_deforming_mesh {
                        for component in transform.translation.to_array() {
                            out.extend_from_slice(&f16::from_f32(component).to_bits().to_le_bytes());
                        }
                    }
                    for component in pack_rotation(transform.rotation) {
                        out.extend_from_slice(&component.to_le_bytes());
                    }
                }
            }
            RepPayload::Compressed { bone_count, bytes } => {
                out.push(*bone_count);
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out.extend_from_slice(bytes);
            }
        }

        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);
        let header = reader.u8()?;

        let side = HandSide::from_bit(header & HEADER_SIDE_BIT);
        let mode = ReplicationMode::try_from((header & HEADER_MODE_MASK) >> HEADER_MODE_SHIFT)?;
        let mut container = Self {
            side,
            mode,
            payload: RepPayload::Empty,
        };

        if header & HEADER_HAS_DATA_BIT == 0 {
            return Ok(container);
        }

        container.payload = match mode {
            ReplicationMode::CurlOnly => {
                RepPayload::Fingers(FingerSummary::new(read_channels(&mut reader)?, Vec::new()))
            }
            ReplicationMode::CurlAndSplay => {
                let curls = read_channels(&mut reader)?;
                let splays = read_channels(&mut reader)?;
                RepPayload::Fingers(FingerSummary::new(curls, splays))
            }
            ReplicationMode::HardTransforms => {
                let allow_deforming_mesh = header & HEADER_DEFORMING_BIT != 0;
                let count = reader.u8()? as usize;
                let mut transforms = Vec::with_capacity(count);
                for _ in 0..count {
                    let translation = if allow_deforming_mesh {
                        Vec3::new(reader.f16()?, reader.f16()?, reader.f16()?)
                    } else {
                        Vec3::ZERO
                    };
                    let rotation = unpack_rotation([reader.i16()?, reader.i16()?, reader.i16()?]);
                    transforms.push(BoneTransform::from_rotation_translation(rotation, translation));
                }
                RepPayload::Transforms {
                    allow_deforming_mesh,
                    transforms,
                }
            }
            ReplicationMode::CompressedNative => {
                let bone_count = reader.u8()?;
                let len = reader.u32()? as usize;
                RepPayload::Compressed {
                    bone_count,
                    bytes: reader.take(len)?.to_vec(),
                }
            }
        };

        Ok(container)
    }
}

/// Expand the reduced transform set into a full catalog frame
fn restore_full_frame(transforms: &[BoneTransform]) -> SourceFrame {
    let mut frame = SourceFrame::identity();
    for (bone, transform) in REPLICATED_BONES.iter().zip(transforms) {
        frame.set(*bone, *transform);
    }
    frame.set(BoneId::Root, BoneTransform::IDENTITY);
    frame.fill_tip_bones();
    frame
}

// ============================================================================
// Quantization
// ============================================================================

fn quantize_channel(value: f32) -> u16 {
    let clamped = if value.is_nan() {
        0.0
    } else {
        value.clamp(CHANNEL_VALUE_MIN, CHANNEL_VALUE_MAX)
    };
    let unit = (clamped - CHANNEL_VALUE_MIN) / (CHANNEL_VALUE_MAX - CHANNEL_VALUE_MIN);
    (unit * u16::MAX as f32).round() as u16
}

fn dequantize_channel(bits: u16) -> f32 {
    let unit = bits as f32 / u16::MAX as f32;
    CHANNEL_VALUE_MIN + unit * (CHANNEL_VALUE_MAX - CHANNEL_VALUE_MIN)
}

fn write_channels(out: &mut Vec<u8>, values: &[f32]) {
    let count = values.len().min(u8::MAX as usize);
    out.push(count as u8);
    for value in &values[..count] {
        out.extend_from_slice(&quantize_channel(*value).to_le_bytes());
    }
}

fn read_channels(reader: &mut ByteReader<'_>) -> Result<Vec<f32>> {
    let count = reader.u8()? as usize;
    (0..count)
        .map(|_| reader.u16().map(dequantize_channel))
        .collect()
}

/// Smallest-three style: drop w after forcing it non-negative
fn pack_rotation(rotation: Quat) -> [i16; 3] {
    let q = rotation.normalize();
    let q = if q.w < 0.0 { -q } else { q };
    let scale = i16::MAX as f32;
    [q.x, q.y, q.z].map(|c| (c.clamp(-1.0, 1.0) * scale).round() as i16)
}

fn unpack_rotation(bits: [i16; 3]) -> Quat {
    let [x, y, z] = bits.map(|b| b as f32 / i16::MAX as f32);
    let w = (1.0 - x * x - y * y - z * z).max(0.0).sqrt();
    Quat::from_xyzw(x, y, z, w).normalize()
}

/// Cursor over a decoded payload
struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        let available = self.bytes.len().saturating_sub(self.offset);
        if needed > available {
            return Err(Error::Truncated {
                offset: self.offset,
                needed,
                available,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn f16(&mut self) -> Result<f32> {
        Ok(f16::from_bits(self.u16()?).to_f32())
    }
}

// ============================================================================
// Smoothing
// ============================================================================

/// Hides the gaps between replicated transform updates by blending the
/// previously displayed frame toward the newest one over one interval.
#[derive(Debug, Clone, Default)]
pub struct ReplicationSmoother {
    settings: ReplicationSettings,
    replicated_once: bool,
    lerping: bool,
    elapsed: f32,
    previous: SourceFrame,
    target: SourceFrame,
    current: SourceFrame,
}

impl ReplicationSmoother {
    pub fn new(settings: ReplicationSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &ReplicationSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ReplicationSettings) {
        self.settings = settings;
    }

    pub fn is_lerping(&self) -> bool {
        self.lerping
    }

    /// Frame to hand to the evaluator this tick
    pub fn current(&self) -> &SourceFrame {
        &self.current
    }

    /// A replicated frame arrived. The first one is shown as is; later ones
    /// start a blend from whatever is currently displayed.
    pub fn notify_new_data(&mut self, incoming: SourceFrame) {
        if !self.settings.smoothing || !self.replicated_once {
            self.replicated_once = true;
            self.lerping = false;
            self.elapsed = 0.0;
            self.previous = incoming.clone();
            self.current = incoming.clone();
            self.target = incoming;
            return;
        }

        self.previous = std::mem::take(&mut self.current);
        self.current = self.previous.clone();
        self.target = incoming;
        self.elapsed = 0.0;
        self.lerping = true;
    }

    /// Advance the blend by `dt` seconds and return the displayed frame
    pub fn update(&mut self, dt: f32) -> &SourceFrame {
        if !self.lerping {
            return &self.current;
        }

        self.elapsed += dt.max(0.0);
        let interval = self.settings.interval();
        let t = if interval > 0.0 {
            (self.elapsed / interval).clamp(0.0, 1.0)
        } else {
            1.0
        };

        if t >= 1.0 {
            self.lerping = false;
            self.elapsed = 0.0;
            self.current = self.target.clone();
            return &self.current;
        }

        if self.target.len() < REPLICATED_BONE_COUNT || self.target.len() != self.previous.len() {
            return &self.current;
        }

        let mut blended = SourceFrame::blend(&self.previous, &self.target, t);
        blended.set(BoneId::Root, BoneTransform::IDENTITY);
        for finger in Finger::ALL {
            if let Some(last) = blended.bone(finger.last_joint()).copied() {
                blended.set(finger.aux(), last);
            }
        }
        self.current = blended;
        &self.current
    }

    /// Forget everything received so far
    pub fn reset(&mut self) {
        *self = Self::new(self.settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::TrackingLevel;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_frame(rng: &mut StdRng) -> SourceFrame {
        SourceFrame::new(
            (0..BoneId::COUNT)
                .map(|_| {
                    let axis = Vec3::new(
                        rng.random_range(-1.0..1.0),
                        rng.random_range(-1.0..1.0),
                        rng.random_range(-1.0..1.0),
                    )
                    .normalize_or(Vec3::Z);
                    BoneTransform::from_rotation_translation(
                        Quat::from_axis_angle(axis, rng.random_range(-2.5..2.5)),
                        Vec3::new(
                            rng.random_range(-0.2..0.2),
                            rng.random_range(-0.2..0.2),
                            rng.random_range(-0.2..0.2),
                        ),
                    )
                })
                .collect(),
        )
    }

    fn hand_frame(side: HandSide, bones: SourceFrame) -> HandFrame {
        HandFrame {
            side,
            bones,
            fingers: FingerSummary::from_curls([0.1, 0.5, 0.9, -0.3, 1.0]).with_splays([0.2, -0.2, 0.0, 0.4]),
            tracking_level: TrackingLevel::Full,
            valid: true,
        }
    }

    #[test]
    fn test_mode_tags() {
        for mode in ReplicationMode::ALL {
            assert_eq!(ReplicationMode::try_from(mode.tag()).unwrap(), mode);
        }
        assert!(matches!(
            ReplicationMode::try_from(7),
            Err(Error::UnknownReplicationMode(7))
        ));
    }

    #[test]
    fn test_curl_only_drops_splays() {
        let frame = hand_frame(HandSide::Left, SourceFrame::empty());
        let container = RepContainer::copy_for_replication(&frame, ReplicationMode::CurlOnly, false);

        let decoded = RepContainer::decode(&container.encode()).unwrap();
        assert_eq!(decoded.side, HandSide::Left);
        assert_eq!(decoded.mode, ReplicationMode::CurlOnly);

        let mut receiver = HandFrame::invalid(HandSide::Left);
        assert!(decoded.apply_to(&mut receiver, None));
        assert!(receiver.fingers.splays.is_empty());
        for (sent, got) in frame.fingers.curls.iter().zip(&receiver.fingers.curls) {
            assert!((sent - got).abs() < 1e-4);
        }
    }

    #[test]
    fn test_curl_and_splay_payload_size() {
        let frame = hand_frame(HandSide::Right, SourceFrame::empty());
        let container = RepContainer::copy_for_replication(&frame, ReplicationMode::CurlAndSplay, false);
        // header + (1 + 5*2) + (1 + 4*2)
        assert_eq!(container.encode().len(), 1 + 11 + 9);
    }

    #[test]
    fn test_channel_quantization_endpoints() {
        assert_eq!(dequantize_channel(quantize_channel(-1.0)), -1.0);
        assert_eq!(dequantize_channel(quantize_channel(1.0)), 1.0);
        assert_eq!(quantize_channel(5.0), u16::MAX);
        assert_eq!(quantize_channel(f32::NAN), quantize_channel(0.0));
    }

    #[test]
    fn test_hard_transforms_restore_full_frame() {
        let mut rng = StdRng::seed_from_u64(7);
        let bones = random_frame(&mut rng);
        let frame = hand_frame(HandSide::Right, bones.clone());

        let container = RepContainer::copy_for_replication(&frame, ReplicationMode::HardTransforms, true);
        let decoded = RepContainer::decode(&container.encode()).unwrap();
        assert_eq!(decoded.allow_deforming_mesh(), Some(true));

        let mut receiver = HandFrame::invalid(HandSide::Right);
        assert!(decoded.apply_to(&mut receiver, None));
        assert_eq!(receiver.bones.len(), BoneId::COUNT);
        assert_eq!(receiver.bones.bone(BoneId::Root), Some(&BoneTransform::IDENTITY));

        for bone in REPLICATED_BONES {
            let sent = bones.bone(bone).unwrap();
            let got = receiver.bones.bone(bone).unwrap();
            assert!(got.abs_diff_eq(sent, 2e-3), "{:?}: {:?} vs {:?}", bone, got, sent);
        }
        for finger in Finger::ALL {
            let last = receiver.bones.bone(finger.last_joint()).unwrap();
            assert_eq!(receiver.bones.bone(finger.tip()), Some(last));
            assert_eq!(receiver.bones.bone(finger.aux()), Some(last));
        }
    }

    #[test]
    fn test_rigid_transforms_skip_translation() {
        let mut rng = StdRng::seed_from_u64(11);
        let frame = hand_frame(HandSide::Left, random_frame(&mut rng));
        let deforming = RepContainer::copy_for_replication(&frame, ReplicationMode::HardTransforms, true).encode();
        let rigid = RepContainer::copy_for_replication(&frame, ReplicationMode::HardTransforms, false).encode();
        assert_eq!(deforming.len() - rigid.len(), REPLICATED_BONE_COUNT * 6);

        let decoded = RepContainer::decode(&rigid).unwrap();
        let RepPayload::Transforms { transforms, .. } = decoded.payload else {
            panic!("expected transforms");
        };
        assert!(transforms.iter().all(|t| t.translation == Vec3::ZERO));
    }

    #[test]
    fn test_short_frame_is_not_replicated() {
        let frame = hand_frame(HandSide::Right, SourceFrame::new(vec![BoneTransform::IDENTITY; 10]));
        let container = RepContainer::copy_for_replication(&frame, ReplicationMode::HardTransforms, true);
        assert!(!container.has_valid_data());
        assert_eq!(container.encode().len(), 1);

        let mut receiver = hand_frame(HandSide::Right, SourceFrame::identity());
        assert!(!container.apply_to(&mut receiver, None));
    }

    #[test]
    fn test_invalid_frame_replicates_empty() {
        let container =
            RepContainer::copy_for_replication(&HandFrame::invalid(HandSide::Left), ReplicationMode::CurlOnly, false);
        assert_eq!(container.payload, RepPayload::Empty);
        let decoded = RepContainer::decode(&container.encode()).unwrap();
        assert_eq!(decoded, container);
    }

    struct Doubling;

    impl Decompressor for Doubling {
        fn decompress(&self, bytes: &[u8], bone_count: usize) -> Result<Vec<BoneTransform>> {
            if bytes.is_empty() {
                return Err(Error::Decompression("empty blob".into()));
            }
            Ok(vec![BoneTransform::from_translation(Vec3::splat(bytes[0] as f32)); bone_count])
        }
    }

    #[test]
    fn test_compressed_payload() {
        let container = RepContainer::from_compressed(HandSide::Left, vec![3, 1, 4, 1, 5], BoneId::COUNT);
        let encoded = container.encode();
        assert_eq!(encoded.len(), 1 + 1 + 4 + 5);

        let decoded = RepContainer::decode(&encoded).unwrap();
        assert_eq!(decoded, container);

        let mut receiver = HandFrame::invalid(HandSide::Left);
        assert!(!decoded.apply_to(&mut receiver, None));
        assert!(decoded.apply_to(&mut receiver, Some(&Doubling)));
        assert_eq!(receiver.bones.len(), BoneId::COUNT);
        assert_eq!(receiver.bones.bone(BoneId::Wrist).unwrap().translation, Vec3::splat(3.0));
    }

    #[test]
    fn test_truncated_payloads() {
        let frame = hand_frame(HandSide::Right, SourceFrame::empty());
        let encoded = RepContainer::copy_for_replication(&frame, ReplicationMode::CurlAndSplay, false).encode();

        for len in 1..encoded.len() {
            assert!(
                matches!(RepContainer::decode(&encoded[..len]), Err(Error::Truncated { .. })),
                "prefix of {} bytes decoded",
                len
            );
        }
        assert!(matches!(
            RepContainer::decode(&[]),
            Err(Error::Truncated {
                offset: 0,
                needed: 1,
                available: 0
            })
        ));
    }

    #[test]
    fn test_rotation_packing_keeps_w_positive() {
        let q = Quat::from_xyzw(0.1, -0.2, 0.3, -0.9).normalize();
        let unpacked = unpack_rotation(pack_rotation(q));
        assert!(unpacked.w >= 0.0);
        assert!(unpacked.dot(q).abs() > 1.0 - 1e-5);
    }

    #[test]
    fn test_smoother_first_update_snaps() {
        let mut rng = StdRng::seed_from_u64(3);
        let first = random_frame(&mut rng);
        let mut smoother = ReplicationSmoother::new(ReplicationSettings::default());

        smoother.notify_new_data(first.clone());
        assert!(!smoother.is_lerping());
        assert_eq!(smoother.update(0.01), &first);
    }

    #[test]
    fn test_smoother_blends_over_one_interval() {
        let mut rng = StdRng::seed_from_u64(5);
        let first = random_frame(&mut rng);
        let second = random_frame(&mut rng);
        let settings = ReplicationSettings {
            rate_hz: 10.0,
            ..ReplicationSettings::default()
        };
        let mut smoother = ReplicationSmoother::new(settings);

        smoother.notify_new_data(first.clone());
        smoother.notify_new_data(second.clone());
        assert!(smoother.is_lerping());

        let halfway = smoother.update(0.05).clone();
        assert_eq!(halfway.bone(BoneId::Root), Some(&BoneTransform::IDENTITY));
        let expected = BoneTransform::blend(
            first.bone(BoneId::Index2).unwrap(),
            second.bone(BoneId::Index2).unwrap(),
            0.5,
        );
        assert!(halfway.bone(BoneId::Index2).unwrap().abs_diff_eq(&expected, 1e-5));
        assert_eq!(halfway.bone(BoneId::AuxRing), halfway.bone(BoneId::Ring3));

        let done = smoother.update(0.06).clone();
        assert!(!smoother.is_lerping());
        assert_eq!(done, second);
    }

    #[test]
    fn test_smoother_disabled_snaps() {
        let mut rng = StdRng::seed_from_u64(9);
        let settings = ReplicationSettings {
            smoothing: false,
            ..ReplicationSettings::default()
        };
        let mut smoother = ReplicationSmoother::new(settings);
        smoother.notify_new_data(random_frame(&mut rng));
        let second = random_frame(&mut rng);
        smoother.notify_new_data(second.clone());
        assert!(!smoother.is_lerping());
        assert_eq!(smoother.current(), &second);
    }

    #[test]
    fn test_smoother_holds_on_mismatched_frames() {
        let mut rng = StdRng::seed_from_u64(13);
        let first = random_frame(&mut rng);
        let mut smoother = ReplicationSmoother::new(ReplicationSettings::default());
        smoother.notify_new_data(first.clone());
        smoother.notify_new_data(SourceFrame::new(vec![BoneTransform::IDENTITY; 5]));

        assert_eq!(smoother.update(0.001), &first);
        // Interval elapsed: the short frame is shown as delivered
        assert_eq!(smoother.update(1.0).len(), 5);
    }
}
