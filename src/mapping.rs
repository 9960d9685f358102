//! Catalog-bone to target-bone mapping.
//!
//! A `MappingTable` is built once per skeleton asset: default entries come
//! from constant name templates for the supported conventions, then every
//! entry is resolved against the bound skeleton. Entries that fail to
//! resolve are kept and skipped at evaluation time.

use crate::bone::{BoneId, HandSide};
use crate::math::Quat;
use crate::skeleton::SkeletonQuery;
use serde::{Deserialize, Serialize};

/// Placeholder replaced by the hand side delimiter in name templates
const SIDE_PLACEHOLDER: &str = "{s}";

/// Naming convention of the target skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SkeletonConvention {
    /// One target bone per catalog bone, including metacarpals, tips and aux
    SourceNative,
    /// Common humanoid rigs: no root, metacarpal, tip or aux bones
    #[default]
    Humanoid,
}

impl SkeletonConvention {
    /// Whether root/wrist and metacarpal/proximal joints are fused in the target
    pub const fn merges_root_and_wrist(self) -> bool {
        matches!(self, SkeletonConvention::Humanoid)
    }

    /// Bone the convention drops when the hand is part of a larger rig
    const fn root_bone(self) -> BoneId {
        match self {
            SkeletonConvention::SourceNative => BoneId::Root,
            SkeletonConvention::Humanoid => BoneId::Wrist,
        }
    }

    const fn name_templates(self) -> &'static [(BoneId, &'static str)] {
        match self {
            SkeletonConvention::SourceNative => &SOURCE_NATIVE_NAMES,
            SkeletonConvention::Humanoid => &HUMANOID_NAMES,
        }
    }
}

const SOURCE_NATIVE_NAMES: [(BoneId, &str); BoneId::COUNT] = [
    (BoneId::Root, "Root"),
    (BoneId::Wrist, "wrist_{s}"),
    (BoneId::Thumb0, "finger_thumb_0_{s}"),
    (BoneId::Thumb1, "finger_thumb_1_{s}"),
    (BoneId::Thumb2, "finger_thumb_2_{s}"),
    (BoneId::Thumb3, "finger_thumb_{s}_end"),
    (BoneId::Index0, "finger_index_meta_{s}"),
    (BoneId::Index1, "finger_index_0_{s}"),
    (BoneId::Index2, "finger_index_1_{s}"),
    (BoneId::Index3, "finger_index_2_{s}"),
    (BoneId::Index4, "finger_index_{s}_end"),
    (BoneId::Middle0, "finger_middle_meta_{s}"),
    (BoneId::Middle1, "finger_middle_0_{s}"),
    (BoneId::Middle2, "finger_middle_1_{s}"),
    (BoneId::Middle3, "finger_middle_2_{s}"),
    (BoneId::Middle4, "finger_middle_{s}_end"),
    (BoneId::Ring0, "finger_ring_meta_{s}"),
    (BoneId::Ring1, "finger_ring_0_{s}"),
    (BoneId::Ring2, "finger_ring_1_{s}"),
    (BoneId::Ring3, "finger_ring_2_{s}"),
    (BoneId::Ring4, "finger_ring_{s}_end"),
    (BoneId::Pinky0, "finger_pinky_meta_{s}"),
    (BoneId::Pinky1, "finger_pinky_0_{s}"),
    (BoneId::Pinky2, "finger_pinky_1_{s}"),
    (BoneId::Pinky3, "finger_pinky_2_{s}"),
    (BoneId::Pinky4, "finger_pinky_{s}_end"),
    (BoneId::AuxThumb, "finger_thumb_{s}_aux"),
    (BoneId::AuxIndex, "finger_index_{s}_aux"),
    (BoneId::AuxMiddle, "finger_middle_{s}_aux"),
    (BoneId::AuxRing, "finger_ring_{s}_aux"),
    (BoneId::AuxPinky, "finger_pinky_{s}_aux"),
];

// Humanoid rigs start fingers at the proximal joint; the thumb's three
// bones line up with catalog thumb 0-2.
const HUMANOID_NAMES: [(BoneId, &str); 16] = [
    (BoneId::Wrist, "hand_{s}"),
    (BoneId::Index1, "index_01_{s}"),
    (BoneId::Index2, "index_02_{s}"),
    (BoneId::Index3, "index_03_{s}"),
    (BoneId::Middle1, "middle_01_{s}"),
    (BoneId::Middle2, "middle_02_{s}"),
    (BoneId::Middle3, "middle_03_{s}"),
    (BoneId::Pinky1, "pinky_01_{s}"),
    (BoneId::Pinky2, "pinky_02_{s}"),
    (BoneId::Pinky3, "pinky_03_{s}"),
    (BoneId::Ring1, "ring_01_{s}"),
    (BoneId::Ring2, "ring_02_{s}"),
    (BoneId::Ring3, "ring_03_{s}"),
    (BoneId::Thumb0, "thumb_01_{s}"),
    (BoneId::Thumb1, "thumb_02_{s}"),
    (BoneId::Thumb2, "thumb_03_{s}"),
];

/// One catalog bone and the target bone it drives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneMappingEntry {
    pub catalog_bone: BoneId,
    pub target_name: String,
    /// Resolved index in the target skeleton
    #[serde(skip)]
    pub target_index: Option<usize>,
    /// Target skeleton's parent of `target_index` (not necessarily mapped)
    #[serde(skip)]
    pub parent_index: Option<usize>,
}

impl BoneMappingEntry {
    pub fn new(catalog_bone: BoneId, target_name: impl Into<String>) -> Self {
        Self {
            catalog_bone,
            target_name: target_name.into(),
            target_index: None,
            parent_index: None,
        }
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.target_index.is_some()
    }
}

/// Ordered mapping from catalog bones to one target skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingTable {
    pub entries: Vec<BoneMappingEntry>,
    pub merge_root_and_wrist: bool,
    pub side: HandSide,
    /// Calibrated rotation from the tracked basis to the target wrist basis
    #[serde(skip, default = "identity_quat")]
    pub adjustment: Quat,
    #[serde(skip)]
    initialized: bool,
    #[serde(skip)]
    last_asset_id: Option<String>,
}

fn identity_quat() -> Quat {
    Quat::IDENTITY
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::new(HandSide::default())
    }
}

impl MappingTable {
    /// Empty, uninitialized table
    pub fn new(side: HandSide) -> Self {
        Self {
            entries: Vec::new(),
            merge_root_and_wrist: false,
            side,
            adjustment: Quat::IDENTITY,
            initialized: false,
            last_asset_id: None,
        }
    }

    /// Table pre-filled with the default entries of `convention`
    pub fn with_defaults(convention: SkeletonConvention, side: HandSide, skip_root_bone: bool) -> Self {
        let mut table = Self::new(side);
        table.construct_default_mappings(convention, skip_root_bone);
        table
    }

    /// Replace the entries with the defaults for `convention`.
    ///
    /// # Arguments
    /// * `convention` - Naming scheme of the target rig
    /// * `skip_root_bone` - Omit the rig's root-most hand bone (hand is part of a body rig)
    pub fn construct_default_mappings(&mut self, convention: SkeletonConvention, skip_root_bone: bool) {
        let delimiter = self.side.delimiter();
        let skipped = convention.root_bone();

        self.merge_root_and_wrist = convention.merges_root_and_wrist();
        self.entries = convention
            .name_templates()
            .iter()
            .filter(|(bone, _)| !(skip_root_bone && *bone == skipped))
            .map(|(bone, template)| {
                BoneMappingEntry::new(*bone, template.replace(SIDE_PLACEHOLDER, delimiter))
            })
            .collect();
        self.invalidate();
    }

    /// Resolve every entry against `skeleton`.
    ///
    /// Returns the number of entries that resolved. The table becomes
    /// initialized only if at least one did.
    pub fn resolve<S: SkeletonQuery + ?Sized>(&mut self, skeleton: &S) -> usize {
        let mut resolved = 0;

        for entry in &mut self.entries {
            entry.target_index = skeleton.resolve_bone_index(&entry.target_name);
            entry.parent_index = entry
                .target_index
                .and_then(|index| skeleton.parent_index(index));

            if entry.target_index.is_some() {
                resolved += 1;
            } else {
                log::debug!(
                    "{:?}: target bone {} not found in {}",
                    entry.catalog_bone,
                    entry.target_name,
                    skeleton.asset_id()
                );
            }
        }

        self.last_asset_id = Some(skeleton.asset_id().to_string());
        self.initialized = resolved > 0;

        if self.initialized {
            log::info!(
                "Mapped {}/{} hand bones onto {}",
                resolved,
                self.entries.len(),
                skeleton.asset_id()
            );
            if !self.is_topologically_ordered() {
                log::warn!(
                    "Mapping for {} lists a child before its parent; children will read stale parents",
                    skeleton.asset_id()
                );
            }
        } else {
            log::warn!("No hand bones resolved against {}", skeleton.asset_id());
        }

        resolved
    }

    /// True when the table must be rebuilt for `skeleton`
    pub fn needs_rebuild<S: SkeletonQuery + ?Sized>(&self, skeleton: &S) -> bool {
        !self.initialized || self.last_asset_id.as_deref() != Some(skeleton.asset_id())
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Drop resolution state so the next bind rebuilds the table
    pub fn invalidate(&mut self) {
        self.initialized = false;
        self.last_asset_id = None;
        self.adjustment = Quat::IDENTITY;
    }

    /// Entry whose resolved target index equals `target_index`.
    /// Parents are looked up by target index, never by catalog bone.
    pub fn entry_for_target(&self, target_index: usize) -> Option<&BoneMappingEntry> {
        self.entries
            .iter()
            .find(|entry| entry.target_index == Some(target_index))
    }

    pub fn entry_for_bone(&self, bone: BoneId) -> Option<&BoneMappingEntry> {
        self.entries.iter().find(|entry| entry.catalog_bone == bone)
    }

    /// Resolved target index of a catalog bone
    pub fn target_index_of(&self, bone: BoneId) -> Option<usize> {
        self.entry_for_bone(bone).and_then(|entry| entry.target_index)
    }

    /// Every mapped parent appears before its children
    pub fn is_topologically_ordered(&self) -> bool {
        self.entries.iter().enumerate().all(|(position, entry)| {
            entry
                .parent_index
                .and_then(|parent| {
                    self.entries
                        .iter()
                        .position(|other| other.target_index == Some(parent))
                })
                .map_or(true, |parent_position| parent_position < position)
        })
    }

    /// Whether `bone` takes the root correction instead of the per-bone one
    pub fn is_root_like(&self, bone: BoneId) -> bool {
        bone == BoneId::Root || (self.merge_root_and_wrist && bone == BoneId::Wrist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::BoneTransform;
    use crate::skeleton::{ReferenceSkeleton, SkeletonBone};

    fn chain(asset_id: &str, names: &[(&str, Option<usize>)]) -> ReferenceSkeleton {
        let bones = names
            .iter()
            .map(|(name, parent)| SkeletonBone {
                name: (*name).to_string(),
                parent: *parent,
                local: BoneTransform::IDENTITY,
            })
            .collect();
        ReferenceSkeleton::new(asset_id, bones).unwrap()
    }

    #[test]
    fn test_humanoid_defaults_use_side_delimiter() {
        let right = MappingTable::with_defaults(SkeletonConvention::Humanoid, HandSide::Right, false);
        assert!(right.merge_root_and_wrist);
        assert_eq!(right.entries.len(), 16);
        assert_eq!(right.entries[0].target_name, "hand_r");
        assert_eq!(right.entry_for_bone(BoneId::Index1).unwrap().target_name, "index_01_r");
        assert_eq!(right.entry_for_bone(BoneId::Thumb0).unwrap().target_name, "thumb_01_r");
        assert!(right.entry_for_bone(BoneId::Index0).is_none());

        let left = MappingTable::with_defaults(SkeletonConvention::Humanoid, HandSide::Left, false);
        assert_eq!(left.entry_for_bone(BoneId::Pinky3).unwrap().target_name, "pinky_03_l");
    }

    #[test]
    fn test_source_native_defaults_cover_catalog() {
        let table = MappingTable::with_defaults(SkeletonConvention::SourceNative, HandSide::Left, false);
        assert!(!table.merge_root_and_wrist);
        assert_eq!(table.entries.len(), BoneId::COUNT);
        assert_eq!(table.entries[0].target_name, "Root");
        assert_eq!(table.entry_for_bone(BoneId::Index0).unwrap().target_name, "finger_index_meta_l");
        assert_eq!(table.entry_for_bone(BoneId::Index4).unwrap().target_name, "finger_index_l_end");
        assert_eq!(table.entry_for_bone(BoneId::AuxRing).unwrap().target_name, "finger_ring_l_aux");
    }

    #[test]
    fn test_skip_root_bone() {
        let native = MappingTable::with_defaults(SkeletonConvention::SourceNative, HandSide::Right, true);
        assert!(native.entry_for_bone(BoneId::Root).is_none());
        assert!(native.entry_for_bone(BoneId::Wrist).is_some());

        let humanoid = MappingTable::with_defaults(SkeletonConvention::Humanoid, HandSide::Right, true);
        assert!(humanoid.entry_for_bone(BoneId::Wrist).is_none());
        assert_eq!(humanoid.entries.len(), 15);
    }

    #[test]
    fn test_resolve_keeps_unresolved_entries() {
        let skeleton = chain(
            "rig_a",
            &[("hand_r", None), ("index_01_r", Some(0)), ("index_02_r", Some(1))],
        );
        let mut table = MappingTable::with_defaults(SkeletonConvention::Humanoid, HandSide::Right, false);

        assert_eq!(table.resolve(&skeleton), 3);
        assert!(table.is_initialized());
        assert_eq!(table.entries.len(), 16);
        assert_eq!(table.target_index_of(BoneId::Index2), Some(2));
        assert_eq!(table.entry_for_bone(BoneId::Index2).unwrap().parent_index, Some(1));
        assert!(!table.entry_for_bone(BoneId::Middle1).unwrap().is_resolved());
        assert_eq!(table.entry_for_target(1).unwrap().catalog_bone, BoneId::Index1);
        assert!(table.is_topologically_ordered());
    }

    #[test]
    fn test_no_matching_bones_stays_uninitialized() {
        let skeleton = chain("unrelated", &[("spine", None), ("head", Some(0))]);
        let mut table = MappingTable::with_defaults(SkeletonConvention::Humanoid, HandSide::Right, false);
        assert_eq!(table.resolve(&skeleton), 0);
        assert!(!table.is_initialized());
        assert!(table.needs_rebuild(&skeleton));
    }

    #[test]
    fn test_rebuild_on_asset_change() {
        let a = chain("rig_a", &[("hand_r", None)]);
        let b = chain("rig_b", &[("hand_r", None)]);
        let mut table = MappingTable::with_defaults(SkeletonConvention::Humanoid, HandSide::Right, false);

        assert!(table.needs_rebuild(&a));
        table.resolve(&a);
        assert!(!table.needs_rebuild(&a));
        assert!(table.needs_rebuild(&b));
    }

    #[test]
    fn test_parent_lookup_is_by_target_index() {
        // A rig where the ring finger hangs off the middle finger's proximal
        // bone: the catalog treats them as unrelated, the rig does not.
        let skeleton = chain(
            "odd_rig",
            &[("hand_r", None), ("middle_01_r", Some(0)), ("ring_01_r", Some(1))],
        );
        let mut table = MappingTable::with_defaults(SkeletonConvention::Humanoid, HandSide::Right, false);
        table.resolve(&skeleton);

        let ring = table.entry_for_bone(BoneId::Ring1).unwrap();
        let parent = table.entry_for_target(ring.parent_index.unwrap()).unwrap();
        assert_eq!(parent.catalog_bone, BoneId::Middle1);
    }

    #[test]
    fn test_explicit_mapping_from_json() {
        let json = r#"{
            "entries": [
                { "catalog_bone": "Wrist", "target_name": "RightHand" },
                { "catalog_bone": "Index1", "target_name": "RightHandIndex1" }
            ],
            "merge_root_and_wrist": true,
            "side": "Right"
        }"#;
        let table: MappingTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.entries.len(), 2);
        assert!(!table.is_initialized());
        assert_eq!(table.adjustment, Quat::IDENTITY);
    }
}
