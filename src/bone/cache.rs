use crate::math::BoneTransform;

/// Transforms already finished during one evaluation pass, keyed by target
/// bone index.
///
/// Children read their parent's corrected transform from here instead of the
/// pose buffer, which may still hold last frame's value. Lives for one
/// evaluation call only.
#[derive(Debug, Clone, Default)]
pub struct ParentCache {
    slots: Vec<Option<BoneTransform>>,
}

impl ParentCache {
    /// Create a cache sized for a pose with `bone_count` bones
    pub fn with_bone_count(bone_count: usize) -> Self {
        Self {
            slots: vec![None; bone_count],
        }
    }

    /// Record the finished transform of `target_index`
    pub fn insert(&mut self, target_index: usize, transform: BoneTransform) {
        if target_index >= self.slots.len() {
            self.slots.resize(target_index + 1, None);
        }
        self.slots[target_index] = Some(transform);
    }

    #[inline]
    pub fn get(&self, target_index: usize) -> Option<&BoneTransform> {
        self.slots.get(target_index).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;

    #[test]
    fn test_insert_and_overwrite() {
        let mut cache = ParentCache::with_bone_count(3);
        assert_eq!(cache.get(1), None);

        cache.insert(1, BoneTransform::from_translation(Vec3::X));
        cache.insert(1, BoneTransform::from_translation(Vec3::Y));
        assert_eq!(cache.get(1).map(|t| t.translation), Some(Vec3::Y));
        assert_eq!(cache.get(0), None);
    }

    #[test]
    fn test_grows_past_initial_size() {
        let mut cache = ParentCache::with_bone_count(2);
        cache.insert(9, BoneTransform::IDENTITY);
        assert_eq!(cache.get(9), Some(&BoneTransform::IDENTITY));
        assert_eq!(cache.get(42), None);

        // Default cache has no slots until written
        let mut empty = ParentCache::default();
        assert_eq!(empty.get(0), None);
        empty.insert(0, BoneTransform::IDENTITY);
        assert!(empty.get(0).is_some());
    }
}
