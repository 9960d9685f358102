use serde::{Deserialize, Serialize};

/// Which physical hand a stream, mapping or gesture state belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HandSide {
    Left,
    #[default]
    Right,
}

impl HandSide {
    /// Delimiter used when formatting side-specific bone names
    pub const fn delimiter(self) -> &'static str {
        match self {
            HandSide::Left => "l",
            HandSide::Right => "r",
        }
    }

    pub const fn opposite(self) -> HandSide {
        match self {
            HandSide::Left => HandSide::Right,
            HandSide::Right => HandSide::Left,
        }
    }

    pub const fn as_bit(self) -> u8 {
        match self {
            HandSide::Left => 0,
            HandSide::Right => 1,
        }
    }

    pub const fn from_bit(bit: u8) -> HandSide {
        if bit & 1 == 0 {
            HandSide::Left
        } else {
            HandSide::Right
        }
    }
}

/// The five digits, in curl-channel order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Finger {
    Thumb = 0,
    Index = 1,
    Middle = 2,
    Ring = 3,
    Pinky = 4,
}

impl Finger {
    pub const COUNT: usize = 5;

    pub const ALL: [Finger; Self::COUNT] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Catalog bones of this finger from the base outwards, tip included.
    /// The thumb has no metacarpal so it carries four joints instead of five.
    pub const fn joints(self) -> &'static [BoneId] {
        match self {
            Finger::Thumb => &[BoneId::Thumb0, BoneId::Thumb1, BoneId::Thumb2, BoneId::Thumb3],
            Finger::Index => &[
                BoneId::Index0,
                BoneId::Index1,
                BoneId::Index2,
                BoneId::Index3,
                BoneId::Index4,
            ],
            Finger::Middle => &[
                BoneId::Middle0,
                BoneId::Middle1,
                BoneId::Middle2,
                BoneId::Middle3,
                BoneId::Middle4,
            ],
            Finger::Ring => &[
                BoneId::Ring0,
                BoneId::Ring1,
                BoneId::Ring2,
                BoneId::Ring3,
                BoneId::Ring4,
            ],
            Finger::Pinky => &[
                BoneId::Pinky0,
                BoneId::Pinky1,
                BoneId::Pinky2,
                BoneId::Pinky3,
                BoneId::Pinky4,
            ],
        }
    }

    /// Tip bone (no rotation of its own in tracking data)
    pub const fn tip(self) -> BoneId {
        match self {
            Finger::Thumb => BoneId::Thumb3,
            Finger::Index => BoneId::Index4,
            Finger::Middle => BoneId::Middle4,
            Finger::Ring => BoneId::Ring4,
            Finger::Pinky => BoneId::Pinky4,
        }
    }

    /// Last joint that carries real tracking data
    pub const fn last_joint(self) -> BoneId {
        match self {
            Finger::Thumb => BoneId::Thumb2,
            Finger::Index => BoneId::Index3,
            Finger::Middle => BoneId::Middle3,
            Finger::Ring => BoneId::Ring3,
            Finger::Pinky => BoneId::Pinky3,
        }
    }

    pub const fn aux(self) -> BoneId {
        match self {
            Finger::Thumb => BoneId::AuxThumb,
            Finger::Index => BoneId::AuxIndex,
            Finger::Middle => BoneId::AuxMiddle,
            Finger::Ring => BoneId::AuxRing,
            Finger::Pinky => BoneId::AuxPinky,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }
}

/// Skeleton-independent hand bone catalog.
/// Ordered exactly like the tracking runtime's per-frame array, so the
/// discriminant doubles as an index into a `SourceFrame`. Parents come
/// before children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum BoneId {
    Root = 0,
    Wrist = 1,

    // Thumb chain (no metacarpal)
    Thumb0 = 2,
    Thumb1 = 3,
    Thumb2 = 4,
    Thumb3 = 5,

    // Index chain, 0 is the metacarpal, 4 the tip
    Index0 = 6,
    Index1 = 7,
    Index2 = 8,
    Index3 = 9,
    Index4 = 10,

    Middle0 = 11,
    Middle1 = 12,
    Middle2 = 13,
    Middle3 = 14,
    Middle4 = 15,

    Ring0 = 16,
    Ring1 = 17,
    Ring2 = 18,
    Ring3 = 19,
    Ring4 = 20,

    Pinky0 = 21,
    Pinky1 = 22,
    Pinky2 = 23,
    Pinky3 = 24,
    Pinky4 = 25,

    // Auxiliary finger-tip bones, expressed relative to the wrist
    AuxThumb = 26,
    AuxIndex = 27,
    AuxMiddle = 28,
    AuxRing = 29,
    AuxPinky = 30,
}

impl BoneId {
    /// Total number of catalog bones (the sentinel "count")
    pub const COUNT: usize = 31;

    /// Convert to array index
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// All catalog bones in runtime array order
    pub const ALL: [BoneId; Self::COUNT] = [
        BoneId::Root,
        BoneId::Wrist,
        BoneId::Thumb0,
        BoneId::Thumb1,
        BoneId::Thumb2,
        BoneId::Thumb3,
        BoneId::Index0,
        BoneId::Index1,
        BoneId::Index2,
        BoneId::Index3,
        BoneId::Index4,
        BoneId::Middle0,
        BoneId::Middle1,
        BoneId::Middle2,
        BoneId::Middle3,
        BoneId::Middle4,
        BoneId::Ring0,
        BoneId::Ring1,
        BoneId::Ring2,
        BoneId::Ring3,
        BoneId::Ring4,
        BoneId::Pinky0,
        BoneId::Pinky1,
        BoneId::Pinky2,
        BoneId::Pinky3,
        BoneId::Pinky4,
        BoneId::AuxThumb,
        BoneId::AuxIndex,
        BoneId::AuxMiddle,
        BoneId::AuxRing,
        BoneId::AuxPinky,
    ];

    pub fn from_index(index: usize) -> Option<BoneId> {
        Self::ALL.get(index).copied()
    }

    /// Parent in the tracking runtime's hierarchy
    #[inline]
    pub const fn parent(self) -> Option<BoneId> {
        BONE_PARENTS[self.index()]
    }

    pub const fn finger(self) -> Option<Finger> {
        match self {
            BoneId::Thumb0
            | BoneId::Thumb1
            | BoneId::Thumb2
            | BoneId::Thumb3
            | BoneId::AuxThumb => Some(Finger::Thumb),
            BoneId::Index0
            | BoneId::Index1
            | BoneId::Index2
            | BoneId::Index3
            | BoneId::Index4
            | BoneId::AuxIndex => Some(Finger::Index),
            BoneId::Middle0
            | BoneId::Middle1
            | BoneId::Middle2
            | BoneId::Middle3
            | BoneId::Middle4
            | BoneId::AuxMiddle => Some(Finger::Middle),
            BoneId::Ring0
            | BoneId::Ring1
            | BoneId::Ring2
            | BoneId::Ring3
            | BoneId::Ring4
            | BoneId::AuxRing => Some(Finger::Ring),
            BoneId::Pinky0
            | BoneId::Pinky1
            | BoneId::Pinky2
            | BoneId::Pinky3
            | BoneId::Pinky4
            | BoneId::AuxPinky => Some(Finger::Pinky),
            BoneId::Root | BoneId::Wrist => None,
        }
    }

    /// First joint after the metacarpal on the four fingers. Rigs that fuse
    /// the metacarpal into this joint need both source transforms combined.
    pub const fn is_proximal(self) -> bool {
        matches!(
            self,
            BoneId::Index1 | BoneId::Middle1 | BoneId::Ring1 | BoneId::Pinky1
        )
    }

    pub const fn is_metacarpal(self) -> bool {
        matches!(
            self,
            BoneId::Thumb0 | BoneId::Index0 | BoneId::Middle0 | BoneId::Ring0 | BoneId::Pinky0
        )
    }

    pub const fn is_aux(self) -> bool {
        self.index() >= BoneId::AuxThumb.index()
    }
}

/// Parent table, indexed by `BoneId::index()`
pub const BONE_PARENTS: [Option<BoneId>; BoneId::COUNT] = [
    None,
    Some(BoneId::Root),
    // Thumb
    Some(BoneId::Wrist),
    Some(BoneId::Thumb0),
    Some(BoneId::Thumb1),
    Some(BoneId::Thumb2),
    // Index
    Some(BoneId::Wrist),
    Some(BoneId::Index0),
    Some(BoneId::Index1),
    Some(BoneId::Index2),
    Some(BoneId::Index3),
    // Middle
    Some(BoneId::Wrist),
    Some(BoneId::Middle0),
    Some(BoneId::Middle1),
    Some(BoneId::Middle2),
    Some(BoneId::Middle3),
    // Ring
    Some(BoneId::Wrist),
    Some(BoneId::Ring0),
    Some(BoneId::Ring1),
    Some(BoneId::Ring2),
    Some(BoneId::Ring3),
    // Pinky
    Some(BoneId::Wrist),
    Some(BoneId::Pinky0),
    Some(BoneId::Pinky1),
    Some(BoneId::Pinky2),
    Some(BoneId::Pinky3),
    // Aux
    Some(BoneId::Wrist),
    Some(BoneId::Wrist),
    Some(BoneId::Wrist),
    Some(BoneId::Wrist),
    Some(BoneId::Wrist),
];
