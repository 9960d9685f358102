//! Rigid transform primitive built on glam.
//!
//! `BoneTransform` carries translation, rotation and (possibly non-uniform)
//! scale. Composition follows glam's operator order: `parent * child` applies
//! `child` first, then `parent`.

pub use glam::{EulerRot, Quat, Vec3};

use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Small epsilon value for floating-point comparisons
pub const EPSILON: f32 = 1e-6;

/// Principal axis of the right-handed coordinate frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// Rigid transform: scale, then rotate, then translate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoneTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self {
            rotation,
            ..Self::IDENTITY
        }
    }

    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    /// Transform a point from this transform's local space into its parent's.
    #[inline]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (self.scale * point) + self.translation
    }

    /// Compose `parent` with `child`: the child's coordinates reinterpreted in
    /// the parent's frame. Equivalent to `parent * child`.
    pub fn compose(parent: &BoneTransform, child: &BoneTransform) -> BoneTransform {
        BoneTransform {
            translation: parent.transform_point(child.translation),
            rotation: parent.rotation * child.rotation,
            scale: parent.scale * child.scale,
        }
    }

    /// Inverse transform. Exact for uniform scale; for non-uniform scale the
    /// shear that a true inverse would need is dropped.
    pub fn inverse(&self) -> BoneTransform {
        let inv_rotation = self.rotation.inverse();
        let inv_scale = self.scale.recip();
        BoneTransform {
            translation: inv_scale * (inv_rotation * -self.translation),
            rotation: inv_rotation,
            scale: inv_scale,
        }
    }

    /// Re-unit the rotation to control drift after repeated composition
    pub fn normalized(self) -> BoneTransform {
        BoneTransform {
            rotation: self.rotation.normalize(),
            ..self
        }
    }

    /// Same transform with scale forced to one
    pub fn with_unit_scale(self) -> BoneTransform {
        BoneTransform {
            scale: Vec3::ONE,
            ..self
        }
    }

    /// Append `delta` to the rotation (`rotation * delta`), translation untouched
    pub fn concatenate_rotation(&mut self, delta: Quat) {
        self.rotation = self.rotation * delta;
    }

    /// Mirror across the plane spanned by two principal axes.
    ///
    /// Implemented as conjugation by a half turn about the remaining axis:
    /// the named translation components and the named quaternion vector
    /// components are negated. The result stays a proper rotation, so
    /// mirroring twice with the same pair returns the input.
    pub fn mirror(self, a: Axis, b: Axis) -> BoneTransform {
        debug_assert_ne!(a, b, "mirror needs two distinct axes");

        let mut translation = self.translation.to_array();
        let mut rotation = self.rotation.to_array();
        for axis in [a, b] {
            translation[axis.index()] = -translation[axis.index()];
            rotation[axis.index()] = -rotation[axis.index()];
        }

        BoneTransform {
            translation: Vec3::from_array(translation),
            rotation: Quat::from_array(rotation),
            scale: self.scale,
        }
    }

    /// Blend from `a` to `b` by `t` (clamped to [0, 1]).
    ///
    /// Translation and scale interpolate linearly, rotation takes the shortest
    /// arc. `t == 0` returns `a` and `t == 1` returns `b` bit for bit.
    pub fn blend(a: &BoneTransform, b: &BoneTransform, t: f32) -> BoneTransform {
        let t = t.clamp(0.0, 1.0);
        if t.is_nan() || t <= 0.0 || a == b {
            return *a;
        }
        if t >= 1.0 {
            return *b;
        }

        BoneTransform {
            translation: lerp_unless_equal(a.translation, b.translation, t),
            rotation: a.rotation.slerp(b.rotation, t),
            scale: lerp_unless_equal(a.scale, b.scale, t),
        }
    }

    /// Approximate equality, treating `q` and `-q` as the same rotation
    pub fn abs_diff_eq(&self, other: &BoneTransform, max_abs_diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
            && (self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
                || self.rotation.abs_diff_eq(-other.rotation, max_abs_diff))
    }
}

// Equal endpoints stay bit-exact instead of picking up lerp rounding
#[inline]
fn lerp_unless_equal(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    if a == b {
        a
    } else {
        a.lerp(b, t)
    }
}

impl Mul for BoneTransform {
    type Output = BoneTransform;

    #[inline]
    fn mul(self, child: BoneTransform) -> BoneTransform {
        BoneTransform::compose(&self, &child)
    }
}

/// Flat transform layout handed to JS and GPU consumers.
///
/// Layout: translation xyz, rotation xyzw, scale xyz.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedBoneTransform {
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

static_assertions::assert_eq_size!(PackedBoneTransform, [f32; 10]);

impl From<&BoneTransform> for PackedBoneTransform {
    fn from(t: &BoneTransform) -> Self {
        Self {
            translation: t.translation.to_array(),
            rotation: t.rotation.to_array(),
            scale: t.scale.to_array(),
        }
    }
}

impl From<PackedBoneTransform> for BoneTransform {
    fn from(p: PackedBoneTransform) -> Self {
        BoneTransform {
            translation: Vec3::from_array(p.translation),
            rotation: Quat::from_array(p.rotation),
            scale: Vec3::from_array(p.scale),
        }
    }
}

/// Reinterpret a packed slice as raw floats
pub fn packed_as_floats(packed: &[PackedBoneTransform]) -> &[f32] {
    bytemuck::cast_slice(packed)
}

/// Keep only the component with the largest magnitude, zeroing the other two.
///
/// Ties resolve toward the later axis, e.g. `|x| == |y|` keeps Y.
pub fn snap_to_dominant_axis(v: Vec3) -> Vec3 {
    let (ax, ay, az) = (v.x.abs(), v.y.abs(), v.z.abs());

    if ay < ax {
        if az < ax {
            Vec3::new(v.x, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 0.0, v.z)
        }
    } else if az < ay {
        Vec3::new(0.0, v.y, 0.0)
    } else {
        Vec3::new(0.0, 0.0, v.z)
    }
}

/// Euler angles in degrees for JSON authoring (more intuitive than quaternions)
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct EulerAngles {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

impl EulerAngles {
    /// Convert to quaternion (XYZ order)
    pub fn to_quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.x.to_radians(),
            self.y.to_radians(),
            self.z.to_radians(),
        )
    }

    /// Convert from quaternion (XYZ order)
    pub fn from_quat(q: Quat) -> Self {
        let (x, y, z) = q.to_euler(EulerRot::XYZ);
        Self {
            x: x.to_degrees(),
            y: y.to_degrees(),
            z: z.to_degrees(),
        }
    }
}

/// Rotation from (yaw, pitch, roll) in degrees: roll about X, then pitch about
/// Y, then yaw about Z.
pub fn quat_from_yaw_pitch_roll_deg([yaw, pitch, roll]: [f32; 3]) -> Quat {
    Quat::from_euler(
        EulerRot::ZYX,
        yaw.to_radians(),
        pitch.to_radians(),
        roll.to_radians(),
    )
}
