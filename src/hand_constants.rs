//! Shared hand-tracking constants used by both build.rs and runtime code.
//!
//! This module is included by both the build script and the gesture module
//! so the compile-time asset validation and the runtime matcher agree on
//! channel layout and limits.

// Some constants are only used by build.rs for validation
#![allow(dead_code)]

/// Number of per-finger curl channels (thumb, index, middle, ring, pinky)
pub const CURL_CHANNEL_COUNT: usize = 5;

/// Number of splay channels (thumb/index, index/middle, middle/ring, ring/pinky)
pub const SPLAY_CHANNEL_COUNT: usize = 4;

/// Maximum number of channels a gesture template may carry
pub const MAX_GESTURE_CHANNELS: usize = CURL_CHANNEL_COUNT + SPLAY_CHANNEL_COUNT;

/// Threshold given to freshly recorded gesture channels
pub const DEFAULT_GESTURE_THRESHOLD: f32 = 0.1;

/// Curl and splay values are normalized into this closed range
pub const CHANNEL_VALUE_MIN: f32 = -1.0;
pub const CHANNEL_VALUE_MAX: f32 = 1.0;

/// Default corrective rotation from tracking bone space to target bone space,
/// as (yaw, pitch, roll) in degrees.
pub const DEFAULT_ADDITION_YAW_PITCH_ROLL_DEG: [f32; 3] = [90.0, 0.0, 90.0];

/// Default replication rate for skeletal data (updates per second)
pub const DEFAULT_REPLICATION_RATE_HZ: f32 = 30.0;

/// Number of transforms carried by a reduced ("hard transforms") replication
/// payload: wrist, thumb 0-2 and joints 0-3 of the four fingers.
pub const REPLICATED_BONE_COUNT: usize = 20;
