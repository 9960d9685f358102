//! Static hand pose ("gesture") recognition from finger curl and splay values.
//!
//! A `GestureLibrary` is an ordered list of templates; the first template
//! whose every channel is within its threshold of the live value wins. Each
//! hand keeps its own `ActiveGestureState` and emits an `Ended` event for the
//! old gesture before a `Detected` event for the new one.

use crate::bone::HandSide;
use crate::error::{Error, Result};
use crate::frame::{FingerSummary, TrackingLevel};
use crate::hand_constants::{
    CHANNEL_VALUE_MAX, CHANNEL_VALUE_MIN, CURL_CHANNEL_COUNT, DEFAULT_GESTURE_THRESHOLD,
    MAX_GESTURE_CHANNELS, SPLAY_CHANNEL_COUNT,
};
use serde::{Deserialize, Serialize};

/// Library shipped with the crate
const BUILTIN_LIBRARY: &str = include_str!("../assets/gestures/default.json");

// ============================================================================
// Channels
// ============================================================================

/// One curl or splay channel of the finger summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerChannel {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
    SplayThumbIndex,
    SplayIndexMiddle,
    SplayMiddleRing,
    SplayRingPinky,
}

impl FingerChannel {
    pub const CURLS: [FingerChannel; CURL_CHANNEL_COUNT] = [
        FingerChannel::Thumb,
        FingerChannel::Index,
        FingerChannel::Middle,
        FingerChannel::Ring,
        FingerChannel::Pinky,
    ];

    pub const SPLAYS: [FingerChannel; SPLAY_CHANNEL_COUNT] = [
        FingerChannel::SplayThumbIndex,
        FingerChannel::SplayIndexMiddle,
        FingerChannel::SplayMiddleRing,
        FingerChannel::SplayRingPinky,
    ];

    pub const fn is_splay(self) -> bool {
        matches!(
            self,
            FingerChannel::SplayThumbIndex
                | FingerChannel::SplayIndexMiddle
                | FingerChannel::SplayMiddleRing
                | FingerChannel::SplayRingPinky
        )
    }

    /// Index into the curl or splay array, depending on `is_splay`
    pub const fn slot(self) -> usize {
        match self {
            FingerChannel::Thumb | FingerChannel::SplayThumbIndex => 0,
            FingerChannel::Index | FingerChannel::SplayIndexMiddle => 1,
            FingerChannel::Middle | FingerChannel::SplayMiddleRing => 2,
            FingerChannel::Ring | FingerChannel::SplayRingPinky => 3,
            FingerChannel::Pinky => 4,
        }
    }

    /// Live value of this channel, if the summary carries it
    pub fn read(self, summary: &FingerSummary) -> Option<f32> {
        if self.is_splay() {
            summary.splays.get(self.slot()).copied()
        } else {
            summary.curls.get(self.slot()).copied()
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FingerChannel::Thumb => "thumb",
            FingerChannel::Index => "index",
            FingerChannel::Middle => "middle",
            FingerChannel::Ring => "ring",
            FingerChannel::Pinky => "pinky",
            FingerChannel::SplayThumbIndex => "splay_thumb_index",
            FingerChannel::SplayIndexMiddle => "splay_index_middle",
            FingerChannel::SplayMiddleRing => "splay_middle_ring",
            FingerChannel::SplayRingPinky => "splay_ring_pinky",
        }
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Target value of one channel and how far the live value may stray
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FingerValue {
    pub channel: FingerChannel,
    pub value: f32,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_threshold() -> f32 {
    DEFAULT_GESTURE_THRESHOLD
}

impl FingerValue {
    pub fn new(channel: FingerChannel, value: f32) -> Self {
        Self {
            channel,
            value,
            threshold: DEFAULT_GESTURE_THRESHOLD,
        }
    }

    pub fn with_threshold(self, threshold: f32) -> Self {
        Self { threshold, ..self }
    }

    #[inline]
    fn accepts(&self, live: f32) -> bool {
        (live - self.value).abs() <= self.threshold
    }
}

/// A named static hand pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureTemplate {
    pub name: String,
    /// Ignore splay channels even when they are present
    #[serde(default)]
    pub curl_only: bool,
    pub values: Vec<FingerValue>,
}

impl GestureTemplate {
    pub fn new(name: impl Into<String>, curl_only: bool, values: Vec<FingerValue>) -> Self {
        Self {
            name: name.into(),
            curl_only,
            values,
        }
    }

    /// Capture the live pose with the default threshold on every channel
    pub fn record(name: impl Into<String>, summary: &FingerSummary, curl_only: bool) -> Self {
        let curls = FingerChannel::CURLS
            .iter()
            .zip(&summary.curls)
            .map(|(channel, value)| FingerValue::new(*channel, *value));

        let splays = FingerChannel::SPLAYS
            .iter()
            .zip(&summary.splays)
            .filter(|_| !curl_only)
            .map(|(channel, value)| FingerValue::new(*channel, *value));

        Self::new(name, curl_only, curls.chain(splays).collect())
    }

    pub fn curl_count(&self) -> usize {
        self.values.iter().filter(|v| !v.channel.is_splay()).count()
    }

    pub fn splay_count(&self) -> usize {
        self.values.iter().filter(|v| v.channel.is_splay()).count()
    }

    /// Whether matching this template needs splay data
    pub fn needs_splay(&self) -> bool {
        !self.curl_only && self.splay_count() > 0
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(Error::InvalidGesture(format!("{}: {}", self.name, reason)));

        if self.name.trim().is_empty() {
            return Err(Error::InvalidGesture("template has an empty name".into()));
        }
        if self.values.is_empty() || self.values.len() > MAX_GESTURE_CHANNELS {
            return fail(format!(
                "expected 1..={} channels, got {}",
                MAX_GESTURE_CHANNELS,
                self.values.len()
            ));
        }

        for (i, value) in self.values.iter().enumerate() {
            if !(0.0..=1.0).contains(&value.threshold) {
                return fail(format!(
                    "{} threshold {} outside [0, 1]",
                    value.channel.as_str(),
                    value.threshold
                ));
            }
            if !(CHANNEL_VALUE_MIN..=CHANNEL_VALUE_MAX).contains(&value.value) {
                return fail(format!(
                    "{} value {} outside [{}, {}]",
                    value.channel.as_str(),
                    value.value,
                    CHANNEL_VALUE_MIN,
                    CHANNEL_VALUE_MAX
                ));
            }
            if self.curl_only && value.channel.is_splay() {
                return fail(format!("curl-only template carries {}", value.channel.as_str()));
            }
            if self.values[..i].iter().any(|v| v.channel == value.channel) {
                return fail(format!("duplicate channel {}", value.channel.as_str()));
            }
        }

        Ok(())
    }

    /// Whether this template can be evaluated against the live data at all.
    ///
    /// Only curl channels are counted against the live data. Splay channels
    /// gate on the tracking level instead, and a capable level that sent no
    /// splays this frame falls back to matching the curls alone.
    fn is_applicable(&self, summary: &FingerSummary, level: TrackingLevel) -> bool {
        if self.curl_count() > summary.curls.len() {
            return false;
        }
        if self.needs_splay() && !level.supports_splay() {
            return false;
        }
        true
    }

    /// Every considered channel is within threshold of the live value
    pub fn matches(&self, summary: &FingerSummary) -> bool {
        let use_splays = !self.curl_only && summary.has_splays();

        self.values
            .iter()
            .filter(|v| use_splays || !v.channel.is_splay())
            .all(|v| v.channel.read(summary).is_some_and(|live| v.accepts(live)))
    }
}

// ============================================================================
// Library
// ============================================================================

/// Ordered gesture templates; earlier templates take priority
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GestureLibrary {
    pub gestures: Vec<GestureTemplate>,
}

impl GestureLibrary {
    pub fn new(gestures: Vec<GestureTemplate>) -> Self {
        Self { gestures }
    }

    /// Parse and validate a library
    pub fn from_json(json: &str) -> Result<Self> {
        let library: GestureLibrary = serde_json::from_str(json)?;
        for gesture in &library.gestures {
            gesture.validate()?;
        }
        Ok(library)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The library bundled in `assets/gestures/default.json`
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_LIBRARY)
    }

    /// Append a template, replacing one with the same name in place
    pub fn insert(&mut self, template: GestureTemplate) -> Result<()> {
        template.validate()?;
        match self.gestures.iter_mut().find(|g| g.name == template.name) {
            Some(existing) => *existing = template,
            None => self.gestures.push(template),
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<GestureTemplate> {
        let index = self.gestures.iter().position(|g| g.name == name)?;
        Some(self.gestures.remove(index))
    }

    pub fn len(&self) -> usize {
        self.gestures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gestures.is_empty()
    }

    /// Index of the first template matching the live data
    pub fn find_match(&self, summary: &FingerSummary, level: TrackingLevel) -> Option<usize> {
        self.gestures.iter().position(|gesture| {
            if !gesture.is_applicable(summary, level) {
                log::trace!("Gesture {} not applicable to live data", gesture.name);
                return false;
            }
            gesture.matches(summary)
        })
    }
}

// ============================================================================
// Events and state
// ============================================================================

/// Transition events, in the order they fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GestureEvent {
    /// A new gesture became active
    Detected {
        name: String,
        index: usize,
        side: HandSide,
    },
    /// The previously active gesture stopped matching
    Ended {
        name: String,
        index: usize,
        side: HandSide,
    },
}

impl GestureEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detected { .. } => "detected",
            Self::Ended { .. } => "ended",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Detected { name, .. } | Self::Ended { name, .. } => name,
        }
    }
}

/// Outcome of one detection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureStatus {
    NoMatch,
    Unchanged,
    Changed,
}

/// Last matched gesture of one hand
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveGestureState {
    pub name: Option<String>,
    pub index: Option<usize>,
}

impl ActiveGestureState {
    pub fn is_active(&self) -> bool {
        self.name.is_some()
    }

    fn take_ended(&mut self, side: HandSide) -> Option<GestureEvent> {
        let name = self.name.take()?;
        let index = self.index.take().unwrap_or_default();
        Some(GestureEvent::Ended { name, index, side })
    }
}

/// Result of `GestureMatcher::detect`
#[derive(Debug, Clone, PartialEq)]
pub struct GestureDetection {
    pub status: GestureStatus,
    pub events: Vec<GestureEvent>,
}

impl GestureDetection {
    fn no_match() -> Self {
        Self {
            status: GestureStatus::NoMatch,
            events: Vec::new(),
        }
    }
}

/// Per-hand gesture state machine: Idle <-> Matched(name)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureMatcher {
    pub side: HandSide,
    pub state: ActiveGestureState,
}

impl GestureMatcher {
    pub fn new(side: HandSide) -> Self {
        Self {
            side,
            state: ActiveGestureState::default(),
        }
    }

    /// Match one frame of finger data and update the active gesture.
    ///
    /// An empty library or a frame without curl data is a no-op.
    pub fn detect(
        &mut self,
        library: &GestureLibrary,
        summary: &FingerSummary,
        level: TrackingLevel,
    ) -> GestureDetection {
        if library.is_empty() || summary.curls.is_empty() {
            return GestureDetection::no_match();
        }

        let Some(index) = library.find_match(summary, level) else {
            let events: Vec<GestureEvent> = self.state.take_ended(self.side).into_iter().collect();
            if let Some(event) = events.first() {
                log::debug!("{:?} gesture ended: {}", self.side, event.name());
            }
            return GestureDetection {
                status: GestureStatus::NoMatch,
                events,
            };
        };

        let name = &library.gestures[index].name;
        if self.state.name.as_deref() == Some(name.as_str()) {
            self.state.index = Some(index);
            return GestureDetection {
                status: GestureStatus::Unchanged,
                events: Vec::new(),
            };
        }

        let mut events = Vec::with_capacity(2);
        events.extend(self.state.take_ended(self.side));
        events.push(GestureEvent::Detected {
            name: name.clone(),
            index,
            side: self.side,
        });
        log::debug!("{:?} gesture detected: {}", self.side, name);

        self.state = ActiveGestureState {
            name: Some(name.clone()),
            index: Some(index),
        };

        GestureDetection {
            status: GestureStatus::Changed,
            events,
        }
    }

    /// Forget the active gesture without firing events
    pub fn reset(&mut self) {
        self.state = ActiveGestureState::default();
    }
}
