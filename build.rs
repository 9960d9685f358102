//! Build script for gesture library validation
//!
//! This script runs at compile time and validates every gesture library JSON
//! file shipped under `assets/gestures` so that thresholds, channel values and
//! template names are sane before the runtime ever loads them.

// Include the shared hand constants
#[path = "src/hand_constants.rs"]
mod hand_constants;

use hand_constants::{CHANNEL_VALUE_MAX, CHANNEL_VALUE_MIN, MAX_GESTURE_CHANNELS};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// One channel of a gesture template from JSON
#[derive(Debug, Deserialize)]
struct FingerValue {
    channel: String,
    value: f32,
    threshold: f32,
}

#[derive(Debug, Deserialize)]
struct Gesture {
    name: String,
    #[serde(default)]
    curl_only: bool,
    values: Vec<FingerValue>,
}

#[derive(Debug, Deserialize)]
struct GestureLibrary {
    gestures: Vec<Gesture>,
}

/// Validate a single template, returning one message per problem
fn validate_gesture(gesture: &Gesture) -> Vec<String> {
    let mut errors = Vec::new();

    if gesture.name.trim().is_empty() {
        errors.push("  template has an empty name".to_string());
    }

    if gesture.values.is_empty() || gesture.values.len() > MAX_GESTURE_CHANNELS {
        errors.push(format!(
            "  {} channels: expected 1..={}, got {}",
            gesture.name,
            MAX_GESTURE_CHANNELS,
            gesture.values.len()
        ));
    }

    for value in &gesture.values {
        if !(0.0..=1.0).contains(&value.threshold) {
            errors.push(format!(
                "  {} / {}: threshold {:.3} outside [0, 1]",
                gesture.name, value.channel, value.threshold
            ));
        }
        if !(CHANNEL_VALUE_MIN..=CHANNEL_VALUE_MAX).contains(&value.value) {
            errors.push(format!(
                "  {} / {}: value {:.3} outside [{}, {}]",
                gesture.name, value.channel, value.value, CHANNEL_VALUE_MIN, CHANNEL_VALUE_MAX
            ));
        }
        if gesture.curl_only && value.channel.starts_with("splay") {
            errors.push(format!(
                "  {} is curl-only but carries splay channel {}",
                gesture.name, value.channel
            ));
        }
    }

    errors
}

/// Validate a gesture library file
fn validate_library_file(path: &Path) -> Result<(), String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    let library: GestureLibrary = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;

    let mut all_errors = Vec::new();
    let mut seen = HashSet::new();

    for (i, gesture) in library.gestures.iter().enumerate() {
        if !seen.insert(gesture.name.as_str()) {
            all_errors.push(format!("Template {}: duplicate name {}", i, gesture.name));
        }

        let errors = validate_gesture(gesture);
        if !errors.is_empty() {
            all_errors.push(format!("Template {} ({}):\n{}", i, gesture.name, errors.join("\n")));
        }
    }

    if all_errors.is_empty() {
        println!(
            "cargo:warning=✓ {} validated ({} gestures)",
            path.display(),
            library.gestures.len()
        );
        Ok(())
    } else {
        Err(format!(
            "Gesture library {} is invalid:\n{}",
            path.display(),
            all_errors.join("\n\n")
        ))
    }
}

fn main() {
    let gesture_dir = Path::new("assets/gestures");

    // Rerun if shared constants change
    println!("cargo:rerun-if-changed=src/hand_constants.rs");

    if !gesture_dir.exists() {
        println!("cargo:warning=Gesture directory not found, skipping validation");
        return;
    }

    let mut has_errors = false;

    if let Ok(entries) = fs::read_dir(gesture_dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                println!("cargo:rerun-if-changed={}", path.display());

                if let Err(e) = validate_library_file(&path) {
                    println!("cargo:warning=VALIDATION ERROR: {}", e);
                    has_errors = true;
                }
            }
        }
    }

    if has_errors {
        panic!("Gesture validation failed! Fix the templates in assets/gestures.");
    }

    println!("cargo:rerun-if-changed={}", gesture_dir.display());
}
