//! End-to-end: bind a rig, drive it from tracked and estimated frames,
//! detect gestures and ship the hand to a peer.

use handbind::gesture::{GestureEvent, GestureStatus};
use handbind::{
    BoneId, EvaluationMode, EvaluationPolicy, FingerSummary, HandFrame, HandSession, HandSide,
    NodeSettings, PoseBuffer, ReferencePose, ReferenceSkeleton, ReplicationMode,
    ReplicationSettings, SourceFrame, TrackingLevel, Vec3,
};

const RIG: &str = include_str!("../assets/skeletons/humanoid_hand_r.json");

fn session() -> HandSession {
    let skeleton = ReferenceSkeleton::from_json(RIG).expect("rig asset loads");
    HandSession::new(NodeSettings::default(), skeleton).expect("session builds")
}

fn tracked(pose: &ReferencePose, curl: f32) -> HandFrame {
    HandFrame {
        side: HandSide::Right,
        bones: pose.frame.to_component_space(),
        fingers: FingerSummary::from_curls([curl; 5]).with_splays([0.0; 4]),
        tracking_level: TrackingLevel::Full,
        valid: true,
    }
}

fn index_tip_reach(session: &HandSession) -> f32 {
    let pose = &session.pose;
    let wrist = session.node.mapping().target_index_of(BoneId::Wrist).unwrap();
    let tip = session.node.mapping().target_index_of(BoneId::Index3).unwrap();
    pose.component_transform(tip)
        .translation
        .distance(pose.component_transform(wrist).translation)
}

#[test]
fn test_binding_resolves_every_rig_bone() {
    let s = session();
    assert!(s.node.is_valid_to_evaluate());
    assert_eq!(s.node.mode(), EvaluationMode::DeformingModelSpace);
    assert!(s.node.mapping().is_topologically_ordered());
    assert!(s.node.mapping().entries.iter().all(|entry| entry.is_resolved()));
}

#[test]
fn test_fist_pulls_fingertips_in() {
    let open = ReferencePose::open_hand().unwrap();
    let fist = ReferencePose::fist().unwrap();
    let mut s = session();

    s.push_frame(tracked(&open, 0.0));
    s.evaluate(1.0);
    let open_reach = index_tip_reach(&s);

    s.push_frame(tracked(&fist, 1.0));
    s.evaluate(1.0);
    let fist_reach = index_tip_reach(&s);

    assert!(
        fist_reach < open_reach,
        "fist reach {} should be shorter than open reach {}",
        fist_reach,
        open_reach
    );
}

#[test]
fn test_rigid_mesh_keeps_bind_translations() {
    let fist = ReferencePose::fist().unwrap();
    let mut s = session();
    s.set_policy(EvaluationPolicy {
        allow_deforming_mesh: false,
        ..EvaluationPolicy::default()
    });
    assert_eq!(s.node.mode(), EvaluationMode::RigidModelSpace);

    s.push_frame(tracked(&fist, 1.0));
    s.evaluate(1.0);

    let bind = handbind::ComponentPose::from_skeleton(&s.skeleton);
    for (posed, rest) in s.pose.transforms().iter().zip(bind.transforms()) {
        assert!(posed.translation.abs_diff_eq(rest.translation, 1e-6));
    }
}

#[test]
fn test_zero_alpha_keeps_bind_pose() {
    let fist = ReferencePose::fist().unwrap();
    let mut s = session();
    s.push_frame(tracked(&fist, 1.0));
    s.evaluate(0.0);

    let bind = handbind::ComponentPose::from_skeleton(&s.skeleton);
    assert_eq!(s.pose, bind);
}

#[test]
fn test_gesture_sequence() {
    let mut s = session();

    s.push_frame(HandFrame {
        side: HandSide::Right,
        bones: SourceFrame::empty(),
        fingers: FingerSummary::from_curls([1.0; 5]),
        tracking_level: TrackingLevel::Estimated,
        valid: true,
    });
    let first = s.detect_gesture();
    assert_eq!(first.status, GestureStatus::Changed);
    assert_eq!(first.events.len(), 1);
    assert!(matches!(&first.events[0], GestureEvent::Detected { name, side: HandSide::Right, .. } if name == "Fist"));

    assert_eq!(s.detect_gesture().status, GestureStatus::Unchanged);

    let relaxed = HandFrame {
        fingers: FingerSummary::from_curls([0.5; 5]),
        ..s.latest.clone()
    };
    s.push_frame(relaxed);
    let gone = s.detect_gesture();
    assert_eq!(gone.status, GestureStatus::NoMatch);
    assert!(matches!(&gone.events[..], [GestureEvent::Ended { name, .. }] if name == "Fist"));
    assert!(!s.matcher.state.is_active());
}

#[test]
fn test_replicated_hand_drives_remote_rig() {
    let open = ReferencePose::open_hand().unwrap();
    let fist = ReferencePose::fist().unwrap();
    let settings = ReplicationSettings {
        mode: ReplicationMode::HardTransforms,
        rate_hz: 20.0,
        smoothing: false,
    };

    let mut local = session();
    local.smoother.set_settings(settings);
    let mut remote = session();
    remote.smoother.set_settings(settings);

    local.push_frame(HandFrame {
        bones: open.frame.clone(),
        ..tracked(&open, 0.0)
    });
    assert!(remote.receive(&local.replicate(), None).unwrap());

    local.push_frame(HandFrame {
        bones: fist.frame.clone(),
        ..tracked(&fist, 1.0)
    });
    assert!(remote.receive(&local.replicate(), None).unwrap());

    // Smoothing is off: the new frame shows up immediately
    let shown = remote.latest.bones.bone(BoneId::Middle2).unwrap();
    let sent = fist.frame.bone(BoneId::Middle2).unwrap();
    assert!(shown.abs_diff_eq(sent, 2e-3));

    let pairs = remote.evaluate(1.0);
    assert_eq!(pairs.len(), remote.node.mapping().entries.len());
}

#[test]
fn test_curl_replication_estimates_on_the_far_side() {
    let mut local = session();
    local.smoother.set_settings(ReplicationSettings {
        mode: ReplicationMode::CurlAndSplay,
        ..ReplicationSettings::default()
    });
    local.push_frame(HandFrame {
        side: HandSide::Right,
        bones: SourceFrame::identity(),
        fingers: FingerSummary::from_curls([0.0, 1.0, 1.0, 1.0, 1.0]).with_splays([0.2; 4]),
        tracking_level: TrackingLevel::Full,
        valid: true,
    });

    let mut remote = session();
    assert!(remote.receive(&local.replicate(), None).unwrap());
    assert!(remote.latest.bones.is_empty());
    assert_eq!(remote.latest.fingers.splays.len(), 4);

    let frame = remote.effective_frame();
    let open = ReferencePose::open_hand().unwrap().frame.to_component_space();
    let fist = ReferencePose::fist().unwrap().frame.to_component_space();
    let reach = |frame: &SourceFrame, bone: BoneId| {
        frame.bone(bone).unwrap().translation.distance(Vec3::ZERO)
    };
    assert!((reach(&frame, BoneId::Thumb2) - reach(&open, BoneId::Thumb2)).abs() < 1e-3);
    assert!((reach(&frame, BoneId::Index3) - reach(&fist, BoneId::Index3)).abs() < 1e-3);
}

#[test]
fn test_truncated_payload_is_rejected() {
    let mut local = session();
    local.push_frame(HandFrame {
        side: HandSide::Right,
        bones: SourceFrame::identity(),
        fingers: FingerSummary::from_curls([0.3; 5]),
        tracking_level: TrackingLevel::Partial,
        valid: true,
    });
    let bytes = local.replicate();

    let mut remote = session();
    assert!(remote.receive(&bytes[..bytes.len() - 1], None).is_err());
    assert!(!remote.latest.valid);
}
