use approx::assert_relative_eq;
use bevy_math::Vec3;
use bevy_transform::components::Transform;
use core::time::Duration;
use test_log::test;

use autonomy::prelude::*;
use autonomy_core::config::SendRateConfig;

use crate::stepper::{FRAME_DURATION, SessionStepper};

fn walk(direction: Vec3) -> MoveInput {
    MoveInput {
        direction,
        ..Default::default()
    }
}

fn last_send(stepper: &SessionStepper, id: NetId) -> Option<f64> {
    stepper
        .character(stepper.clients[0], id)
        .simulator()
        .driver()
        .and_then(|d| d.pacing().last_send())
}

/// A character at rest for 3 seconds sends one snapshot right away, then one
/// per stationary interval
#[test]
fn test_stationary_character_send_count() {
    let config = MovementConfig {
        send: SendRateConfig {
            stationary_send_interval: 0.5,
            max_send_interval: 0.5,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut stepper = SessionStepper::new(1, config, LinkSettings::default());
    let id = stepper.session.spawn_character(stepper.clients[0], Vec3::ZERO);

    let mut sends = 0;
    let mut previous = None;
    for _ in 0..180 {
        stepper.frame_step(1);
        let current = last_send(&stepper, id);
        if current != previous {
            sends += 1;
            previous = current;
        }
    }
    assert_eq!(sends, 6);
}

#[test]
fn test_default_bounds_cap_send_count() {
    let mut stepper = SessionStepper::single();
    let id = stepper.session.spawn_character(stepper.clients[0], Vec3::ZERO);
    let mut sends = 0;
    let mut previous = None;
    for _ in 0..180 {
        stepper.frame_step(1);
        let current = last_send(&stepper, id);
        if current != previous {
            sends += 1;
            previous = current;
        }
    }
    // at rest the interval is floored by the stationary interval of 1/12s
    assert!((30..=37).contains(&sends));
}

#[test]
fn test_server_relays_to_observers() {
    let mut stepper = SessionStepper::with_clients(3);
    let owner = stepper.clients[0];
    let id = stepper.session.spawn_character(owner, Vec3::ZERO);
    stepper.session.set_input(id, walk(Vec3::X));
    stepper.advance_time(Duration::from_secs(2));
    stepper.session.set_input(id, walk(Vec3::ZERO));
    stepper.advance_time(Duration::from_secs(2));

    let target = stepper.character(owner, id).state.location;
    assert!(target.x > 500.0);
    for peer in [PeerId::Server, stepper.clients[1], stepper.clients[2]] {
        let character = stepper.character(peer, id);
        assert_relative_eq!(character.state.location.x, target.x, epsilon = 0.1);
        // smoothing finished: the character is drawn where it is
        let visual = character.visual_transform();
        assert_relative_eq!(visual.location.x, target.x, epsilon = 0.1);
        assert!(character.latest_snapshot().is_some());
    }
}

#[test]
fn test_observer_smooths_corrections() {
    let mut stepper = SessionStepper::with_clients(2);
    let owner = stepper.clients[0];
    let observer = stepper.clients[1];
    let id = stepper.session.spawn_character(owner, Vec3::ZERO);
    stepper.frame_step(10);

    // teleport the owner by less than the max smoothing distance
    stepper
        .session
        .peer_mut(owner)
        .unwrap()
        .character_mut(id)
        .unwrap()
        .state
        .location = Vec3::new(100.0, 0.0, 0.0);
    let mut visuals = Vec::new();
    for _ in 0..60 {
        stepper.frame_step(1);
        visuals.push(stepper.character(observer, id).visual_transform().location.x);
    }
    // the visual transform moved progressively instead of jumping
    assert!(visuals.iter().any(|x| *x > 1.0 && *x < 99.0));
    assert!(visuals.windows(2).all(|w| w[1] >= w[0] - 1e-3));
    let character = stepper.character(observer, id);
    assert_relative_eq!(character.visual_transform().location.x, 100.0, epsilon = 1e-2);
    assert_relative_eq!(character.state.location.x, 100.0, epsilon = 1e-2);
}

#[test]
fn test_large_teleport_snaps() {
    let mut stepper = SessionStepper::with_clients(2);
    let owner = stepper.clients[0];
    let observer = stepper.clients[1];
    let id = stepper.session.spawn_character(owner, Vec3::ZERO);
    stepper.frame_step(10);

    stepper
        .session
        .peer_mut(owner)
        .unwrap()
        .character_mut(id)
        .unwrap()
        .state
        .location = Vec3::new(1000.0, 0.0, 0.0);
    // one stationary send interval, plus the relay through the server
    stepper.frame_step(10);
    let visual = stepper.character(observer, id).visual_transform();
    assert_relative_eq!(visual.location.x, 1000.0, epsilon = 1e-2);
}

/// Under a poor connection the sequenced channel never hands a reconciler a
/// snapshot older than one it already applied
#[test]
fn test_sequenced_channel_under_poor_connection() {
    let link = LinkSettings {
        mode: ChannelMode::SequencedUnreliable,
        conditioner: Some(LinkConditionerConfig::poor_condition().with_duplication(0.1)),
        seed: 42,
    };
    let mut stepper = SessionStepper::new(2, MovementConfig::default(), link);
    let owner = stepper.clients[0];
    let id = stepper.session.spawn_character(owner, Vec3::ZERO);
    stepper.session.set_input(id, walk(Vec3::X));

    let mut last_seen = [f32::MIN; 2];
    for _ in 0..240 {
        stepper.frame_step(1);
        for (i, peer) in [PeerId::Server, stepper.clients[1]].into_iter().enumerate() {
            if let Some(snapshot) = stepper.character(peer, id).latest_snapshot() {
                assert!(snapshot.location.x >= last_seen[i]);
                last_seen[i] = snapshot.location.x;
            }
        }
    }
    assert!(last_seen.iter().all(|x| *x > 0.0));

    // once the owner stops, every peer settles on its final location
    stepper.session.set_input(id, walk(Vec3::ZERO));
    stepper.advance_time(Duration::from_secs(3));
    let target = stepper.character(owner, id).state.location;
    for peer in [PeerId::Server, stepper.clients[1]] {
        let character = stepper.character(peer, id);
        assert_relative_eq!(character.state.location.x, target.x, epsilon = 0.1);
        assert_eq!(character.state.velocity, Vec3::ZERO);
    }
}

/// One server frame: apply what the owner sent, relay it, then hand the
/// relayed messages to the observer unless `deliver` is false
fn relay_frame(server: &mut Peer, observer: &mut Peer, observer_end: &mut MoveLink, deliver: bool) {
    let delta = FRAME_DURATION.as_secs_f32();
    server.step(delta);
    observer.advance_clock(delta);
    for message in observer_end.receive(Duration::ZERO).unwrap() {
        if deliver {
            observer.on_move_received(PeerId::Server, message).unwrap();
        }
    }
    observer.tick_characters(delta);
}

#[test]
fn test_observer_recovers_from_lost_relay() {
    let id = NetId(1);
    let owner = PeerId::Client(1);
    let observer_id = PeerId::Client(2);
    let mut server = Peer::new(PeerId::Server, MovementConfig::default());
    let mut observer = Peer::new(observer_id, MovementConfig::default());
    server.spawn_character(
        CharacterState::new(id, owner).with_roles(NetRole::Authority, NetRole::AutonomousProxy),
        Box::new(KinematicLocomotion::default()),
    );
    observer.spawn_character(
        CharacterState::new(id, owner).with_roles(NetRole::SimulatedProxy, NetRole::Authority),
        Box::new(KinematicLocomotion::default()),
    );
    let (server_to_owner, mut owner_end) = MoveLink::new_pair(ChannelMode::SequencedUnreliable);
    let (server_to_observer, mut observer_end) = MoveLink::new_pair(ChannelMode::SequencedUnreliable);
    server.connect(owner, server_to_owner);
    server.connect(observer_id, server_to_observer);

    let moving = MoveSnapshot {
        location: Vec3::new(10.0, 0.0, 0.0),
        velocity: Vec3::X * 300.0,
        movement_mode: MovementMode::Walking,
        ..Default::default()
    };
    let stopped = MoveSnapshot {
        location: Vec3::new(110.0, 0.0, 0.0),
        movement_mode: MovementMode::Walking,
        ..Default::default()
    };
    owner_end.send(id, moving).unwrap();
    relay_frame(&mut server, &mut observer, &mut observer_end, true);
    assert!(observer.character(id).unwrap().state.velocity.x > 0.0);

    // the relay of the stop is lost on its way to the observer
    owner_end.send(id, stopped.clone()).unwrap();
    relay_frame(&mut server, &mut observer, &mut observer_end, false);

    // the owner keeps resending the same stationary snapshot
    for _ in 0..24 {
        owner_end.send(id, stopped.clone()).unwrap();
        relay_frame(&mut server, &mut observer, &mut observer_end, true);
    }
    let character = observer.character(id).unwrap();
    assert_relative_eq!(character.state.location.x, 110.0, epsilon = 0.1);
    assert_eq!(character.state.velocity, Vec3::ZERO);
}

#[test]
fn test_character_on_moving_platform() {
    let mut stepper = SessionStepper::with_clients(2);
    let owner = stepper.clients[0];
    let observer = stepper.clients[1];
    let platform = stepper
        .session
        .spawn_base(MovementBase::new(Transform::IDENTITY).with_motion(Vec3::Z * 100.0, 0.0));
    let id = stepper.session.spawn_character(owner, Vec3::new(10.0, 0.0, 0.0));
    stepper
        .session
        .peer_mut(owner)
        .unwrap()
        .set_base(id, Some(platform), None, false);

    stepper.advance_time(Duration::from_secs(1));
    let owner_location = stepper.character(owner, id).state.location;
    assert_relative_eq!(owner_location.z, 100.0, epsilon = 2.0);
    for peer in [PeerId::Server, observer] {
        let character = stepper.character(peer, id);
        assert_eq!(character.state.based.base, Some(platform));
        assert_relative_eq!(character.state.location.x, owner_location.x, epsilon = 0.5);
        assert_relative_eq!(character.state.location.z, owner_location.z, epsilon = 2.0);
    }
}

#[test]
fn test_detached_controller_does_not_send() {
    let mut stepper = SessionStepper::single();
    let owner = stepper.clients[0];
    let id = stepper.session.spawn_character(owner, Vec3::ZERO);
    stepper.session.peer_mut(owner).unwrap().connection = None;
    stepper.session.set_input(id, walk(Vec3::X));
    stepper.advance_time(Duration::from_secs(1));

    assert!(stepper.character(owner, id).state.location.x > 100.0);
    assert!(stepper.character(PeerId::Server, id).latest_snapshot().is_none());
    assert_eq!(stepper.character(PeerId::Server, id).state.location, Vec3::ZERO);
}

#[test]
fn test_linear_smoothing_end_to_end() {
    let config = MovementConfig::default().with_smoothing_mode(NetworkSmoothingMode::Linear);
    let mut stepper = SessionStepper::new(2, config, LinkSettings::default());
    let owner = stepper.clients[0];
    let id = stepper.session.spawn_character(owner, Vec3::ZERO);
    stepper.session.set_input(id, walk(Vec3::X));
    stepper.advance_time(Duration::from_secs(1));
    stepper.session.set_input(id, walk(Vec3::ZERO));
    stepper.advance_time(Duration::from_secs(2));

    let target = stepper.character(owner, id).state.location;
    let observer = stepper.character(stepper.clients[1], id);
    let timestamp = observer.latest_snapshot().and_then(|s| s.timestamp);
    assert!(timestamp.is_some_and(|t| t > 0.0));
    assert_relative_eq!(observer.visual_transform().location.x, target.x, epsilon = 0.1);
}

#[cfg(feature = "metrics")]
#[test]
fn test_metrics() {
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    metrics::with_local_recorder(&recorder, || {
        let mut stepper = SessionStepper::single();
        let id = stepper.session.spawn_character(stepper.clients[0], Vec3::ZERO);
        stepper.session.set_input(id, walk(Vec3::X));
        stepper.frame_step(30);
    });
    let counter = |name: &str| {
        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .find(|(key, ..)| key.key().name() == name)
            .map(|(.., value)| match value {
                DebugValue::Counter(count) => count,
                _ => 0,
            })
            .unwrap_or(0)
    };
    assert!(counter("autonomy/snapshots_sent") > 0);
    assert!(counter("autonomy/snapshots_received") > 0);
}
