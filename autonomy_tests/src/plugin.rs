use approx::assert_relative_eq;
use bevy_math::Vec3;
use test_log::test;

use autonomy::prelude::*;

use crate::stepper::AppStepper;

#[test]
fn test_movement_reaches_every_app() {
    let mut stepper = AppStepper::with_clients(2);
    let entities = stepper.spawn_character(NetId(1), 0);
    let [server, owner, observer] = entities[..] else {
        panic!("expected one entity per app");
    };

    stepper.client_apps[0]
        .world_mut()
        .get_mut::<PlayerInput>(owner)
        .unwrap()
        .0
        .direction = Vec3::X;
    stepper.frame_step(90);

    let owner_x = AppStepper::translation(&stepper.client_apps[0], owner).x;
    let server_x = AppStepper::translation(&stepper.server_app, server).x;
    let observer_x = AppStepper::translation(&stepper.client_apps[1], observer).x;
    assert!(owner_x > 500.0);
    assert!(server_x > 0.0);
    assert!(observer_x > 0.0);
    assert_relative_eq!(server_x, owner_x, epsilon = 60.0);
    assert_relative_eq!(observer_x, owner_x, epsilon = 60.0);
}

#[test]
fn test_character_at_rest_converges() {
    let mut stepper = AppStepper::with_clients(2);
    let entities = stepper.spawn_character(NetId(1), 0);
    let [server, owner, observer] = entities[..] else {
        panic!("expected one entity per app");
    };
    let input = |stepper: &mut AppStepper, direction: Vec3| {
        stepper.client_apps[0]
            .world_mut()
            .get_mut::<PlayerInput>(owner)
            .unwrap()
            .0
            .direction = direction;
    };

    input(&mut stepper, Vec3::Z);
    stepper.frame_step(30);
    input(&mut stepper, Vec3::ZERO);
    stepper.frame_step(120);

    let owner_translation = AppStepper::translation(&stepper.client_apps[0], owner);
    let peer = AppStepper::peer(&stepper.server_app);
    assert!(peer.character(NetId(1)).unwrap().latest_snapshot().is_some());
    for translation in [
        AppStepper::translation(&stepper.server_app, server),
        AppStepper::translation(&stepper.client_apps[1], observer),
    ] {
        assert_relative_eq!(translation.z, owner_translation.z, epsilon = 0.1);
    }
}
