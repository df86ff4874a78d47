//! Bevy integration: one [`App`] is one peer.
//!
//! - `PreUpdate`: advance the peer clock and apply the snapshots that arrived
//! - `Update`: copy [`PlayerInput`]s, move the bases, tick every character
//! - `PostUpdate`: send the queued snapshots, then write visual transforms into [`Transform`]
use bevy_app::prelude::*;
use bevy_ecs::prelude::*;
use bevy_time::{Real, Time};
use bevy_transform::components::Transform;

use autonomy_core::config::MovementConfig;
use autonomy_core::id::{NetId, PeerId};
use autonomy_core::locomotion::MoveInput;

use crate::peer::Peer;

#[derive(SystemSet, Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum AutonomySet {
    // PRE UPDATE
    /// Receive move messages and reconcile remote characters
    Receive,

    // UPDATE
    /// Simulate every character
    Tick,

    // POST UPDATE
    /// Flush the queued snapshots to the links
    Send,
    /// Copy visual transforms into [`Transform`]
    SyncVisual,
}

/// The peer simulated by this app
#[derive(Resource, Debug)]
pub struct LocalPeer(pub Peer);

/// Marks the entity that displays a character
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[require(Transform)]
pub struct CharacterId(pub NetId);

/// Input of a character controlled by this peer
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayerInput(pub MoveInput);

pub struct AutonomyPlugin {
    pub peer: PeerId,
    pub config: MovementConfig,
}

impl AutonomyPlugin {
    pub fn new(peer: PeerId) -> Self {
        Self {
            peer,
            config: MovementConfig::default(),
        }
    }

    fn receive(time: Res<Time<Real>>, mut peer: ResMut<LocalPeer>) {
        peer.0.advance_clock(time.delta_secs());
        peer.0.receive();
    }

    fn tick(time: Res<Time<Real>>, mut peer: ResMut<LocalPeer>, inputs: Query<(&CharacterId, &PlayerInput)>) {
        let peer = &mut peer.0;
        inputs
            .iter()
            .for_each(|(character, input)| peer.set_input(character.0, input.0));
        peer.advance_bases(time.delta_secs());
        peer.tick_characters(time.delta_secs());
    }

    fn send(mut peer: ResMut<LocalPeer>) {
        peer.0.flush();
    }

    fn sync_visual(peer: Res<LocalPeer>, mut query: Query<(&CharacterId, &mut Transform)>) {
        query.iter_mut().for_each(|(character, mut transform)| {
            if let Some(character) = peer.0.character(character.0) {
                let visual = character.visual_transform();
                transform.translation = visual.location;
                transform.rotation = visual.rotation;
            }
        });
    }
}

impl Plugin for AutonomyPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(LocalPeer(Peer::new(self.peer, self.config.clone())));
        app.configure_sets(PostUpdate, (AutonomySet::Send, AutonomySet::SyncVisual).chain());
        app.add_systems(PreUpdate, Self::receive.in_set(AutonomySet::Receive));
        app.add_systems(Update, Self::tick.in_set(AutonomySet::Tick));
        app.add_systems(
            PostUpdate,
            (
                Self::send.in_set(AutonomySet::Send),
                Self::sync_visual.in_set(AutonomySet::SyncVisual),
            ),
        );
    }
}
