//! One participant of a session: the server or a client.
//!
//! A peer owns its view of every character and movement base, and one
//! [`MoveLink`] per remote peer it talks to. Clients only talk to the server;
//! the server relays what it receives from an owning client to every other
//! client.
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::time::Duration;
use tracing::{debug, error, trace, warn};

use autonomy_core::base::{BaseRegistry, MovementBase};
use autonomy_core::config::MovementConfig;
use autonomy_core::id::{BoneName, NetId, PeerId};
use autonomy_core::locomotion::{LocomotionEngine, MoveInput};
use autonomy_core::network::{ConnectionQuality, FixedConnection, MoveSender};
use autonomy_core::snapshot::MoveSnapshot;
use autonomy_core::state::{CharacterState, WorldOrigin};
use autonomy_link::{MoveLink, MoveMessage};
use autonomy_reconcile::ReceiveOutcome;
use bevy_platform::collections::HashMap;

use crate::character::{Character, TickContext};
use crate::error::ReceiveError;

#[derive(Debug)]
pub struct Peer {
    id: PeerId,
    config: MovementConfig,
    /// Local clock, in seconds
    clock: f64,
    pub origin: WorldOrigin,
    /// `None` for a peer without a player connection
    pub connection: Option<FixedConnection>,
    pub bases: BaseRegistry,
    characters: HashMap<NetId, Character>,
    links: HashMap<PeerId, MoveLink>,
    /// Snapshots to send on the next flush
    outbox: Vec<(NetId, MoveSnapshot)>,
}

impl Peer {
    pub fn new(id: PeerId, config: MovementConfig) -> Self {
        Self {
            id,
            config,
            clock: 0.0,
            origin: WorldOrigin::default(),
            connection: Some(FixedConnection::default()),
            bases: BaseRegistry::default(),
            characters: HashMap::default(),
            links: HashMap::default(),
            outbox: Vec::new(),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Talk to `remote` through `link`
    pub fn connect(&mut self, remote: PeerId, link: MoveLink) {
        debug!(peer = %self.id, %remote, "link connected");
        self.links.insert(remote, link);
    }

    pub fn is_connected_to(&self, remote: PeerId) -> bool {
        self.links.contains_key(&remote)
    }

    pub fn spawn_character(&mut self, state: CharacterState, locomotion: Box<dyn LocomotionEngine>) {
        let id = state.id;
        let character = Character::new(state, locomotion, &self.config);
        trace!(peer = %self.id, character = ?id, simulator = ?character.simulator(), "spawned character");
        self.characters.insert(id, character);
    }

    pub fn despawn_character(&mut self, id: NetId) -> Option<Character> {
        self.links.values_mut().for_each(|link| link.remove_character(id));
        self.bases.attach_to_base(id, None);
        self.characters.remove(&id)
    }

    pub fn character(&self, id: NetId) -> Option<&Character> {
        self.characters.get(&id)
    }

    pub fn character_mut(&mut self, id: NetId) -> Option<&mut Character> {
        self.characters.get_mut(&id)
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn set_input(&mut self, id: NetId, input: MoveInput) {
        if let Some(character) = self.characters.get_mut(&id) {
            character.input = input;
        }
    }

    pub fn insert_base(&mut self, id: NetId, base: MovementBase) {
        self.bases.insert(id, base);
    }

    /// Stand a character on a movement base, or take it off any base with `None`
    pub fn set_base(&mut self, id: NetId, base: Option<NetId>, bone: Option<BoneName>, has_relative_rotation: bool) {
        if let Some(character) = self.characters.get_mut(&id) {
            self.bases
                .set_base(&mut character.state, base, bone, has_relative_rotation);
        }
    }

    pub fn advance_clock(&mut self, delta: f32) {
        self.clock += delta as f64;
    }

    fn link_time(&self) -> Duration {
        Duration::from_secs_f64(self.clock.max(0.0))
    }

    /// Drain every link and apply the snapshots that arrived
    pub fn receive(&mut self) {
        let now = self.link_time();
        let mut arrived = Vec::new();
        let mut disconnected = Vec::new();
        for (remote, link) in self.links.iter_mut() {
            match link.receive(now) {
                Ok(messages) => arrived.extend(messages.into_iter().map(|m| (*remote, m))),
                Err(e) => {
                    warn!(peer = %self.id, %remote, ?e, "dropping link");
                    disconnected.push(*remote);
                }
            }
        }
        disconnected.iter().for_each(|remote| {
            self.links.remove(remote);
        });
        for (sender, message) in arrived {
            if let Err(e) = self.on_move_received(sender, message) {
                warn!(peer = %self.id, %sender, ?e, "failed to apply move message");
            }
        }
    }

    /// Apply a raw move message received from `sender` by a transport other
    /// than a [`MoveLink`]
    pub fn receive_bytes(&mut self, sender: PeerId, bytes: &[u8]) -> Result<ReceiveOutcome, ReceiveError> {
        let message = MoveMessage::from_bytes(bytes)?;
        self.on_move_received(sender, message)
    }

    /// Apply a move message received from `sender`.
    ///
    /// On the server, every snapshot accepted from the owning client is queued
    /// to be relayed to every other client, duplicates included: an observer
    /// that lost the previous relay catches up on the next one.
    pub fn on_move_received(&mut self, sender: PeerId, message: MoveMessage) -> Result<ReceiveOutcome, ReceiveError> {
        let MoveMessage {
            character: id, snapshot, ..
        } = message;
        let connection = self.connection.as_ref().map(|c| c as &dyn ConnectionQuality);
        let Some(character) = self.characters.get_mut(&id) else {
            return Err(ReceiveError::UnknownCharacter(id));
        };
        let mut ctx = TickContext {
            local_peer: self.id,
            now: self.clock,
            bases: &mut self.bases,
            origin: self.origin,
            connection,
        };
        let outcome = character.receive(sender, snapshot, &mut ctx);
        trace!(peer = %self.id, %sender, character = ?id, ?outcome, "move received");
        if self.id.is_server()
            && matches!(outcome, ReceiveOutcome::Applied | ReceiveOutcome::Duplicate)
            && let Some(latest) = character.latest_snapshot()
        {
            self.outbox.push((id, latest.clone()));
        }
        Ok(outcome)
    }

    /// Move every base by its own velocity
    pub fn advance_bases(&mut self, delta: f32) {
        self.bases.advance(delta);
    }

    /// Tick every character, queuing the snapshots to send
    pub fn tick_characters(&mut self, delta: f32) {
        let connection = self.connection.as_ref().map(|c| c as &dyn ConnectionQuality);
        let mut ctx = TickContext {
            local_peer: self.id,
            now: self.clock,
            bases: &mut self.bases,
            origin: self.origin,
            connection,
        };
        for (id, character) in self.characters.iter_mut() {
            if let Some(snapshot) = character.tick(delta, &mut ctx) {
                self.outbox.push((*id, snapshot));
            }
        }
    }

    /// Send every queued snapshot.
    ///
    /// A snapshot goes to every linked peer except the character's owner.
    pub fn flush(&mut self) {
        for (id, snapshot) in self.outbox.drain(..) {
            let Some(owner) = self.characters.get(&id).map(|c| c.state.owner) else {
                error!(peer = %self.id, character = ?id, "queued a snapshot for a despawned character");
                continue;
            };
            self.links
                .iter_mut()
                .filter(|(remote, _)| **remote != owner)
                .for_each(|(_, link)| link.send_move(id, &snapshot));
        }
    }

    /// Run one full frame: receive, advance bases, tick characters, send
    pub fn step(&mut self, delta: f32) {
        self.advance_clock(delta);
        self.receive();
        self.advance_bases(delta);
        self.tick_characters(delta);
        self.flush();
    }
}
