//! A server and its clients stepped together in one process.
use alloc::boxed::Box;
use alloc::vec::Vec;
use bevy_math::Vec3;
use tracing::info;

use autonomy_core::base::MovementBase;
use autonomy_core::config::MovementConfig;
use autonomy_core::id::{NetId, PeerId};
use autonomy_core::locomotion::{KinematicLocomotion, MoveInput};
use autonomy_core::role::NetRole;
use autonomy_core::state::CharacterState;
use autonomy_link::{ChannelMode, LinkConditioner, LinkConditionerConfig, MoveLink};

use crate::peer::Peer;

/// How a client is linked to the server
#[derive(Debug, Clone, Default)]
pub struct LinkSettings {
    pub mode: ChannelMode,
    /// Conditions the traffic received on both ends
    pub conditioner: Option<LinkConditionerConfig>,
    /// Seed of the conditioner's randomness
    pub seed: u64,
}

#[derive(Debug)]
pub struct Session {
    config: MovementConfig,
    server: Peer,
    clients: Vec<Peer>,
    next_net_id: u64,
}

impl Session {
    pub fn new(config: MovementConfig) -> Self {
        Self {
            server: Peer::new(PeerId::Server, config.clone()),
            config,
            clients: Vec::new(),
            next_net_id: 1,
        }
    }

    /// Connect a new client to the server
    pub fn add_client(&mut self, settings: &LinkSettings) -> PeerId {
        let id = PeerId::Client(self.clients.len() as u64 + 1);
        let (mut server_end, mut client_end) = MoveLink::new_pair(settings.mode);
        if let Some(config) = &settings.conditioner {
            server_end = server_end.with_conditioner(LinkConditioner::with_seed(config.clone(), settings.seed));
            client_end = client_end.with_conditioner(LinkConditioner::with_seed(
                config.clone(),
                settings.seed.wrapping_add(1),
            ));
        }
        let mut client = Peer::new(id, self.config.clone());
        for (base_id, base) in self.server.bases.iter() {
            client.insert_base(*base_id, base.clone());
        }
        client.connect(PeerId::Server, client_end);
        self.server.connect(id, server_end);
        self.clients.push(client);
        info!(client = %id, mode = ?settings.mode, "client connected");
        id
    }

    pub fn server(&self) -> &Peer {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut Peer {
        &mut self.server
    }

    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        match id {
            PeerId::Server => Some(&self.server),
            PeerId::Client(_) => self.clients.iter().find(|c| c.id() == id),
        }
    }

    pub fn peer_mut(&mut self, id: PeerId) -> Option<&mut Peer> {
        match id {
            PeerId::Server => Some(&mut self.server),
            PeerId::Client(_) => self.clients.iter_mut().find(|c| c.id() == id),
        }
    }

    pub fn peers(&self) -> impl Iterator<Item = &Peer> {
        core::iter::once(&self.server).chain(self.clients.iter())
    }

    fn peers_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        core::iter::once(&mut self.server).chain(self.clients.iter_mut())
    }

    fn allocate_net_id(&mut self) -> NetId {
        let id = NetId(self.next_net_id);
        self.next_net_id += 1;
        id
    }

    /// Register a movement base on every peer
    pub fn spawn_base(&mut self, base: MovementBase) -> NetId {
        let id = self.allocate_net_id();
        self.peers_mut().for_each(|peer| peer.insert_base(id, base.clone()));
        id
    }

    /// Spawn a character controlled by `owner` on every peer.
    ///
    /// The owning client simulates it; the server and the other clients
    /// reconcile its snapshots. The owner is acknowledged right away.
    pub fn spawn_character(&mut self, owner: PeerId, location: Vec3) -> NetId {
        let id = self.allocate_net_id();
        self.peers_mut().for_each(|peer| {
            let roles = match (peer.id(), owner) {
                (PeerId::Server, PeerId::Server) => (NetRole::Authority, NetRole::SimulatedProxy),
                (PeerId::Server, _) => (NetRole::Authority, NetRole::AutonomousProxy),
                (local, owner) if local == owner => (NetRole::AutonomousProxy, NetRole::Authority),
                _ => (NetRole::SimulatedProxy, NetRole::Authority),
            };
            let state = CharacterState::new(id, owner)
                .with_roles(roles.0, roles.1)
                .with_location(location);
            peer.spawn_character(state, Box::new(KinematicLocomotion::default()));
            if let Some(character) = peer.character_mut(id) {
                character.possessed();
                character.acknowledge();
            }
        });
        id
    }

    pub fn despawn_character(&mut self, id: NetId) {
        self.peers_mut().for_each(|peer| {
            peer.despawn_character(id);
        });
    }

    /// Set the input of a character on its owning client
    pub fn set_input(&mut self, id: NetId, input: MoveInput) {
        let Some(owner) = self.server.character(id).map(|c| c.state.owner) else {
            return;
        };
        if let Some(peer) = self.peer_mut(owner) {
            peer.set_input(id, input);
        }
    }

    /// Step every peer by `delta` seconds: clients first, then the server
    pub fn step(&mut self, delta: f32) {
        self.clients.iter_mut().for_each(|client| client.step(delta));
        self.server.step(delta);
    }
}
