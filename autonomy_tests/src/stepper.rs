use alloc::boxed::Box;
use alloc::vec::Vec;
use bevy_app::App;
use bevy_ecs::prelude::*;
use bevy_math::Vec3;
use bevy_time::{TimePlugin, TimeUpdateStrategy};
use bevy_transform::components::Transform;
use core::time::Duration;
use tracing::debug;

use autonomy::prelude::*;

pub const FRAME_DURATION: Duration = Duration::from_nanos(16_666_667);

/// Stepper with one server and n clients in a single [`Session`],
/// connected through crossbeam links.
pub struct SessionStepper {
    pub session: Session,
    pub clients: Vec<PeerId>,
    pub frame_duration: Duration,
    /// Simulated time elapsed since the start
    pub elapsed: Duration,
}

impl SessionStepper {
    pub fn single() -> Self {
        Self::with_clients(1)
    }

    pub fn with_clients(n: usize) -> Self {
        Self::new(n, MovementConfig::default(), LinkSettings::default())
    }

    pub fn new(n: usize, config: MovementConfig, link: LinkSettings) -> Self {
        let mut session = Session::new(config);
        let clients = (0..n)
            .map(|i| {
                session.add_client(&LinkSettings {
                    seed: link.seed.wrapping_add(2 * i as u64),
                    ..link.clone()
                })
            })
            .collect();
        Self {
            session,
            clients,
            frame_duration: FRAME_DURATION,
            elapsed: Duration::ZERO,
        }
    }

    pub fn client(&self, i: usize) -> &Peer {
        self.peer(self.clients[i])
    }

    pub fn server(&self) -> &Peer {
        self.session.server()
    }

    pub fn peer(&self, id: PeerId) -> &Peer {
        self.session.peer(id).expect("unknown peer")
    }

    pub fn character(&self, peer: PeerId, id: NetId) -> &Character {
        self.peer(peer).character(id).expect("character not spawned on this peer")
    }

    pub fn frame_step(&mut self, n: usize) {
        for _ in 0..n {
            self.session.step(self.frame_duration.as_secs_f32());
            self.elapsed += self.frame_duration;
        }
    }

    /// Step until `duration` of simulated time has elapsed
    pub fn advance_time(&mut self, duration: Duration) {
        let frames = duration.as_nanos().div_ceil(self.frame_duration.as_nanos());
        self.frame_step(frames as usize);
    }
}

/// Stepper with one bevy [`App`] per peer, each running the [`AutonomyPlugin`].
///
/// The client apps are updated before the server app on every frame.
pub struct AppStepper {
    pub client_apps: Vec<App>,
    pub server_app: App,
    pub frame_duration: Duration,
}

impl AppStepper {
    pub fn with_clients(n: usize) -> Self {
        let mut stepper = Self {
            client_apps: Vec::new(),
            server_app: Self::peer_app(PeerId::Server),
            frame_duration: FRAME_DURATION,
        };
        for _ in 0..n {
            stepper.new_client();
        }
        stepper
    }

    fn peer_app(peer: PeerId) -> App {
        let mut app = App::new();
        app.add_plugins((TimePlugin, AutonomyPlugin::new(peer)));
        app.insert_resource(TimeUpdateStrategy::ManualDuration(FRAME_DURATION));
        app.finish();
        app.cleanup();
        app
    }

    fn new_client(&mut self) -> PeerId {
        let id = PeerId::Client(self.client_apps.len() as u64 + 1);
        let (server_end, client_end) = MoveLink::new_pair(ChannelMode::SequencedUnreliable);
        let mut client_app = Self::peer_app(id);
        Self::peer_mut(&mut client_app).connect(PeerId::Server, client_end);
        Self::peer_mut(&mut self.server_app).connect(id, server_end);
        self.client_apps.push(client_app);
        debug!(client = %id, "client app connected");
        id
    }

    pub fn peer_mut(app: &mut App) -> &mut Peer {
        &mut app.world_mut().resource_mut::<LocalPeer>().into_inner().0
    }

    pub fn peer(app: &App) -> &Peer {
        &app.world().resource::<LocalPeer>().0
    }

    /// Spawn a character owned by client `owner` on every app, displayed by a
    /// [`CharacterId`] entity. The owner's entity also carries a [`PlayerInput`].
    pub fn spawn_character(&mut self, id: NetId, owner: usize) -> Vec<Entity> {
        let owner_id = PeerId::Client(owner as u64 + 1);
        let mut entities = Vec::new();
        let apps = core::iter::once(&mut self.server_app).chain(self.client_apps.iter_mut());
        for app in apps {
            let local = Self::peer(app).id();
            let (local_role, remote_role) = match local {
                PeerId::Server => (NetRole::Authority, NetRole::AutonomousProxy),
                local if local == owner_id => (NetRole::AutonomousProxy, NetRole::Authority),
                _ => (NetRole::SimulatedProxy, NetRole::Authority),
            };
            let peer = Self::peer_mut(app);
            peer.spawn_character(
                CharacterState::new(id, owner_id).with_roles(local_role, remote_role),
                Box::new(KinematicLocomotion::default()),
            );
            if let Some(character) = peer.character_mut(id) {
                character.possessed();
                character.acknowledge();
            }
            let mut entity = app.world_mut().spawn(CharacterId(id));
            if local == owner_id {
                entity.insert(PlayerInput::default());
            }
            entities.push(entity.id());
        }
        entities
    }

    pub fn frame_step(&mut self, n: usize) {
        for _ in 0..n {
            self.client_apps.iter_mut().for_each(|app| app.update());
            self.server_app.update();
        }
    }

    pub fn translation(app: &App, entity: Entity) -> Vec3 {
        app.world()
            .get::<Transform>(entity)
            .map(|t| t.translation)
            .unwrap_or(Vec3::NAN)
    }
}
