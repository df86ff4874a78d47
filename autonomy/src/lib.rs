/*! # Autonomy

Client-authoritative character movement for Bevy.

The client that controls a character simulates it locally and sends compact
snapshots of its state; the server adopts them as ground truth and relays them
to every other client. Every peer that does not control the character applies
the latest snapshot, predicts the character forward between snapshots, and
smooths corrections so that the visual transform never snaps.

- [`Session`](session::Session) steps a server and its clients in one process
- [`AutonomyPlugin`](plugin::AutonomyPlugin) runs one peer inside a bevy [`App`](bevy_app::App)
*/
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod character;
pub mod error;
pub mod peer;
pub mod plugin;
pub mod session;
pub mod simulator;

pub mod prelude {
    pub use autonomy_core::prelude::*;
    pub use autonomy_link::prelude::*;
    pub use autonomy_reconcile::prelude::*;
    pub use autonomy_send::prelude::*;
    pub use autonomy_smoothing::{SmoothingEngine, SmoothingState, VisualTransform};

    pub use crate::character::Character;
    pub use crate::error::ReceiveError;
    pub use crate::peer::Peer;
    pub use crate::plugin::{AutonomyPlugin, AutonomySet, CharacterId, LocalPeer, PlayerInput};
    pub use crate::session::{LinkSettings, Session};
    pub use crate::simulator::MovementSimulator;
}
