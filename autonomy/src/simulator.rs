//! How a character moves on this peer, chosen from its network roles.
use alloc::boxed::Box;

use autonomy_core::config::MovementConfig;
use autonomy_core::role::NetRole;
use autonomy_core::state::CharacterState;
use autonomy_reconcile::RemoteReconciler;
use autonomy_send::LocalSimulationDriver;

#[derive(Debug, Clone)]
pub enum MovementSimulator {
    /// The owning client: simulates from input and sends snapshots
    LocalAuthoritative(LocalSimulationDriver),
    /// The server and the other clients: reconcile received snapshots
    RemoteReconciled(Box<RemoteReconciler>),
    /// Movement is not driven by this subsystem on this peer
    Disabled,
}

impl MovementSimulator {
    pub fn for_roles(state: &CharacterState, config: &MovementConfig) -> Self {
        match (state.local_role, state.remote_role) {
            (NetRole::AutonomousProxy, _) => Self::LocalAuthoritative(LocalSimulationDriver::new(config)),
            (NetRole::Authority, NetRole::AutonomousProxy) | (NetRole::SimulatedProxy, _) => {
                Self::RemoteReconciled(Box::new(RemoteReconciler::new(config)))
            }
            _ => Self::Disabled,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalAuthoritative(_))
    }

    pub fn driver(&self) -> Option<&LocalSimulationDriver> {
        match self {
            Self::LocalAuthoritative(driver) => Some(driver),
            _ => None,
        }
    }

    pub fn driver_mut(&mut self) -> Option<&mut LocalSimulationDriver> {
        match self {
            Self::LocalAuthoritative(driver) => Some(driver),
            _ => None,
        }
    }

    pub fn reconciler(&self) -> Option<&RemoteReconciler> {
        match self {
            Self::RemoteReconciled(reconciler) => Some(&**reconciler),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autonomy_core::id::{NetId, PeerId};
    use test_log::test;

    fn simulator(local: NetRole, remote: NetRole) -> MovementSimulator {
        let state = CharacterState::new(NetId(1), PeerId::Client(1)).with_roles(local, remote);
        MovementSimulator::for_roles(&state, &MovementConfig::default())
    }

    #[test]
    fn test_for_roles() {
        assert!(simulator(NetRole::AutonomousProxy, NetRole::Authority).is_local());
        assert!(
            simulator(NetRole::Authority, NetRole::AutonomousProxy)
                .reconciler()
                .is_some()
        );
        assert!(
            simulator(NetRole::SimulatedProxy, NetRole::Authority)
                .reconciler()
                .is_some()
        );
        assert!(matches!(
            simulator(NetRole::Authority, NetRole::SimulatedProxy),
            MovementSimulator::Disabled
        ));
    }
}
