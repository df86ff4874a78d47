use serde::{Deserialize, Serialize};

/// Network role of a character, as seen from one peer.
///
/// Each peer holds a local role and a remote role for every character: the
/// owning client sees `(AutonomousProxy, Authority)`, the server sees
/// `(Authority, AutonomousProxy)` and every other client sees
/// `(SimulatedProxy, Authority)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetRole {
    #[default]
    None,
    SimulatedProxy,
    AutonomousProxy,
    Authority,
}
