//! # Autonomy Reconcile
//!
//! Applies the snapshots of a character this peer does not control: on the
//! server for the owning client's character, and on every other client for
//! the snapshots the server relays.
//!
//! Only the latest snapshot is kept. Each arrival replaces it wholesale and
//! may trigger a smoothing correction; between arrivals the character is
//! predicted forward from its replicated velocity.

mod glue;
pub mod proxy;
pub mod reconciler;

pub use reconciler::{ReceiveOutcome, ReconcileContext, RejectReason, RemoteReconciler};

pub mod prelude {
    pub use crate::reconciler::{ReceiveOutcome, ReconcileContext, RejectReason, RemoteReconciler};
}
