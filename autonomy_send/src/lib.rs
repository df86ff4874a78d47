//! # Autonomy Send
//!
//! The owning client simulates its own character and decides, every tick,
//! whether the new state is worth sending.

pub mod driver;
pub mod send_rate;

pub use driver::{LocalSimulationDriver, SendContext};
pub use send_rate::SendRateController;

pub mod prelude {
    pub use crate::driver::{LocalSimulationDriver, SendContext};
    pub use crate::send_rate::SendRateController;
}
