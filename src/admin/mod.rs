mod bg_heal;
pub mod client;
mod heal_cmds;
pub mod heal_sequence;
#[cfg(test)]
pub(crate) mod mock;
pub mod monitor;

pub use bg_heal::*;
pub use client::{AdminClient, HealResponse, HttpTransport, Transport};
pub use heal_cmds::*;
pub use heal_sequence::{HealSequence, HealSequenceState, HealSessions};
pub use monitor::HealStatusMonitor;
