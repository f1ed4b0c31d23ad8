// Handshake module declarations

pub mod credentials;
pub mod messages;
pub mod participant;
pub mod protocol;
pub mod state;
pub mod transcript;
