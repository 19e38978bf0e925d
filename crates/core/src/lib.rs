pub mod blobs;
pub mod bus;
pub mod error;
pub mod extract;
pub mod media;
pub mod relay;
pub mod session;
pub mod synth;

pub use bus::{BusEvent, Envelope, MessageBus, Reply};
pub use error::{RelayError, SessionError};
