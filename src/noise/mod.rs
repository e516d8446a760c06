//! Noise-IK handshake and the bidirectional session cipher it produces.
//!
//! ```text
//! IkInitiator::new(local, peer_static) ──msg1──► IkResponder::respond ──msg2──► NoiseSession (responder)
//!        │                                                                          ▲
//!        └─────────────────────────── finish(msg2) ───────────────────────► NoiseSession (initiator)
//! ```
//! Strictly two messages — there is no message 3 the way Noise_XX has one.
//! Both peers reach a completed session simultaneously, at message 2.

pub mod handshake;
pub mod session;

pub use handshake::{CipherChoice, IkInitiator, IkResponder};
pub use session::NoiseSession;
