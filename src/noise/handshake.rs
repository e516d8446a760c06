//! The two-message Noise-IK handshake state machine.

use snow::{Builder, HandshakeState};

use crate::error::{Error, Result};
use crate::time::{default_provider, TimeProvider};

use super::session::NoiseSession;

/// Which AEAD cipher the handshake negotiates. `ChaChaPoly` is authoritative;
/// `Aesgcm` is a selectable alternate (see capabilities negotiation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherChoice {
    /// `Noise_IK_25519_ChaChaPoly_SHA256`.
    ChaChaPoly,
    /// `Noise_IK_25519_AESGCM_SHA256`.
    Aesgcm,
}

impl CipherChoice {
    fn pattern_str(self) -> &'static str {
        match self {
            CipherChoice::ChaChaPoly => "Noise_IK_25519_ChaChaPoly_SHA256",
            CipherChoice::Aesgcm => "Noise_IK_25519_AESGCM_SHA256",
        }
    }
}

/// Longest possible handshake message: ephemeral (32) + encrypted static
/// (32 + 16) + encrypted payload + generous slack.
const MAX_HANDSHAKE_MSG: usize = 256;

/// Initiator side of a Noise-IK handshake. `IK` means the initiator already
/// knows the responder's static public key before the handshake starts —
/// that's what lets it complete in two messages instead of three.
pub struct IkInitiator {
    state: HandshakeState,
    time: &'static dyn TimeProvider,
    cipher: CipherChoice,
    peer_static: [u8; 32],
    local_private: [u8; 32],
}

impl IkInitiator {
    /// Starts a handshake as initiator, immediately producing message 1
    /// carrying `payload` as Noise-IK's payload₀.
    pub fn new(
        local_private: &[u8; 32],
        peer_static: &[u8; 32],
        cipher: CipherChoice,
        payload: &[u8],
    ) -> Result<(Self, Vec<u8>)> {
        Self::with_time_provider(local_private, peer_static, cipher, payload, default_provider())
    }

    /// Same as [`IkInitiator::new`] with an explicit time provider, for
    /// deterministic session-timestamp tests.
    pub fn with_time_provider(
        local_private: &[u8; 32],
        peer_static: &[u8; 32],
        cipher: CipherChoice,
        payload: &[u8],
        time: &'static dyn TimeProvider,
    ) -> Result<(Self, Vec<u8>)> {
        let params = cipher
            .pattern_str()
            .parse()
            .map_err(|_| Error::UnsupportedCipher(cipher.pattern_str().to_string()))?;

        let mut state = Builder::new(params)
            .local_private_key(local_private)
            .remote_public_key(peer_static)
            .build_initiator()
            .map_err(|_| Error::HandshakeAuth)?;

        let mut msg = vec![0u8; payload.len() + MAX_HANDSHAKE_MSG];
        let len = state
            .write_message(payload, &mut msg)
            .map_err(|_| Error::HandshakeAuth)?;
        msg.truncate(len);

        Ok((
            Self {
                state,
                time,
                cipher,
                peer_static: *peer_static,
                local_private: *local_private,
            },
            msg,
        ))
    }

    /// Processes the responder's message 2, decoding its payload, and
    /// completes the handshake, yielding an established bidirectional
    /// [`NoiseSession`].
    pub fn finish(mut self, responder_msg: &[u8]) -> Result<(NoiseSession, Vec<u8>)> {
        let mut payload = vec![0u8; responder_msg.len()];
        let len = self
            .state
            .read_message(responder_msg, &mut payload)
            .map_err(|_| Error::HandshakeAuth)?;
        payload.truncate(len);

        if !self.state.is_handshake_finished() {
            return Err(Error::HandshakeAuth);
        }

        let transport = self
            .state
            .into_transport_mode()
            .map_err(|_| Error::HandshakeAuth)?;

        Ok((
            NoiseSession::new(transport, self.peer_static, self.local_private, self.cipher, self.time),
            payload,
        ))
    }
}

/// Responder side of a Noise-IK handshake. Unlike `IK`'s initiator, the
/// responder doesn't need to know the initiator's static key in advance —
/// it learns it (authenticated) from message 1.
pub struct IkResponder {
    state: HandshakeState,
    time: &'static dyn TimeProvider,
    cipher: CipherChoice,
    local_private: [u8; 32],
}

impl IkResponder {
    /// Begins a handshake as responder.
    pub fn new(local_private: &[u8; 32], cipher: CipherChoice) -> Result<Self> {
        Self::with_time_provider(local_private, cipher, default_provider())
    }

    /// Same as [`IkResponder::new`] with an explicit time provider.
    pub fn with_time_provider(
        local_private: &[u8; 32],
        cipher: CipherChoice,
        time: &'static dyn TimeProvider,
    ) -> Result<Self> {
        let params = cipher
            .pattern_str()
            .parse()
            .map_err(|_| Error::UnsupportedCipher(cipher.pattern_str().to_string()))?;

        let state = Builder::new(params)
            .local_private_key(local_private)
            .build_responder()
            .map_err(|_| Error::HandshakeAuth)?;

        Ok(Self {
            state,
            time,
            cipher,
            local_private: *local_private,
        })
    }

    /// Processes the initiator's message 1 (decoding its payload₀), writes
    /// message 2 carrying `response_payload` as payload₁, and completes the
    /// handshake in the same step — `IK` gives the responder everything it
    /// needs in one round.
    ///
    /// Returns the established session, message 2, and the decoded payload₀.
    pub fn respond(
        mut self,
        initiator_msg: &[u8],
        response_payload: &[u8],
    ) -> Result<(NoiseSession, Vec<u8>, Vec<u8>)> {
        let mut received_payload = vec![0u8; initiator_msg.len()];
        let received_len = self
            .state
            .read_message(initiator_msg, &mut received_payload)
            .map_err(|_| Error::HandshakeAuth)?;
        received_payload.truncate(received_len);

        let mut msg = vec![0u8; response_payload.len() + MAX_HANDSHAKE_MSG];
        let len = self
            .state
            .write_message(response_payload, &mut msg)
            .map_err(|_| Error::HandshakeAuth)?;
        msg.truncate(len);

        if !self.state.is_handshake_finished() {
            return Err(Error::HandshakeAuth);
        }

        let peer_static: [u8; 32] = self
            .state
            .get_remote_static()
            .ok_or(Error::HandshakeAuth)?
            .try_into()
            .map_err(|_| Error::HandshakeAuth)?;

        let transport = self
            .state
            .into_transport_mode()
            .map_err(|_| Error::HandshakeAuth)?;

        let session = NoiseSession::new(
            transport,
            peer_static,
            self.local_private,
            self.cipher,
            self.time,
        );

        Ok((session, msg, received_payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    fn handshake() -> (NoiseSession, NoiseSession) {
        let initiator_keys = KeyPair::generate().unwrap();
        let responder_keys = KeyPair::generate().unwrap();

        let (initiator, msg1) = IkInitiator::new(
            &initiator_keys.private_bytes(),
            &responder_keys.public,
            CipherChoice::ChaChaPoly,
            b"",
        )
        .unwrap();

        let responder = IkResponder::new(&responder_keys.private_bytes(), CipherChoice::ChaChaPoly).unwrap();
        let (responder_session, msg2, _payload0) = responder.respond(&msg1, b"").unwrap();

        let (initiator_session, _payload1) = initiator.finish(&msg2).unwrap();
        (initiator_session, responder_session)
    }

    #[test]
    fn handshake_completes_and_peer_keys_match() {
        let initiator_keys_pub;
        let responder_keys_pub;
        {
            // Rebuild to capture public keys for comparison against session state.
            let initiator_keys = KeyPair::generate().unwrap();
            let responder_keys = KeyPair::generate().unwrap();
            initiator_keys_pub = initiator_keys.public;
            responder_keys_pub = responder_keys.public;

            let (initiator, msg1) = IkInitiator::new(
                &initiator_keys.private_bytes(),
                &responder_keys.public,
                CipherChoice::ChaChaPoly,
                b"",
            )
            .unwrap();
            let responder =
                IkResponder::new(&responder_keys.private_bytes(), CipherChoice::ChaChaPoly).unwrap();
            let (responder_session, msg2, _payload0) = responder.respond(&msg1, b"").unwrap();
            let (initiator_session, _payload1) = initiator.finish(&msg2).unwrap();

            assert_eq!(initiator_session.peer_static(), &responder_keys_pub);
            assert_eq!(responder_session.peer_static(), &initiator_keys_pub);
        }
    }

    #[test]
    fn initial_payloads_round_trip_through_handshake() {
        let initiator_keys = KeyPair::generate().unwrap();
        let responder_keys = KeyPair::generate().unwrap();

        let (initiator, msg1) = IkInitiator::new(
            &initiator_keys.private_bytes(),
            &responder_keys.public,
            CipherChoice::ChaChaPoly,
            b"hello from alice",
        )
        .unwrap();

        let responder = IkResponder::new(&responder_keys.private_bytes(), CipherChoice::ChaChaPoly).unwrap();
        let (_responder_session, msg2, payload0) = responder.respond(&msg1, b"hello from bob").unwrap();
        assert_eq!(payload0, b"hello from alice");

        let (_initiator_session, payload1) = initiator.finish(&msg2).unwrap();
        assert_eq!(payload1, b"hello from bob");
    }

    #[test]
    fn completed_session_encrypts_and_decrypts() {
        let (mut initiator_session, mut responder_session) = handshake();
        let ciphertext = initiator_session.encrypt(b"hello responder").unwrap();
        let plaintext = responder_session.decrypt(&ciphertext).unwrap();
        assert_eq!(plaintext, b"hello responder");
    }

    #[test]
    fn garbage_first_message_is_rejected() {
        let responder_keys = KeyPair::generate().unwrap();
        let responder =
            IkResponder::new(&responder_keys.private_bytes(), CipherChoice::ChaChaPoly).unwrap();
        let result = responder.respond(&[0u8; 48], b"");
        assert!(matches!(result, Err(Error::HandshakeAuth)));
    }
}
