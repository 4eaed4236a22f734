//! Signing keys.

use rand::{thread_rng, Rng};
use secp256k1::{schnorr::Signature, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey};

use crate::{
    error::PublishError,
    nip19::{self, Entity},
};

/// Secret key together with the public key derived from it.
#[derive(Clone)]
pub struct Keys {
    keypair: Keypair,
    public: XOnlyPublicKey,
}

impl Keys {
    /// Decode an `nsec1…` bech32 key, or a 64 character hex secret.
    pub fn parse(encoded: &str) -> Result<Self, PublishError> {
        let encoded = encoded.trim();
        if encoded.len() == 64 {
            if let Ok(bytes) = hex::decode(encoded) {
                return Self::from_slice(&bytes);
            }
        }
        match nip19::decode(encoded).map_err(|e| PublishError::KeyDecode(e.to_string()))? {
            Entity::SecretKey(bytes) => Self::from_slice(&bytes),
            Entity::PublicKey(_) => Err(PublishError::KeyDecode(
                "expected a secret key, got a public key".into(),
            )),
            Entity::Note(_) | Entity::Address(_) => Err(PublishError::KeyDecode(
                "expected a secret key, got an event reference".into(),
            )),
        }
    }

    /// Build keys from raw secret bytes.
    pub fn from_slice(secret: &[u8]) -> Result<Self, PublishError> {
        let secret =
            SecretKey::from_slice(secret).map_err(|e| PublishError::KeyDecode(e.to_string()))?;
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &secret);
        let (public, _) = keypair.x_only_public_key();
        Ok(Self { keypair, public })
    }

    /// Fresh random keys.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let keypair = Keypair::new(&secp, &mut thread_rng());
        let (public, _) = keypair.x_only_public_key();
        Self { keypair, public }
    }

    pub fn public_key(&self) -> XOnlyPublicKey {
        self.public
    }

    /// Lowercase hex of the x-only public key, as used in event `pubkey`.
    pub fn public_hex(&self) -> String {
        hex::encode(self.public_key().serialize())
    }

    pub fn npub(&self) -> Option<String> {
        nip19::encode_public(&self.public_key().serialize()).ok()
    }

    pub fn nsec(&self) -> Option<String> {
        nip19::encode_secret(&self.keypair.secret_bytes()).ok()
    }

    /// BIP-340 signature over a 32 byte event id.
    pub fn sign(&self, id: &[u8; 32]) -> Result<Signature, PublishError> {
        let secp = Secp256k1::new();
        let msg = Message::from_digest(*id);
        let aux: [u8; 32] = thread_rng().gen();
        let sig = secp.sign_schnorr_with_aux_rand(&msg, &self.keypair, &aux);
        secp.verify_schnorr(&sig, &msg, &self.public)
            .map_err(|e| PublishError::Signing(e.to_string()))?;
        Ok(sig)
    }
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys")
            .field("public", &self.public_hex())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NSEC: &str = "nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5";
    const NSEC_HEX: &str = "67dea2ed018072d675f5415ecfaed7d2597555e202d85b3d65ea4e58d2d92ffa";
    const NPUB: &str = "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg";

    #[test]
    fn nsec_and_hex_decode_to_same_key() {
        let a = Keys::parse(NSEC).unwrap();
        let b = Keys::parse(NSEC_HEX).unwrap();
        assert_eq!(a.public_hex(), b.public_hex());
    }

    #[test]
    fn public_key_derivation_is_stable() {
        let first = Keys::parse(NSEC).unwrap().public_hex();
        for _ in 0..5 {
            assert_eq!(Keys::parse(NSEC).unwrap().public_hex(), first);
        }
    }

    #[test]
    fn rejects_public_key_in_place_of_secret() {
        let err = Keys::parse(NPUB).unwrap_err();
        assert!(matches!(err, PublishError::KeyDecode(_)));
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in ["", "nsec1", "hello", &"0".repeat(64)] {
            assert!(
                matches!(Keys::parse(bad), Err(PublishError::KeyDecode(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn signature_verifies_under_derived_key() {
        let keys = Keys::from_slice(&[1u8; 32]).unwrap();
        let id = [9u8; 32];
        let sig = keys.sign(&id).unwrap();
        let secp = Secp256k1::verification_only();
        secp.verify_schnorr(&sig, &Message::from_digest(id), &keys.public_key())
            .unwrap();
    }

    #[test]
    fn generated_keys_round_trip_through_nsec() {
        let keys = Keys::generate();
        let nsec = keys.nsec().unwrap();
        assert!(nsec.starts_with("nsec1"));
        assert_eq!(Keys::parse(&nsec).unwrap().public_hex(), keys.public_hex());
        assert_ne!(Keys::generate().public_hex(), keys.public_hex());
    }

    #[test]
    fn debug_does_not_leak_secret() {
        let keys = Keys::parse(NSEC).unwrap();
        let dbg = format!("{keys:?}");
        assert!(!dbg.contains(NSEC_HEX));
    }
}
