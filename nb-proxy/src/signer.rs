//! HMAC signing and re-signing of Jupyter wire messages
//!
//! Each side of the bridge authenticates messages with its own key. The proxy
//! never validates incoming signatures; it replaces them with one the receiving
//! side will accept.

use crate::message::{ConnectionInfo, SignatureScheme, DELIMITER};
use bytes::Bytes;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Number of frames after the signature covered by it
pub const SIGNED_FRAMES: usize = 4;

/// Signs message envelopes with one side's key
#[derive(Debug, Clone)]
pub struct Signer {
    key: Bytes,
    scheme: SignatureScheme,
}

impl Signer {
    pub fn new(key: impl Into<Bytes>, scheme: SignatureScheme) -> Self {
        Self {
            key: key.into(),
            scheme,
        }
    }

    /// Signer for messages that will be validated by the side described by `info`
    pub fn for_connection(info: &ConnectionInfo) -> Self {
        Self::new(info.key.clone().into_bytes(), info.signature_scheme)
    }

    /// Whether this signer produces empty signatures
    pub fn is_disabled(&self) -> bool {
        self.key.is_empty()
    }

    /// Hex-encoded HMAC over `parts`, or an empty frame when the key is empty
    pub fn sign(&self, parts: &[Bytes]) -> Bytes {
        if self.is_disabled() {
            return Bytes::new();
        }

        let digest = match self.scheme {
            SignatureScheme::HmacSha256 => {
                hex::encode(keyed_mac::<HmacSha256>(&self.key, parts).finalize().into_bytes())
            }
            SignatureScheme::HmacSha512 => {
                hex::encode(keyed_mac::<HmacSha512>(&self.key, parts).finalize().into_bytes())
            }
        };

        Bytes::from(digest)
    }

    /// Check `signature` against `parts` in constant time
    pub fn verify(&self, parts: &[Bytes], signature: &[u8]) -> bool {
        if self.is_disabled() {
            return signature.is_empty();
        }

        let Ok(expected) = hex::decode(signature) else {
            return false;
        };

        match self.scheme {
            SignatureScheme::HmacSha256 => keyed_mac::<HmacSha256>(&self.key, parts)
                .verify_slice(&expected)
                .is_ok(),
            SignatureScheme::HmacSha512 => keyed_mac::<HmacSha512>(&self.key, parts)
                .verify_slice(&expected)
                .is_ok(),
        }
    }
}

/// MAC keyed with `key` that has absorbed every part
fn keyed_mac<M: Mac + KeyInit>(key: &[u8], parts: &[Bytes]) -> M {
    let mut mac = <M as KeyInit>::new_from_slice(key).expect("HMAC can take key of any size");
    parts.iter().for_each(|part| mac.update(part));
    mac
}

/// The two directions a signed message can travel through the proxy
#[derive(Debug, Clone)]
pub struct SigningKeys {
    /// Signs frontend traffic for the kernel
    pub to_kernel: Signer,
    /// Signs kernel traffic for the frontend
    pub to_frontend: Signer,
}

impl SigningKeys {
    pub fn new(frontend: &ConnectionInfo, kernel: &ConnectionInfo) -> Self {
        Self {
            to_kernel: Signer::for_connection(kernel),
            to_frontend: Signer::for_connection(frontend),
        }
    }
}

/// Replace the signature of a Jupyter wire message.
///
/// Frames look like `[ids.., <IDS|MSG>, hmac, header, parent, metadata,
/// content, buffers..]`. Only the signature frame changes; messages without
/// a delimiter are returned untouched.
pub fn resign(mut frames: Vec<Bytes>, signer: &Signer) -> Vec<Bytes> {
    let Some(delim_pos) = frames.iter().position(|f| f.as_ref() == DELIMITER) else {
        return frames;
    };

    let hmac_pos = delim_pos + 1;
    let start = (hmac_pos + 1).min(frames.len());
    let end = (start + SIGNED_FRAMES).min(frames.len());
    let signature = signer.sign(&frames[start..end]);

    if hmac_pos < frames.len() {
        frames[hmac_pos] = signature;
    } else {
        frames.push(signature);
    }

    frames
}
