use crate::{Signer, SignerError};
use async_trait::async_trait;
use ed25519_dalek::Signer as _;
use txkit_core::types::{Algorithm, Bytes, KeyMaterial};

/// Signs with the private component of the key it is handed.
///
/// Signing is deterministic: secp256k1 uses RFC6979 nonces and ed25519 signatures are
/// deterministic by construction, so identical inputs yield identical signatures.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalSigner;

impl LocalSigner {
    fn sign_secp256k1(&self, digest: &[u8], key: &KeyMaterial) -> Result<Bytes, SignerError> {
        if digest.len() != 32 {
            return Err(SignerError::InvalidMessage {
                algorithm: Algorithm::Secp256k1,
                reason: format!("expected a 32-byte digest, got {} bytes", digest.len()),
            })
        }
        let signing_key = key
            .secp256k1_signing_key()
            .ok_or_else(|| SignerError::MissingPrivateKey(key.identity()))?;
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| SignerError::Crypto(e.to_string()))?;

        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(&signature.to_bytes());
        out.push(recovery_id.to_byte());
        Ok(out.into())
    }

    fn sign_ed25519(&self, message: &[u8], key: &KeyMaterial) -> Result<Bytes, SignerError> {
        let signing_key = key
            .ed25519_signing_key()
            .ok_or_else(|| SignerError::MissingPrivateKey(key.identity()))?;
        Ok(signing_key.sign(message).to_bytes().into())
    }
}

#[async_trait]
impl Signer for LocalSigner {
    #[tracing::instrument(skip_all, fields(signer = %key.identity(), algorithm = %key.algorithm()))]
    async fn sign(&self, message: &[u8], key: &KeyMaterial) -> Result<Bytes, SignerError> {
        let signature = match key.algorithm() {
            Algorithm::Secp256k1 => self.sign_secp256k1(message, key)?,
            Algorithm::Ed25519 => self.sign_ed25519(message, key)?,
        };
        tracing::trace!(len = signature.len(), "produced signature");
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txkit_core::{
        types::{recover_secp256k1, verify_signature},
        utils::sha256,
    };

    #[tokio::test]
    async fn signs_secp256k1_digest() {
        let key = KeyMaterial::random(Algorithm::Secp256k1, &mut rand::thread_rng());
        let digest = sha256(b"transaction");
        let signature = LocalSigner.sign(&digest, &key).await.unwrap();

        assert_eq!(signature.len(), 65);
        assert!(signature[64] < 2);
        assert_eq!(recover_secp256k1(&digest, &signature).unwrap(), key.identity());
        // deterministic nonces
        assert_eq!(LocalSigner.sign(&digest, &key).await.unwrap(), signature);
    }

    #[tokio::test]
    async fn rejects_undigested_secp256k1_message() {
        let key = KeyMaterial::random(Algorithm::Secp256k1, &mut rand::thread_rng());
        let err = LocalSigner.sign(b"not a digest", &key).await.unwrap_err();
        assert!(matches!(err, SignerError::InvalidMessage { .. }));
    }

    #[tokio::test]
    async fn signs_ed25519_message() {
        let key = KeyMaterial::random(Algorithm::Ed25519, &mut rand::thread_rng());
        let signature = LocalSigner.sign(b"TXpayload", &key).await.unwrap();
        assert_eq!(signature.len(), 64);
        verify_signature(Algorithm::Ed25519, &key.identity(), b"TXpayload", &signature).unwrap();
    }

    #[tokio::test]
    async fn public_only_key_cannot_sign() {
        let key = KeyMaterial::random(Algorithm::Ed25519, &mut rand::thread_rng()).to_public();
        let err = LocalSigner.sign(b"TXpayload", &key).await.unwrap_err();
        assert!(matches!(err, SignerError::MissingPrivateKey(id) if id == key.identity()));
    }

    #[test]
    fn usable_as_trait_object() {
        let signer: std::sync::Arc<dyn Signer> = std::sync::Arc::new(LocalSigner);
        assert!(signer.supports(Algorithm::Ed25519));
    }
}
