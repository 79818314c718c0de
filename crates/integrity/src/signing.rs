//! RSA-PSS signing and verification over SHA-256, salt length equal to the
//! digest length. Keys are RSA-4096, loaded from PKCS#8 PEM.

use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::error::IntegrityError;

pub struct SigningIdentity {
    key: SigningKey<Sha256>,
}

impl SigningIdentity {
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, IntegrityError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| IntegrityError::Key(e.to_string()))?;
        Ok(SigningIdentity {
            key: SigningKey::<Sha256>::new(private_key),
        })
    }

    /// `sign(key, bytes) -> bytes`. PSS signing is randomized: two
    /// signatures over identical bytes differ but both verify.
    pub fn sign(&self, bytes: &[u8]) -> Vec<u8> {
        let mut rng = rand::rngs::OsRng;
        let signature = self.key.sign_with_rng(&mut rng, bytes);
        signature.to_bytes().to_vec()
    }
}

pub struct VerifyingIdentity {
    key: VerifyingKey<Sha256>,
}

impl VerifyingIdentity {
    pub fn from_public_pkcs8_pem(pem: &str) -> Result<Self, IntegrityError> {
        let public_key = RsaPublicKey::from_public_key_pem(pem).map_err(|e| IntegrityError::Key(e.to_string()))?;
        Ok(VerifyingIdentity {
            key: VerifyingKey::<Sha256>::new(public_key),
        })
    }

    /// `verify(pub, bytes, sig) -> {ok | err}`. Fails closed: any error,
    /// including a malformed signature encoding, maps to `ErrSignature`.
    pub fn verify(&self, bytes: &[u8], sig_bytes: &[u8]) -> Result<(), IntegrityError> {
        let signature = Signature::try_from(sig_bytes).map_err(|_| IntegrityError::Signature)?;
        self.key.verify(bytes, &signature).map_err(|_| IntegrityError::Signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    fn test_keypair() -> (String, String) {
        let mut rng = rand::rngs::OsRng;
        // A small modulus keeps the unit test fast; production keys are
        // RSA-4096, enforced at deployment/config validation time.
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = RsaPublicKey::from(&private);
        (
            private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string(),
            public.to_public_key_pem(LineEnding::LF).unwrap(),
        )
    }

    #[test]
    fn sign_then_verify_round_trips() {
        let (sk_pem, pk_pem) = test_keypair();
        let signer = SigningIdentity::from_pkcs8_pem(&sk_pem).unwrap();
        let verifier = VerifyingIdentity::from_public_pkcs8_pem(&pk_pem).unwrap();

        let bytes = b"canonical manifest bytes";
        let sig = signer.sign(bytes);
        verifier.verify(bytes, &sig).unwrap();
    }

    #[test]
    fn tampered_bytes_fail_verification() {
        let (sk_pem, pk_pem) = test_keypair();
        let signer = SigningIdentity::from_pkcs8_pem(&sk_pem).unwrap();
        let verifier = VerifyingIdentity::from_public_pkcs8_pem(&pk_pem).unwrap();

        let sig = signer.sign(b"original");
        assert!(verifier.verify(b"tampered", &sig).is_err());
    }

    #[test]
    fn two_signatures_over_same_bytes_both_verify() {
        let (sk_pem, pk_pem) = test_keypair();
        let signer = SigningIdentity::from_pkcs8_pem(&sk_pem).unwrap();
        let verifier = VerifyingIdentity::from_public_pkcs8_pem(&pk_pem).unwrap();

        let bytes = b"same bytes, twice";
        let sig_a = signer.sign(bytes);
        let sig_b = signer.sign(bytes);
        assert_ne!(sig_a, sig_b, "PSS salts must differ between signings");
        verifier.verify(bytes, &sig_a).unwrap();
        verifier.verify(bytes, &sig_b).unwrap();
    }
}
