//! Verifies the manifest signature and merkle root, then rehashes every
//! `payload/` file against its manifest entry. Both checks are
//! fail-closed and run before anything touches the service or the
//! install directory.

use std::path::Path;

use ransomeye_integrity::{canonical_bytes_of, merkle_root, sha256_hex, VerifyingIdentity};
use ransomeye_types::UpdateManifest;

use crate::error::UpdaterError;

pub struct VerifiedUpdate {
    pub manifest: UpdateManifest,
}

/// `bundle_root` is an already-unpacked update bundle directory
/// containing `manifest.json`, `manifest.sig`, and `payload/`.
pub fn verify_update(bundle_root: &Path, verifier: &VerifyingIdentity) -> Result<VerifiedUpdate, UpdaterError> {
    let manifest_bytes = std::fs::read(bundle_root.join("manifest.json"))?;
    let manifest_sig = std::fs::read(bundle_root.join("manifest.sig"))?;

    verifier.verify(&manifest_bytes, &manifest_sig).map_err(|_| UpdaterError::Signature)?;
    let manifest: UpdateManifest = serde_json::from_slice(&manifest_bytes)?;

    let recomputed = merkle_root(&manifest.entries);
    if recomputed != manifest.merkle_root {
        return Err(ransomeye_integrity::IntegrityError::MerkleMismatch {
            expected: manifest.merkle_root.clone(),
            actual: recomputed,
        }
        .into());
    }

    for entry in &manifest.entries {
        let entry_path = bundle_root.join(&entry.path);
        let bytes = std::fs::read(&entry_path).map_err(|_| UpdaterError::MissingEntry(entry.path.clone()))?;
        if bytes.len() as u64 != entry.size || sha256_hex(&bytes) != entry.sha256 {
            return Err(UpdaterError::EntryMismatch { path: entry.path.clone() });
        }
    }

    // Re-derive the manifest's own canonical bytes to confirm the
    // signature covered exactly this manifest and not a stale copy with
    // the same merkle root (entries could in principle collide on root
    // while differing in producer/version metadata).
    let recanonicalized = canonical_bytes_of(&manifest)?;
    if recanonicalized != manifest_bytes {
        return Err(UpdaterError::Signature);
    }

    Ok(VerifiedUpdate { manifest })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ransomeye_integrity::{write_atomic, SigningIdentity};
    use ransomeye_types::bundle::{Compression, ManifestAlgorithms, ManifestEntry, ManifestProducer};
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
    use rsa::RsaPrivateKey;
    use tempfile::tempdir;

    fn keypair() -> (SigningIdentity, VerifyingIdentity) {
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let private_pem = key.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let public_pem = rsa::RsaPublicKey::from(&key).to_public_key_pem(LineEnding::LF).unwrap();
        (SigningIdentity::from_pkcs8_pem(&private_pem).unwrap(), VerifyingIdentity::from_public_pkcs8_pem(&public_pem).unwrap())
    }

    fn build_update_bundle(dir: &Path, signer: &SigningIdentity) {
        std::fs::create_dir_all(dir.join("payload")).unwrap();
        let payload_bytes = b"agent binary bytes";
        std::fs::write(dir.join("payload").join("ransomeye-agent"), payload_bytes).unwrap();

        let entry = ManifestEntry {
            path: "payload/ransomeye-agent".to_string(),
            size: payload_bytes.len() as u64,
            sha256: sha256_hex(payload_bytes),
            chunk_index: None,
        };
        let entries = vec![entry];
        let root = merkle_root(&entries);

        let manifest = UpdateManifest {
            version: "1".to_string(),
            producer: ManifestProducer {
                name: "ransomeye-updater".to_string(),
                version: "0.1.0".to_string(),
                node_id: "node-a".to_string(),
            },
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            algorithms: ManifestAlgorithms {
                compression: Compression::Zstd,
                ..ManifestAlgorithms::default()
            },
            target_version: "1.2.3".to_string(),
            self_test_path: "payload/self_test.sh".to_string(),
            entries,
            merkle_root: root,
        };
        let manifest_bytes = canonical_bytes_of(&manifest).unwrap();
        write_atomic(&dir.join("manifest.json"), &manifest_bytes).unwrap();
        let sig = signer.sign(&manifest_bytes);
        write_atomic(&dir.join("manifest.sig"), &sig).unwrap();
    }

    #[test]
    fn verifies_a_well_formed_update_bundle() {
        let (signer, verifier) = keypair();
        let dir = tempdir().unwrap();
        build_update_bundle(dir.path(), &signer);

        let verified = verify_update(dir.path(), &verifier).unwrap();
        assert_eq!(verified.manifest.target_version, "1.2.3");
    }

    #[test]
    fn a_tampered_payload_file_is_rejected_before_anything_else() {
        let (signer, verifier) = keypair();
        let dir = tempdir().unwrap();
        build_update_bundle(dir.path(), &signer);
        std::fs::write(dir.path().join("payload").join("ransomeye-agent"), b"tampered bytes").unwrap();

        assert!(verify_update(dir.path(), &verifier).is_err());
    }

    #[test]
    fn a_bad_signature_is_rejected() {
        let (signer, _verifier) = keypair();
        let (_other_signer, other_verifier) = keypair();
        let dir = tempdir().unwrap();
        build_update_bundle(dir.path(), &signer);

        assert!(verify_update(dir.path(), &other_verifier).is_err());
    }
}
