pub use crate::internal::capsule::{decapsulate_direct, encapsulate, Capsule};
pub use crate::internal::cfrag::{CFrag, CorrectnessProof};
pub use crate::internal::curve::{CurveBN, CurvePoint, Params};
pub use crate::internal::errors::PreErrors;
pub use crate::internal::keys::{PublicKey, SecretKey, Signature, Signer};
pub use crate::internal::kfrag::{KFrag, KFragMode};
pub use crate::internal::serializable::Serializable;

use crate::internal::hashing::{
    hash_capsule_points, hash_to_polynomial_arg, hash_to_shared_secret, kfrag_signature_message,
};
use crate::internal::schemes::{dem_decrypt, dem_encrypt, kdf};
use crate::internal::utils::{lambda_coeff, poly_eval};

use std::sync::Arc;

use openssl::nid::Nid;
use tracing::{debug, instrument, warn};
use zeroize::Zeroizing;

/// Creates the standard parameters needed to operate with this crate, i.e.
/// the SECP256K1 curve
pub fn new_standard_params() -> Result<Arc<Params>, PreErrors> {
    Ok(Arc::new(Params::new(Nid::SECP256K1)?))
}

/// Encrypts `plaintext` for the owner of `receiving_pk`.
///
/// Returns the KEM capsule and the DEM ciphertext. The capsule encoding is
/// used as associated data, so the ciphertext only opens with its own capsule.
#[instrument(level = "debug", skip_all, fields(plaintext_len = plaintext.len()))]
pub fn encrypt(
    params: &Arc<Params>,
    receiving_pk: &PublicKey,
    plaintext: &[u8],
) -> Result<(Capsule, Vec<u8>), PreErrors> {
    let (capsule, key) = encapsulate(params, receiving_pk)?;
    let ciphertext = dem_encrypt(&key, plaintext, &capsule.to_bytes())?;
    Ok((capsule, ciphertext))
}

/// Decrypts a ciphertext with the secret key it was originally encrypted
/// for, without any proxy involved.
#[instrument(level = "debug", skip_all, fields(ciphertext_len = ciphertext.len()))]
pub fn decrypt_original(
    decrypting_sk: &SecretKey,
    capsule: &Capsule,
    ciphertext: &[u8],
) -> Result<Vec<u8>, PreErrors> {
    let key = decapsulate_direct(decrypting_sk, capsule)?;
    dem_decrypt(&key, ciphertext, &capsule.to_bytes())
}

/// Creates a re-encryption key from the delegating secret key to the
/// receiving public key, and splits it in KFrags, using Shamir's Secret Sharing.
///
/// Any `threshold` of the `num_kfrags` fragments are enough to re-encrypt.
/// The flags choose which public keys the proxy signature of each fragment
/// commits to; `KFrag::verify` must later be given exactly those keys.
///
/// Note: the name of this function in the paper is ReKeyGen
#[allow(clippy::too_many_arguments)]
#[instrument(
    level = "debug",
    skip_all,
    fields(threshold = threshold, num_kfrags = num_kfrags)
)]
pub fn generate_kfrags(
    params: &Arc<Params>,
    delegating_sk: &SecretKey,
    receiving_pk: &PublicKey,
    signing_sk: &SecretKey,
    threshold: usize,
    num_kfrags: usize,
    sign_delegating_key: bool,
    sign_receiving_key: bool,
) -> Result<Vec<KFrag>, PreErrors> {
    if threshold == 0 || threshold > num_kfrags {
        return Err(PreErrors::ParameterMismatch(threshold, num_kfrags));
    }
    if [
        delegating_sk.params(),
        receiving_pk.params(),
        signing_sk.params(),
    ]
    .iter()
    .any(|p| *p != params)
    {
        return Err(PreErrors::CurveMismatch);
    }

    let signer = Signer::new(signing_sk)?;
    let delegating_pk = delegating_sk.public_key();
    let mode = KFragMode::from_flags(sign_delegating_key, sign_receiving_key);

    /* The precursor point is used as an ephemeral public key in a DH key exchange,
    and the resulting shared secret 'dh_point' is used to derive other secret values
    */
    let precursor_sk = CurveBN::rand_curve_bn(params)?;
    let precursor = CurvePoint::mul_gen(&precursor_sk, params);
    let dh_point = receiving_pk.to_point() * &precursor_sk;

    // Secret value 'd' allows to make Umbral non-interactive
    let d = hash_to_shared_secret(&precursor, receiving_pk, &dh_point)?;

    // Coefficients of the generating polynomial, by degree
    let mut coefficients: Vec<CurveBN> = Vec::with_capacity(threshold);
    coefficients.push(delegating_sk.to_secret_scalar() * &d.invert()?);
    for _ in 1..threshold {
        coefficients.push(CurveBN::rand_curve_bn(params)?);
    }

    let u = CurvePoint::u_point(params)?;
    let mut kfrags: Vec<KFrag> = Vec::with_capacity(num_kfrags);
    while kfrags.len() < num_kfrags {
        let kfrag_id = CurveBN::rand_curve_bn(params)?;
        if kfrags.iter().any(|kfrag| kfrag.id() == &kfrag_id) {
            debug!("kfrag id collision, drawing again");
            continue;
        }

        /*
            The index of the re-encryption key share (which in Shamir's Secret
            Sharing corresponds to x in the tuple (x, f(x)), with f being the
            generating polynomial), is used to prevent reconstruction of the
            re-encryption key without Bob's intervention
        */
        let share_index = hash_to_polynomial_arg(&precursor, receiving_pk, &dh_point, &kfrag_id)?;
        let rk = poly_eval(&coefficients, &share_index);
        let commitment = &u * &rk;

        let signature_for_receiver = signer.sign(&kfrag_signature_message(
            &kfrag_id,
            &commitment,
            &precursor,
            Some(&delegating_pk),
            Some(receiving_pk),
        ))?;
        let signature_for_proxy = signer.sign(&kfrag_signature_message(
            &kfrag_id,
            &commitment,
            &precursor,
            sign_delegating_key.then(|| &delegating_pk),
            sign_receiving_key.then(|| receiving_pk),
        ))?;

        kfrags.push(KFrag::new(
            kfrag_id,
            rk,
            precursor.clone(),
            commitment,
            mode,
            signature_for_proxy,
            signature_for_receiver,
        ));
    }

    Ok(kfrags)
}

/// Performs the re-encryption operation of proxies and produces a capsule
/// fragment, i.e. a CFrag, from a KFrag given in input.
///
/// The optional `metadata` is bound into the correctness proof.
#[instrument(level = "debug", skip_all, fields(with_metadata = metadata.is_some()))]
pub fn reencrypt(
    capsule: &Capsule,
    kfrag: &KFrag,
    metadata: Option<&[u8]>,
) -> Result<CFrag, PreErrors> {
    if capsule.params() != kfrag.precursor().params() {
        return Err(PreErrors::CurveMismatch);
    }
    if !capsule.verify() {
        warn!("refusing to re-encrypt an invalid capsule");
        return Err(PreErrors::InvalidCapsule);
    }

    CFrag::from_kfrag(capsule, kfrag, metadata)
}

/// Combines capsule fragments received from the proxies and decrypts the
/// ciphertext with the receiving secret key.
///
/// Every fragment is verified against `signing_pk`, `delegating_pk` and the
/// public key of `decrypting_sk` before being used.
#[instrument(level = "debug", skip_all, fields(num_cfrags = cfrags.len()))]
pub fn decrypt_reencrypted(
    decrypting_sk: &SecretKey,
    delegating_pk: &PublicKey,
    signing_pk: &PublicKey,
    capsule: &Capsule,
    cfrags: &[CFrag],
    ciphertext: &[u8],
) -> Result<Vec<u8>, PreErrors> {
    let key = decapsulate_reencrypted(decrypting_sk, delegating_pk, signing_pk, capsule, cfrags)?;
    dem_decrypt(&key, ciphertext, &capsule.to_bytes())
}

fn decapsulate_reencrypted(
    decrypting_sk: &SecretKey,
    delegating_pk: &PublicKey,
    signing_pk: &PublicKey,
    capsule: &Capsule,
    cfrags: &[CFrag],
) -> Result<Zeroizing<Vec<u8>>, PreErrors> {
    let params = capsule.params();
    if [
        decrypting_sk.params(),
        delegating_pk.params(),
        signing_pk.params(),
    ]
    .iter()
    .any(|p| *p != params)
    {
        return Err(PreErrors::CurveMismatch);
    }

    let first = match cfrags.first() {
        Some(cfrag) => cfrag,
        None => return Err(PreErrors::ThresholdNotMet),
    };
    for (i, cfrag) in cfrags.iter().enumerate() {
        if cfrags[..i]
            .iter()
            .any(|other| other.kfrag_id() == cfrag.kfrag_id())
        {
            warn!(index = i, "duplicate cfrag id");
            return Err(PreErrors::DuplicateFragmentId);
        }
    }

    let receiving_pk = decrypting_sk.public_key();
    for (i, cfrag) in cfrags.iter().enumerate() {
        if !cfrag.verify(capsule, signing_pk, delegating_pk, &receiving_pk) {
            warn!(index = i, "cfrag failed verification");
            return Err(PreErrors::VerificationFailed);
        }
    }

    let precursor = first.precursor();
    if cfrags.iter().any(|cfrag| cfrag.precursor() != precursor) {
        warn!("cfrags come from different kfrag batches");
        return Err(PreErrors::InconsistentFragments);
    }

    let dh_point = precursor * decrypting_sk.to_secret_scalar();
    let d = hash_to_shared_secret(precursor, &receiving_pk, &dh_point)?;

    // Combination of CFrags via Shamir's Secret Sharing reconstruction
    let xs = cfrags
        .iter()
        .map(|cfrag| hash_to_polynomial_arg(precursor, &receiving_pk, &dh_point, cfrag.kfrag_id()))
        .collect::<Result<Vec<CurveBN>, PreErrors>>()?;

    let lambda = lambda_coeff(0, &xs)?;
    let mut e_prime = first.e_i_point() * &lambda;
    let mut v_prime = first.v_i_point() * &lambda;
    for (i, cfrag) in cfrags.iter().enumerate().skip(1) {
        let lambda = lambda_coeff(i, &xs)?;
        e_prime = &e_prime + &(cfrag.e_i_point() * &lambda);
        v_prime = &v_prime + &(cfrag.v_i_point() * &lambda);
    }

    // Only a full quorum rebuilds points that satisfy the capsule relation
    let h = hash_capsule_points(capsule.e(), capsule.v())?;
    let lhs = delegating_pk.to_point() * &(capsule.sign() * &d.invert()?);
    let rhs = &(&e_prime * &h) + &v_prime;
    if lhs != rhs {
        warn!("reconstructed points do not open the capsule");
        return Err(PreErrors::ThresholdNotMet);
    }

    let shared_key = &(&e_prime + &v_prime) * &d;
    kdf(&Zeroizing::new(shared_key.to_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::RngCore;
    use std::thread;

    fn _generate_credentials(params: &Arc<Params>) -> (SecretKey, SecretKey, SecretKey) {
        let alice = SecretKey::random(params).unwrap();
        let signer = SecretKey::random(params).unwrap();
        let bob = SecretKey::random(params).unwrap();

        (alice, signer, bob)
    }

    fn _kfrags(
        params: &Arc<Params>,
        alice: &SecretKey,
        signer: &SecretKey,
        bob: &SecretKey,
        threshold: usize,
        n: usize,
    ) -> Vec<KFrag> {
        generate_kfrags(
            params,
            alice,
            &bob.public_key(),
            signer,
            threshold,
            n,
            true,
            true,
        )
        .expect("Error in generate_kfrags")
    }

    #[test]
    fn encrypt_decrypt_original() {
        let params = new_standard_params().unwrap();
        let (alice, _, _) = _generate_credentials(&params);

        let plaintext = b"Hello, umbral!".to_vec();
        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), &plaintext).unwrap();
        let plaintext_dec = decrypt_original(&alice, &capsule, &ciphertext).unwrap();
        assert_eq!(plaintext, plaintext_dec);
    }

    #[test]
    fn encrypt_decrypt_random_sizes() {
        let params = new_standard_params().unwrap();
        let (alice, _, _) = _generate_credentials(&params);
        let mut rng = rand::thread_rng();

        for size in &[0usize, 1, 31, 1024, 70_000] {
            let mut plaintext = vec![0u8; *size];
            rng.fill_bytes(&mut plaintext);
            let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), &plaintext).unwrap();
            assert_eq!(
                decrypt_original(&alice, &capsule, &ciphertext).unwrap(),
                plaintext
            );
        }
    }

    #[test]
    fn decrypt_with_wrong_key_fails() {
        let params = new_standard_params().unwrap();
        let (alice, _, bob) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"secret").unwrap();
        assert_eq!(
            decrypt_original(&bob, &capsule, &ciphertext).unwrap_err(),
            PreErrors::DecryptionFailed
        );
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let params = new_standard_params().unwrap();
        let (alice, _, _) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"Hello, umbral!").unwrap();
        for i in 0..ciphertext.len() {
            let mut tampered = ciphertext.clone();
            tampered[i] ^= 0x01;
            assert_eq!(
                decrypt_original(&alice, &capsule, &tampered).unwrap_err(),
                PreErrors::DecryptionFailed
            );
        }
        assert_eq!(
            decrypt_original(&alice, &capsule, &ciphertext[..10]).unwrap_err(),
            PreErrors::DecryptionFailed
        );
    }

    #[test]
    fn tampered_capsule_is_rejected() {
        let params = new_standard_params().unwrap();
        let (alice, _, _) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"Hello, umbral!").unwrap();
        let bytes = capsule.to_bytes();
        for i in 0..bytes.len() {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            match Capsule::from_bytes(&tampered, &params) {
                Err(err) => assert_eq!(err, PreErrors::InvalidEncoding),
                Ok(tampered_capsule) => {
                    assert!(!tampered_capsule.verify());
                    assert_eq!(
                        decrypt_original(&alice, &tampered_capsule, &ciphertext).unwrap_err(),
                        PreErrors::InvalidCapsule
                    );
                }
            }
        }
    }

    #[test]
    fn kfrags_parameter_mismatch() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        for (threshold, n) in &[(0, 5), (6, 5), (1, 0)] {
            let res = generate_kfrags(
                &params,
                &alice,
                &bob.public_key(),
                &signer,
                *threshold,
                *n,
                true,
                true,
            );
            assert_eq!(
                res.unwrap_err(),
                PreErrors::ParameterMismatch(*threshold, *n)
            );
        }
    }

    #[test]
    fn kfrags_curve_mismatch() {
        let params = new_standard_params().unwrap();
        let other_params = Arc::new(Params::new(Nid::X9_62_PRIME256V1).unwrap());
        let (alice, signer, _) = _generate_credentials(&params);
        let bob = SecretKey::random(&other_params).unwrap();

        let res = generate_kfrags(
            &params,
            &alice,
            &bob.public_key(),
            &signer,
            2,
            3,
            true,
            true,
        );
        assert_eq!(res.unwrap_err(), PreErrors::CurveMismatch);
        assert_eq!(
            encrypt(&params, &bob.public_key(), b"data").unwrap_err(),
            PreErrors::CurveMismatch
        );
    }

    #[test]
    fn kfrags_have_distinct_ids() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let kfrags = _kfrags(&params, &alice, &signer, &bob, 3, 10);
        assert_eq!(kfrags.len(), 10);
        for (i, kfrag) in kfrags.iter().enumerate() {
            assert!(!kfrag.id().is_zero());
            for other in &kfrags[i + 1..] {
                assert_ne!(kfrag.id(), other.id());
            }
            assert_eq!(kfrag.precursor(), kfrags[0].precursor());
        }
    }

    #[test]
    fn verify_kfrag_key_binding() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);
        let (alice_pk, signer_pk, bob_pk) =
            (alice.public_key(), signer.public_key(), bob.public_key());

        for &(sign_delegating, sign_receiving) in
            &[(false, false), (true, false), (false, true), (true, true)]
        {
            let kfrags = generate_kfrags(
                &params,
                &alice,
                &bob_pk,
                &signer,
                2,
                3,
                sign_delegating,
                sign_receiving,
            )
            .unwrap();
            let delegating = sign_delegating.then(|| &alice_pk);
            let receiving = sign_receiving.then(|| &bob_pk);

            for kfrag in &kfrags {
                assert_eq!(
                    kfrag.keys_mode_in_signature(),
                    KFragMode::from_flags(sign_delegating, sign_receiving)
                );
                assert!(kfrag.verify(&signer_pk, delegating, receiving));

                // the set of keys must match exactly
                let flipped_delegating = match delegating {
                    Some(_) => None,
                    None => Some(&alice_pk),
                };
                let flipped_receiving = match receiving {
                    Some(_) => None,
                    None => Some(&bob_pk),
                };
                assert!(!kfrag.verify(&signer_pk, flipped_delegating, receiving));
                assert!(!kfrag.verify(&signer_pk, delegating, flipped_receiving));
            }
        }
    }

    #[test]
    fn false_verify_kfrag() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);
        let carl = SecretKey::random(&params).unwrap();

        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 5);
        for kfrag in &kfrags {
            // wrong receiver
            assert!(!kfrag.verify(
                &signer.public_key(),
                Some(&alice.public_key()),
                Some(&carl.public_key())
            ));
            // wrong signer
            assert!(!kfrag.verify(
                &carl.public_key(),
                Some(&alice.public_key()),
                Some(&bob.public_key())
            ));
            // wrong delegator
            assert!(!kfrag.verify(
                &signer.public_key(),
                Some(&carl.public_key()),
                Some(&bob.public_key())
            ));
        }
    }

    #[test]
    fn kfrag_bytes() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let kfrags = _kfrags(&params, &alice, &signer, &bob, 1, 1);
        let kf_bytes = kfrags[0].to_bytes();
        assert_eq!(kf_bytes.len(), 259);
        assert_eq!(kf_bytes.len(), KFrag::expected_bytes_length(&params));

        let kf_new = KFrag::from_bytes(&kf_bytes, &params).expect("KFrag");
        assert_eq!(kfrags[0], kf_new);
        assert!(kf_new.verify(
            &signer.public_key(),
            Some(&alice.public_key()),
            Some(&bob.public_key())
        ));

        // mode byte sits after id, share, precursor and commitment
        let mut bad_mode = kf_bytes.clone();
        bad_mode[32 + 32 + 33 + 33] = 4;
        assert_eq!(
            KFrag::from_bytes(&bad_mode, &params).unwrap_err(),
            PreErrors::InvalidEncoding
        );
        assert_eq!(
            KFrag::from_bytes(&kf_bytes[..258], &params).unwrap_err(),
            PreErrors::InvalidEncoding
        );
    }

    #[test]
    fn kfrag_debug_hides_share() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let kfrags = _kfrags(&params, &alice, &signer, &bob, 1, 1);
        let share_hex = crate::internal::utils::to_hex(&kfrags[0].to_bytes()[32..64]);
        let printed = format!("{:?}", kfrags[0]);
        assert!(!printed.contains(&share_hex));
    }

    #[test]
    fn reencrypt_and_decrypt_all_subsets() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let plaintext = b"Hello, umbral!".to_vec();
        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), &plaintext).unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 3);
        let cfrags: Vec<CFrag> = kfrags
            .iter()
            .map(|kfrag| reencrypt(&capsule, kfrag, None).unwrap())
            .collect();

        for subset in &[[0usize, 1], [0, 2], [1, 2], [2, 0]] {
            let chosen: Vec<CFrag> = subset.iter().map(|&i| cfrags[i].clone()).collect();
            let plaintext_bob = decrypt_reencrypted(
                &bob,
                &alice.public_key(),
                &signer.public_key(),
                &capsule,
                &chosen,
                &ciphertext,
            )
            .unwrap();
            assert_eq!(plaintext_bob, plaintext);
        }

        // more than the threshold also works
        let plaintext_bob = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &cfrags,
            &ciphertext,
        )
        .unwrap();
        assert_eq!(plaintext_bob, plaintext);
    }

    #[test]
    fn reencrypted_key_matches_direct_key() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, _) = encrypt(&params, &alice.public_key(), b"data").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 3, 5);
        let mut cfrags: Vec<CFrag> = kfrags
            .iter()
            .map(|kfrag| reencrypt(&capsule, kfrag, None).unwrap())
            .collect();
        cfrags.shuffle(&mut rand::thread_rng());

        let direct = decapsulate_direct(&alice, &capsule).unwrap();
        let reencrypted = decapsulate_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &cfrags[..3],
        )
        .unwrap();
        assert_eq!(*direct, *reencrypted);
    }

    #[test]
    fn threshold_one_of_one() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"single proxy").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 1, 1);
        let cfrag = reencrypt(&capsule, &kfrags[0], None).unwrap();
        let plaintext_bob = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &[cfrag],
            &ciphertext,
        )
        .unwrap();
        assert_eq!(plaintext_bob, b"single proxy".to_vec());
    }

    #[test]
    fn sub_threshold_is_rejected() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"data").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 3, 5);
        let cfrags: Vec<CFrag> = kfrags[..2]
            .iter()
            .map(|kfrag| reencrypt(&capsule, kfrag, None).unwrap())
            .collect();

        let res = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &cfrags,
            &ciphertext,
        );
        assert_eq!(res.unwrap_err(), PreErrors::ThresholdNotMet);

        let res = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &[],
            &ciphertext,
        );
        assert_eq!(res.unwrap_err(), PreErrors::ThresholdNotMet);
    }

    #[test]
    fn duplicate_cfrags_are_rejected() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"data").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 3);

        // two re-encryptions with the same kfrag share the same id
        let cfrag_a = reencrypt(&capsule, &kfrags[0], None).unwrap();
        let cfrag_b = reencrypt(&capsule, &kfrags[0], None).unwrap();
        let res = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &[cfrag_a, cfrag_b],
            &ciphertext,
        );
        assert_eq!(res.unwrap_err(), PreErrors::DuplicateFragmentId);
    }

    #[test]
    fn proof_is_randomized_but_verifies() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, _) = encrypt(&params, &alice.public_key(), b"data").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 3);
        let cfrag_a = reencrypt(&capsule, &kfrags[0], None).unwrap();
        let cfrag_b = reencrypt(&capsule, &kfrags[0], None).unwrap();

        assert_ne!(cfrag_a.to_bytes(), cfrag_b.to_bytes());
        assert_eq!(cfrag_a.e_i_point(), cfrag_b.e_i_point());
        assert_eq!(cfrag_a.v_i_point(), cfrag_b.v_i_point());
        for cfrag in &[cfrag_a, cfrag_b] {
            assert!(cfrag.verify(
                &capsule,
                &signer.public_key(),
                &alice.public_key(),
                &bob.public_key()
            ));
        }
    }

    #[test]
    fn cfrag_fragment_binding() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);
        let carl = SecretKey::random(&params).unwrap();

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"data").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 3);
        let cfrags: Vec<CFrag> = kfrags
            .iter()
            .map(|kfrag| reencrypt(&capsule, kfrag, None).unwrap())
            .collect();

        for cfrag in &cfrags {
            assert!(cfrag.verify(
                &capsule,
                &signer.public_key(),
                &alice.public_key(),
                &bob.public_key()
            ));
            // wrong signing key
            assert!(!cfrag.verify(
                &capsule,
                &carl.public_key(),
                &alice.public_key(),
                &bob.public_key()
            ));
            // wrong receiving key
            assert!(!cfrag.verify(
                &capsule,
                &signer.public_key(),
                &alice.public_key(),
                &carl.public_key()
            ));
            // wrong delegating key
            assert!(!cfrag.verify(
                &capsule,
                &signer.public_key(),
                &carl.public_key(),
                &bob.public_key()
            ));
        }

        // carl cannot use cfrags made for bob
        let res = decrypt_reencrypted(
            &carl,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &cfrags,
            &ciphertext,
        );
        assert_eq!(res.unwrap_err(), PreErrors::VerificationFailed);

        // nor can bob when trusting the wrong signer
        let res = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &carl.public_key(),
            &capsule,
            &cfrags,
            &ciphertext,
        );
        assert_eq!(res.unwrap_err(), PreErrors::VerificationFailed);
    }

    #[test]
    fn cfrag_context_isolation() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule_a, _) = encrypt(&params, &alice.public_key(), b"first").unwrap();
        let (capsule_b, ciphertext_b) = encrypt(&params, &alice.public_key(), b"second").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 3);
        let cfrags_a: Vec<CFrag> = kfrags
            .iter()
            .map(|kfrag| reencrypt(&capsule_a, kfrag, None).unwrap())
            .collect();

        for cfrag in &cfrags_a {
            assert!(!cfrag.verify(
                &capsule_b,
                &signer.public_key(),
                &alice.public_key(),
                &bob.public_key()
            ));
        }
        let res = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule_b,
            &cfrags_a,
            &ciphertext_b,
        );
        assert_eq!(res.unwrap_err(), PreErrors::VerificationFailed);
    }

    #[test]
    fn tampered_cfrag_is_rejected() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"data").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 3);
        let cfrags: Vec<CFrag> = kfrags
            .iter()
            .map(|kfrag| reencrypt(&capsule, kfrag, None).unwrap())
            .collect();

        // flip one bit at a time in the transformed points E1 and V1
        let bytes = cfrags[0].to_bytes();
        let mut parsed = 0;
        for i in 0..66 {
            let mut tampered = bytes.clone();
            tampered[i] ^= 0x01;
            let tampered = match CFrag::from_bytes(&tampered, &params) {
                Err(err) => {
                    assert_eq!(err, PreErrors::InvalidEncoding);
                    continue;
                }
                Ok(tampered) => tampered,
            };
            parsed += 1;
            assert!(!tampered.verify(
                &capsule,
                &signer.public_key(),
                &alice.public_key(),
                &bob.public_key()
            ));

            let res = decrypt_reencrypted(
                &bob,
                &alice.public_key(),
                &signer.public_key(),
                &capsule,
                &[tampered, cfrags[1].clone()],
                &ciphertext,
            );
            assert_eq!(res.unwrap_err(), PreErrors::VerificationFailed);
        }
        // the parity bit of the tag always yields a valid point
        assert!(parsed >= 2);
    }

    #[test]
    fn metadata_is_bound_to_proof() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"data").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 3);
        let cfrags: Vec<CFrag> = kfrags
            .iter()
            .map(|kfrag| reencrypt(&capsule, kfrag, Some(&b"proxy metadata"[..])).unwrap())
            .collect();

        let mut bytes = cfrags[0].to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = CFrag::from_bytes(&bytes, &params).unwrap();
        assert!(!tampered.verify(
            &capsule,
            &signer.public_key(),
            &alice.public_key(),
            &bob.public_key()
        ));

        let plaintext_bob = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &cfrags[1..],
            &ciphertext,
        )
        .unwrap();
        assert_eq!(plaintext_bob, b"data".to_vec());
    }

    #[test]
    fn inconsistent_batches_are_rejected() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"data").unwrap();
        let kfrags_a = _kfrags(&params, &alice, &signer, &bob, 2, 3);
        let kfrags_b = _kfrags(&params, &alice, &signer, &bob, 2, 3);
        let cfrags = vec![
            reencrypt(&capsule, &kfrags_a[0], None).unwrap(),
            reencrypt(&capsule, &kfrags_b[1], None).unwrap(),
        ];

        let res = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &cfrags,
            &ciphertext,
        );
        assert_eq!(res.unwrap_err(), PreErrors::InconsistentFragments);
    }

    #[test]
    fn reencrypt_invalid_capsule() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, _) = encrypt(&params, &alice.public_key(), b"data").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 3);

        let mut bytes = capsule.to_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let forged = Capsule::from_bytes(&bytes, &params).unwrap();
        assert_eq!(
            reencrypt(&forged, &kfrags[0], None).unwrap_err(),
            PreErrors::InvalidCapsule
        );
    }

    #[test]
    fn tampered_ciphertext_after_reencryption() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"data").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 3);
        let cfrags: Vec<CFrag> = kfrags
            .iter()
            .map(|kfrag| reencrypt(&capsule, kfrag, None).unwrap())
            .collect();

        let mut tampered = ciphertext.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0x80;
        let res = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &cfrags,
            &tampered,
        );
        assert_eq!(res.unwrap_err(), PreErrors::DecryptionFailed);
    }

    #[test]
    fn concurrent_reencryption() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"Hello, umbral!").unwrap();
        let kfrags = _kfrags(&params, &alice, &signer, &bob, 3, 5);

        let capsule = Arc::new(capsule);
        let handles: Vec<_> = kfrags
            .into_iter()
            .map(|kfrag| {
                let capsule = Arc::clone(&capsule);
                thread::spawn(move || reencrypt(&capsule, &kfrag, None).unwrap())
            })
            .collect();
        let cfrags: Vec<CFrag> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();

        let plaintext_bob = decrypt_reencrypted(
            &bob,
            &alice.public_key(),
            &signer.public_key(),
            &capsule,
            &cfrags[2..],
            &ciphertext,
        )
        .unwrap();
        assert_eq!(plaintext_bob, b"Hello, umbral!".to_vec());
    }

    #[test]
    fn bytes_conv() {
        let params = new_standard_params().unwrap();
        let (alice, signer, bob) = _generate_credentials(&params);

        let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"Hello, umbral!").unwrap();
        let capsule_new = Capsule::from_bytes(&capsule.to_bytes(), &params).expect("Capsule");
        assert_eq!(capsule, capsule_new);

        let kfrags = _kfrags(&params, &alice, &signer, &bob, 2, 3);
        let cfrags: Vec<CFrag> = kfrags
            .iter()
            .map(|kfrag| {
                let kfrag = KFrag::from_bytes(&kfrag.to_bytes(), &params).expect("KFrag");
                let cfrag = reencrypt(&capsule_new, &kfrag, None).unwrap();
                CFrag::from_bytes(&cfrag.to_bytes(), &params).expect("CFrag")
            })
            .collect();

        let alice_pk = PublicKey::from_bytes(&alice.public_key().to_bytes(), &params).unwrap();
        let signer_pk = PublicKey::from_bytes(&signer.public_key().to_bytes(), &params).unwrap();
        let plaintext_bob = decrypt_reencrypted(
            &bob,
            &alice_pk,
            &signer_pk,
            &capsule_new,
            &cfrags[..2],
            &ciphertext,
        )
        .unwrap();
        assert_eq!(plaintext_bob, b"Hello, umbral!".to_vec());
    }
}
