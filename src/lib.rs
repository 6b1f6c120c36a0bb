//! Threshold proxy re-encryption (Umbral) over OpenSSL elliptic curves.
//!
//! A delegator encrypts data for its own public key, then issues `n` key
//! fragments to proxies. Any `threshold` of them can transform the capsule so
//! that a designated recipient decrypts, without any proxy learning the
//! plaintext or either party's secret key.
//!
//! ```no_run
//! use umbral_tpre::pre::*;
//!
//! # fn main() -> Result<(), PreErrors> {
//! let params = new_standard_params()?;
//! let alice = SecretKey::random(&params)?;
//! let signer = SecretKey::random(&params)?;
//! let bob = SecretKey::random(&params)?;
//!
//! let (capsule, ciphertext) = encrypt(&params, &alice.public_key(), b"Hello, umbral!")?;
//! let kfrags = generate_kfrags(&params, &alice, &bob.public_key(), &signer, 2, 3, true, true)?;
//!
//! let cfrags: Vec<CFrag> = kfrags
//!     .iter()
//!     .take(2)
//!     .map(|kfrag| reencrypt(&capsule, kfrag, None))
//!     .collect::<Result<_, _>>()?;
//!
//! let plaintext = decrypt_reencrypted(
//!     &bob,
//!     &alice.public_key(),
//!     &signer.public_key(),
//!     &capsule,
//!     &cfrags,
//!     &ciphertext,
//! )?;
//! assert_eq!(plaintext, b"Hello, umbral!".to_vec());
//! # Ok(())
//! # }
//! ```

mod internal;
pub mod pre;
