use crate::internal::curve::{CurveBN, CurvePoint, Params};
use crate::internal::errors::PreErrors;
use crate::internal::schemes::{Hash, SHA256Hash};
use crate::internal::serializable::{expect_end, take_scalar, Serializable};

use std::fmt;
use std::sync::Arc;

use openssl::ec::EcKey;
use openssl::ecdsa::EcdsaSig;
use openssl::pkey::Private;
use zeroize::Zeroizing;

/// A secret scalar, owned by exactly one party.
pub struct SecretKey {
    scalar: CurveBN,
}

impl SecretKey {
    pub fn random(params: &Arc<Params>) -> Result<Self, PreErrors> {
        Ok(SecretKey {
            scalar: CurveBN::rand_curve_bn(params)?,
        })
    }

    /// Restores a key exported with `to_secret_bytes`.
    pub fn from_secret_bytes(bytes: &[u8], params: &Arc<Params>) -> Result<Self, PreErrors> {
        Ok(SecretKey {
            scalar: CurveBN::from_bytes(bytes, params)?,
        })
    }

    /// Exports the secret scalar. The buffer is wiped when dropped.
    pub fn to_secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        self.scalar.to_secret_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(self)
    }

    pub fn params(&self) -> &Arc<Params> {
        self.scalar.params()
    }

    pub(crate) fn to_secret_scalar(&self) -> &CurveBN {
        &self.scalar
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SecretKey {{ <redacted> }}")
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct PublicKey {
    point: CurvePoint,
}

impl PublicKey {
    pub fn from_secret_key(sk: &SecretKey) -> Self {
        PublicKey {
            point: CurvePoint::mul_gen(&sk.scalar, sk.params()),
        }
    }

    pub fn to_point(&self) -> &CurvePoint {
        &self.point
    }

    pub fn params(&self) -> &Arc<Params> {
        self.point.params()
    }
}

impl Serializable for PublicKey {
    fn to_bytes(&self) -> Vec<u8> {
        self.point.to_bytes()
    }

    fn from_bytes(bytes: &[u8], params: &Arc<Params>) -> Result<Self, PreErrors> {
        let point = CurvePoint::from_bytes(bytes, params).map_err(|_| PreErrors::InvalidEncoding)?;
        Ok(PublicKey { point })
    }
}

/// ECDSA signature over the SHA-256 digest of a message.
#[derive(Clone, PartialEq, Debug)]
pub struct Signature {
    r: CurveBN,
    s: CurveBN,
}

impl Signature {
    fn from_ecdsa_sig(other: &EcdsaSig, params: &Arc<Params>) -> Result<Self, PreErrors> {
        Ok(Signature {
            r: CurveBN::from_big_num(other.r(), params)?,
            s: CurveBN::from_big_num(other.s(), params)?,
        })
    }

    pub fn expected_bytes_length(params: &Arc<Params>) -> usize {
        2 * CurveBN::expected_bytes_length(params)
    }

    /// Fails closed: any backend error counts as an invalid signature.
    pub fn verify(&self, message: &[u8], verifying_pk: &PublicKey) -> bool {
        let params = verifying_pk.params();
        if params != self.r.params() {
            return false;
        }
        let digest = sha256_digest(message);

        let verified = EcKey::from_public_key(params.group(), verifying_pk.to_point().point())
            .and_then(|key| {
                let sig = EcdsaSig::from_private_components(
                    self.r.bn().to_owned()?,
                    self.s.bn().to_owned()?,
                )?;
                sig.verify(&digest, &key)
            });
        verified.unwrap_or(false)
    }
}

impl Serializable for Signature {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.r.to_bytes();
        bytes.extend_from_slice(&self.s.to_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8], params: &Arc<Params>) -> Result<Self, PreErrors> {
        let mut rest = bytes;
        let r = take_scalar(&mut rest, params)?;
        let s = take_scalar(&mut rest, params)?;
        expect_end(rest)?;
        Ok(Signature { r, s })
    }
}

fn sha256_digest(message: &[u8]) -> Vec<u8> {
    let mut hash = SHA256Hash::new(b"");
    hash.update(message);
    hash.finalize()
}

/// Signs key fragments on behalf of the delegator.
pub struct Signer {
    key: EcKey<Private>,
    verifying_key: PublicKey,
}

impl Signer {
    pub fn new(sk: &SecretKey) -> Result<Self, PreErrors> {
        let verifying_key = sk.public_key();
        let key = EcKey::from_private_components(
            sk.params().group(),
            sk.to_secret_scalar().bn(),
            verifying_key.to_point().point(),
        )?;
        Ok(Signer { key, verifying_key })
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature, PreErrors> {
        let digest = sha256_digest(message);
        let sig = EcdsaSig::sign(&digest, &self.key)?;
        Signature::from_ecdsa_sig(&sig, self.verifying_key.params())
    }

    pub fn verifying_key(&self) -> &PublicKey {
        &self.verifying_key
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Signer {{ verifying_key: {:?} }}", self.verifying_key)
    }
}
