use crate::internal::curve::{CurveBN, CurvePoint, Params};
use crate::internal::errors::PreErrors;
use crate::internal::hashing::hash_capsule_points;
use crate::internal::keys::{PublicKey, SecretKey};
use crate::internal::schemes::kdf;
use crate::internal::serializable::{expect_end, take_point, take_scalar, Serializable};

use std::sync::Arc;

use zeroize::Zeroizing;

/// The key encapsulation part of a ciphertext: `(E, V, s)` with
/// `g * s == V + E * H(E, V)`.
#[derive(Clone, PartialEq, Debug)]
pub struct Capsule {
    e_point: CurvePoint,
    v_point: CurvePoint,
    sign: CurveBN,
}

impl Capsule {
    pub fn new(e: CurvePoint, v: CurvePoint, s: CurveBN) -> Self {
        Capsule {
            e_point: e,
            v_point: v,
            sign: s,
        }
    }

    pub fn expected_bytes_length(params: &Arc<Params>) -> usize {
        let bn_size = CurveBN::expected_bytes_length(params);
        let point_size = CurvePoint::expected_bytes_length(params);

        // e_point, v_point: 2 point_size
        // sign: 1 bn_size
        bn_size + point_size * 2
    }

    /// Checks the binding of `s` to `E` and `V`. Anyone can run it.
    pub fn verify(&self) -> bool {
        let params = self.e_point.params();
        let h = match hash_capsule_points(&self.e_point, &self.v_point) {
            Ok(h) => h,
            Err(_) => return false,
        };

        let first = CurvePoint::mul_gen(&self.sign, params);
        let second = &self.v_point + &(&self.e_point * &h);

        first == second
    }

    pub fn e(&self) -> &CurvePoint {
        &self.e_point
    }

    pub fn v(&self) -> &CurvePoint {
        &self.v_point
    }

    pub fn sign(&self) -> &CurveBN {
        &self.sign
    }

    pub fn params(&self) -> &Arc<Params> {
        self.e_point.params()
    }
}

impl Serializable for Capsule {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.e_point.to_bytes();
        bytes.extend_from_slice(&self.v_point.to_bytes());
        bytes.extend_from_slice(&self.sign.to_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8], params: &Arc<Params>) -> Result<Self, PreErrors> {
        let mut rest = bytes;
        let e_point = take_point(&mut rest, params)?;
        let v_point = take_point(&mut rest, params)?;
        let sign = take_scalar(&mut rest, params)?;
        expect_end(rest)?;

        Ok(Capsule {
            e_point,
            v_point,
            sign,
        })
    }
}

/// Generates a fresh symmetric key for `receiving_pk` along with the capsule
/// that lets its owner, or a quorum of proxies, recover it.
pub fn encapsulate(
    params: &Arc<Params>,
    receiving_pk: &PublicKey,
) -> Result<(Capsule, Zeroizing<Vec<u8>>), PreErrors> {
    if params != receiving_pk.params() {
        return Err(PreErrors::CurveMismatch);
    }

    let r = CurveBN::rand_curve_bn(params)?;
    let u = CurveBN::rand_curve_bn(params)?;
    let e = CurvePoint::mul_gen(&r, params);
    let v = CurvePoint::mul_gen(&u, params);

    let h = hash_capsule_points(&e, &v)?;
    let s = &u + &(&r * &h);

    let shared_key = receiving_pk.to_point() * &(&r + &u);
    let key = kdf(&Zeroizing::new(shared_key.to_bytes()))?;

    Ok((Capsule::new(e, v, s), key))
}

/// Recovers the key of a capsule made for the owner of `decrypting_sk`.
pub fn decapsulate_direct(
    decrypting_sk: &SecretKey,
    capsule: &Capsule,
) -> Result<Zeroizing<Vec<u8>>, PreErrors> {
    if decrypting_sk.params() != capsule.params() {
        return Err(PreErrors::CurveMismatch);
    }
    if !capsule.verify() {
        return Err(PreErrors::InvalidCapsule);
    }

    let shared_key = &(capsule.e() + capsule.v()) * decrypting_sk.to_secret_scalar();
    kdf(&Zeroizing::new(shared_key.to_bytes()))
}
