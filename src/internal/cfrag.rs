use crate::internal::capsule::Capsule;
use crate::internal::curve::{CurveBN, CurvePoint, Params};
use crate::internal::errors::PreErrors;
use crate::internal::hashing::{hash_to_cfrag_verification, kfrag_signature_message};
use crate::internal::keys::{PublicKey, Signature};
use crate::internal::kfrag::KFrag;
use crate::internal::serializable::{
    expect_end, take, take_point, take_scalar, take_serializable, Serializable,
};

use std::convert::{TryFrom, TryInto};
use std::sync::Arc;

use tracing::debug;

/// Length prefix of the metadata trailer.
fn metadata_len_prefix(len: usize) -> Result<[u8; 4], PreErrors> {
    u32::try_from(len)
        .map(u32::to_be_bytes)
        .map_err(|_| PreErrors::MetadataTooLong(len))
}

/// Non-interactive proof that a capsule fragment was computed with the share
/// committed to in its key fragment.
#[derive(Clone, PartialEq, Debug)]
pub struct CorrectnessProof {
    e2: CurvePoint,
    v2: CurvePoint,
    kfrag_commitment: CurvePoint,
    kfrag_pok: CurvePoint,
    z3: CurveBN,
    kfrag_signature: Signature,
}

impl CorrectnessProof {
    pub fn expected_bytes_length(params: &Arc<Params>) -> usize {
        let bn_size = CurveBN::expected_bytes_length(params);
        let point_size = CurvePoint::expected_bytes_length(params);

        // e2, v2, kfrag_commitment, kfrag_pok: 4 point_size
        // z3: 1 bn_size
        // kfrag_signature: 2 bn_size
        point_size * 4 + bn_size * 3
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.e2.to_bytes();
        bytes.extend_from_slice(&self.v2.to_bytes());
        bytes.extend_from_slice(&self.kfrag_commitment.to_bytes());
        bytes.extend_from_slice(&self.kfrag_pok.to_bytes());
        bytes.extend_from_slice(&self.z3.to_bytes());
        bytes.extend_from_slice(&self.kfrag_signature.to_bytes());
        bytes
    }

    fn take_from(rest: &mut &[u8], params: &Arc<Params>) -> Result<Self, PreErrors> {
        Ok(CorrectnessProof {
            e2: take_point(rest, params)?,
            v2: take_point(rest, params)?,
            kfrag_commitment: take_point(rest, params)?,
            kfrag_pok: take_point(rest, params)?,
            z3: take_scalar(rest, params)?,
            kfrag_signature: take_serializable(
                rest,
                Signature::expected_bytes_length(params),
                params,
            )?,
        })
    }

    pub fn kfrag_commitment(&self) -> &CurvePoint {
        &self.kfrag_commitment
    }
}

/// A proxy's re-encryption of a capsule under one key fragment.
#[derive(Clone, PartialEq, Debug)]
pub struct CFrag {
    e_i_point: CurvePoint,
    v_i_point: CurvePoint,
    kfrag_id: CurveBN,
    precursor: CurvePoint,
    proof: CorrectnessProof,
    metadata: Option<Vec<u8>>,
}

impl CFrag {
    /// Re-encrypts `capsule` with the share of `kfrag` and proves it.
    /// The capsule must already have been checked.
    pub(crate) fn from_kfrag(
        capsule: &Capsule,
        kfrag: &KFrag,
        metadata: Option<&[u8]>,
    ) -> Result<Self, PreErrors> {
        if let Some(metadata) = metadata {
            metadata_len_prefix(metadata.len())?;
        }
        let params = capsule.params();
        let rk = kfrag.re_key_share();
        let e1 = capsule.e() * rk;
        let v1 = capsule.v() * rk;

        let t = CurveBN::rand_curve_bn(params)?;
        let u = CurvePoint::u_point(params)?;
        let e2 = capsule.e() * &t;
        let v2 = capsule.v() * &t;
        let u2 = &u * &t;

        let h = hash_to_cfrag_verification(
            &[
                capsule.e(),
                &e1,
                &e2,
                capsule.v(),
                &v1,
                &v2,
                &u,
                kfrag.commitment(),
                &u2,
            ],
            metadata,
        )?;
        let z3 = &t + &(&h * rk);

        Ok(CFrag {
            e_i_point: e1,
            v_i_point: v1,
            kfrag_id: kfrag.id().clone(),
            precursor: kfrag.precursor().clone(),
            proof: CorrectnessProof {
                e2,
                v2,
                kfrag_commitment: kfrag.commitment().clone(),
                kfrag_pok: u2,
                z3,
                kfrag_signature: kfrag.signature_for_receiver().clone(),
            },
            metadata: metadata.map(|m| m.to_vec()),
        })
    }

    /// Checks that this fragment was produced from `capsule` with a key
    /// fragment signed by `signing_pk` for the pair of keys given.
    pub fn verify(
        &self,
        capsule: &Capsule,
        signing_pk: &PublicKey,
        delegating_pk: &PublicKey,
        receiving_pk: &PublicKey,
    ) -> bool {
        let params = capsule.params();
        if self.e_i_point.params() != params
            || [signing_pk, delegating_pk, receiving_pk]
                .iter()
                .any(|key| key.params() != params)
        {
            return false;
        }
        if !capsule.verify() {
            debug!("cfrag checked against an invalid capsule");
            return false;
        }

        let proof = &self.proof;
        let message = kfrag_signature_message(
            &self.kfrag_id,
            &proof.kfrag_commitment,
            &self.precursor,
            Some(delegating_pk),
            Some(receiving_pk),
        );
        if !proof.kfrag_signature.verify(&message, signing_pk) {
            debug!("cfrag carries an invalid kfrag signature");
            return false;
        }

        let u = match CurvePoint::u_point(params) {
            Ok(u) => u,
            Err(_) => return false,
        };
        let h = match hash_to_cfrag_verification(
            &[
                capsule.e(),
                &self.e_i_point,
                &proof.e2,
                capsule.v(),
                &self.v_i_point,
                &proof.v2,
                &u,
                &proof.kfrag_commitment,
                &proof.kfrag_pok,
            ],
            self.metadata.as_deref(),
        ) {
            Ok(h) => h,
            Err(_) => return false,
        };

        let z3 = &proof.z3;
        let correct_e = capsule.e() * z3 == &proof.e2 + &(&self.e_i_point * &h);
        let correct_v = capsule.v() * z3 == &proof.v2 + &(&self.v_i_point * &h);
        let correct_u = &u * z3 == &proof.kfrag_pok + &(&proof.kfrag_commitment * &h);

        if !(correct_e && correct_v && correct_u) {
            debug!("cfrag correctness proof does not hold");
            return false;
        }
        true
    }

    pub fn expected_bytes_length(params: &Arc<Params>) -> usize {
        let bn_size = CurveBN::expected_bytes_length(params);
        let point_size = CurvePoint::expected_bytes_length(params);

        // e_i_point, v_i_point, precursor: 3 point_size
        // kfrag_id: 1 bn_size
        // followed by the proof and the metadata trailer
        point_size * 3 + bn_size + CorrectnessProof::expected_bytes_length(params)
    }

    pub fn e_i_point(&self) -> &CurvePoint {
        &self.e_i_point
    }

    pub fn v_i_point(&self) -> &CurvePoint {
        &self.v_i_point
    }

    pub fn kfrag_id(&self) -> &CurveBN {
        &self.kfrag_id
    }

    pub fn precursor(&self) -> &CurvePoint {
        &self.precursor
    }

    pub fn proof(&self) -> &CorrectnessProof {
        &self.proof
    }

    pub fn metadata(&self) -> Option<&[u8]> {
        self.metadata.as_deref()
    }
}

impl Serializable for CFrag {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.e_i_point.to_bytes();
        bytes.extend_from_slice(&self.v_i_point.to_bytes());
        bytes.extend_from_slice(&self.kfrag_id.to_bytes());
        bytes.extend_from_slice(&self.precursor.to_bytes());
        bytes.extend_from_slice(&self.proof.to_bytes());
        match &self.metadata {
            Some(metadata) => {
                bytes.push(0x01);
                let prefix = metadata_len_prefix(metadata.len())
                    .expect("metadata length is checked when the cfrag is built");
                bytes.extend_from_slice(&prefix);
                bytes.extend_from_slice(metadata);
            }
            None => bytes.push(0x00),
        }
        bytes
    }

    fn from_bytes(bytes: &[u8], params: &Arc<Params>) -> Result<Self, PreErrors> {
        let mut rest = bytes;

        let e_i_point = take_point(&mut rest, params)?;
        let v_i_point = take_point(&mut rest, params)?;
        let kfrag_id = take_scalar(&mut rest, params)?;
        let precursor = take_point(&mut rest, params)?;
        let proof = CorrectnessProof::take_from(&mut rest, params)?;
        let metadata = match take(&mut rest, 1)?[0] {
            0x00 => None,
            0x01 => {
                let len_bytes: [u8; 4] = take(&mut rest, 4)?
                    .try_into()
                    .map_err(|_| PreErrors::InvalidEncoding)?;
                let len = u32::from_be_bytes(len_bytes) as usize;
                Some(take(&mut rest, len)?.to_vec())
            }
            _ => return Err(PreErrors::InvalidEncoding),
        };
        expect_end(rest)?;

        Ok(CFrag {
            e_i_point,
            v_i_point,
            kfrag_id,
            precursor,
            proof,
            metadata,
        })
    }
}
