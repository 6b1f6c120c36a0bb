use crate::internal::curve::{CurveBN, CurvePoint};
use crate::internal::errors::PreErrors;
use crate::internal::keys::PublicKey;
use crate::internal::schemes::{hash_to_curvebn, Blake2bHash, ExtendedKeccak};
use crate::internal::serializable::Serializable;

const NON_INTERACTIVE: &[u8] = b"NON_INTERACTIVE";
const X_COORDINATE: &[u8] = b"X_COORDINATE";
const CFRAG_VERIFICATION: &[u8] = b"CFRAG_VERIFICATION";

/// Appends an optional field so that an absent value never collides with a
/// present one: `0x00`, or `0x01` followed by the length and the bytes.
pub fn append_optional(buf: &mut Vec<u8>, value: Option<&[u8]>) {
    match value {
        Some(bytes) => {
            buf.push(0x01);
            buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
            buf.extend_from_slice(bytes);
        }
        None => buf.push(0x00),
    }
}

/// Challenge `h = H(E, V)` binding a capsule.
pub fn hash_capsule_points(e: &CurvePoint, v: &CurvePoint) -> Result<CurveBN, PreErrors> {
    let mut to_hash = e.to_bytes();
    to_hash.extend_from_slice(&v.to_bytes());
    hash_to_curvebn::<Blake2bHash>(&to_hash, e.params(), None)
}

fn dh_transcript(precursor: &CurvePoint, receiving_pk: &PublicKey, dh_point: &CurvePoint) -> Vec<u8> {
    let mut to_hash = precursor.to_bytes();
    to_hash.extend_from_slice(&receiving_pk.to_bytes());
    to_hash.extend_from_slice(&dh_point.to_bytes());
    to_hash
}

/// The scalar `d` that lets the recipient rebuild the key without talking to
/// the delegator.
pub fn hash_to_shared_secret(
    precursor: &CurvePoint,
    receiving_pk: &PublicKey,
    dh_point: &CurvePoint,
) -> Result<CurveBN, PreErrors> {
    let to_hash = dh_transcript(precursor, receiving_pk, dh_point);
    hash_to_curvebn::<Blake2bHash>(&to_hash, precursor.params(), Some(NON_INTERACTIVE))
}

/// Share index of the fragment with identifier `id`.
pub fn hash_to_polynomial_arg(
    precursor: &CurvePoint,
    receiving_pk: &PublicKey,
    dh_point: &CurvePoint,
    id: &CurveBN,
) -> Result<CurveBN, PreErrors> {
    let mut to_hash = dh_transcript(precursor, receiving_pk, dh_point);
    to_hash.extend_from_slice(&id.to_bytes());
    hash_to_curvebn::<Blake2bHash>(&to_hash, precursor.params(), Some(X_COORDINATE))
}

pub fn kfrag_signature_message(
    id: &CurveBN,
    commitment: &CurvePoint,
    precursor: &CurvePoint,
    delegating_pk: Option<&PublicKey>,
    receiving_pk: Option<&PublicKey>,
) -> Vec<u8> {
    let mut message = id.to_bytes();
    message.extend_from_slice(&commitment.to_bytes());
    message.extend_from_slice(&precursor.to_bytes());
    append_optional(&mut message, delegating_pk.map(|pk| pk.to_bytes()).as_deref());
    append_optional(&mut message, receiving_pk.map(|pk| pk.to_bytes()).as_deref());
    message
}

/// Fiat-Shamir challenge of a re-encryption proof.
pub fn hash_to_cfrag_verification(
    points: &[&CurvePoint],
    metadata: Option<&[u8]>,
) -> Result<CurveBN, PreErrors> {
    let params = match points.first() {
        Some(point) => point.params(),
        None => return Err(PreErrors::InvalidPoint),
    };
    let mut to_hash = Vec::new();
    for point in points {
        to_hash.extend_from_slice(&point.to_bytes());
    }
    append_optional(&mut to_hash, metadata);
    hash_to_curvebn::<ExtendedKeccak>(&to_hash, params, Some(CFRAG_VERIFICATION))
}
