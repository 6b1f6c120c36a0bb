use crate::internal::curve::{CurveBN, CurvePoint, Params};
use crate::internal::errors::PreErrors;
use crate::internal::hashing::kfrag_signature_message;
use crate::internal::keys::{PublicKey, Signature};
use crate::internal::serializable::{
    expect_end, take, take_point, take_scalar, take_serializable, Serializable,
};
use crate::internal::utils::to_hex;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

/// Which public keys the proxy signature of a fragment commits to.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum KFragMode {
    NoKey = 0,
    DelegatingOnly = 1,
    ReceivingOnly = 2,
    DelegatingAndReceiving = 3,
}

impl KFragMode {
    pub fn from_flags(sign_delegating_key: bool, sign_receiving_key: bool) -> Self {
        match (sign_delegating_key, sign_receiving_key) {
            (false, false) => KFragMode::NoKey,
            (true, false) => KFragMode::DelegatingOnly,
            (false, true) => KFragMode::ReceivingOnly,
            (true, true) => KFragMode::DelegatingAndReceiving,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self, PreErrors> {
        match value {
            0 => Ok(KFragMode::NoKey),
            1 => Ok(KFragMode::DelegatingOnly),
            2 => Ok(KFragMode::ReceivingOnly),
            3 => Ok(KFragMode::DelegatingAndReceiving),
            _ => Err(PreErrors::InvalidEncoding),
        }
    }

    pub fn delegating_key_in_signature(self) -> bool {
        matches!(
            self,
            KFragMode::DelegatingOnly | KFragMode::DelegatingAndReceiving
        )
    }

    pub fn receiving_key_in_signature(self) -> bool {
        matches!(
            self,
            KFragMode::ReceivingOnly | KFragMode::DelegatingAndReceiving
        )
    }
}

/// One share of a re-encryption key, held by a single proxy.
#[derive(Clone, PartialEq)]
pub struct KFrag {
    identifier: CurveBN,
    re_key_share: CurveBN,
    precursor: CurvePoint,
    commitment: CurvePoint,
    keys_mode_in_signature: KFragMode,
    signature_for_proxy: Signature,
    signature_for_receiver: Signature,
}

impl KFrag {
    pub(crate) fn new(
        identifier: CurveBN,
        re_key_share: CurveBN,
        precursor: CurvePoint,
        commitment: CurvePoint,
        keys_mode_in_signature: KFragMode,
        signature_for_proxy: Signature,
        signature_for_receiver: Signature,
    ) -> Self {
        KFrag {
            identifier,
            re_key_share,
            precursor,
            commitment,
            keys_mode_in_signature,
            signature_for_proxy,
            signature_for_receiver,
        }
    }

    pub fn expected_bytes_length(params: &Arc<Params>) -> usize {
        let bn_size = CurveBN::expected_bytes_length(params);
        let point_size = CurvePoint::expected_bytes_length(params);

        // identifier, re_key_share: 2 bn_size
        // precursor, commitment: 2 point_size
        // keys_mode_in_signature: 1
        // signature_for_proxy, signature_for_receiver: 4 bn_size
        bn_size * 6 + point_size * 2 + 1
    }

    /// Checks the commitment to the share and the delegator's signature.
    ///
    /// The keys supplied must be exactly the keys the fragment was bound to:
    /// omitting a bound key, or passing one that was not bound, fails.
    pub fn verify(
        &self,
        signing_pk: &PublicKey,
        delegating_pk: Option<&PublicKey>,
        receiving_pk: Option<&PublicKey>,
    ) -> bool {
        let params = self.commitment.params();
        let mode = self.keys_mode_in_signature;

        if mode.delegating_key_in_signature() != delegating_pk.is_some()
            || mode.receiving_key_in_signature() != receiving_pk.is_some()
        {
            debug!(?mode, "supplied keys do not match the keys bound in the kfrag");
            return false;
        }
        let keys = [Some(signing_pk), delegating_pk, receiving_pk];
        if keys.iter().flatten().any(|key| key.params() != params) {
            return false;
        }

        // Verify that the commitment is well-formed
        let u = match CurvePoint::u_point(params) {
            Ok(u) => u,
            Err(_) => return false,
        };
        if &u * &self.re_key_share != self.commitment {
            debug!("kfrag commitment does not match its share");
            return false;
        }

        let message = kfrag_signature_message(
            &self.identifier,
            &self.commitment,
            &self.precursor,
            delegating_pk,
            receiving_pk,
        );
        self.signature_for_proxy.verify(&message, signing_pk)
    }

    pub fn id(&self) -> &CurveBN {
        &self.identifier
    }

    pub(crate) fn re_key_share(&self) -> &CurveBN {
        &self.re_key_share
    }

    pub fn precursor(&self) -> &CurvePoint {
        &self.precursor
    }

    pub fn commitment(&self) -> &CurvePoint {
        &self.commitment
    }

    pub fn keys_mode_in_signature(&self) -> KFragMode {
        self.keys_mode_in_signature
    }

    pub fn signature_for_proxy(&self) -> &Signature {
        &self.signature_for_proxy
    }

    pub fn signature_for_receiver(&self) -> &Signature {
        &self.signature_for_receiver
    }
}

impl fmt::Debug for KFrag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KFrag")
            .field("identifier", &to_hex(&self.identifier.to_bytes()))
            .field("re_key_share", &"<redacted>")
            .field("precursor", &self.precursor)
            .field("commitment", &self.commitment)
            .field("keys_mode_in_signature", &self.keys_mode_in_signature)
            .finish()
    }
}

impl Serializable for KFrag {
    fn to_bytes(&self) -> Vec<u8> {
        // no reallocation, which would leave a copy of the share in freed memory
        let mut bytes = Vec::with_capacity(Self::expected_bytes_length(self.identifier.params()));
        bytes.extend_from_slice(&self.identifier.to_bytes());
        bytes.extend_from_slice(&self.re_key_share.to_secret_bytes());
        bytes.extend_from_slice(&self.precursor.to_bytes());
        bytes.extend_from_slice(&self.commitment.to_bytes());
        bytes.push(self.keys_mode_in_signature as u8);
        bytes.extend_from_slice(&self.signature_for_proxy.to_bytes());
        bytes.extend_from_slice(&self.signature_for_receiver.to_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8], params: &Arc<Params>) -> Result<Self, PreErrors> {
        let signature_size = Signature::expected_bytes_length(params);
        let mut rest = bytes;

        let identifier = take_scalar(&mut rest, params)?;
        let re_key_share = take_scalar(&mut rest, params)?;
        let precursor = take_point(&mut rest, params)?;
        let commitment = take_point(&mut rest, params)?;
        let keys_mode_in_signature = KFragMode::from_u8(take(&mut rest, 1)?[0])?;
        let signature_for_proxy = take_serializable(&mut rest, signature_size, params)?;
        let signature_for_receiver = take_serializable(&mut rest, signature_size, params)?;
        expect_end(rest)?;

        Ok(KFrag {
            identifier,
            re_key_share,
            precursor,
            commitment,
            keys_mode_in_signature,
            signature_for_proxy,
            signature_for_receiver,
        })
    }
}
