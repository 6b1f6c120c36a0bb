use crate::internal::curve::{CurveBN, CurvePoint, Params};
use crate::internal::errors::PreErrors;

use std::sync::Arc;

/// Fixed-layout byte encoding of the public artifacts of the scheme.
pub trait Serializable: Sized {
    fn to_bytes(&self) -> Vec<u8>;

    /// Any malformed input is reported as `PreErrors::InvalidEncoding`.
    fn from_bytes(bytes: &[u8], params: &Arc<Params>) -> Result<Self, PreErrors>;
}

/// Splits `size` bytes off the front of `bytes`.
pub(crate) fn take<'a>(bytes: &mut &'a [u8], size: usize) -> Result<&'a [u8], PreErrors> {
    if bytes.len() < size {
        return Err(PreErrors::InvalidEncoding);
    }
    let (head, tail) = bytes.split_at(size);
    *bytes = tail;
    Ok(head)
}

pub(crate) fn take_point(bytes: &mut &[u8], params: &Arc<Params>) -> Result<CurvePoint, PreErrors> {
    let size = CurvePoint::expected_bytes_length(params);
    CurvePoint::from_bytes(take(bytes, size)?, params).map_err(|_| PreErrors::InvalidEncoding)
}

pub(crate) fn take_scalar(bytes: &mut &[u8], params: &Arc<Params>) -> Result<CurveBN, PreErrors> {
    let size = CurveBN::expected_bytes_length(params);
    CurveBN::from_bytes(take(bytes, size)?, params).map_err(|_| PreErrors::InvalidEncoding)
}

pub(crate) fn take_serializable<T: Serializable>(
    bytes: &mut &[u8],
    size: usize,
    params: &Arc<Params>,
) -> Result<T, PreErrors> {
    T::from_bytes(take(bytes, size)?, params).map_err(|_| PreErrors::InvalidEncoding)
}

pub(crate) fn expect_end(bytes: &[u8]) -> Result<(), PreErrors> {
    if bytes.is_empty() {
        Ok(())
    } else {
        Err(PreErrors::InvalidEncoding)
    }
}
