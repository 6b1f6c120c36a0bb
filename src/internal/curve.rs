use crate::internal::errors::PreErrors;
use crate::internal::schemes::{unsafe_hash_to_point, Blake2bHash};
use crate::internal::utils::to_hex;

use std::convert::TryInto;
use std::fmt;
use std::ops::{Add, Mul, Sub};
use std::sync::Arc;

use openssl::bn::{BigNum, BigNumContext, BigNumRef};
use openssl::ec::{EcGroup, EcGroupRef, EcPoint, EcPointRef, PointConversionForm};
use openssl::nid::Nid;
use zeroize::Zeroizing;

const U_POINT_LABEL: &[u8] = b"NuCypher/UmbralParameters/u";
const HASH_TO_SCALAR_ID: &str = "blake2b-512/mod-order";
const KDF_ID: &str = "hkdf-blake2b-512";

/// Scratch space for OpenSSL big number operations, one per operation.
fn bn_ctx() -> BigNumContext {
    BigNumContext::new().expect("Error in BN context allocation")
}

/// Group configuration: the curve, its generators and its order.
pub struct Params {
    curve_name: Nid,
    group: EcGroup,
    g_point: EcPoint,
    order: BigNum,
    u_point: EcPoint,
    field_order_size_in_bytes: usize,
    group_order_size_in_bytes: usize,
}

impl Params {
    pub fn new(curve_name: Nid) -> Result<Self, PreErrors> {
        let mut ctx = BigNumContext::new()?;
        let group = EcGroup::from_curve_name(curve_name)?;
        let g_point = group.generator().to_owned(&group)?;
        let mut order = BigNum::new()?;
        group.order(&mut order, &mut ctx)?;
        let field_order_size_in_bytes = ((group.degree() + 7) / 8) as usize;
        let group_order_size_in_bytes = order.num_bytes() as usize;
        let g_bytes = g_point.to_bytes(&group, PointConversionForm::COMPRESSED, &mut ctx)?;
        let u_point =
            unsafe_hash_to_point::<Blake2bHash>(&g_bytes, U_POINT_LABEL, &group, &mut ctx)?;
        Ok(Params {
            curve_name,
            group,
            g_point,
            order,
            u_point,
            field_order_size_in_bytes,
            group_order_size_in_bytes,
        })
    }

    pub fn curve_name(&self) -> Nid {
        self.curve_name
    }

    /// Encodes the parameters as the 4-byte big-endian OpenSSL curve id.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.curve_name.as_raw().to_be_bytes().to_vec()
    }

    /// Rebuilds the parameters from `to_bytes`. Unknown curve ids are
    /// rejected as `InvalidEncoding`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PreErrors> {
        let raw: [u8; 4] = bytes.try_into().map_err(|_| PreErrors::InvalidEncoding)?;
        Params::new(Nid::from_raw(i32::from_be_bytes(raw))).map_err(|_| PreErrors::InvalidEncoding)
    }

    pub fn group(&self) -> &EcGroupRef {
        &self.group
    }

    pub fn g_point(&self) -> &EcPointRef {
        &self.g_point
    }

    pub fn order(&self) -> &BigNumRef {
        &self.order
    }

    pub fn u_point(&self) -> &EcPointRef {
        &self.u_point
    }

    pub fn field_order_size_in_bytes(&self) -> usize {
        self.field_order_size_in_bytes
    }

    pub fn group_order_size_in_bytes(&self) -> usize {
        self.group_order_size_in_bytes
    }

    /// Identifier of the function mapping byte strings to scalars.
    pub fn hash_to_scalar_id(&self) -> &'static str {
        HASH_TO_SCALAR_ID
    }

    /// Identifier of the function deriving symmetric keys from shared points.
    pub fn kdf_id(&self) -> &'static str {
        KDF_ID
    }
}

impl PartialEq for Params {
    fn eq(&self, other: &Params) -> bool {
        self.curve_name == other.curve_name
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Params {{ curve_name: {:?} }}", self.curve_name)
    }
}

/// A scalar modulo the group order.
///
/// Every value carries the OpenSSL constant-time flag and its limbs are
/// cleared when dropped, since most scalars in the scheme are secrets.
pub struct CurveBN {
    bn: BigNum,
    params: Arc<Params>,
}

impl CurveBN {
    fn wrap(mut bn: BigNum, params: &Arc<Params>) -> Self {
        bn.set_const_time();
        CurveBN {
            bn,
            params: Arc::clone(params),
        }
    }

    pub fn from_u32(n: u32, params: &Arc<Params>) -> Result<Self, PreErrors> {
        Ok(Self::wrap(BigNum::from_u32(n)?, params))
    }

    pub fn from_big_num(n: &BigNumRef, params: &Arc<Params>) -> Result<Self, PreErrors> {
        Ok(Self::wrap(n.to_owned()?, params))
    }

    pub fn from_bytes(bytes: &[u8], params: &Arc<Params>) -> Result<Self, PreErrors> {
        if bytes.len() != Self::expected_bytes_length(params) {
            return Err(PreErrors::InvalidScalar);
        }
        let bn = BigNum::from_slice(bytes).map_err(|_| PreErrors::InvalidScalar)?;
        if Self::bn_is_in_range(&bn, params) {
            Ok(Self::wrap(bn, params))
        } else {
            Err(PreErrors::InvalidScalar)
        }
    }

    /// Draws a uniformly random non-zero scalar from OpenSSL's CSPRNG.
    pub fn rand_curve_bn(params: &Arc<Params>) -> Result<Self, PreErrors> {
        let mut rand = BigNum::new()?;
        loop {
            params.order().rand_range(&mut rand)?;
            if Self::bn_is_in_range(&rand, params) {
                break;
            }
        }
        Ok(Self::wrap(rand, params))
    }

    /// Fixed-width big-endian encoding. The unpadded copy of the limbs is
    /// wiped before it is freed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let size = self.params.group_order_size_in_bytes();
        let limbs = Zeroizing::new(self.bn.to_vec());
        let mut bytes = vec![0_u8; size];
        bytes[size - limbs.len()..].copy_from_slice(&limbs);
        bytes
    }

    /// Same as `to_bytes`, for scalars that are secrets.
    pub fn to_secret_bytes(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.to_bytes())
    }

    fn bn_is_in_range(bn: &BigNumRef, params: &Arc<Params>) -> bool {
        bn.num_bits() > 0 && !bn.is_negative() && bn < params.order()
    }

    pub fn expected_bytes_length(params: &Arc<Params>) -> usize {
        params.group_order_size_in_bytes()
    }

    pub fn is_zero(&self) -> bool {
        self.bn.num_bits() == 0
    }

    pub fn invert(&self) -> Result<Self, PreErrors> {
        if self.is_zero() {
            return Err(PreErrors::InvalidScalar);
        }
        let mut res = BigNum::new()?;
        let mut ctx: BigNumContext = BigNumContext::new()?;
        res.mod_inverse(&self.bn, self.params.order(), &mut ctx)?;
        Ok(Self::wrap(res, &self.params))
    }

    pub fn bn(&self) -> &BigNumRef {
        &self.bn
    }

    pub fn params(&self) -> &Arc<Params> {
        &self.params
    }
}

impl Drop for CurveBN {
    fn drop(&mut self) {
        self.bn.clear();
    }
}

impl PartialEq for CurveBN {
    fn eq(&self, other: &CurveBN) -> bool {
        self.params == other.params && self.bn == other.bn
    }
}

impl Clone for CurveBN {
    fn clone(&self) -> Self {
        Self::wrap(
            self.bn.to_owned().expect("Error in BN cloning"),
            &self.params,
        )
    }
}

impl fmt::Debug for CurveBN {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CurveBN {{ <redacted> }}")
    }
}

impl Add for &CurveBN {
    type Output = CurveBN;

    fn add(self, other: &CurveBN) -> CurveBN {
        let mut res = BigNum::new().expect("Error in BN creation");
        res.mod_add(&self.bn, &other.bn, self.params.order(), &mut bn_ctx())
            .expect("Error in BN addition");
        CurveBN::wrap(res, &self.params)
    }
}

impl Sub for &CurveBN {
    type Output = CurveBN;

    fn sub(self, other: &CurveBN) -> CurveBN {
        let mut res = BigNum::new().expect("Error in BN creation");
        res.mod_sub(&self.bn, &other.bn, self.params.order(), &mut bn_ctx())
            .expect("Error in BN subtraction");
        CurveBN::wrap(res, &self.params)
    }
}

impl Mul for &CurveBN {
    type Output = CurveBN;

    fn mul(self, other: &CurveBN) -> CurveBN {
        let mut res = BigNum::new().expect("Error in BN creation");
        res.mod_mul(&self.bn, &other.bn, self.params.order(), &mut bn_ctx())
            .expect("Error in BN multiplication");
        CurveBN::wrap(res, &self.params)
    }
}

/// A point of the group, encoded in compressed SEC1 form.
pub struct CurvePoint {
    point: EcPoint,
    params: Arc<Params>,
}

impl CurvePoint {
    pub fn from_ec_point(p: &EcPointRef, params: &Arc<Params>) -> Result<Self, PreErrors> {
        Ok(CurvePoint {
            point: p.to_owned(params.group())?,
            params: Arc::clone(params),
        })
    }

    pub fn generator(params: &Arc<Params>) -> Result<Self, PreErrors> {
        Self::from_ec_point(params.g_point(), params)
    }

    /// The second generator `U`, whose discrete log relative to `G` is unknown.
    pub fn u_point(params: &Arc<Params>) -> Result<Self, PreErrors> {
        Self::from_ec_point(params.u_point(), params)
    }

    pub fn from_bytes(bytes: &[u8], params: &Arc<Params>) -> Result<Self, PreErrors> {
        if bytes.len() != Self::expected_bytes_length(params) {
            return Err(PreErrors::InvalidPoint);
        }
        let mut ctx: BigNumContext = BigNumContext::new()?;
        let point = EcPoint::from_bytes(params.group(), bytes, &mut ctx)
            .map_err(|_| PreErrors::InvalidPoint)?;
        if point.is_infinity(params.group()) {
            return Err(PreErrors::InvalidPoint);
        }
        Ok(CurvePoint {
            point,
            params: Arc::clone(params),
        })
    }

    pub fn mul_gen(other: &CurveBN, params: &Arc<Params>) -> Self {
        let mut res = EcPoint::new(params.group()).expect("Error in Point creation");
        res.mul_generator(params.group(), &other.bn, &bn_ctx())
            .expect("Error in Point multiplication");

        CurvePoint {
            point: res,
            params: Arc::clone(params),
        }
    }

    pub fn expected_bytes_length(params: &Arc<Params>) -> usize {
        // compressed form: sign byte followed by the x coordinate
        1 + params.field_order_size_in_bytes()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.point
            .to_bytes(
                self.params.group(),
                PointConversionForm::COMPRESSED,
                &mut bn_ctx(),
            )
            .expect("Error in Point to bytes")
    }

    pub fn is_infinity(&self) -> bool {
        self.point.is_infinity(self.params.group())
    }

    pub fn point(&self) -> &EcPointRef {
        &self.point
    }

    pub fn params(&self) -> &Arc<Params> {
        &self.params
    }
}

impl PartialEq for CurvePoint {
    fn eq(&self, other: &CurvePoint) -> bool {
        self.params == other.params
            && self
                .point
                .eq(self.params.group(), &other.point, &mut bn_ctx())
                .unwrap_or(false)
    }
}

impl Clone for CurvePoint {
    fn clone(&self) -> Self {
        CurvePoint {
            point: self
                .point
                .to_owned(self.params.group())
                .expect("Error in Point cloning"),
            params: Arc::clone(&self.params),
        }
    }
}

impl fmt::Debug for CurvePoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CurvePoint {{ point: {} }}", to_hex(&self.to_bytes()))
    }
}

impl Add for &CurvePoint {
    type Output = CurvePoint;

    fn add(self, other: &CurvePoint) -> CurvePoint {
        let mut res = EcPoint::new(self.params.group()).expect("Error in Point creation");
        res.add(self.params.group(), &self.point, &other.point, &mut bn_ctx())
            .expect("Error in Point addition");

        CurvePoint {
            point: res,
            params: Arc::clone(&self.params),
        }
    }
}

impl Mul<&CurveBN> for &CurvePoint {
    type Output = CurvePoint;

    fn mul(self, other: &CurveBN) -> CurvePoint {
        let mut res = EcPoint::new(self.params.group()).expect("Error in Point creation");
        res.mul(self.params.group(), &self.point, &other.bn, &bn_ctx())
            .expect("Error in Point multiplication");

        CurvePoint {
            point: res,
            params: Arc::clone(&self.params),
        }
    }
}
