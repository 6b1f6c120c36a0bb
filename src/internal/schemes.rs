use crate::internal::curve::{CurveBN, Params};
use crate::internal::errors::PreErrors;

use std::sync::Arc;

use aead::{Aead, KeyInit, Payload};
use blake2::{Blake2b, Digest};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use hkdf::Hkdf;
use openssl::bn::{BigNum, BigNumContext, BigNumContextRef};
use openssl::ec::{EcGroupRef, EcPoint};
use sha2::Sha256;
use sha3::Keccak256;
use zeroize::Zeroizing;

pub const DEM_KEYSIZE: usize = 32;
const DEM_NONCE_SIZE: usize = 12;
const DEM_TAG_SIZE: usize = 16;
pub const DEM_MIN_SIZE: usize = DEM_NONCE_SIZE + DEM_TAG_SIZE;
const KDF_SALT: &[u8] = b"KDF_SALT";
const KDF_INFO: &[u8] = b"DEM_KEY";

/// A hash function keyed by a customization string, so that digests taken
/// for different purposes never collide.
pub trait Hash {
  fn new(customization_string: &[u8]) -> Self;
  fn update(&mut self, data: &[u8]);
  fn finalize(self) -> Vec<u8>;
}

fn customization_prefix(customization_string: &[u8]) -> Vec<u8> {
  let mut prefix = (customization_string.len() as u64).to_be_bytes().to_vec();
  prefix.extend_from_slice(customization_string);
  prefix
}

pub struct Blake2bHash {
  digest: Blake2b,
}

impl Hash for Blake2bHash {
  fn new(customization_string: &[u8]) -> Self {
    let mut hasher = Blake2b::new();
    hasher.update(customization_prefix(customization_string));

    Self { digest: hasher }
  }

  fn update(&mut self, data: &[u8]) {
    self.digest.update(data);
  }

  fn finalize(self) -> Vec<u8> {
    self.digest.finalize().to_vec()
  }
}

/// Two Keccak-256 lanes with distinct prefixes, giving a 512-bit digest.
pub struct ExtendedKeccak {
  upper: Keccak256,
  lower: Keccak256,
}

impl Hash for ExtendedKeccak {
  fn new(customization_string: &[u8]) -> Self {
    let prefix = customization_prefix(customization_string);
    let mut upper = Keccak256::new();
    upper.update(b"\x00");
    upper.update(&prefix);
    let mut lower = Keccak256::new();
    lower.update(b"\x01");
    lower.update(&prefix);

    Self { upper, lower }
  }

  fn update(&mut self, data: &[u8]) {
    self.upper.update(data);
    self.lower.update(data);
  }

  fn finalize(self) -> Vec<u8> {
    let mut up = self.upper.finalize().to_vec();
    up.extend_from_slice(&self.lower.finalize());
    up
  }
}

pub struct SHA256Hash {
  digest: Sha256,
}

impl Hash for SHA256Hash {
  fn new(customization_string: &[u8]) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(customization_prefix(customization_string));

    Self { digest: hasher }
  }

  fn update(&mut self, data: &[u8]) {
    self.digest.update(data);
  }

  fn finalize(self) -> Vec<u8> {
    self.digest.finalize().to_vec()
  }
}

/// Maps `bytes` to a scalar in `[1, order - 1]`.
pub fn hash_to_curvebn<H>(
  bytes: &[u8],
  params: &Arc<Params>,
  customization_string: Option<&[u8]>,
) -> Result<CurveBN, PreErrors>
where
  H: Hash,
{
  let mut htc_customization = b"hash_to_curvebn".to_vec();
  if let Some(c) = customization_string {
    htc_customization.extend_from_slice(c);
  }
  let mut hash = H::new(&htc_customization);
  hash.update(bytes);

  let digest_bn = BigNum::from_slice(&hash.finalize())?;
  let mut ctx = BigNumContext::new()?;

  // Get order minus one
  let one = BigNum::from_u32(1)?;
  let mut order_minus_one = BigNum::new()?;
  order_minus_one.checked_sub(params.order(), &one)?;

  // Compute modulo
  let mut modulo = BigNum::new()?;
  modulo.checked_rem(&digest_bn, &order_minus_one, &mut ctx)?;

  // To CurveBN
  let mut curve_bn = BigNum::new()?;
  curve_bn.checked_add(&modulo, &one)?;

  CurveBN::from_big_num(&curve_bn, params)
}

/// HKDF over BLAKE2b, turning a shared point encoding into a DEM key.
pub fn kdf(base_key: &[u8]) -> Result<Zeroizing<Vec<u8>>, PreErrors> {
  let mut buf = Zeroizing::new(vec![0; DEM_KEYSIZE]);
  Hkdf::<Blake2b>::new(Some(KDF_SALT), base_key)
    .expand(KDF_INFO, &mut buf)
    .map_err(|_| PreErrors::DerivationFailed)?;
  Ok(buf)
}

/// Authenticated encryption with ChaCha20-Poly1305. The random nonce is
/// prepended to the returned ciphertext.
pub fn dem_encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, PreErrors> {
  let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| PreErrors::EncryptionFailed)?;

  let mut slice = [0u8; DEM_NONCE_SIZE];
  getrandom::getrandom(&mut slice)?;
  let nonce = Nonce::from_slice(&slice);
  let payload = Payload {
    msg: plaintext,
    aad,
  };

  let mut enc_data = cipher
    .encrypt(nonce, payload)
    .map_err(|_| PreErrors::EncryptionFailed)?;
  let mut ciphertext = nonce.to_vec();
  ciphertext.append(&mut enc_data);
  Ok(ciphertext)
}

pub fn dem_decrypt(key: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, PreErrors> {
  if ciphertext.len() < DEM_MIN_SIZE {
    return Err(PreErrors::DecryptionFailed);
  }
  let cipher = ChaCha20Poly1305::new_from_slice(key).map_err(|_| PreErrors::DecryptionFailed)?;

  let (nonce, msg) = ciphertext.split_at(DEM_NONCE_SIZE);
  let payload = Payload { msg, aad };

  cipher
    .decrypt(Nonce::from_slice(nonce), payload)
    .map_err(|_| PreErrors::DecryptionFailed)
}

/// Try-and-increment hashing onto the curve. Not constant time, only used on
/// public inputs.
pub fn unsafe_hash_to_point<H>(
  data: &[u8],
  label: &[u8],
  group: &EcGroupRef,
  ctx: &mut BigNumContextRef,
) -> Result<EcPoint, PreErrors>
where
  H: Hash,
{
  let mut to_hash = (label.len() as u64).to_be_bytes().to_vec();
  to_hash.extend_from_slice(label);
  to_hash.extend_from_slice(&(data.len() as u64).to_be_bytes());
  to_hash.extend_from_slice(data);

  let curve_key_size_bytes = ((group.degree() + 7) / 8) as usize;
  // unused high bits of the x coordinate on curves like P-521
  let top_byte_mask = match group.degree() % 8 {
    0 => 0xff,
    bits => (1u8 << bits) - 1,
  };

  for i in 0..=u32::MAX {
    let mut hash = H::new(b"");
    hash.update(&to_hash);
    hash.update(&i.to_be_bytes());
    let mut digest = hash.finalize();

    // fields wider than one digest are filled with counter-indexed blocks
    let mut block = 1u32;
    while digest.len() < curve_key_size_bytes + 1 {
      let mut hash = H::new(b"");
      hash.update(&to_hash);
      hash.update(&i.to_be_bytes());
      hash.update(&block.to_be_bytes());
      digest.extend_from_slice(&hash.finalize());
      block += 1;
    }

    let mut compressed_point = match digest[0] & 1 == 0 {
      true => vec![0x02],
      false => vec![0x03],
    };
    compressed_point.extend_from_slice(&digest[1..=curve_key_size_bytes]);
    compressed_point[1] &= top_byte_mask;

    if let Ok(point) = EcPoint::from_bytes(group, &compressed_point, ctx) {
      return Ok(point);
    }
  }

  Err(PreErrors::InvalidPoint)
}
