extern crate quick_error;
use quick_error::quick_error;

quick_error! {
  #[derive(Debug, PartialEq)]
  pub enum PreErrors {
      InvalidScalar {
        display("The scalar is zero, out of range or badly sized")
      }
      InvalidPoint {
        display("The point is not a valid curve point")
      }
      InvalidEncoding {
        display("The bytes given in input are not valid")
      }
      InvalidCapsule {
        display("The capsule is not valid")
      }
      ParameterMismatch(threshold: usize, num_kfrags: usize) {
        display("The threshold {} is not valid for {} fragments", threshold, num_kfrags)
      }
      CurveMismatch {
        display("Keys parameters are not the same")
      }
      DuplicateFragmentId {
        display("Two capsule fragments share the same fragment id")
      }
      ThresholdNotMet {
        display("Not enough capsule fragments to reach the threshold")
      }
      InconsistentFragments {
        display("The capsule fragments come from different key fragment batches")
      }
      MetadataTooLong(len: usize) {
        display("Capsule fragment metadata of {} bytes does not fit a 32-bit length", len)
      }
      VerificationFailed {
        display("Fragment verification failed")
      }
      EncryptionFailed {
        display("Encryption error")
      }
      DecryptionFailed {
        display("Decryption error")
      }
      DerivationFailed {
        display("Key Derivation error")
      }
      Randomness(msg: String) {
        display("Random source error: {}", msg)
        from(err: getrandom::Error) -> (err.to_string())
      }
      Backend(msg: String) {
        display("OpenSSL error: {}", msg)
        from(err: openssl::error::ErrorStack) -> (err.to_string())
      }
  }
}
