pub mod capsule;
pub mod cfrag;
pub mod curve;
pub mod errors;
pub mod hashing;
pub mod keys;
pub mod kfrag;
pub mod schemes;
pub mod serializable;
pub mod utils;
