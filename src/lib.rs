//! OneCloud - partner side of the OneCloud file hand-off protocol
//!
//! Token-correlated sessions, action dispatch, and AES-256-CBC stream
//! envelopes keyed with the PKCS#12 password KDF.

mod types;
mod keys;
mod envelope;
mod crypto;
mod models;
mod storage;
mod transport;
mod receiver;
mod utils;

pub use types::*;
pub use keys::*;
pub use envelope::*;
pub use crypto::*;
pub use models::*;
pub use storage::*;
pub use transport::*;
pub use receiver::*;
pub use utils::*;
