//! Type definitions and protocol constants for OneCloud.

use thiserror::Error;

/// Size of a derived symmetric key in bytes (AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of the initialization vector that prefixes every stream envelope.
pub const IV_SIZE: usize = 16;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Number of random bytes in a generated salt (before hex encoding).
pub const SALT_SIZE: usize = 20;

/// Key derivation iteration count used by the coordinator.
///
/// Both peers must use the same value or the derived keys will differ.
pub const KDF_ITERATIONS: u32 = 100;

/// Smallest well-formed envelope: the IV plus one padding block.
pub const MIN_ENVELOPE_SIZE: usize = IV_SIZE + BLOCK_SIZE;

/// Content type used when none can be inferred from a file name.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Package name of the coordinator application.
pub const COORDINATOR_PACKAGE_NAME: &str = "com.box.android";

// Inbound actions
pub const ACTION_EDIT_FILE: &str = "com.box.android.EDIT_FILE";
pub const ACTION_CREATE_FILE: &str = "com.box.android.CREATE_FILE";
pub const ACTION_VIEW_FILE: &str = "com.box.android.VIEW_FILE";
pub const ACTION_FILE_SAVED: &str = "com.box.android.FILE_SAVED";
pub const ACTION_FILE_SAVING: &str = "com.box.android.FILE_SAVING";
pub const ACTION_FILE_SAVED_ERROR: &str = "com.box.android.FILE_SAVED_ERROR";

/// Launch action, used in both directions.
pub const ACTION_LAUNCH: &str = "com.box.android.LAUNCH";

// Outbound actions
pub const ACTION_UPLOAD_NEW_VERSION: &str = "com.box.android.UPLOAD_NEW_VERSION";
pub const ACTION_UPLOAD_NEW_FILE: &str = "com.box.android.UPLOAD_NEW_FILE";

// Extras keys
pub const EXTRA_FILE_ID: &str = "com.box.android.EXTRA_FILE_ID";
pub const EXTRA_FOLDER_ID: &str = "com.box.android.EXTRA_FOLDER_ID";
pub const EXTRA_FILE_NAME: &str = "com.box.android.EXTRA_FILE_NAME";
pub const EXTRA_FOLDER_NAME: &str = "com.box.android.EXTRA_FOLDER_NAME";
pub const EXTRA_BOX_TOKEN: &str = "com.box.android.EXTRA_BOX_TOKEN";
pub const EXTRA_ONE_CLOUD_APP_PACKAGE_NAME: &str =
    "com.box.android.EXTRA_ONE_CLOUD_APP_PACKAGE_NAME";
pub const EXTRA_BYTES_TRANSFERRED: &str = "com.box.android.EXTRA_BYTES_TRANSFERRED";
pub const EXTRA_CRYPTO_KEY: &str = "com.box.android.EXTRA_CRYPTO_KEY";
pub const EXTRA_CRYPTO_SALT: &str = "com.box.android.EXTRA_CRYPTO_SALT";
pub const EXTRA_IS_ENCRYPTED: &str = "com.box.android.EXTRA_IS_ENCRYPTED";

/// Errors that can occur during OneCloud operations.
#[derive(Error, Debug)]
pub enum OneCloudError {
    // Protocol Errors
    /// Token missing or not strictly positive.
    #[error("Invalid token: {0}")]
    InvalidToken(i64),

    /// No session has been recorded for this token.
    #[error("Unknown token: {0}")]
    UnknownToken(i64),

    /// A required extra was absent from the session entry.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// The message did not reference a payload file.
    #[error("Message has no attachment")]
    MissingAttachment,

    // Crypto Errors
    /// Could not derive a key from the passphrase and salt.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Cipher setup failed.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Stream ended before the IV prefix was complete.
    #[error("Truncated envelope: expected {expected} prefix bytes, got {actual}")]
    TruncatedEnvelope { expected: usize, actual: usize },

    // Storage Errors
    /// The session store could not complete an operation.
    #[error("Storage failed: {0}")]
    StorageFailed(String),

    // Transport Errors
    /// The transport refused or failed to deliver a message.
    #[error("Transport failed: {0}")]
    Transport(String),

    /// Message could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OneCloudError>;
