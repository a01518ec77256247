//! Data models for OneCloud messages.
//!
//! Messages are flat records: an action tag, a map of typed extras, and at
//! most one attached file path. The action vocabulary is closed; see
//! [`InboundAction`] and [`OutboundAction`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{
    OneCloudError, Result, ACTION_CREATE_FILE, ACTION_EDIT_FILE, ACTION_FILE_SAVED,
    ACTION_FILE_SAVED_ERROR, ACTION_FILE_SAVING, ACTION_LAUNCH, ACTION_UPLOAD_NEW_FILE,
    ACTION_UPLOAD_NEW_VERSION, ACTION_VIEW_FILE, EXTRA_BOX_TOKEN, EXTRA_BYTES_TRANSFERRED,
    EXTRA_CRYPTO_KEY, EXTRA_CRYPTO_SALT, EXTRA_FILE_ID, EXTRA_FILE_NAME, EXTRA_FOLDER_ID,
    EXTRA_FOLDER_NAME, EXTRA_IS_ENCRYPTED, EXTRA_ONE_CLOUD_APP_PACKAGE_NAME,
};

/// Correlation token issued by the coordinator. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(i64);

impl Token {
    /// Validates a raw token value.
    pub fn new(raw: i64) -> Result<Self> {
        if raw <= 0 {
            return Err(OneCloudError::InvalidToken(raw));
        }
        Ok(Self(raw))
    }

    /// The raw wire value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A typed extra value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Bool(bool),
    Long(i64),
    Str(String),
}

impl From<&str> for ExtraValue {
    fn from(value: &str) -> Self {
        ExtraValue::Str(value.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(value: String) -> Self {
        ExtraValue::Str(value)
    }
}

impl From<i64> for ExtraValue {
    fn from(value: i64) -> Self {
        ExtraValue::Long(value)
    }
}

impl From<bool> for ExtraValue {
    fn from(value: bool) -> Self {
        ExtraValue::Bool(value)
    }
}

/// Named extras carried by every message.
pub type Extras = BTreeMap<String, ExtraValue>;

fn string_extra<'a>(extras: &'a Extras, key: &str) -> Option<&'a str> {
    match extras.get(key) {
        Some(ExtraValue::Str(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn long_extra(extras: &Extras, key: &str) -> Option<i64> {
    match extras.get(key) {
        Some(ExtraValue::Long(v)) => Some(*v),
        _ => None,
    }
}

fn bool_extra(extras: &Extras, key: &str) -> Option<bool> {
    match extras.get(key) {
        Some(ExtraValue::Bool(v)) => Some(*v),
        _ => None,
    }
}

/// Actions the coordinator sends to a partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundAction {
    EditFile,
    CreateFile,
    ViewFile,
    Launch,
    FileSaved,
    FileSaving,
    FileSavedError,
}

impl InboundAction {
    /// All inbound actions.
    pub const ALL: [InboundAction; 7] = [
        InboundAction::EditFile,
        InboundAction::CreateFile,
        InboundAction::ViewFile,
        InboundAction::Launch,
        InboundAction::FileSaved,
        InboundAction::FileSaving,
        InboundAction::FileSavedError,
    ];

    /// Parse a wire action tag. Unknown tags yield `None`.
    pub fn from_wire(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == tag)
    }

    /// The wire action tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            InboundAction::EditFile => ACTION_EDIT_FILE,
            InboundAction::CreateFile => ACTION_CREATE_FILE,
            InboundAction::ViewFile => ACTION_VIEW_FILE,
            InboundAction::Launch => ACTION_LAUNCH,
            InboundAction::FileSaved => ACTION_FILE_SAVED,
            InboundAction::FileSaving => ACTION_FILE_SAVING,
            InboundAction::FileSavedError => ACTION_FILE_SAVED_ERROR,
        }
    }
}

impl fmt::Display for InboundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions a partner sends back to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboundAction {
    #[serde(rename = "com.box.android.UPLOAD_NEW_VERSION")]
    UploadNewVersion,
    #[serde(rename = "com.box.android.UPLOAD_NEW_FILE")]
    UploadNewFile,
    #[serde(rename = "com.box.android.LAUNCH")]
    Launch,
}

impl OutboundAction {
    /// The wire action tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboundAction::UploadNewVersion => ACTION_UPLOAD_NEW_VERSION,
            OutboundAction::UploadNewFile => ACTION_UPLOAD_NEW_FILE,
            OutboundAction::Launch => ACTION_LAUNCH,
        }
    }
}

impl fmt::Display for OutboundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message received from the coordinator.
///
/// The action is kept as the raw tag so that unknown actions can be
/// recognised and ignored rather than failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Raw wire action tag.
    pub action: String,
    /// Typed extras.
    #[serde(default)]
    pub extras: Extras,
    /// Path of the attached payload file, if any.
    #[serde(default)]
    pub data: Option<PathBuf>,
    /// Declared MIME type of the payload, if any.
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl InboundMessage {
    /// Creates a message with the given action tag and no extras.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            extras: Extras::new(),
            data: None,
            mime_type: None,
        }
    }

    /// Creates a message for a known action.
    pub fn for_action(action: InboundAction) -> Self {
        Self::new(action.as_str())
    }

    /// Adds an extra.
    pub fn with_extra(mut self, key: &str, value: impl Into<ExtraValue>) -> Self {
        self.extras.insert(key.to_string(), value.into());
        self
    }

    /// Sets the token extra.
    pub fn with_token(self, token: i64) -> Self {
        self.with_extra(EXTRA_BOX_TOKEN, token)
    }

    /// Attaches a payload file.
    pub fn with_data(mut self, path: impl Into<PathBuf>) -> Self {
        self.data = Some(path.into());
        self
    }

    /// Sets the declared MIME type.
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Parses a message from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| OneCloudError::Serialization(e.to_string()))
    }

    /// Encodes the message as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| OneCloudError::Serialization(e.to_string()))
    }

    /// The parsed action, or `None` for an unknown tag.
    pub fn inbound_action(&self) -> Option<InboundAction> {
        InboundAction::from_wire(&self.action)
    }

    /// The validated token. A missing token is reported as `-1`.
    pub fn token(&self) -> Result<Token> {
        Token::new(long_extra(&self.extras, EXTRA_BOX_TOKEN).unwrap_or(-1))
    }

    pub fn file_id(&self) -> Option<&str> {
        string_extra(&self.extras, EXTRA_FILE_ID)
    }

    pub fn folder_id(&self) -> Option<&str> {
        string_extra(&self.extras, EXTRA_FOLDER_ID)
    }

    pub fn file_name(&self) -> Option<&str> {
        string_extra(&self.extras, EXTRA_FILE_NAME)
    }

    pub fn folder_name(&self) -> Option<&str> {
        string_extra(&self.extras, EXTRA_FOLDER_NAME)
    }

    pub fn package_name(&self) -> Option<&str> {
        string_extra(&self.extras, EXTRA_ONE_CLOUD_APP_PACKAGE_NAME)
    }

    pub fn crypto_key(&self) -> Option<&str> {
        string_extra(&self.extras, EXTRA_CRYPTO_KEY)
    }

    pub fn crypto_salt(&self) -> Option<&str> {
        string_extra(&self.extras, EXTRA_CRYPTO_SALT)
    }

    /// Bytes transferred so far (save progress). Defaults to 0.
    pub fn bytes_transferred(&self) -> i64 {
        long_extra(&self.extras, EXTRA_BYTES_TRANSFERRED).unwrap_or(0)
    }

    pub fn is_encrypted(&self) -> bool {
        bool_extra(&self.extras, EXTRA_IS_ENCRYPTED).unwrap_or(false)
    }
}

/// A message sent from the partner to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub action: OutboundAction,
    /// Package the message is addressed to.
    pub target_package: String,
    /// Identity of the sending process.
    pub sender: String,
    /// Extras echoed from the session, plus any overrides.
    pub extras: Extras,
    /// Path of the attached payload file, if any.
    pub data: Option<PathBuf>,
    /// Inferred content type of the attachment.
    pub content_type: Option<String>,
    /// Ask the coordinator to start in a fresh task.
    #[serde(default)]
    pub new_task: bool,
}

impl OutboundMessage {
    /// Creates a message echoing the given extras.
    pub fn new(
        action: OutboundAction,
        target_package: impl Into<String>,
        sender: impl Into<String>,
        extras: Extras,
    ) -> Self {
        Self {
            action,
            target_package: target_package.into(),
            sender: sender.into(),
            extras,
            data: None,
            content_type: None,
            new_task: false,
        }
    }

    /// Sets or replaces an extra.
    pub fn put_extra(&mut self, key: &str, value: impl Into<ExtraValue>) {
        self.extras.insert(key.to_string(), value.into());
    }

    /// Attaches a file with its content type.
    pub fn set_data_and_type(&mut self, path: &Path, content_type: impl Into<String>) {
        self.data = Some(path.to_path_buf());
        self.content_type = Some(content_type.into());
    }

    /// Encodes the message as JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| OneCloudError::Serialization(e.to_string()))
    }

    /// Parses a message from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| OneCloudError::Serialization(e.to_string()))
    }

    pub fn token(&self) -> Option<i64> {
        long_extra(&self.extras, EXTRA_BOX_TOKEN)
    }

    pub fn file_name(&self) -> Option<&str> {
        string_extra(&self.extras, EXTRA_FILE_NAME)
    }

    pub fn package_name(&self) -> Option<&str> {
        string_extra(&self.extras, EXTRA_ONE_CLOUD_APP_PACKAGE_NAME)
    }

    pub fn is_encrypted(&self) -> Option<bool> {
        bool_extra(&self.extras, EXTRA_IS_ENCRYPTED)
    }
}
