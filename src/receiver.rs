//! Partner-side OneCloud receiver.
//!
//! This module routes inbound coordinator messages to a [`OneCloudHandler`],
//! remembers the last message seen for every token, and builds the outbound
//! replies that echo that session context back to the coordinator.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};

use crate::crypto::{open_decrypting_source_with, open_encrypting_sink_with, EncryptingWriter};
use crate::envelope::is_valid_envelope_len;
use crate::models::{InboundAction, InboundMessage, OutboundAction, OutboundMessage, Token};
use crate::storage::{InMemorySessionStore, SessionStore, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};
use crate::transport::MessageTransport;
use crate::types::{
    OneCloudError, Result, COORDINATOR_PACKAGE_NAME, EXTRA_CRYPTO_KEY, EXTRA_CRYPTO_SALT,
    EXTRA_FILE_NAME, EXTRA_IS_ENCRYPTED, EXTRA_ONE_CLOUD_APP_PACKAGE_NAME, KDF_ITERATIONS,
};
use crate::utils::content_type_for;

/// Payload stream handed to edit and view handlers.
pub type PayloadReader = Box<dyn Read + Send>;

/// Configuration for the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverConfig {
    /// Identity of this process, sent on every outbound message.
    pub partner_package: String,
    /// Package every outbound message is addressed to.
    pub coordinator_package: String,
    /// Key derivation iteration count shared with the coordinator.
    pub kdf_iterations: u32,
    /// Session lifetime after the last write (`None` = never expire).
    pub session_ttl: Option<Duration>,
    /// Maximum number of tracked sessions.
    pub max_sessions: usize,
}

impl ReceiverConfig {
    /// Creates a configuration with default settings for the given partner.
    pub fn new(partner_package: &str) -> Self {
        Self {
            partner_package: partner_package.to_string(),
            coordinator_package: COORDINATOR_PACKAGE_NAME.to_string(),
            kdf_iterations: KDF_ITERATIONS,
            session_ttl: Some(DEFAULT_SESSION_TTL),
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Sets the coordinator package.
    pub fn with_coordinator_package(mut self, package: &str) -> Self {
        self.coordinator_package = package.to_string();
        self
    }

    /// Sets the key derivation iteration count.
    pub fn with_kdf_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    /// Sets the session lifetime.
    pub fn with_session_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Sets the session capacity.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }
}

/// Callbacks for the seven inbound actions.
///
/// Every callback runs after the message has been stored as the session
/// entry for its token, so outbound calls made from inside a callback see
/// the triggering message.
#[async_trait::async_trait]
pub trait OneCloudHandler: Send + Sync {
    /// The coordinator wants a file edited. `payload` yields plaintext.
    async fn on_edit_file_requested(
        &self,
        token: Token,
        payload: PayloadReader,
        file_name: Option<String>,
        mime_type: Option<String>,
    );

    /// The coordinator wants a new file created.
    async fn on_create_file_requested(&self, token: Token, mime_type: Option<String>);

    /// The coordinator wants a file shown read-only. `payload` yields plaintext.
    async fn on_view_file_requested(
        &self,
        token: Token,
        payload: PayloadReader,
        file_name: Option<String>,
        mime_type: Option<String>,
    );

    /// The coordinator wants the partner brought to the foreground.
    async fn on_launch_requested(&self, token: Token);

    /// A previous upload was stored.
    async fn on_file_saved(&self, token: Token, file_name: Option<String>);

    /// Upload progress. Only called with `bytes_transferred > 0`.
    async fn on_file_saving(&self, token: Token, file_name: Option<String>, bytes_transferred: i64);

    /// A previous upload failed.
    async fn on_file_saved_error(&self, token: Token, file_name: Option<String>);
}

/// What became of one inbound message.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The handler for this action ran.
    Handled(InboundAction),
    /// The token was missing or not positive. Nothing was stored.
    Rejected(OneCloudError),
    /// The action tag is not part of the vocabulary. The session was updated.
    Ignored(String),
    /// A progress message with no bytes transferred.
    SkippedProgress(i64),
    /// The session could not be stored or the payload could not be opened,
    /// so no handler ran.
    Dropped(OneCloudError),
}

impl DispatchOutcome {
    /// Returns true if a handler ran.
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled(_))
    }
}

/// Result of an outbound call that did not fail in the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// The message was handed to the transport.
    Sent,
    /// No live session for the token, so nothing was sent.
    UnknownToken,
}

/// The partner side of the OneCloud protocol.
///
/// Shared freely between tasks: `receive` and the outbound calls only need
/// `&self`, and the session store does its own locking.
pub struct OneCloudReceiver<T, S = InMemorySessionStore>
where
    T: MessageTransport,
    S: SessionStore,
{
    config: ReceiverConfig,
    transport: T,
    sessions: S,
}

impl<T> OneCloudReceiver<T, InMemorySessionStore>
where
    T: MessageTransport,
{
    /// Creates a receiver with an in-memory session store sized by `config`.
    pub fn new(config: ReceiverConfig, transport: T) -> Self {
        let sessions = InMemorySessionStore::new(config.session_ttl, config.max_sessions);
        Self::with_store(config, transport, sessions)
    }
}

impl<T, S> OneCloudReceiver<T, S>
where
    T: MessageTransport,
    S: SessionStore,
{
    /// Creates a receiver with a caller-supplied session store.
    pub fn with_store(config: ReceiverConfig, transport: T, sessions: S) -> Self {
        Self {
            config,
            transport,
            sessions,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the session store.
    pub fn sessions(&self) -> &S {
        &self.sessions
    }

    /// The current session entry for a token.
    pub async fn session(&self, token: Token) -> Result<Option<InboundMessage>> {
        self.sessions.get(token).await
    }

    /// Dispatch one inbound message.
    ///
    /// Messages without a positive token are rejected before anything is
    /// stored. Otherwise the message replaces the session entry for its
    /// token, and then the matching handler runs. Failures are never
    /// reported to the coordinator; they only show up in the outcome and
    /// the log.
    ///
    /// # Arguments
    /// * `handler` - Callbacks for the inbound actions
    /// * `message` - The message as delivered by the host
    ///
    /// # Returns
    /// What happened to the message.
    pub async fn receive<H>(&self, handler: &H, message: InboundMessage) -> DispatchOutcome
    where
        H: OneCloudHandler + ?Sized,
    {
        let token = match message.token() {
            Ok(token) => token,
            Err(e) => {
                warn!("Rejecting {} message: {}", message.action, e);
                return DispatchOutcome::Rejected(e);
            }
        };

        if let Err(e) = self.sessions.put(token, message.clone()).await {
            warn!("Dropping {} for token {}: {}", message.action, token, e);
            return DispatchOutcome::Dropped(e);
        }

        let action = match message.inbound_action() {
            Some(action) => action,
            None => {
                debug!("Ignoring unknown action {} for token {}", message.action, token);
                return DispatchOutcome::Ignored(message.action);
            }
        };
        debug!("Dispatching {} for token {}", action, token);

        let file_name = message.file_name().map(str::to_string);
        let mime_type = message.mime_type.clone();

        match action {
            InboundAction::EditFile | InboundAction::ViewFile => {
                let payload = match self.open_payload(&message) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Dropping {} for token {}: {}", action, token, e);
                        return DispatchOutcome::Dropped(e);
                    }
                };
                if action == InboundAction::EditFile {
                    handler
                        .on_edit_file_requested(token, payload, file_name, mime_type)
                        .await;
                } else {
                    handler
                        .on_view_file_requested(token, payload, file_name, mime_type)
                        .await;
                }
            }
            InboundAction::CreateFile => {
                handler.on_create_file_requested(token, mime_type).await;
            }
            InboundAction::Launch => {
                handler.on_launch_requested(token).await;
            }
            InboundAction::FileSaved => {
                handler.on_file_saved(token, file_name).await;
            }
            InboundAction::FileSaving => {
                let bytes = message.bytes_transferred();
                if bytes <= 0 {
                    debug!("Skipping progress for token {} with {} bytes", token, bytes);
                    return DispatchOutcome::SkippedProgress(bytes);
                }
                handler.on_file_saving(token, file_name, bytes).await;
            }
            InboundAction::FileSavedError => {
                handler.on_file_saved_error(token, file_name).await;
            }
        }

        DispatchOutcome::Handled(action)
    }

    /// Open the attached payload.
    ///
    /// The file is handed over as-is only when the message carries no key,
    /// no salt, and is not flagged encrypted. Any other combination must
    /// carry both a key and a salt, and is decrypted with them.
    fn open_payload(&self, message: &InboundMessage) -> Result<PayloadReader> {
        let path = message.data.as_deref().ok_or(OneCloudError::MissingAttachment)?;

        let (key, salt) = match (message.crypto_key(), message.crypto_salt()) {
            (Some(key), Some(salt)) => (key, salt),
            (None, None) if !message.is_encrypted() => {
                return Ok(Box::new(BufReader::new(File::open(path)?)));
            }
            (None, _) => return Err(OneCloudError::MissingField(EXTRA_CRYPTO_KEY)),
            (Some(_), None) => return Err(OneCloudError::MissingField(EXTRA_CRYPTO_SALT)),
        };

        let file = File::open(path)?;

        let len = file.metadata()?.len();
        if !is_valid_envelope_len(len) {
            return Err(OneCloudError::Crypto(format!(
                "Malformed envelope of {} bytes",
                len
            )));
        }

        let reader =
            open_decrypting_source_with(BufReader::new(file), key, salt, self.config.kdf_iterations)?;
        Ok(Box::new(reader))
    }

    fn outbound(&self, action: OutboundAction, session: InboundMessage) -> OutboundMessage {
        OutboundMessage::new(
            action,
            self.config.coordinator_package.as_str(),
            self.config.partner_package.as_str(),
            session.extras,
        )
    }

    /// Build an upload of a new version of the session's file.
    ///
    /// The content type comes from the file name stored in the session.
    /// Returns `Ok(None)` if the token has no live session.
    pub async fn build_upload_new_version(
        &self,
        token: Token,
        file: &Path,
        new_file_name: Option<&str>,
        is_encrypted: bool,
    ) -> Result<Option<OutboundMessage>> {
        let session = match self.sessions.get(token).await? {
            Some(session) => session,
            None => return Ok(None),
        };
        let content_type = content_type_for(session.file_name());

        let mut message = self.outbound(OutboundAction::UploadNewVersion, session);
        message.set_data_and_type(file, content_type);
        message.put_extra(EXTRA_ONE_CLOUD_APP_PACKAGE_NAME, self.config.partner_package.as_str());
        if let Some(name) = new_file_name {
            message.put_extra(EXTRA_FILE_NAME, name);
        }
        message.put_extra(EXTRA_IS_ENCRYPTED, is_encrypted);
        Ok(Some(message))
    }

    /// Build an upload of a new file named `file_name`.
    ///
    /// Returns `Ok(None)` if the token has no live session.
    pub async fn build_upload_new_file(
        &self,
        token: Token,
        file: &Path,
        file_name: &str,
        is_encrypted: bool,
    ) -> Result<Option<OutboundMessage>> {
        let session = match self.sessions.get(token).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        let mut message = self.outbound(OutboundAction::UploadNewFile, session);
        message.set_data_and_type(file, content_type_for(Some(file_name)));
        message.put_extra(EXTRA_ONE_CLOUD_APP_PACKAGE_NAME, self.config.partner_package.as_str());
        message.put_extra(EXTRA_FILE_NAME, file_name);
        message.put_extra(EXTRA_IS_ENCRYPTED, is_encrypted);
        Ok(Some(message))
    }

    /// Build a launch request echoing the session extras.
    ///
    /// Returns `Ok(None)` if the token has no live session.
    pub async fn build_launch(&self, token: Token) -> Result<Option<OutboundMessage>> {
        let session = match self.sessions.get(token).await? {
            Some(session) => session,
            None => return Ok(None),
        };
        let mut message = self.outbound(OutboundAction::Launch, session);
        message.new_task = true;
        Ok(Some(message))
    }

    /// Send a new version of the session's file to the coordinator.
    ///
    /// # Arguments
    /// * `token` - Session to reply to
    /// * `file` - Path of the new contents
    /// * `new_file_name` - Rename the file, or keep the stored name with `None`
    /// * `is_encrypted` - Whether `file` holds a stream envelope
    ///
    /// # Returns
    /// `SendStatus::UnknownToken` if there was no session to reply to.
    pub async fn upload_new_version(
        &self,
        token: Token,
        file: &Path,
        new_file_name: Option<&str>,
        is_encrypted: bool,
    ) -> Result<SendStatus> {
        let message = self
            .build_upload_new_version(token, file, new_file_name, is_encrypted)
            .await?;
        self.deliver(token, OutboundAction::UploadNewVersion, message).await
    }

    /// Send a new file to the coordinator, filed alongside the session's file.
    pub async fn upload_new_file(
        &self,
        token: Token,
        file: &Path,
        file_name: &str,
        is_encrypted: bool,
    ) -> Result<SendStatus> {
        let message = self
            .build_upload_new_file(token, file, file_name, is_encrypted)
            .await?;
        self.deliver(token, OutboundAction::UploadNewFile, message).await
    }

    /// Ask the coordinator to come to the foreground for this session.
    pub async fn launch(&self, token: Token) -> Result<SendStatus> {
        let message = self.build_launch(token).await?;
        self.deliver(token, OutboundAction::Launch, message).await
    }

    async fn deliver(
        &self,
        token: Token,
        action: OutboundAction,
        message: Option<OutboundMessage>,
    ) -> Result<SendStatus> {
        match message {
            Some(message) => {
                debug!("Sending {} for token {}", action, token);
                self.transport.send(message).await?;
                Ok(SendStatus::Sent)
            }
            None => {
                warn!("No session for token {}, {} not sent", token, action);
                Ok(SendStatus::UnknownToken)
            }
        }
    }

    /// Wrap `sink` in an encrypting writer keyed by the session's crypto
    /// key and salt.
    ///
    /// The IV is written to `sink` before this returns.
    pub async fn open_encrypted_output_stream<W: Write>(
        &self,
        token: Token,
        sink: W,
    ) -> Result<EncryptingWriter<W>> {
        let session = self
            .sessions
            .get(token)
            .await?
            .ok_or(OneCloudError::UnknownToken(token.value()))?;
        let key = session
            .crypto_key()
            .ok_or(OneCloudError::MissingField(EXTRA_CRYPTO_KEY))?;
        let salt = session
            .crypto_salt()
            .ok_or(OneCloudError::MissingField(EXTRA_CRYPTO_SALT))?;

        open_encrypting_sink_with(sink, key, salt, self.config.kdf_iterations)
    }
}
