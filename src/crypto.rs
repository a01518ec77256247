//! Streaming encryption and decryption of OneCloud payloads.
//!
//! Payloads travel as stream envelopes (see [`crate::envelope`]): a random IV
//! followed by AES-256-CBC ciphertext with PKCS#7 padding. The writer and
//! reader here are pass-through filters over any `Write`/`Read`, holding at
//! most one block of state, so arbitrarily large files stream in constant
//! memory.

use std::io::{self, ErrorKind, Read, Write};

use aes::Aes256;
use cbc::cipher::block_padding::{Padding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use log::warn;

use crate::envelope::{generate_iv, read_full, read_iv, write_iv};
use crate::keys::derive_key_with_iterations;
use crate::types::{OneCloudError, Result, BLOCK_SIZE, IV_SIZE, KDF_ITERATIONS};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// A sink that encrypts everything written to it before forwarding to `W`.
///
/// Call [`EncryptingWriter::finish`] to write the final padded block and get
/// the inner sink back. Dropping an unfinished writer finishes it on a
/// best-effort basis.
///
/// Once a write to the inner sink fails the writer is poisoned: the cipher
/// state no longer matches what reached the sink, so every later write and
/// the final block are refused.
pub struct EncryptingWriter<W: Write> {
    inner: Option<W>,
    cipher: Aes256CbcEnc,
    pending: [u8; BLOCK_SIZE],
    pending_len: usize,
    finished: bool,
    poisoned: bool,
}

impl<W: Write> EncryptingWriter<W> {
    fn new(inner: W, cipher: Aes256CbcEnc) -> Self {
        Self {
            inner: Some(inner),
            cipher,
            pending: [0u8; BLOCK_SIZE],
            pending_len: 0,
            finished: false,
            poisoned: false,
        }
    }

    /// Returns a reference to the underlying sink.
    pub fn get_ref(&self) -> Option<&W> {
        self.inner.as_ref()
    }

    /// Pad and encrypt the final block, flush, and return the inner sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.finalize()?;
        self.inner
            .take()
            .ok_or_else(|| io::Error::new(ErrorKind::Other, "encrypting writer already closed"))
    }

    fn encrypt_block(&mut self, mut block: aes::Block) -> [u8; BLOCK_SIZE] {
        self.cipher.encrypt_block_mut(&mut block);
        self.pending_len = 0;

        let mut out = [0u8; BLOCK_SIZE];
        out.copy_from_slice(&block);
        out
    }

    fn poisoned_error() -> io::Error {
        io::Error::new(
            ErrorKind::Other,
            "encrypting writer is unusable after a failed write",
        )
    }

    /// Forward ciphertext to the inner sink, poisoning the writer on failure.
    fn forward(&mut self, ciphertext: &[u8]) -> io::Result<()> {
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::Other, "encrypting writer already closed"))?;
        if let Err(e) = inner.write_all(ciphertext) {
            self.poisoned = true;
            return Err(e);
        }
        Ok(())
    }

    fn finalize(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        if self.poisoned {
            return Err(Self::poisoned_error());
        }

        let mut block = aes::Block::clone_from_slice(&self.pending);
        Pkcs7::pad(&mut block, self.pending_len);
        let last = self.encrypt_block(block);
        self.finished = true;

        self.forward(&last)?;
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.finished {
            return Err(io::Error::new(
                ErrorKind::Other,
                "write after encrypting writer was finished",
            ));
        }
        if self.poisoned {
            return Err(Self::poisoned_error());
        }

        let mut out = Vec::with_capacity(buf.len() + BLOCK_SIZE);
        let mut input = buf;
        while !input.is_empty() {
            let take = (BLOCK_SIZE - self.pending_len).min(input.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&input[..take]);
            self.pending_len += take;
            input = &input[take..];

            if self.pending_len == BLOCK_SIZE {
                let block = aes::Block::clone_from_slice(&self.pending);
                out.extend_from_slice(&self.encrypt_block(block));
            }
        }

        if !out.is_empty() {
            self.forward(&out)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(inner) => inner.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for EncryptingWriter<W> {
    fn drop(&mut self) {
        if self.finished || self.inner.is_none() {
            return;
        }
        if self.poisoned {
            warn!("Dropping encrypting writer after a failed write, envelope is incomplete");
            return;
        }
        if let Err(e) = self.finalize() {
            warn!("Failed to finalize encrypted stream on drop: {}", e);
        }
    }
}

/// A source that decrypts an envelope body on demand.
///
/// One decrypted block is held back until the next one (or end of stream)
/// arrives, since only the last block carries padding.
pub struct DecryptingReader<R: Read> {
    inner: R,
    cipher: Aes256CbcDec,
    ready: [u8; BLOCK_SIZE],
    ready_pos: usize,
    ready_len: usize,
    held: Option<[u8; BLOCK_SIZE]>,
    done: bool,
}

impl<R: Read> DecryptingReader<R> {
    fn new(inner: R, cipher: Aes256CbcDec) -> Self {
        Self {
            inner,
            cipher,
            ready: [0u8; BLOCK_SIZE],
            ready_pos: 0,
            ready_len: 0,
            held: None,
            done: false,
        }
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn next_block(&mut self) -> io::Result<()> {
        let mut block = [0u8; BLOCK_SIZE];
        let read = read_full(&mut self.inner, &mut block)?;

        if read == BLOCK_SIZE {
            let mut decrypted = aes::Block::clone_from_slice(&block);
            self.cipher.decrypt_block_mut(&mut decrypted);
            block.copy_from_slice(&decrypted);
            if let Some(previous) = self.held.replace(block) {
                self.set_ready(previous, BLOCK_SIZE);
            }
            return Ok(());
        }

        self.done = true;

        if read != 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                "ciphertext length is not a multiple of the block size",
            ));
        }

        let last = self
            .held
            .take()
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidData, "envelope has no ciphertext"))?;

        let block = aes::Block::clone_from_slice(&last);
        let len = Pkcs7::unpad(&block)
            .map_err(|_| io::Error::new(ErrorKind::InvalidData, "invalid padding"))?
            .len();

        self.set_ready(last, len);
        Ok(())
    }

    fn set_ready(&mut self, block: [u8; BLOCK_SIZE], len: usize) {
        self.ready = block;
        self.ready_pos = 0;
        self.ready_len = len;
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            if self.ready_pos < self.ready_len {
                let n = (self.ready_len - self.ready_pos).min(buf.len());
                buf[..n].copy_from_slice(&self.ready[self.ready_pos..self.ready_pos + n]);
                self.ready_pos += n;
                return Ok(n);
            }
            if self.done {
                return Ok(0);
            }
            self.next_block()?;
        }
    }
}

/// Wrap a raw sink in an encrypting sink.
///
/// Derives the key, writes a fresh IV to `raw`, and returns a writer that
/// encrypts everything after it. Nothing is written to `raw` if key
/// derivation or cipher setup fails.
///
/// # Arguments
/// * `raw` - Destination for the envelope
/// * `passphrase` - Shared crypto key
/// * `salt` - Salt text as carried in the session extras
pub fn open_encrypting_sink<W: Write>(
    raw: W,
    passphrase: &str,
    salt: &str,
) -> Result<EncryptingWriter<W>> {
    open_encrypting_sink_with(raw, passphrase, salt, KDF_ITERATIONS)
}

/// [`open_encrypting_sink`] with an explicit key derivation iteration count.
pub fn open_encrypting_sink_with<W: Write>(
    mut raw: W,
    passphrase: &str,
    salt: &str,
    iterations: u32,
) -> Result<EncryptingWriter<W>> {
    let iv = generate_iv();
    let cipher = {
        let key = derive_key_with_iterations(passphrase, salt.as_bytes(), iterations)?;
        Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
            .map_err(|e| OneCloudError::Crypto(format!("Cipher init failed: {}", e)))?
    };

    write_iv(&mut raw, &iv)?;
    Ok(EncryptingWriter::new(raw, cipher))
}

/// Wrap a raw source in a decrypting source.
///
/// Reads the IV prefix from `raw`, derives the key, and returns a reader that
/// yields the plaintext.
///
/// # Arguments
/// * `raw` - Source positioned at the start of an envelope
/// * `passphrase` - Shared crypto key
/// * `salt` - Salt text used when the envelope was written
pub fn open_decrypting_source<R: Read>(
    raw: R,
    passphrase: &str,
    salt: &str,
) -> Result<DecryptingReader<R>> {
    open_decrypting_source_with(raw, passphrase, salt, KDF_ITERATIONS)
}

/// [`open_decrypting_source`] with an explicit key derivation iteration count.
pub fn open_decrypting_source_with<R: Read>(
    mut raw: R,
    passphrase: &str,
    salt: &str,
    iterations: u32,
) -> Result<DecryptingReader<R>> {
    let iv: [u8; IV_SIZE] = read_iv(&mut raw)?;
    let cipher = {
        let key = derive_key_with_iterations(passphrase, salt.as_bytes(), iterations)?;
        Aes256CbcDec::new_from_slices(key.as_bytes(), &iv)
            .map_err(|e| OneCloudError::Crypto(format!("Cipher init failed: {}", e)))?
    };

    Ok(DecryptingReader::new(raw, cipher))
}

/// Encrypt an in-memory payload into a complete envelope.
pub fn encrypt_bytes(plaintext: &[u8], passphrase: &str, salt: &str) -> Result<Vec<u8>> {
    let mut writer = open_encrypting_sink(Vec::new(), passphrase, salt)?;
    writer.write_all(plaintext)?;
    Ok(writer.finish()?)
}

/// Decrypt a complete in-memory envelope.
pub fn decrypt_bytes(envelope: &[u8], passphrase: &str, salt: &str) -> Result<Vec<u8>> {
    let mut reader = open_decrypting_source(envelope, passphrase, salt)?;
    let mut plaintext = Vec::new();
    reader.read_to_end(&mut plaintext)?;
    Ok(plaintext)
}
