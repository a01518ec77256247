//! Stream envelope prefix handling.
//!
//! An envelope is the raw IV followed by AES-256-CBC ciphertext:
//!
//! - [0-15]  initialization vector (16 bytes, unencrypted)
//! - [16+]   ciphertext (PKCS#7 padded, multiple of 16 bytes, at least one block)

use std::io::{ErrorKind, Read, Write};

use rand::rngs::OsRng;
use rand::RngCore;

use crate::types::{OneCloudError, Result, BLOCK_SIZE, IV_SIZE, MIN_ENVELOPE_SIZE};

/// Generate a fresh random IV for one stream.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Write the IV prefix to the raw sink.
pub fn write_iv<W: Write>(raw: &mut W, iv: &[u8; IV_SIZE]) -> Result<()> {
    raw.write_all(iv)?;
    Ok(())
}

/// Read exactly [`IV_SIZE`] bytes from the raw source.
///
/// Fails with [`OneCloudError::TruncatedEnvelope`] if the source ends early.
pub fn read_iv<R: Read>(raw: &mut R) -> Result<[u8; IV_SIZE]> {
    let mut iv = [0u8; IV_SIZE];
    let read = read_full(raw, &mut iv)?;
    if read < IV_SIZE {
        return Err(OneCloudError::TruncatedEnvelope {
            expected: IV_SIZE,
            actual: read,
        });
    }
    Ok(iv)
}

/// Check if data has the shape of a complete envelope.
///
/// This only checks length; the ciphertext itself is not validated.
pub fn is_stream_envelope(data: &[u8]) -> bool {
    is_valid_envelope_len(data.len() as u64)
}

/// Whether an envelope of `len` bytes could be well-formed.
pub fn is_valid_envelope_len(len: u64) -> bool {
    len >= MIN_ENVELOPE_SIZE as u64 && (len - IV_SIZE as u64) % BLOCK_SIZE as u64 == 0
}

/// Fill `buffer` from `reader`, stopping early only at end of stream.
pub(crate) fn read_full<R: Read>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buffer.len() {
        match reader.read(&mut buffer[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out one byte per call.
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(1);
            self.0.read(&mut buf[..n])
        }
    }

    #[test]
    fn test_write_then_read_iv() {
        let iv = generate_iv();
        let mut out = Vec::new();
        write_iv(&mut out, &iv).unwrap();
        assert_eq!(out.len(), IV_SIZE);

        let read = read_iv(&mut Cursor::new(out)).unwrap();
        assert_eq!(read, iv);
    }

    #[test]
    fn test_read_iv_across_short_reads() {
        let data: Vec<u8> = (0..IV_SIZE as u8).collect();
        let iv = read_iv(&mut Trickle(Cursor::new(data.clone()))).unwrap();
        assert_eq!(&iv[..], &data[..]);
    }

    #[test]
    fn test_read_iv_too_short() {
        let result = read_iv(&mut Cursor::new(vec![0u8; 5]));
        assert!(matches!(
            result,
            Err(OneCloudError::TruncatedEnvelope {
                expected: IV_SIZE,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_generate_iv_fresh() {
        assert_ne!(generate_iv(), generate_iv());
    }

    #[test]
    fn test_is_stream_envelope() {
        assert!(is_stream_envelope(&[0u8; MIN_ENVELOPE_SIZE]));
        assert!(is_stream_envelope(&[0u8; MIN_ENVELOPE_SIZE + BLOCK_SIZE]));
        assert!(!is_stream_envelope(&[0u8; IV_SIZE]));
        assert!(!is_stream_envelope(&[0u8; MIN_ENVELOPE_SIZE + 3]));
        assert!(!is_stream_envelope(&[]));
    }

    #[test]
    fn test_is_valid_envelope_len() {
        assert!(is_valid_envelope_len(32));
        assert!(is_valid_envelope_len(1024 + 16));
        assert!(!is_valid_envelope_len(31));
        assert!(!is_valid_envelope_len(40));
    }
}
