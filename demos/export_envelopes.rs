//! Export sample stream envelopes for checking other implementations.
//!
//! Writes one `<name>.hex` file per sample payload, plus `params.json` with
//! the passphrase, salt, KDF name and iteration count used to key them.

use onecloud::{encrypt_bytes, KDF_ITERATIONS};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const PASSPHRASE: &str = "onecloud-shared-key";
const SALT_HEX: &str = "000102030405060708090a0b0c0d0e0f10111213";

fn sample_payloads() -> BTreeMap<&'static str, Vec<u8>> {
    let mut payloads = BTreeMap::new();
    payloads.insert("empty", Vec::new());
    payloads.insert("single_byte", b"X".to_vec());
    payloads.insert("hello_world", b"hello world".to_vec());
    payloads.insert("one_block", b"0123456789abcdef".to_vec());
    payloads.insert("block_plus_one", b"0123456789abcdefg".to_vec());
    payloads.insert("utf8", "Café résumé naïve".as_bytes().to_vec());
    payloads.insert("binary", (0..=255u8).collect());
    payloads.insert(
        "long_text",
        "The quick brown fox jumps over the lazy dog. ".repeat(100).into_bytes(),
    );
    payloads
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let output_dir = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("test-envelopes-rust");

    let output_path = Path::new(output_dir);
    fs::create_dir_all(output_path).unwrap();

    let params = serde_json::json!({
        "passphrase": PASSPHRASE,
        "salt": SALT_HEX,
        "kdf": "pkcs12-sha256",
        "iterations": KDF_ITERATIONS,
    });
    fs::write(
        output_path.join("params.json"),
        serde_json::to_string_pretty(&params).unwrap(),
    )
    .unwrap();

    let payloads = sample_payloads();
    for (name, payload) in &payloads {
        let envelope = encrypt_bytes(payload, PASSPHRASE, SALT_HEX).unwrap();
        fs::write(output_path.join(format!("{}.hex", name)), hex::encode(&envelope)).unwrap();
        println!("✓ {} ({} bytes)", name, envelope.len());
    }

    println!("Exported {} envelopes to {}", payloads.len(), output_dir);
}
