//! Binary container format and HMAC integrity verification.
//!
//! A `.avlt` file has this layout:
//!
//! ```text
//! [AVLT: 4 bytes][version: 1 byte][header_len: 4 bytes LE][header JSON][payload][HMAC-SHA256: 32 bytes]
//! ```
//!
//! - **Magic** (`AVLT`): identifies the file as an authvault container.
//! - **Version**: format version (currently `1`).
//! - **Header length**: little-endian u32 telling us where the header
//!   JSON ends and the payload begins.
//! - **Header JSON**: serialized `VaultHeader` (salt, KDF params,
//!   verifier, wrapped data key).  Nothing secret lives here.
//! - **Payload**: AES-256-GCM ciphertext of the serialized records.
//! - **HMAC-SHA256**: 32-byte tag over header + payload bytes, keyed
//!   with the data key's MAC sub-key.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::StorageMode;
use crate::crypto::KdfParams;
use crate::encoding::{base64_decode, base64_encode};
use crate::errors::{Result, VaultError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes at the start of every container.
const MAGIC: &[u8; 4] = b"AVLT";

/// Current binary format version.
pub const CURRENT_VERSION: u8 = 1;

/// Size of the HMAC tag appended to the file (SHA-256 = 32 bytes).
const HMAC_LEN: usize = 32;

/// Fixed-size prefix: 4 (magic) + 1 (version) + 4 (header_len).
const PREFIX_LEN: usize = 9;

// ---------------------------------------------------------------------------
// VaultHeader
// ---------------------------------------------------------------------------

/// Material for the platform (biometric/PIN) unlock path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricSlot {
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub verifier: Vec<u8>,

    /// The data key wrapped under the slot key.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub wrapped_data_key: Vec<u8>,

    pub enrolled_at: DateTime<Utc>,
}

/// Metadata stored at the beginning of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultHeader {
    /// Format version.
    pub version: u8,

    /// The salt used for Argon2id key derivation (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    /// Argon2 params used to derive the master key.
    pub kdf: KdfParams,

    /// Password verifier: proves a derived key is right without decrypting.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub verifier: Vec<u8>,

    /// The random data key, wrapped under the master key.
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub wrapped_data_key: Vec<u8>,

    /// Whether the payload is a tree or a flat account list.
    pub storage_mode: StorageMode,

    /// When this vault was first created.
    pub created_at: DateTime<Utc>,

    /// Present once the platform unlock path has been enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biometric: Option<BiometricSlot>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Write a container to disk **atomically**.
///
/// The blob is written to a temp file in the same directory (mode 0600
/// on unix), flushed, then renamed over the target path so readers never
/// see a half-written file.
pub fn write_vault(path: &Path, header: &VaultHeader, payload: &[u8], mac_key: &[u8]) -> Result<()> {
    let header_bytes = serde_json::to_vec(header)
        .map_err(|e| VaultError::Serialization(format!("header: {e}")))?;

    let hmac_tag = compute_hmac(mac_key, &header_bytes, payload)?;

    let header_len = u32::try_from(header_bytes.len()).map_err(|_| {
        VaultError::Serialization(format!(
            "header length {} exceeds u32::MAX",
            header_bytes.len()
        ))
    })?;
    let total = PREFIX_LEN + header_bytes.len() + payload.len() + HMAC_LEN;
    let mut buf = Vec::with_capacity(total);

    buf.extend_from_slice(MAGIC); // 4 bytes
    buf.push(CURRENT_VERSION); // 1 byte
    buf.extend_from_slice(&header_len.to_le_bytes()); // 4 bytes LE
    buf.extend_from_slice(&header_bytes); // header JSON
    buf.extend_from_slice(payload); // ciphertext
    buf.extend_from_slice(&hmac_tag); // 32 bytes

    write_atomic(path, &buf)
}

/// Write `bytes` to `path` via temp file + rename, owner-only permissions.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Raw data read from a container on disk.
///
/// Keeps the original bytes so the HMAC can be verified over the
/// exact bytes that were written.
pub struct RawVault {
    pub header: VaultHeader,
    /// The raw header JSON bytes exactly as stored on disk.
    pub header_bytes: Vec<u8>,
    /// The encrypted payload.
    pub payload: Vec<u8>,
    /// The HMAC tag stored at the end of the file.
    pub stored_hmac: Vec<u8>,
}

fn corrupt(msg: impl Into<String>) -> VaultError {
    VaultError::DatabaseError(msg.into())
}

/// Read a container and return its parts **with raw bytes**.
///
/// A missing file is `MasterKeyNotInitialized`; anything structurally
/// wrong is `DatabaseError`.  The caller verifies the HMAC before
/// trusting the payload.
pub fn read_vault(path: &Path) -> Result<RawVault> {
    if !path.exists() {
        return Err(VaultError::MasterKeyNotInitialized);
    }

    let data = fs::read(path)?;
    parse_vault(&data)
}

/// Split an in-memory container into its parts.
pub fn parse_vault(data: &[u8]) -> Result<RawVault> {
    if data.len() < PREFIX_LEN + HMAC_LEN {
        return Err(corrupt("file too small to be a valid vault"));
    }

    // --- Parse the fixed-size prefix ---

    if &data[0..4] != MAGIC {
        return Err(corrupt("missing AVLT magic bytes"));
    }

    let version = data[4];
    if version != CURRENT_VERSION {
        return Err(corrupt(format!(
            "unsupported version {version}, expected {CURRENT_VERSION}"
        )));
    }

    let header_len_u32 = u32::from_le_bytes(
        data[5..9]
            .try_into()
            .map_err(|_| corrupt("bad header length"))?,
    );
    let header_len = usize::try_from(header_len_u32)
        .map_err(|_| corrupt(format!("header length {header_len_u32} is too large")))?;

    let header_end = PREFIX_LEN
        .checked_add(header_len)
        .ok_or_else(|| corrupt("header length overflow"))?;
    if header_end + HMAC_LEN > data.len() {
        return Err(corrupt("header length exceeds file size"));
    }

    // --- Extract the variable-length sections as raw bytes ---

    let header_bytes = data[PREFIX_LEN..header_end].to_vec();
    let payload_end = data.len() - HMAC_LEN;
    let payload = data[header_end..payload_end].to_vec();
    let stored_hmac = data[payload_end..].to_vec();

    let header: VaultHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| corrupt(format!("header JSON: {e}")))?;
    if header.version != version {
        return Err(corrupt("header version does not match file version"));
    }

    Ok(RawVault {
        header,
        header_bytes,
        payload,
        stored_hmac,
    })
}

/// Compute HMAC-SHA256 over header + payload bytes.
pub fn compute_hmac(mac_key: &[u8], header_bytes: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(mac_key)
        .map_err(|e| VaultError::Unexpected(format!("invalid HMAC key: {e}")))?;

    mac.update(header_bytes);
    mac.update(payload);

    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify the HMAC in constant time (`Mac::verify_slice`).
pub fn verify_hmac(
    mac_key: &[u8],
    header_bytes: &[u8],
    payload: &[u8],
    expected_hmac: &[u8],
) -> Result<()> {
    let mut mac = Hmac::<Sha256>::new_from_slice(mac_key)
        .map_err(|e| VaultError::Unexpected(format!("invalid HMAC key: {e}")))?;

    mac.update(header_bytes);
    mac.update(payload);

    mac.verify_slice(expected_hmac)
        .map_err(|_| corrupt("integrity check failed: the vault was modified or is corrupted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn header() -> VaultHeader {
        VaultHeader {
            version: CURRENT_VERSION,
            salt: vec![1; 32],
            kdf: KdfParams::minimum(),
            verifier: vec![2; 32],
            wrapped_data_key: vec![3; 60],
            storage_mode: StorageMode::Hierarchical,
            created_at: Utc::now(),
            biometric: None,
        }
    }

    #[test]
    fn write_then_read_keeps_parts() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vault.avlt");
        let key = [7u8; 32];
        let written = header();
        write_vault(&path, &written, b"ciphertext", &key).unwrap();

        let raw = read_vault(&path).unwrap();
        assert_eq!(raw.header, written);
        assert_eq!(raw.payload, b"ciphertext");
        verify_hmac(&key, &raw.header_bytes, &raw.payload, &raw.stored_hmac).unwrap();
    }

    #[test]
    fn missing_file_means_not_initialized() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            read_vault(&tmp.path().join("nope.avlt")),
            Err(VaultError::MasterKeyNotInitialized)
        ));
    }

    #[test]
    fn flipped_payload_byte_fails_mac() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vault.avlt");
        let key = [7u8; 32];
        write_vault(&path, &header(), b"ciphertext", &key).unwrap();

        let mut data = fs::read(&path).unwrap();
        let idx = data.len() - HMAC_LEN - 1;
        data[idx] ^= 0xff;
        let raw = parse_vault(&data).unwrap();
        assert!(matches!(
            verify_hmac(&key, &raw.header_bytes, &raw.payload, &raw.stored_hmac),
            Err(VaultError::DatabaseError(_))
        ));
    }

    #[test]
    fn garbage_is_database_error() {
        assert!(matches!(
            parse_vault(b"definitely not a vault file at all, no sir"),
            Err(VaultError::DatabaseError(_))
        ));
        assert!(matches!(parse_vault(b"AVLT"), Err(VaultError::DatabaseError(_))));
    }

    #[cfg(unix)]
    #[test]
    fn container_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vault.avlt");
        write_vault(&path, &header(), b"x", &[7u8; 32]).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
