use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use aes::{Aes128, Aes192, Aes256};
use ctr::Ctr64BE;
use ctr::cipher::{KeyIvInit, StreamCipher};

/// Marks a cached object as encrypted. Anything else is plain audio.
pub const MAGIC: [u8; 4] = [0x12, 0xD3, 0x15, 0x27];

/// Each frame is `[16-byte IV][up to 1008 bytes ciphertext]`.
pub const FRAME_SIZE: usize = 1024;
pub const IV_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Truncated frame at offset {offset}: {len} bytes is shorter than the 16-byte IV")]
    TruncatedFrame { offset: u64, len: usize },

    #[error("Object is encrypted but no key material is available")]
    MissingKey,

    #[error("Invalid key length: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Encrypted,
    Plain,
}

impl ContainerKind {
    pub fn sniff(header: &[u8]) -> Self {
        if header == MAGIC {
            ContainerKind::Encrypted
        } else {
            ContainerKind::Plain
        }
    }

    pub fn is_encrypted(self) -> bool {
        self == ContainerKind::Encrypted
    }
}

/// A cached audio object found in the source directory.
#[derive(Debug, Clone)]
pub struct CachedObject {
    pub path: PathBuf,
    pub len: u64,
    pub modified: SystemTime,
    pub kind: ContainerKind,
}

impl CachedObject {
    /// Stat the file and peek at its first bytes to classify it.
    pub fn open(path: &Path) -> io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let mut header = [0u8; MAGIC.len()];
        let read = read_full(&mut File::open(path)?, &mut header)?;

        Ok(Self {
            path: path.to_path_buf(),
            len: metadata.len(),
            modified: metadata.modified()?,
            kind: ContainerKind::sniff(&header[..read]),
        })
    }

    /// The base filename, which is the catalog lookup key.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeStats {
    pub kind: ContainerKind,
    pub frames: u64,
    pub bytes_written: u64,
}

/// Decode a cached object from `source` into `dest`.
///
/// Encrypted objects are decrypted frame by frame and flushed after each
/// frame; plain objects are copied byte for byte. The key is only required
/// for encrypted objects.
pub fn decode<R: Read, W: Write>(
    mut source: R,
    mut dest: W,
    key: Option<&[u8]>,
) -> Result<DecodeStats, ContainerError> {
    let mut header = [0u8; MAGIC.len()];
    let read = read_full(&mut source, &mut header)?;

    match ContainerKind::sniff(&header[..read]) {
        ContainerKind::Encrypted => {
            let key = key.ok_or(ContainerError::MissingKey)?;
            check_key_length(key)?;
            decrypt_frames(source, dest, key)
        }
        ContainerKind::Plain => {
            dest.write_all(&header[..read])?;
            let copied = io::copy(&mut source, &mut dest)?;
            dest.flush()?;
            Ok(DecodeStats {
                kind: ContainerKind::Plain,
                frames: 0,
                bytes_written: read as u64 + copied,
            })
        }
    }
}

fn decrypt_frames<R: Read, W: Write>(
    mut source: R,
    mut dest: W,
    key: &[u8],
) -> Result<DecodeStats, ContainerError> {
    let mut frame = [0u8; FRAME_SIZE];
    let mut offset = MAGIC.len() as u64;
    let mut stats = DecodeStats {
        kind: ContainerKind::Encrypted,
        frames: 0,
        bytes_written: 0,
    };

    loop {
        let len = read_full(&mut source, &mut frame)?;
        if len == 0 {
            break;
        }
        if len < IV_SIZE {
            return Err(ContainerError::TruncatedFrame { offset, len });
        }

        let (iv, payload) = frame[..len].split_at_mut(IV_SIZE);
        apply_frame_keystream(key, iv, payload)?;
        dest.write_all(payload)?;
        dest.flush()?;

        offset += len as u64;
        stats.frames += 1;
        stats.bytes_written += payload.len() as u64;
    }

    Ok(stats)
}

fn check_key_length(key: &[u8]) -> Result<(), ContainerError> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        n => Err(ContainerError::InvalidKeyLength(n)),
    }
}

/// XOR one frame payload with its keystream. The IV's first half is the
/// fixed counter prefix, its second half the big-endian initial counter.
fn apply_frame_keystream(key: &[u8], iv: &[u8], payload: &mut [u8]) -> Result<(), ContainerError> {
    let invalid = |_| ContainerError::InvalidKeyLength(key.len());
    match key.len() {
        16 => Ctr64BE::<Aes128>::new_from_slices(key, iv)
            .map_err(invalid)?
            .apply_keystream(payload),
        24 => Ctr64BE::<Aes192>::new_from_slices(key, iv)
            .map_err(invalid)?
            .apply_keystream(payload),
        32 => Ctr64BE::<Aes256>::new_from_slices(key, iv)
            .map_err(invalid)?
            .apply_keystream(payload),
        n => return Err(ContainerError::InvalidKeyLength(n)),
    }
    Ok(())
}

/// Read until `buf` is full or the reader is exhausted.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Build an encrypted container from plaintext, deriving each frame IV from
/// `iv_seed` and the frame index.
#[cfg(test)]
pub(crate) fn encode(plaintext: &[u8], key: &[u8], iv_seed: [u8; IV_SIZE]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    for (index, chunk) in plaintext.chunks(FRAME_SIZE - IV_SIZE).enumerate() {
        let mut iv = iv_seed;
        iv[7] ^= index as u8;
        let mut payload = chunk.to_vec();
        apply_frame_keystream(key, &iv, &mut payload).unwrap();
        out.extend_from_slice(&iv);
        out.extend_from_slice(&payload);
    }
    out
}
