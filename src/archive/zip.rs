//! In-process ZIP password verification.
//!
//! # Supported
//! - Zip32 archives (EOCD + central directory).
//! - WinZip AES (AE-1/AE-2, 128/192/256-bit) and traditional PKWARE
//!   encryption.
//! - Entries stored (method 0) or deflated (method 8).
//!
//! # Not Supported
//! - Zip64, multi-disk archives, PKWARE strong encryption.
//!
//! # Verification
//! Both schemes carry a cheap password verifier (2 bytes for AES, 1 byte for
//! PKWARE) that wrong passwords pass with probability 1/65536 and 1/256. A
//! verifier match is never taken as proof: AES entries must also pass the
//! HMAC-SHA1 authentication code and yield plaintext, PKWARE entries must
//! decrypt and inflate to data matching the stored CRC-32.

use std::io::{self, Read};
use std::path::Path;

use aes::{Aes128, Aes192, Aes256};
use ctr::cipher::{KeyIvInit, StreamCipher};
use flate2::read::DeflateDecoder;
use flate2::CrcReader;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{Result, SweepError};
use crate::types::{CheckOutcome, WrongKind};

const SIG_EOCD: u32 = 0x0605_4b50;
const SIG_CDFH: u32 = 0x0201_4b50;
const SIG_LFH: u32 = 0x0403_4b50;

const EOCD_MIN_LEN: usize = 22;
const EOCD_SEARCH_MAX: usize = 66 * 1024;
const CDFH_LEN: usize = 46;
const LFH_LEN: usize = 30;

const FLAG_ENCRYPTED: u16 = 1 << 0;
const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
const FLAG_STRONG_ENCRYPTION: u16 = 1 << 6;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;
const METHOD_AES: u16 = 99;

const EXTRA_AES: u16 = 0x9901;
const AES_PBKDF2_ROUNDS: u32 = 1000;
const AES_VERIFIER_LEN: usize = 2;
const AES_AUTH_LEN: usize = 10;
const ZIPCRYPTO_HEADER_LEN: usize = 12;

type Aes128Ctr = ctr::Ctr128LE<Aes128>;
type Aes192Ctr = ctr::Ctr128LE<Aes192>;
type Aes256Ctr = ctr::Ctr128LE<Aes256>;

/// AES key size from the 0x9901 extra field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesStrength {
    Aes128,
    Aes192,
    Aes256,
}

impl AesStrength {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Aes128),
            2 => Some(Self::Aes192),
            3 => Some(Self::Aes256),
            _ => None,
        }
    }

    pub fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }

    pub fn salt_len(self) -> usize {
        self.key_len() / 2
    }
}

/// How the located entry is encrypted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encryption {
    Aes {
        strength: AesStrength,
        /// 1 for AE-1 (CRC present), 2 for AE-2
        vendor_version: u16,
    },
    ZipCrypto {
        /// Expected last byte of the decrypted 12-byte header
        check_byte: u8,
    },
}

/// First encrypted file entry of an archive, loaded into memory
#[derive(Debug, Clone)]
pub struct EncryptedEntry {
    pub name: String,
    pub encryption: Encryption,
    /// Compression method of the plaintext
    pub method: u16,
    pub crc32: u32,
    pub uncompressed_size: u64,
    /// Raw entry payload, including salt/verifier/auth or the PKWARE header
    payload: Vec<u8>,
}

impl EncryptedEntry {
    /// Read `path` and locate its first encrypted, non-directory entry
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            SweepError::io(e.to_string(), Some(path.to_string_lossy().to_string()))
        })?;
        Self::locate(&bytes).map_err(|e| match e {
            SweepError::Archive { message, .. } => {
                SweepError::archive(path.to_string_lossy(), message)
            }
            other => other,
        })
    }

    /// Locate the first encrypted, non-directory entry in an in-memory archive
    pub fn locate(bytes: &[u8]) -> Result<Self> {
        let eocd = find_eocd(bytes)?;
        let entries = u16_at(bytes, eocd + 10)?;
        let cd_size = u32_at(bytes, eocd + 12)?;
        let cd_offset = u32_at(bytes, eocd + 16)?;
        if entries == 0xFFFF || cd_size == u32::MAX || cd_offset == u32::MAX {
            return Err(malformed("Zip64 archives are not supported"));
        }

        let mut pos = cd_offset as usize;
        for _ in 0..entries {
            if u32_at(bytes, pos)? != SIG_CDFH {
                return Err(malformed(format!("bad central directory signature at {}", pos)));
            }
            let flags = u16_at(bytes, pos + 8)?;
            let method = u16_at(bytes, pos + 10)?;
            let mod_time = u16_at(bytes, pos + 12)?;
            let crc32 = u32_at(bytes, pos + 16)?;
            let compressed_size = u32_at(bytes, pos + 20)? as usize;
            let uncompressed_size = u32_at(bytes, pos + 24)? as u64;
            let name_len = u16_at(bytes, pos + 28)? as usize;
            let extra_len = u16_at(bytes, pos + 30)? as usize;
            let comment_len = u16_at(bytes, pos + 32)? as usize;
            let local_offset = u32_at(bytes, pos + 42)? as usize;

            let name_start = pos + CDFH_LEN;
            let name_bytes = slice(bytes, name_start, name_len)?;
            let extra = slice(bytes, name_start + name_len, extra_len)?;
            let name = String::from_utf8_lossy(name_bytes).into_owned();
            pos = name_start + name_len + extra_len + comment_len;

            if flags & FLAG_ENCRYPTED == 0 || name.ends_with('/') {
                continue;
            }
            if flags & FLAG_STRONG_ENCRYPTION != 0 {
                return Err(malformed(format!("'{}' uses unsupported strong encryption", name)));
            }

            let payload = local_payload(bytes, local_offset, compressed_size)?.to_vec();

            let (encryption, method) = if method == METHOD_AES {
                parse_aes_extra(extra)
                    .ok_or_else(|| malformed(format!("'{}' is missing its AES extra field", name)))?
            } else {
                let check_byte = if flags & FLAG_DATA_DESCRIPTOR != 0 {
                    (mod_time >> 8) as u8
                } else {
                    (crc32 >> 24) as u8
                };
                (Encryption::ZipCrypto { check_byte }, method)
            };

            if method != METHOD_STORED && method != METHOD_DEFLATE {
                return Err(malformed(format!(
                    "'{}' uses unsupported compression method {}",
                    name, method
                )));
            }

            let entry = Self {
                name,
                encryption,
                method,
                crc32,
                uncompressed_size,
                payload,
            };
            entry.check_payload_len()?;
            return Ok(entry);
        }

        Err(malformed("no encrypted file entry found"))
    }

    fn check_payload_len(&self) -> Result<()> {
        let min = match &self.encryption {
            Encryption::Aes { strength, .. } => {
                strength.salt_len() + AES_VERIFIER_LEN + AES_AUTH_LEN
            }
            Encryption::ZipCrypto { .. } => ZIPCRYPTO_HEADER_LEN,
        };
        if self.payload.len() < min {
            return Err(malformed(format!("'{}' is truncated", self.name)));
        }
        Ok(())
    }

    /// Try one password against the entry
    pub fn verify(&self, password: &[u8]) -> CheckOutcome {
        match &self.encryption {
            Encryption::Aes {
                strength,
                vendor_version,
            } => self.verify_aes(*strength, *vendor_version, password),
            Encryption::ZipCrypto { check_byte } => self.verify_zipcrypto(*check_byte, password),
        }
    }

    fn verify_aes(&self, strength: AesStrength, vendor_version: u16, password: &[u8]) -> CheckOutcome {
        let key_len = strength.key_len();
        let salt_len = strength.salt_len();
        let salt = &self.payload[..salt_len];
        let verifier = &self.payload[salt_len..salt_len + AES_VERIFIER_LEN];
        let body_end = self.payload.len() - AES_AUTH_LEN;
        let ciphertext = &self.payload[salt_len + AES_VERIFIER_LEN..body_end];
        let auth_code = &self.payload[body_end..];

        let mut derived = vec![0u8; key_len * 2 + AES_VERIFIER_LEN];
        pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, AES_PBKDF2_ROUNDS, &mut derived);
        let (enc_key, rest) = derived.split_at(key_len);
        let (auth_key, derived_verifier) = rest.split_at(key_len);

        if derived_verifier != verifier {
            return CheckOutcome::WrongPassword(WrongKind::Verifier);
        }

        let mut mac = match Hmac::<Sha1>::new_from_slice(auth_key) {
            Ok(mac) => mac,
            Err(e) => return fatal(format!("HMAC init: {}", e)),
        };
        mac.update(ciphertext);
        if mac.verify_truncated_left(auth_code).is_err() {
            return CheckOutcome::WrongPassword(WrongKind::Authentication);
        }

        let mut plain = ciphertext.to_vec();
        let mut iv = [0u8; 16];
        iv[0] = 1;
        let applied = match strength {
            AesStrength::Aes128 => Aes128Ctr::new_from_slices(enc_key, &iv)
                .map(|mut c| c.apply_keystream(&mut plain)),
            AesStrength::Aes192 => Aes192Ctr::new_from_slices(enc_key, &iv)
                .map(|mut c| c.apply_keystream(&mut plain)),
            AesStrength::Aes256 => Aes256Ctr::new_from_slices(enc_key, &iv)
                .map(|mut c| c.apply_keystream(&mut plain)),
        };
        if let Err(e) = applied {
            return fatal(format!("AES init: {}", e));
        }

        // AE-2 zeroes the CRC, so only AE-1 can be checked end to end.
        let confirmed = if vendor_version == 1 && self.crc32 != 0 {
            self.matches_crc(plain.as_slice())
        } else {
            self.yields_plaintext(&plain)
        };
        if confirmed {
            CheckOutcome::Success
        } else {
            CheckOutcome::WrongPassword(WrongKind::Authentication)
        }
    }

    fn verify_zipcrypto(&self, check_byte: u8, password: &[u8]) -> CheckOutcome {
        let mut keys = ZipCryptoKeys::new(password);

        let mut header = [0u8; ZIPCRYPTO_HEADER_LEN];
        header.copy_from_slice(&self.payload[..ZIPCRYPTO_HEADER_LEN]);
        keys.decrypt(&mut header);
        if header[ZIPCRYPTO_HEADER_LEN - 1] != check_byte {
            return CheckOutcome::WrongPassword(WrongKind::Verifier);
        }

        let body = ZipCryptoReader {
            keys,
            inner: &self.payload[ZIPCRYPTO_HEADER_LEN..],
        };
        if self.matches_crc(body) {
            CheckOutcome::Success
        } else {
            CheckOutcome::WrongPassword(WrongKind::Authentication)
        }
    }

    /// At least one plaintext byte can be produced (or the file is empty)
    fn yields_plaintext(&self, compressed: &[u8]) -> bool {
        if self.uncompressed_size == 0 {
            return true;
        }
        match self.method {
            METHOD_STORED => !compressed.is_empty(),
            _ => {
                let mut one = [0u8; 1];
                matches!(DeflateDecoder::new(compressed).read(&mut one), Ok(1))
            }
        }
    }

    /// Full decompression matches the declared size and CRC-32. Reads the
    /// plaintext through a fixed buffer and stops at the first inflate error.
    fn matches_crc<R: Read>(&self, compressed: R) -> bool {
        let limit = self.uncompressed_size.saturating_add(1);
        match self.method {
            METHOD_STORED => self.crc_of(compressed.take(limit)),
            _ => self.crc_of(DeflateDecoder::new(compressed).take(limit)),
        }
    }

    fn crc_of<R: Read>(&self, plain: R) -> bool {
        let mut reader = CrcReader::new(plain);
        match io::copy(&mut reader, &mut io::sink()) {
            Ok(len) => len == self.uncompressed_size && reader.crc().sum() == self.crc32,
            Err(_) => false,
        }
    }
}

/// Traditional PKWARE stream cipher state
struct ZipCryptoKeys {
    k0: u32,
    k1: u32,
    k2: u32,
}

impl ZipCryptoKeys {
    fn new(password: &[u8]) -> Self {
        let mut keys = Self {
            k0: 0x1234_5678,
            k1: 0x2345_6789,
            k2: 0x3456_7890,
        };
        for &b in password {
            keys.update(b);
        }
        keys
    }

    fn update(&mut self, b: u8) {
        self.k0 = crc32_step(self.k0, b);
        self.k1 = self
            .k1
            .wrapping_add(self.k0 & 0xff)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.k2 = crc32_step(self.k2, (self.k1 >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let t = (self.k2 | 2) & 0xffff;
        ((t * (t ^ 1)) >> 8) as u8
    }

    fn decrypt(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            let plain = *b ^ self.stream_byte();
            self.update(plain);
            *b = plain;
        }
    }
}

/// Decrypts a PKWARE payload as it is read
struct ZipCryptoReader<'a> {
    keys: ZipCryptoKeys,
    inner: &'a [u8],
}

impl Read for ZipCryptoReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.keys.decrypt(&mut buf[..n]);
        Ok(n)
    }
}

const CRC32_TABLE: [u32; 256] = crc32_table();

const fn crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut c = i as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
            k += 1;
        }
        table[i] = c;
        i += 1;
    }
    table
}

fn crc32_step(crc: u32, b: u8) -> u32 {
    CRC32_TABLE[((crc ^ b as u32) & 0xff) as usize] ^ (crc >> 8)
}

fn parse_aes_extra(mut extra: &[u8]) -> Option<(Encryption, u16)> {
    while extra.len() >= 4 {
        let id = u16::from_le_bytes([extra[0], extra[1]]);
        let size = u16::from_le_bytes([extra[2], extra[3]]) as usize;
        let body = extra.get(4..4 + size)?;
        if id == EXTRA_AES && size >= 7 && &body[2..4] == b"AE" {
            let vendor_version = u16::from_le_bytes([body[0], body[1]]);
            let strength = AesStrength::from_byte(body[4])?;
            let method = u16::from_le_bytes([body[5], body[6]]);
            return Some((
                Encryption::Aes {
                    strength,
                    vendor_version,
                },
                method,
            ));
        }
        extra = &extra[4 + size..];
    }
    None
}

fn local_payload(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    if u32_at(bytes, offset)? != SIG_LFH {
        return Err(malformed(format!("bad local header signature at {}", offset)));
    }
    let name_len = u16_at(bytes, offset + 26)? as usize;
    let extra_len = u16_at(bytes, offset + 28)? as usize;
    slice(bytes, offset + LFH_LEN + name_len + extra_len, len)
}

fn find_eocd(bytes: &[u8]) -> Result<usize> {
    if bytes.len() < EOCD_MIN_LEN {
        return Err(malformed("file too small to be a ZIP archive"));
    }
    let floor = bytes.len().saturating_sub(EOCD_SEARCH_MAX);
    (floor..=bytes.len() - EOCD_MIN_LEN)
        .rev()
        .find(|&i| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]) == SIG_EOCD)
        .ok_or_else(|| malformed("end of central directory not found"))
}

fn slice(bytes: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    start
        .checked_add(len)
        .and_then(|end| bytes.get(start..end))
        .ok_or_else(|| malformed(format!("record at {} runs past end of file", start)))
}

fn u16_at(bytes: &[u8], at: usize) -> Result<u16> {
    let b = slice(bytes, at, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn u32_at(bytes: &[u8], at: usize) -> Result<u32> {
    let b = slice(bytes, at, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn malformed(message: impl Into<String>) -> SweepError {
    SweepError::archive("<memory>", message)
}

fn fatal(message: String) -> CheckOutcome {
    CheckOutcome::Fatal(SweepError::checker(crate::types::CheckMethod::Zip, message, None))
}
