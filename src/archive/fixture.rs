//! Encrypted ZIP archive writer for tests.
//!
//! Only depends on external crates so integration tests can include it with
//! `#[path]`.

#![allow(dead_code)]

use std::io::Write;

use aes::{Aes128, Aes192, Aes256};
use ctr::cipher::{KeyIvInit, StreamCipher};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Builds a Zip32 archive entry by entry
#[derive(Default)]
pub struct ZipBuilder {
    body: Vec<u8>,
    central: Vec<u8>,
    count: u16,
}

struct Entry<'a> {
    name: &'a str,
    flags: u16,
    method: u16,
    crc: u32,
    uncompressed: u32,
    extra: Vec<u8>,
    payload: Vec<u8>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(mut self, name: &str) -> Self {
        self.push(Entry {
            name,
            flags: 0,
            method: 0,
            crc: 0,
            uncompressed: 0,
            extra: Vec::new(),
            payload: Vec::new(),
        });
        self
    }

    pub fn plain(mut self, name: &str, data: &[u8]) -> Self {
        self.push(Entry {
            name,
            flags: 0,
            method: 0,
            crc: crc32(data),
            uncompressed: data.len() as u32,
            extra: Vec::new(),
            payload: data.to_vec(),
        });
        self
    }

    /// WinZip AE-2, AES-256, stored
    pub fn aes(self, name: &str, data: &[u8], password: &[u8]) -> Self {
        self.aes_with_strength(name, data, password, 3)
    }

    /// WinZip AE-2, AES-128, stored
    pub fn aes128(self, name: &str, data: &[u8], password: &[u8]) -> Self {
        self.aes_with_strength(name, data, password, 1)
    }

    /// WinZip AE-2, stored, with strength byte 1 (128), 2 (192) or 3 (256)
    pub fn aes_with_strength(mut self, name: &str, data: &[u8], password: &[u8], strength: u8) -> Self {
        let payload = aes_payload(data, password, strength);
        self.push(Entry {
            name,
            flags: 1,
            method: 99,
            crc: 0,
            uncompressed: data.len() as u32,
            extra: aes_extra(strength, 0),
            payload,
        });
        self
    }

    /// WinZip AE-2, AES-256, deflated
    pub fn aes_deflated(mut self, name: &str, data: &[u8], password: &[u8]) -> Self {
        let payload = aes_payload(&deflate(data), password, 3);
        self.push(Entry {
            name,
            flags: 1,
            method: 99,
            crc: 0,
            uncompressed: data.len() as u32,
            extra: aes_extra(3, 8),
            payload,
        });
        self
    }

    /// Traditional PKWARE encryption, stored
    pub fn zipcrypto(self, name: &str, data: &[u8], password: &[u8]) -> Self {
        self.zipcrypto_entry(name, 0, data, data.to_vec(), password)
    }

    /// Traditional PKWARE encryption, deflated
    pub fn zipcrypto_deflated(self, name: &str, data: &[u8], password: &[u8]) -> Self {
        self.zipcrypto_entry(name, 8, data, deflate(data), password)
    }

    fn zipcrypto_entry(
        mut self,
        name: &str,
        method: u16,
        data: &[u8],
        stored: Vec<u8>,
        password: &[u8],
    ) -> Self {
        let crc = crc32(data);
        let mut plain = vec![0x5a, 0x13, 0x77, 0x02, 0xc4, 0x91, 0x3e, 0x68, 0x0b, 0xe2, 0x40];
        plain.push((crc >> 24) as u8);
        plain.extend(stored);

        let mut keys = Keys::new(password);
        let payload = plain
            .into_iter()
            .map(|p| {
                let c = p ^ keys.stream_byte();
                keys.update(p);
                c
            })
            .collect();

        self.push(Entry {
            name,
            flags: 1,
            method,
            crc,
            uncompressed: data.len() as u32,
            extra: Vec::new(),
            payload,
        });
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        let cd_offset = self.body.len() as u32;
        let cd_size = self.central.len() as u32;
        let mut out = std::mem::take(&mut self.body);
        out.extend_from_slice(&self.central);
        out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    fn push(&mut self, e: Entry<'_>) {
        let offset = self.body.len() as u32;
        let csize = e.payload.len() as u32;
        let version: u16 = if e.method == 99 { 51 } else { 20 };

        let b = &mut self.body;
        b.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        b.extend_from_slice(&version.to_le_bytes());
        b.extend_from_slice(&e.flags.to_le_bytes());
        b.extend_from_slice(&e.method.to_le_bytes());
        b.extend_from_slice(&0u16.to_le_bytes());
        b.extend_from_slice(&0u16.to_le_bytes());
        b.extend_from_slice(&e.crc.to_le_bytes());
        b.extend_from_slice(&csize.to_le_bytes());
        b.extend_from_slice(&e.uncompressed.to_le_bytes());
        b.extend_from_slice(&(e.name.len() as u16).to_le_bytes());
        b.extend_from_slice(&(e.extra.len() as u16).to_le_bytes());
        b.extend_from_slice(e.name.as_bytes());
        b.extend_from_slice(&e.extra);
        b.extend_from_slice(&e.payload);

        let c = &mut self.central;
        c.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        c.extend_from_slice(&63u16.to_le_bytes());
        c.extend_from_slice(&version.to_le_bytes());
        c.extend_from_slice(&e.flags.to_le_bytes());
        c.extend_from_slice(&e.method.to_le_bytes());
        c.extend_from_slice(&0u16.to_le_bytes());
        c.extend_from_slice(&0u16.to_le_bytes());
        c.extend_from_slice(&e.crc.to_le_bytes());
        c.extend_from_slice(&csize.to_le_bytes());
        c.extend_from_slice(&e.uncompressed.to_le_bytes());
        c.extend_from_slice(&(e.name.len() as u16).to_le_bytes());
        c.extend_from_slice(&(e.extra.len() as u16).to_le_bytes());
        c.extend_from_slice(&0u16.to_le_bytes());
        c.extend_from_slice(&0u16.to_le_bytes());
        c.extend_from_slice(&0u16.to_le_bytes());
        c.extend_from_slice(&0u32.to_le_bytes());
        c.extend_from_slice(&offset.to_le_bytes());
        c.extend_from_slice(e.name.as_bytes());
        c.extend_from_slice(&e.extra);

        self.count += 1;
    }
}

fn aes_extra(strength: u8, actual_method: u16) -> Vec<u8> {
    let mut extra = Vec::new();
    extra.extend_from_slice(&0x9901u16.to_le_bytes());
    extra.extend_from_slice(&7u16.to_le_bytes());
    extra.extend_from_slice(&2u16.to_le_bytes());
    extra.extend_from_slice(b"AE");
    extra.push(strength);
    extra.extend_from_slice(&actual_method.to_le_bytes());
    extra
}

fn aes_payload(data: &[u8], password: &[u8], strength: u8) -> Vec<u8> {
    let key_len = 8 + 8 * strength as usize;
    let salt_len = key_len / 2;
    let salt: Vec<u8> = [7u8, 1, 9, 3, 5, 2, 8, 4, 6, 0, 11, 13, 12, 15, 14, 10][..salt_len].to_vec();
    let mut derived = vec![0u8; key_len * 2 + 2];
    pbkdf2::pbkdf2_hmac::<Sha1>(password, &salt, 1000, &mut derived);
    let (enc_key, rest) = derived.split_at(key_len);
    let (auth_key, verifier) = rest.split_at(key_len);

    let mut ciphertext = data.to_vec();
    let mut iv = [0u8; 16];
    iv[0] = 1;
    match strength {
        1 => ctr::Ctr128LE::<Aes128>::new_from_slices(enc_key, &iv)
            .expect("AES-128 key and IV lengths")
            .apply_keystream(&mut ciphertext),
        2 => ctr::Ctr128LE::<Aes192>::new_from_slices(enc_key, &iv)
            .expect("AES-192 key and IV lengths")
            .apply_keystream(&mut ciphertext),
        _ => ctr::Ctr128LE::<Aes256>::new_from_slices(enc_key, &iv)
            .expect("AES-256 key and IV lengths")
            .apply_keystream(&mut ciphertext),
    }

    let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(auth_key).expect("HMAC key");
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let mut payload = salt;
    payload.extend_from_slice(verifier);
    payload.extend_from_slice(&ciphertext);
    payload.extend_from_slice(&tag[..10]);
    payload
}

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("deflate into memory");
    encoder.finish().expect("deflate into memory")
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = flate2::Crc::new();
    crc.update(data);
    crc.sum()
}

struct Keys(u32, u32, u32);

impl Keys {
    fn new(password: &[u8]) -> Self {
        let mut keys = Keys(0x1234_5678, 0x2345_6789, 0x3456_7890);
        for &b in password {
            keys.update(b);
        }
        keys
    }

    fn update(&mut self, b: u8) {
        self.0 = step(self.0, b);
        self.1 = self
            .1
            .wrapping_add(self.0 & 0xff)
            .wrapping_mul(134_775_813)
            .wrapping_add(1);
        self.2 = step(self.2, (self.1 >> 24) as u8);
    }

    fn stream_byte(&self) -> u8 {
        let t = (self.2 | 2) & 0xffff;
        ((t * (t ^ 1)) >> 8) as u8
    }
}

fn step(crc: u32, b: u8) -> u32 {
    let mut c = (crc ^ b as u32) & 0xff;
    for _ in 0..8 {
        c = if c & 1 != 0 { 0xEDB8_8320 ^ (c >> 1) } else { c >> 1 };
    }
    c ^ (crc >> 8)
}
