/*!
Byte-range codec applied around the virtual buffer: compress, then encrypt on the way in;
decrypt, then decompress on the way out.

Every encoded unit is finalized on its own. Gzip members concatenate cleanly, so a
compression-only transform decodes any number of pushed units at once. Cipher units do not:
each is sealed with its own nonce and tag, so extraction only opens a span that is exactly
one sealed unit.
*/
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, NONCE_LEN};

use crate::error::{Error, Result};

/// AEAD algorithms available for the cipher stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherKind {
	Aes128Gcm,
	Aes256Gcm,
	ChaCha20Poly1305,
}
impl CipherKind {
	fn algorithm(self) -> &'static aead::Algorithm {
		match self {
			CipherKind::Aes128Gcm => &aead::AES_128_GCM,
			CipherKind::Aes256Gcm => &aead::AES_256_GCM,
			CipherKind::ChaCha20Poly1305 => &aead::CHACHA20_POLY1305,
		}
	}

	/// Required key size in bytes.
	pub fn key_len(self) -> usize {
		self.algorithm().key_len()
	}

	pub fn as_str(self) -> &'static str {
		match self {
			CipherKind::Aes128Gcm => "aes-128-gcm",
			CipherKind::Aes256Gcm => "aes-256-gcm",
			CipherKind::ChaCha20Poly1305 => "chacha20-poly1305",
		}
	}
}
impl fmt::Display for CipherKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for CipherKind {
	type Err = Error;
	fn from_str(s: &str) -> Result<Self> {
		match s.to_ascii_lowercase().as_str() {
			"aes-128-gcm" => Ok(CipherKind::Aes128Gcm),
			"aes-256-gcm" => Ok(CipherKind::Aes256Gcm),
			"chacha20-poly1305" => Ok(CipherKind::ChaCha20Poly1305),
			_ => Err(Error::InvalidInput("unknown cipher")),
		}
	}
}

struct Cipher {
	kind: CipherKind,
	key: LessSafeKey,
	// base nonce; unit `seq` is sealed with `iv ^ be64(seq)` over the trailing 8 bytes
	iv: [u8; NONCE_LEN],
}
impl Cipher {
	fn new(kind: CipherKind, key: &[u8], iv: &[u8]) -> Result<Self> {
		let key = UnboundKey::new(kind.algorithm(), key)
			.map_err(|_| Error::InvalidInput("cipher key has wrong length"))?;
		if iv.len() != NONCE_LEN {
			return Err(Error::InvalidInput("cipher iv must be 12 bytes"));
		}
		let mut base = [0; NONCE_LEN];
		base.copy_from_slice(iv);
		Ok(Cipher {
			kind,
			key: LessSafeKey::new(key),
			iv: base,
		})
	}

	fn nonce(&self, seq: u64) -> Nonce {
		let mut nonce = self.iv;
		for (n, s) in nonce[(NONCE_LEN - 8)..].iter_mut().zip(seq.to_be_bytes().iter()) {
			*n ^= s;
		}
		Nonce::assume_unique_for_key(nonce)
	}

	fn seal(&self, seq: u64, mut data: Vec<u8>) -> Result<Vec<u8>> {
		self.key.seal_in_place_append_tag(self.nonce(seq), Aad::empty(), &mut data)
			.map_err(|_| Error::Cipher)?;
		Ok(data)
	}

	fn open(&self, seq: u64, mut data: Vec<u8>) -> Result<Vec<u8>> {
		let len = self.key.open_in_place(self.nonce(seq), Aad::empty(), &mut data)
			.map_err(|_| Error::Cipher)?
			.len();
		data.truncate(len);
		Ok(data)
	}
}

/// Encode/decode pair configured by [`EncodedBufferBuilder`](crate::EncodedBufferBuilder).
pub(crate) struct Transform {
	compression: Option<Compression>,
	cipher: Option<Cipher>,
}
impl fmt::Debug for Transform {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// keys stay out of logs
		f.debug_struct("Transform")
			.field("compression", &self.compression.map(|c| c.level()))
			.field("cipher", &self.cipher.as_ref().map(|c| c.kind))
			.finish()
	}
}
impl Transform {
	pub(crate) fn new(compression: Option<Compression>) -> Self {
		Transform {
			compression,
			cipher: None,
		}
	}

	pub(crate) fn with_cipher(mut self, kind: CipherKind, key: &[u8], iv: &[u8]) -> Result<Self> {
		self.cipher = Some(Cipher::new(kind, key, iv)?);
		Ok(self)
	}

	pub(crate) fn is_identity(&self) -> bool {
		self.compression.is_none() && self.cipher.is_none()
	}

	/// Encode one pushed unit; `seq` numbers the unit among all pushes.
	pub(crate) fn encode(&self, data: Bytes, seq: u64) -> Result<Bytes> {
		if self.is_identity() {
			return Ok(data);
		}
		let plain = data.len();

		let mut out = match self.compression {
			Some(level) => {
				let mut enc = GzEncoder::new(Vec::with_capacity(plain / 2 + 32), level);
				enc.write_all(&data)?;
				enc.finish()?
			},
			None => data.to_vec(),
		};
		if let Some(cipher) = &self.cipher {
			out = cipher.seal(seq, out)?;
		}

		debug!("encode #{}: {} -> {} bytes", seq, plain, out.len());
		Ok(Bytes::from(out))
	}

	/// Decode one extracted span; `seq` numbers the span among all consuming extractions.
	pub(crate) fn decode(&self, data: Vec<u8>, seq: u64) -> Result<Vec<u8>> {
		if self.is_identity() {
			return Ok(data);
		}
		let stored = data.len();

		let mut out = match &self.cipher {
			Some(cipher) => cipher.open(seq, data)?,
			None => data,
		};
		if self.compression.is_some() {
			let mut plain = Vec::with_capacity(out.len() * 2);
			MultiGzDecoder::new(&out[..]).read_to_end(&mut plain)?;
			out = plain;
		}

		debug!("decode #{}: {} -> {} bytes", seq, stored, out.len());
		Ok(out)
	}
}
