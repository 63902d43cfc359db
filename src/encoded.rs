use bytes::Bytes;
use flate2::Compression;

use crate::error::Result;
use crate::transform::{CipherKind, Transform};
use crate::vise::VirtualBuffer;

/**
[`VirtualBuffer`] that encodes every pushed chunk and decodes whatever is extracted.

Positions, lengths, [`at()`](#method.at) and [`starts_with()`](#method.starts_with)
all refer to the stored (encoded) bytes; only [`shift()`](#method.shift)
and [`chunks()`](#method.chunks) decode, each over the whole span it extracts.

With a cipher configured, an extracted span must be exactly one pushed unit,
so keep to one push per shift. Compression alone has no such restriction.

## Example

```
use vise::{CipherKind, Compression, EncodedBuffer};

let mut buf = EncodedBuffer::builder()
	.compression(Compression::default())
	.cipher(CipherKind::ChaCha20Poly1305, &[42; 32], &[0; 12])
	.build()?;

buf.push(&b"lorem ipsum"[..])?;
let stored = buf.len();
assert_eq!(buf.shift(stored)?, vec![&b"lorem ipsum"[..]]);
assert!(buf.is_empty());
# Ok::<(), vise::Error>(())
```
*/
#[derive(Debug)]
pub struct EncodedBuffer {
	inner: VirtualBuffer,
	transform: Transform,
	// sequence numbers of the next push and of the next consuming extraction
	sealed: u64,
	opened: u64,
}

impl EncodedBuffer {
	pub fn builder() -> EncodedBufferBuilder {
		EncodedBufferBuilder::new()
	}

	/// Encode `chunk` and append the result. On error nothing is appended.
	pub fn push<B: Into<Bytes>>(&mut self, chunk: B) -> Result<()> {
		let data = self.transform.encode(chunk.into(), self.sealed)?;
		self.sealed += 1;
		self.inner.push(data);
		Ok(())
	}

	/**
	Consume `n` stored bytes and return them decoded as a single item
	(or as-is, chunk by chunk, if no transform is configured).

	Decoding happens before anything is consumed: if it fails, the buffer is left untouched.
	*/
	pub fn shift(&mut self, n: usize) -> Result<Vec<Bytes>> {
		if self.transform.is_identity() {
			return Ok(self.inner.shift(n));
		}

		let span = self.inner.peek(n);
		if span.is_empty() {
			return Ok(Vec::new());
		}
		let decoded = self.transform.decode(span.concat(), self.opened)?;

		self.inner.shift(n);
		self.opened += 1;
		Ok(vec![Bytes::from(decoded)])
	}

	/// Decoded snapshot of the remaining content. Does not consume anything.
	pub fn chunks(&self) -> Result<Vec<Bytes>> {
		if self.transform.is_identity() {
			return Ok(self.inner.chunks());
		}

		let span = self.inner.chunks();
		if span.is_empty() {
			return Ok(Vec::new());
		}
		let decoded = self.transform.decode(span.concat(), self.opened)?;
		Ok(vec![Bytes::from(decoded)])
	}

	/// Stored byte at `pos`.
	pub fn at(&self, pos: usize) -> Option<u8> {
		self.inner.at(pos)
	}

	pub fn get(&self, pos: usize) -> Option<u8> {
		self.inner.get(pos)
	}

	pub fn starts_with(&self, value: &[u8]) -> bool {
		self.inner.starts_with(value)
	}

	pub fn starts_with_at(&self, value: &[u8], pos: usize, length: Option<usize>) -> bool {
		self.inner.starts_with_at(value, pos, length)
	}

	/// Number of stored (encoded) bytes.
	pub fn len(&self) -> usize {
		self.inner.len()
	}

	pub fn is_empty(&self) -> bool {
		self.inner.is_empty()
	}

	/// Underlying buffer of encoded chunks.
	pub fn raw(&self) -> &VirtualBuffer {
		&self.inner
	}
}

/// Configuration for [`EncodedBuffer`].
pub struct EncodedBufferBuilder {
	chunks: Vec<Bytes>,
	compression: Option<Compression>,
	cipher: Option<(CipherKind, Vec<u8>, Vec<u8>)>,
}
impl Default for EncodedBufferBuilder {
	fn default() -> Self {
		EncodedBufferBuilder::new()
	}
}
impl EncodedBufferBuilder {
	pub fn new() -> Self {
		EncodedBufferBuilder {
			chunks: Vec::new(),
			compression: None,
			cipher: None,
		}
	}

	/// Encrypt each pushed chunk with `kind`; `iv` is the 12-byte base nonce.
	pub fn cipher(mut self, kind: CipherKind, key: &[u8], iv: &[u8]) -> Self {
		self.cipher = Some((kind, key.to_vec(), iv.to_vec()));
		self
	}

	/// Gzip each pushed chunk before it gets encrypted.
	pub fn compression(mut self, level: Compression) -> Self {
		self.compression = Some(level);
		self
	}

	/// Chunks to push right after the buffer is created.
	pub fn chunks<I, B>(mut self, chunks: I) -> Self
	where
		I: IntoIterator<Item = B>,
		B: Into<Bytes>,
	{
		self.chunks.extend(chunks.into_iter().map(Into::into));
		self
	}

	pub fn build(self) -> Result<EncodedBuffer> {
		let mut transform = Transform::new(self.compression);
		if let Some((kind, key, iv)) = self.cipher {
			transform = transform.with_cipher(kind, &key, &iv)?;
		}

		let mut buf = EncodedBuffer {
			inner: VirtualBuffer::new(),
			transform,
			sealed: 0,
			opened: 0,
		};
		for chunk in self.chunks {
			buf.push(chunk)?;
		}
		Ok(buf)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Error;

	const KEY: [u8; 32] = [0x5a; 32];
	const IV: [u8; 12] = [9; 12];

	fn init() {
		let _ = env_logger::builder().is_test(true).try_init();
	}

	fn sealed() -> EncodedBuffer {
		EncodedBuffer::builder()
			.cipher(CipherKind::Aes256Gcm, &KEY, &IV)
			.build()
			.unwrap()
	}

	#[test]
	fn identity_behaves_like_plain_buffer() {
		let mut buf = EncodedBuffer::builder()
			.chunks(vec![&b"abcde"[..], b"fgh", b"ijk"])
			.build()
			.unwrap();
		assert_eq!(buf.len(), 11);
		assert_eq!(buf.at(5), Some(b'f'));
		assert_eq!(buf.shift(2).unwrap(), vec![&b"ab"[..]]);
		assert_eq!(buf.shift(4).unwrap(), vec![&b"cde"[..], b"f"]);
		assert_eq!(buf.chunks().unwrap(), vec![&b"gh"[..], b"ijk"]);
	}

	#[test]
	fn one_push_per_shift() {
		init();
		let mut buf = sealed();
		for word in &["lorem", "ipsum", "dolor"] {
			buf.push(word.as_bytes().to_vec()).unwrap();
			assert_eq!(buf.len(), word.len() + 16);
			let n = buf.len();
			assert_eq!(buf.shift(n).unwrap(), vec![word.as_bytes()]);
			assert!(buf.is_empty());
		}
	}

	#[test]
	fn sealed_units_shift_one_at_a_time() {
		let mut buf = sealed();
		buf.push(&b"lorem "[..]).unwrap();
		buf.push(&b"ipsum"[..]).unwrap();

		assert_eq!(buf.shift(6 + 16).unwrap(), vec![&b"lorem "[..]]);
		assert_eq!(buf.shift(5 + 16).unwrap(), vec![&b"ipsum"[..]]);
		assert!(buf.is_empty());
	}

	#[test]
	fn failed_decode_consumes_nothing() {
		let mut buf = sealed();
		buf.push(&b"lorem "[..]).unwrap();
		buf.push(&b"ipsum"[..]).unwrap();
		let stored = buf.raw().to_vec();

		let n = buf.len();
		match buf.shift(n) {
			Err(Error::Cipher) => {},
			other => panic!("unexpected {:?}", other),
		}
		assert!(buf.chunks().is_err());
		assert_eq!(buf.raw().to_vec(), stored);

		// still in sync afterwards
		assert_eq!(buf.shift(6 + 16).unwrap(), vec![&b"lorem "[..]]);
	}

	#[test]
	fn chunks_does_not_advance() {
		let mut buf = sealed();
		buf.push(&b"lorem ipsum"[..]).unwrap();
		assert_eq!(buf.chunks().unwrap(), vec![&b"lorem ipsum"[..]]);
		assert_eq!(buf.chunks().unwrap(), vec![&b"lorem ipsum"[..]]);

		let n = buf.len();
		assert_eq!(buf.shift(n).unwrap(), vec![&b"lorem ipsum"[..]]);
		assert_eq!(buf.chunks().unwrap(), Vec::<Bytes>::new());
	}

	#[test]
	fn compression_spans_pushes() {
		let mut buf = EncodedBuffer::builder()
			.compression(Compression::fast())
			.chunks(vec![&b"lorem "[..], b"ipsum "])
			.build()
			.unwrap();
		buf.push(&b"dolor"[..]).unwrap();

		assert_eq!(buf.chunks().unwrap(), vec![&b"lorem ipsum dolor"[..]]);
		let n = buf.len();
		assert_eq!(buf.shift(n).unwrap(), vec![&b"lorem ipsum dolor"[..]]);
	}

	#[test]
	fn probes_see_stored_bytes() {
		let mut buf = EncodedBuffer::builder()
			.compression(Compression::default())
			.build()
			.unwrap();
		buf.push(&b"lorem"[..]).unwrap();

		// gzip magic, not the plaintext
		assert!(buf.starts_with(&[0x1f, 0x8b]));
		assert!(buf.starts_with_at(&[0x8b], 1, None));
		assert!(!buf.starts_with(b"lorem"));
		assert_eq!(buf.at(0), Some(0x1f));
		assert_eq!(buf.get(1), Some(0x8b));
	}

	#[test]
	fn zero_and_empty_shifts() {
		let mut buf = sealed();
		assert_eq!(buf.shift(10).unwrap(), Vec::<Bytes>::new());
		buf.push(&b"lorem"[..]).unwrap();
		assert_eq!(buf.shift(0).unwrap(), Vec::<Bytes>::new());
		assert_eq!(buf.len(), 5 + 16);
	}

	#[test]
	fn bad_config() {
		match EncodedBuffer::builder().cipher(CipherKind::Aes128Gcm, &KEY, &IV).build() {
			Err(Error::InvalidInput(_)) => {},
			other => panic!("unexpected {:?}", other),
		}
	}
}
