use std::cell::Cell;
use std::cmp::min;
use std::iter::FromIterator;

use bytes::Bytes;
use log::trace;
use memchr::memchr;
use slice_deque::SliceDeque;

use crate::chunk::Chunk;

/**
Logical byte stream stitched together from separately pushed chunks.

Pushed chunks are never copied: [`shift()`](#method.shift), [`chunks()`](#method.chunks)
and [`peek()`](#method.peek) hand out [`Bytes`] views into the very storage that was pushed.

## Example

```
use vise::VirtualBuffer;

let mut buf = VirtualBuffer::from_chunks(vec![&b"abcde"[..], b"fgh", b"ijk"]);
assert_eq!(buf.len(), 11);
assert_eq!(buf.at(5), Some(b'f'));
assert!(buf.starts_with(b"abcdef"));

assert_eq!(buf.shift(2), vec![&b"ab"[..]]);
assert_eq!(buf.shift(4), vec![&b"cde"[..], b"f"]);
assert_eq!(buf.to_vec(), b"ghijk");
```
*/
#[derive(Debug, Clone)]
pub struct VirtualBuffer {
	chunks: SliceDeque<Chunk>,
	// sum of chunk lengths minus `window`
	len: usize,
	// bytes at the start of chunks[0] that were already shifted out
	window: usize,
	// index of the chunk that resolved the most recent lookup;
	// only ever a place to start scanning from
	hint: Cell<Option<usize>>,
}

impl Default for VirtualBuffer {
	fn default() -> Self {
		VirtualBuffer::new()
	}
}

impl VirtualBuffer {
	pub fn new() -> Self {
		VirtualBuffer {
			chunks: SliceDeque::new(),
			len: 0,
			window: 0,
			hint: Cell::new(None),
		}
	}

	/// Seed the buffer with zero or more chunks, pushed in iteration order.
	pub fn from_chunks<I, B>(chunks: I) -> Self
	where
		I: IntoIterator<Item = B>,
		B: Into<Bytes>,
	{
		let mut buf = VirtualBuffer::new();
		buf.extend(chunks);
		buf
	}

	/// Number of bytes that can still be read or shifted.
	#[inline]
	pub fn len(&self) -> usize {
		self.len
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len == 0
	}

	/// Number of physical chunks currently retained.
	pub fn chunk_count(&self) -> usize {
		self.chunks.len()
	}

	/// Append a chunk to the end of the stream. Ownership moves into the buffer, no bytes are copied.
	pub fn push<B: Into<Bytes>>(&mut self, chunk: B) {
		let data = chunk.into();
		let offset = self.len + self.window;
		let index = self.chunks.len();
		trace!("push: {} bytes as chunk #{} at raw offset {}", data.len(), index, offset);

		self.len += data.len();
		self.chunks.push_back(Chunk::new(data, offset, index));
	}

	/*
	translate logical `pos` into (chunk index, offset within that chunk)

	   window
	   |-|
	  |abcde|fgh|ijk|
	     |  pos=4 → raw=6 → (1, 1)
	     |pos=0
	*/
	fn lookup(&self, pos: usize) -> Option<(usize, usize)> {
		if pos >= self.len {
			return None;
		}
		let raw = pos + self.window;

		// resume from the last hit unless the target lies behind it
		let start = match self.hint.get() {
			Some(i) if i < self.chunks.len() && self.chunks[i].offset <= raw => i,
			_ => 0,
		};

		for chunk in &self.chunks[start..] {
			if let Some(local) = chunk.local(raw) {
				self.hint.set(Some(chunk.index));
				return Some((chunk.index, local));
			}
		}
		None
	}

	/// Byte at logical position `pos`, or `None` past the end of the stream.
	pub fn at(&self, pos: usize) -> Option<u8> {
		self.lookup(pos)
			.map(|(i, local)| self.chunks[i].data[local])
	}

	/// Same as [`at()`](#method.at).
	#[inline]
	pub fn get(&self, pos: usize) -> Option<u8> {
		self.at(pos)
	}

	/**
	Consume `n` bytes from the front of the stream.

	Returns consumed bytes as they were laid out across chunks:
	every chunk that was fully consumed is dropped from the buffer and handed back,
	followed by the consumed head of the chunk the stream now starts in, if any.
	Asking for more than [`len()`](#method.len) bytes consumes everything.
	*/
	pub fn shift(&mut self, n: usize) -> Vec<Bytes> {
		if n == 0 {
			return Vec::new();
		}

		let prev = self.window;
		let (drop_to, window) = match self.lookup(n) {
			Some((index, local)) => (index, local),
			None => (self.chunks.len(), 0),
		};

		let mut out = Vec::with_capacity(drop_to + 1);
		for i in 0..drop_to {
			let chunk = match self.chunks.pop_front() {
				Some(chunk) => chunk,
				None => break,
			};
			if i == 0 && prev > 0 {
				// head of this one went out with an earlier shift
				out.push(chunk.data.slice(prev..));
			} else {
				out.push(chunk.data);
			}
		}

		self.window = window;
		if window > 0 {
			let from = if drop_to > 0 { 0 } else { prev };
			out.push(self.chunks[0].data.slice(from..window));
		}

		self.reindex();
		self.hint.set(None);
		trace!("shift: {} bytes, dropped {} chunks, window at {}", n, drop_to, self.window);
		out
	}

	// recompute offsets, indices and length of retained chunks, counting from zero
	fn reindex(&mut self) {
		let mut offset = 0;
		for (index, chunk) in self.chunks.iter_mut().enumerate() {
			chunk.offset = offset;
			chunk.index = index;
			offset += chunk.len;
		}
		self.len = offset - self.window;
	}

	/// Snapshot of the remaining content, one item per retained chunk.
	pub fn chunks(&self) -> Vec<Bytes> {
		self.chunks.iter()
			.enumerate()
			.map(|(i, chunk)| {
				if i == 0 && self.window > 0 {
					chunk.data.slice(self.window..)
				} else {
					chunk.data.clone()
				}
			})
			.collect()
	}

	/// Up to `n` bytes from the front of the stream, without consuming them.
	pub fn peek(&self, n: usize) -> Vec<Bytes> {
		let mut remaining = min(n, self.len);
		let mut skip = self.window;
		let mut out = Vec::new();
		for chunk in self.chunks.iter() {
			if remaining == 0 {
				break;
			}
			let take = min(chunk.len.saturating_sub(skip), remaining);
			if take > 0 {
				out.push(chunk.data.slice(skip..(skip + take)));
			}
			remaining -= take;
			skip = 0;
		}
		out
	}

	/// Copy the remaining content into one contiguous vector.
	pub fn to_vec(&self) -> Vec<u8> {
		let mut out = Vec::with_capacity(self.len);
		for chunk in self.chunks() {
			out.extend_from_slice(&chunk);
		}
		out
	}

	/// Whether the stream begins with `value`.
	pub fn starts_with(&self, value: &[u8]) -> bool {
		self.starts_with_at(value, 0, None)
	}

	/**
	Whether the stream, starting at `pos`, matches the first `length` bytes of `value`
	(all of `value` if `length` is `None`; `length` is capped at `value.len()`).

	Nothing is copied or consumed; comparison walks across chunk boundaries in place.
	A `pos` that falls outside of the stream never matches, not even an empty `value`.
	*/
	pub fn starts_with_at(&self, value: &[u8], pos: usize, length: Option<usize>) -> bool {
		let len = match length {
			Some(length) => min(length, value.len()),
			None => value.len(),
		};
		match pos.checked_add(len) {
			Some(end) if end <= self.len => {},
			_ => return false,
		}

		let (start, mut local) = match self.lookup(pos) {
			Some(found) => found,
			None => return false,
		};

		let mut i = 0;
		for chunk in &self.chunks[start..] {
			if i == len {
				break;
			}
			let take = min(chunk.len - local, len - i);
			if chunk.data[local..(local + take)] != value[i..(i + take)] {
				return false;
			}
			i += take;
			local = 0;
		}
		true
	}

	/// Logical position of the first `byte` at or after `from`.
	pub fn find(&self, byte: u8, from: usize) -> Option<usize> {
		let (start, mut local) = self.lookup(from)?;
		for chunk in &self.chunks[start..] {
			if let Some(n) = memchr(byte, &chunk.data[local..]) {
				self.hint.set(Some(chunk.index));
				return Some(chunk.offset + local + n - self.window);
			}
			local = 0;
		}
		None
	}

	/**
	Consume bytes up to and including the next `delim`, returning what preceded it.
	The delimiter itself is silently dropped.

	Returns `None` and leaves the buffer untouched if `delim` is nowhere in the stream.
	*/
	pub fn shift_until(&mut self, delim: u8) -> Option<Vec<Bytes>> {
		let at = self.find(delim, 0)?;
		let mut out = self.shift(at + 1);

		// empty chunks that preceded the next non-empty one were dropped too
		while out.last().map_or(false, |b| b.is_empty()) {
			out.pop();
		}
		if let Some(last) = out.last_mut() {
			last.truncate(last.len() - 1);
			if last.is_empty() {
				out.pop();
			}
		}
		Some(out)
	}
}

impl<B: Into<Bytes>> Extend<B> for VirtualBuffer {
	fn extend<I: IntoIterator<Item = B>>(&mut self, iter: I) {
		for chunk in iter {
			self.push(chunk);
		}
	}
}

impl<B: Into<Bytes>> FromIterator<B> for VirtualBuffer {
	fn from_iter<I: IntoIterator<Item = B>>(iter: I) -> Self {
		VirtualBuffer::from_chunks(iter)
	}
}


#[cfg(test)]
mod props {
	use super::*;
	use proptest::prelude::*;

	fn chunk_lists() -> impl Strategy<Value = Vec<Vec<u8>>> {
		prop::collection::vec(prop::collection::vec(any::<u8>(), 0..12), 0..8)
	}

	fn concat(chunks: &[Vec<u8>]) -> Vec<u8> {
		chunks.iter().flatten().copied().collect()
	}

	proptest! {
		#[test]
		fn prop_length_accounts_for_pushes_and_shifts(chunks in chunk_lists(), steps in prop::collection::vec(0usize..16, 0..8)) {
			let mut buf = VirtualBuffer::from_chunks(chunks.clone());
			let mut expected = concat(&chunks).len();
			prop_assert_eq!(buf.len(), expected);
			for n in steps {
				let shifted: usize = buf.shift(n).iter().map(|b| b.len()).sum();
				prop_assert_eq!(shifted, min(n, expected));
				expected -= shifted;
				prop_assert_eq!(buf.len(), expected);
			}
		}

		#[test]
		fn prop_at_matches_flat_content(chunks in chunk_lists(), skip in 0usize..24) {
			let mut buf = VirtualBuffer::from_chunks(chunks.clone());
			buf.shift(skip);
			let content = concat(&chunks);
			let content = &content[min(skip, content.len())..];
			for (i, &c) in content.iter().enumerate() {
				prop_assert_eq!(buf.at(i), Some(c));
			}
			prop_assert_eq!(buf.at(content.len()), None);
		}

		#[test]
		fn prop_shifts_reconstruct_content(chunks in chunk_lists(), steps in prop::collection::vec(1usize..10, 0..12)) {
			let mut buf = VirtualBuffer::from_chunks(chunks.clone());
			let mut out = Vec::new();
			for n in steps {
				for b in buf.shift(n) {
					out.extend_from_slice(&b);
				}
			}
			let len = buf.len();
			for b in buf.shift(len) {
				out.extend_from_slice(&b);
			}
			prop_assert_eq!(out, concat(&chunks));
			prop_assert!(buf.is_empty());
		}

		#[test]
		fn prop_chunks_is_read_only(chunks in chunk_lists(), skip in 0usize..24) {
			let mut buf = VirtualBuffer::from_chunks(chunks.clone());
			buf.shift(skip);
			let first = buf.chunks();
			let second = buf.chunks();
			prop_assert_eq!(&first, &second);
			let content = concat(&chunks);
			let flat: Vec<u8> = first.iter().flat_map(|b| b.iter().copied()).collect();
			prop_assert_eq!(&flat[..], &content[min(skip, content.len())..]);
		}

		#[test]
		fn prop_starts_with_agrees_with_at(chunks in chunk_lists(), value in prop::collection::vec(0u8..4, 0..6), pos in 0usize..20) {
			let buf = VirtualBuffer::from_chunks(chunks);
			let expected = pos < buf.len()
				&& pos + value.len() <= buf.len()
				&& value.iter().enumerate().all(|(i, &v)| buf.at(pos + i) == Some(v));
			prop_assert_eq!(buf.starts_with_at(&value, pos, None), expected);
		}
	}
}
