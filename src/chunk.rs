use bytes::Bytes;

/// One physically distinct piece of the virtual buffer.
#[derive(Debug, Clone)]
pub(crate) struct Chunk {
	pub(crate) data: Bytes,
	// cached `data.len()`
	pub(crate) len: usize,
	// start of this chunk counted from the start of the first retained chunk,
	// ignoring the window offset
	pub(crate) offset: usize,
	// position within the retained sequence
	pub(crate) index: usize,
}
impl Chunk {
	pub(crate) fn new(data: Bytes, offset: usize, index: usize) -> Self {
		Chunk {
			len: data.len(),
			data,
			offset, index,
		}
	}

	/// Local offset of raw position `raw` if this chunk owns it.
	#[inline]
	pub(crate) fn local(&self, raw: usize) -> Option<usize> {
		if raw < self.offset {
			return None;
		}
		let local = raw - self.offset;
		if local < self.len { Some(local) } else { None }
	}
}
