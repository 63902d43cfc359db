/*!
Virtual buffer over a queue of separately arrived byte chunks.

A streaming parser pushes chunks as they come, probes bytes anywhere in the
logical stream, checks prefixes across chunk boundaries, and finally consumes
bytes off the front, getting fully consumed chunks handed back. Nothing is copied
until the caller asks for contiguous bytes.

```
use vise::VirtualBuffer;

let mut buf = VirtualBuffer::new();
buf.push(&b"GET / HT"[..]);
buf.push(&b"TP/1.1\r\n"[..]);

assert!(buf.starts_with(b"GET "));
let eol = buf.find(b'\n', 0).unwrap();
let line = buf.shift(eol + 1);
assert_eq!(line, vec![&b"GET / HT"[..], b"TP/1.1\r\n"]);
assert!(buf.is_empty());
```

[`EncodedBuffer`] wraps the same machinery with an optional gzip and AEAD stage.
*/

mod chunk;
mod encoded;
mod error;
mod transform;
mod vise;

pub use crate::encoded::{EncodedBuffer, EncodedBufferBuilder};
pub use crate::error::{Error, Result};
pub use crate::transform::CipherKind;
pub use crate::vise::VirtualBuffer;
pub use bytes::Bytes;
pub use flate2::Compression;
