use quick_error::quick_error;

quick_error! {
	#[derive(Debug)]
	pub enum Error {
		/// Caller-supplied input was rejected (e.g. a transform configuration
		/// with a key or nonce of the wrong size).
		InvalidInput(what: &'static str) {
			display("invalid input: {}", what)
		}
		/// Sealing or opening a cipher unit failed.
		/// Opening fails whenever the bytes being extracted were not sealed
		/// as exactly one unit with the expected sequence number.
		Cipher {
			display("cipher operation failed")
		}
		Compression(err: std::io::Error) {
			from()
			display("compression failed: {}", err)
			source(err)
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
