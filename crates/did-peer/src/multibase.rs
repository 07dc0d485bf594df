//! The tiny slice of [multibase] that did:peer needs: base58-btc, and the
//! SHA-256 content hash used to shorten did:peer:2 into did:peer:3.
//!
//! [multibase]: https://datatracker.ietf.org/doc/html/draft-multiformats-multibase

use sha2::{Digest, Sha256};

/// The multibase prefix character for base58-btc.
pub const BASE58_BTC: char = 'z';

/// Length of a SHA-256 digest.
pub const DIGEST_LEN: usize = 32;

/// Encodes `bytes` as multibase base58-btc, i.e. `z` followed by base58.
pub fn encode_base58btc(bytes: &[u8]) -> String {
	let encoded = bs58::encode(bytes)
		.with_alphabet(bs58::Alphabet::BITCOIN)
		.into_string();
	format!("{BASE58_BTC}{encoded}")
}

/// Hashes `bytes` with SHA-256 and multibase-encodes the digest as base58-btc.
pub fn encode_content_hash(bytes: &[u8]) -> String {
	encode_base58btc(&Sha256::digest(bytes))
}

/// Decodes a multibase base58-btc string into `out_buf`, clearing it first.
pub fn decode_base58btc(
	multibase: &str,
	out_buf: &mut Vec<u8>,
) -> Result<(), MultibaseDecodeError> {
	out_buf.clear();
	let Some(&base) = multibase.as_bytes().first() else {
		return Err(MultibaseDecodeError::Empty);
	};
	if base != BASE58_BTC as u8 {
		return Err(MultibaseDecodeError::WrongBase(base));
	}
	bs58::decode(&multibase[1..])
		.with_alphabet(bs58::Alphabet::BITCOIN)
		.onto(out_buf)?;
	Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum MultibaseDecodeError {
	#[error("multibase string was empty")]
	Empty,
	#[error(
		"Expected \"base58-btc\" encoding which should be identified in multibase as ascii 'z' (0x7a) but got {0:x}"
	)]
	WrongBase(u8),
	#[error("expected a {DIGEST_LEN} byte digest but got {0} bytes")]
	WrongLength(usize),
	#[error(transparent)]
	Bs58(#[from] bs58::decode::Error),
}

#[cfg(test)]
mod test {
	use super::*;

	use eyre::WrapErr;
	use hex_literal::hex;

	#[derive(Debug)]
	struct Example {
		decoded: &'static [u8],
		encoded: &'static str,
	}

	// from: https://datatracker.ietf.org/doc/html/draft-msporny-base58-03#section-5
	const EXAMPLES: &[Example] = &[
		Example {
			decoded: b"Hello World!",
			encoded: "2NEpo7TZRRrLZSi2U",
		},
		Example {
			decoded: b"The quick brown fox jumps over the lazy dog.",
			encoded: "USm3fpXnKG5EUBx2ndxBDMPVciP5hGey2Jh4NDv6gmeo1LkMeiKrLJUUBk6Z",
		},
		Example {
			decoded: &hex!("0000287fb4cd"),
			encoded: "11233QC4",
		},
	];

	#[test]
	fn test_decode_base58btc() -> eyre::Result<()> {
		let mut buf = Vec::new();
		for e in EXAMPLES {
			let Example { decoded, encoded } = e;
			decode_base58btc(&format!("z{encoded}"), &mut buf)
				.wrap_err_with(|| format!("Failed to decode example {e:?}"))?;
			assert_eq!(buf, *decoded, "failed comparison in example {e:?}");
		}
		Ok(())
	}

	#[test]
	fn test_encode_base58btc() {
		for e in EXAMPLES {
			let Example { decoded, encoded } = e;
			assert_eq!(
				encode_base58btc(decoded),
				format!("z{encoded}"),
				"failed comparison in example {e:?}"
			);
		}
	}

	#[test]
	fn test_decode_rejects_other_bases() {
		let mut buf = Vec::new();
		assert!(matches!(
			decode_base58btc("f00ff", &mut buf),
			Err(MultibaseDecodeError::WrongBase(b'f'))
		));
		assert!(matches!(
			decode_base58btc("", &mut buf),
			Err(MultibaseDecodeError::Empty)
		));
		assert!(matches!(
			decode_base58btc("z0OIl", &mut buf),
			Err(MultibaseDecodeError::Bs58(_))
		));
	}

	#[test]
	fn test_content_hash() -> eyre::Result<()> {
		// sha256("abc"), FIPS 180-2 appendix B.1
		let expected =
			hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
		let encoded = encode_content_hash(b"abc");
		let mut buf = Vec::new();
		decode_base58btc(&encoded, &mut buf)?;
		assert_eq!(buf, expected);
		assert_eq!(buf.len(), DIGEST_LEN);
		Ok(())
	}
}
