//! Streaming digest computation.
//!
//! Any [`Read`] source can be hashed; the reader is drained in fixed-size
//! blocks until it reports end of stream. A read error aborts the computation
//! so no digest is ever produced from a partial stream.

use std::fmt;
use std::io::{self, ErrorKind, Read};

use base64::Engine;
use clap::ValueEnum;
use digest::DynDigest;

/// Bytes requested from the source per read.
pub const BLOCK_SIZE: usize = 4096;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HashKind {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashKind {
    fn hasher(self) -> Box<dyn DynDigest> {
        match self {
            HashKind::Md5 => Box::new(md5::Md5::default()),
            HashKind::Sha1 => Box::new(sha1::Sha1::default()),
            HashKind::Sha256 => Box::new(sha2::Sha256::default()),
            HashKind::Sha384 => Box::new(sha2::Sha384::default()),
            HashKind::Sha512 => Box::new(sha2::Sha512::default()),
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HashKind::Md5 => "MD5",
            HashKind::Sha1 => "SHA1",
            HashKind::Sha256 => "SHA256",
            HashKind::Sha384 => "SHA384",
            HashKind::Sha512 => "SHA512",
        };
        f.write_str(name)
    }
}

/// A finished digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub kind: HashKind,
    pub bytes: Vec<u8>,
    /// Number of bytes that were hashed.
    pub length: u64,
}

impl Digest {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Hashes everything `reader` yields.
pub fn compute<R: Read>(reader: &mut R, kind: HashKind) -> io::Result<Digest> {
    let mut hasher = kind.hasher();
    let mut buffer = [0u8; BLOCK_SIZE];
    let mut length = 0u64;
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..n]);
        length += n as u64;
    }

    Ok(Digest {
        kind,
        bytes: hasher.finalize().into_vec(),
        length,
    })
}
