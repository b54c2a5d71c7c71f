//! Compression codecs shared by directories, metadata, and tile payloads.

use std::io::{Read as _, Write as _};

use crate::error::{S2PmtError, S2PmtResult};
use crate::header::Compression;

pub(crate) fn compress_all(compression: Compression, data: &[u8]) -> S2PmtResult<Vec<u8>> {
    match compression {
        Compression::Unknown => Err(S2PmtError::UnsupportedCompression(compression)),
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        Compression::Brotli => {
            let mut out = Vec::new();
            {
                let mut encoder = brotli::CompressorWriter::new(&mut out, 4096, 11, 24);
                encoder.write_all(data)?;
                encoder.flush()?;
            }
            Ok(out)
        }
        Compression::Zstd => Ok(zstd::encode_all(data, 0)?),
    }
}

pub(crate) fn decompress_all(compression: Compression, data: &[u8]) -> S2PmtResult<Vec<u8>> {
    match compression {
        Compression::Unknown => Err(S2PmtError::UnsupportedCompression(compression)),
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => {
            let mut out = Vec::with_capacity(data.len() * 2);
            flate2::read::GzDecoder::new(data).read_to_end(&mut out)?;
            Ok(out)
        }
        Compression::Brotli => {
            let mut out = Vec::with_capacity(data.len() * 2);
            brotli::Decompressor::new(data, 4096).read_to_end(&mut out)?;
            Ok(out)
        }
        Compression::Zstd => Ok(zstd::decode_all(data)?),
    }
}
