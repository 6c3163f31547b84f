//! Array codecs for the ibd binary sidecar.
//!
//! Every numeric array is first converted to its fixed-width little-endian
//! representation ([`DataType::encode`]) and then passed through a [`Codec`]
//! before it is appended to the ibd file. The codec set is closed: imzML only
//! defines "no compression" and "zlib compression" for external binary data.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Errors raised while encoding or decoding array payloads
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Underlying read or write failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The payload is not a whole number of elements
    #[error("encoded payload of {length} bytes is not a multiple of the {width}-byte element width")]
    MisalignedPayload {
        /// Decompressed payload length in bytes
        length: usize,
        /// Element width of the expected data type
        width: usize,
    },
}

/// Storage width for one array kind.
///
/// The variants mirror the binary data types the imzML controlled vocabulary
/// can describe. Values are carried as `f64` in the API and narrowed at
/// encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 32-bit IEEE float
    F32,
    /// 64-bit IEEE float
    F64,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
}

impl DataType {
    /// Size of one encoded element in bytes
    pub fn byte_width(self) -> usize {
        match self {
            DataType::F32 | DataType::I32 => 4,
            DataType::F64 | DataType::I64 => 8,
        }
    }

    /// The controlled-vocabulary name for this type ("32-bit float", ...)
    pub fn cv_name(self) -> &'static str {
        match self {
            DataType::F32 => "32-bit float",
            DataType::F64 => "64-bit float",
            DataType::I32 => "32-bit integer",
            DataType::I64 => "64-bit integer",
        }
    }

    /// Pass a value through this storage width and back.
    ///
    /// Deduplication compares candidate arrays against values decoded from
    /// disk, so candidates must be narrowed the same way the stored bytes
    /// were. Without this, an `f32` store would never dedup `f64` input.
    pub fn normalize(self, value: f64) -> f64 {
        match self {
            DataType::F64 => value,
            DataType::F32 => value as f32 as f64,
            DataType::I32 => value as i32 as f64,
            DataType::I64 => value as i64 as f64,
        }
    }

    /// Encode values as fixed-width little-endian bytes
    pub fn encode(self, values: &[f64]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(values.len() * self.byte_width());
        for &v in values {
            match self {
                DataType::F32 => out.write_f32::<LittleEndian>(v as f32)?,
                DataType::F64 => out.write_f64::<LittleEndian>(v)?,
                DataType::I32 => out.write_i32::<LittleEndian>(v as i32)?,
                DataType::I64 => out.write_i64::<LittleEndian>(v as i64)?,
            }
        }
        Ok(out)
    }

    /// Decode fixed-width little-endian bytes back to `f64` values
    pub fn decode(self, bytes: &[u8]) -> Result<Vec<f64>, CodecError> {
        let width = self.byte_width();
        if bytes.len() % width != 0 {
            return Err(CodecError::MisalignedPayload {
                length: bytes.len(),
                width,
            });
        }
        let mut reader = bytes;
        let mut out = Vec::with_capacity(bytes.len() / width);
        for _ in 0..bytes.len() / width {
            let v = match self {
                DataType::F32 => reader.read_f32::<LittleEndian>()? as f64,
                DataType::F64 => reader.read_f64::<LittleEndian>()?,
                DataType::I32 => reader.read_i32::<LittleEndian>()? as f64,
                DataType::I64 => reader.read_i64::<LittleEndian>()? as f64,
            };
            out.push(v);
        }
        Ok(out)
    }

    /// Parse a type label; accepts both the short form ("f64") and the
    /// controlled-vocabulary name ("64-bit float")
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "f32" | "32-bit float" => Some(DataType::F32),
            "f64" | "64-bit float" => Some(DataType::F64),
            "i32" | "32-bit integer" => Some(DataType::I32),
            "i64" | "64-bit integer" => Some(DataType::I64),
            _ => None,
        }
    }
}

/// Payload codec applied after fixed-width encoding.
///
/// `Zlib` can additionally round values to a fixed number of decimals before
/// encoding, trading precision for compressibility. Rounding happens before
/// any dedup comparison so that identical input keeps deduplicating after
/// the precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Store encoded bytes as-is
    None,
    /// Deflate the encoded bytes with zlib
    Zlib {
        /// Round values to this many decimals before encoding
        round_decimals: Option<i32>,
    },
}

impl Codec {
    /// Zlib without value rounding
    pub fn zlib() -> Self {
        Codec::Zlib {
            round_decimals: None,
        }
    }

    /// The controlled-vocabulary name for this codec
    pub fn cv_name(self) -> &'static str {
        match self {
            Codec::None => "no compression",
            Codec::Zlib { .. } => "zlib compression",
        }
    }

    /// Apply this codec's rounding policy
    pub fn round(self, values: &[f64]) -> Vec<f64> {
        match self {
            Codec::Zlib {
                round_decimals: Some(decimals),
            } => {
                let scale = 10f64.powi(decimals);
                values.iter().map(|v| (v * scale).round() / scale).collect()
            }
            _ => values.to_vec(),
        }
    }

    /// Compress an encoded payload
    pub fn compress(self, bytes: Vec<u8>) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::None => Ok(bytes),
            Codec::Zlib { .. } => {
                let mut encoder =
                    ZlibEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
                encoder.write_all(&bytes)?;
                Ok(encoder.finish()?)
            }
        }
    }

    /// Reverse [`Codec::compress`]
    pub fn decompress(self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::None => Ok(bytes.to_vec()),
            Codec::Zlib { .. } => {
                let mut out = Vec::new();
                ZlibDecoder::new(bytes).read_to_end(&mut out)?;
                Ok(out)
            }
        }
    }

    /// Parse a codec label; accepts "none"/"zlib" and the CV names
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "none" | "no compression" => Some(Codec::None),
            "zlib" | "zlib compression" => Some(Codec::zlib()),
            _ => None,
        }
    }
}

/// Encode then compress: the full value-to-payload path
pub fn encode_array(values: &[f64], dtype: DataType, codec: Codec) -> Result<Vec<u8>, CodecError> {
    codec.compress(dtype.encode(values)?)
}

/// Decompress then decode: reverse of [`encode_array`]
pub fn decode_array(bytes: &[u8], dtype: DataType, codec: Codec) -> Result<Vec<f64>, CodecError> {
    dtype.decode(&codec.decompress(bytes)?)
}
