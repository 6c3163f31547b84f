//! Append-only ibd binary sidecar.
//!
//! The ibd file starts with the session's 16-byte UUID and is followed by a
//! concatenation of encoded numeric arrays in write order. [`IbdWriter`]
//! tracks the append offset and keeps a running SHA-1 over every byte
//! written, header included; the finished digest is embedded in the imzML
//! document so readers can verify the sidecar. Written byte ranges are never
//! touched again.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use sha1::{Digest, Sha1};
use uuid::Uuid;

use crate::codec::{self, Codec, CodecError, DataType};

/// Errors raised by ibd operations
#[derive(Debug, thiserror::Error)]
pub enum IbdError {
    /// Underlying file operation failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Array payload could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Where one encoded array lives in the ibd file.
///
/// Produced exactly once per physically written array; any number of
/// spectrum records may reference the same location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayLocation {
    /// Byte offset of the first encoded byte
    pub offset: u64,
    /// Number of array elements before encoding
    pub element_count: u64,
    /// Number of bytes the encoded payload occupies
    pub encoded_byte_length: u64,
}

/// Append-only writer over the ibd file
pub struct IbdWriter {
    file: File,
    offset: u64,
    sha1: Sha1,
}

impl IbdWriter {
    /// Create the ibd file and write the session UUID as its first 16 bytes
    pub fn create<P: AsRef<Path>>(path: P, uuid: &Uuid) -> Result<Self, IbdError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut writer = Self {
            file,
            offset: 0,
            sha1: Sha1::new(),
        };
        writer.append(uuid.as_bytes())?;
        Ok(writer)
    }

    /// Append bytes, returning the offset at which they begin.
    ///
    /// The running digest covers exactly the appended bytes in call order.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64, IbdError> {
        let at = self.offset;
        self.file.write_all(bytes)?;
        self.sha1.update(bytes);
        self.offset += bytes.len() as u64;
        Ok(at)
    }

    /// Current append offset (equals bytes written so far)
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read back a previously written byte range.
    ///
    /// Restores the file position to end-of-file so subsequent appends land
    /// where they must.
    pub fn read_back(&mut self, offset: u64, length: u64) -> Result<Vec<u8>, IbdError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut bytes = vec![0u8; length as usize];
        self.file.read_exact(&mut bytes)?;
        self.file.seek(SeekFrom::End(0))?;
        Ok(bytes)
    }

    /// Encode, compress and append one array; the raw write primitive used
    /// by every mode
    pub fn write_array(
        &mut self,
        values: &[f64],
        dtype: DataType,
        codec: Codec,
    ) -> Result<ArrayLocation, IbdError> {
        let payload = codec::encode_array(values, dtype, codec)?;
        let offset = self.append(&payload)?;
        Ok(ArrayLocation {
            offset,
            element_count: values.len() as u64,
            encoded_byte_length: payload.len() as u64,
        })
    }

    /// Read back and decode the array at `location`
    pub fn read_array(
        &mut self,
        location: &ArrayLocation,
        dtype: DataType,
        codec: Codec,
    ) -> Result<Vec<f64>, IbdError> {
        let bytes = self.read_back(location.offset, location.encoded_byte_length)?;
        Ok(codec::decode_array(&bytes, dtype, codec)?)
    }

    /// Flush, close and return the uppercase hex SHA-1 over everything
    /// written
    pub fn finish(mut self) -> Result<String, IbdError> {
        self.file.flush()?;
        let digest = self.sha1.finalize();
        Ok(digest.iter().map(|b| format!("{b:02X}")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, DataType};

    fn scratch_ibd() -> (tempfile::TempDir, IbdWriter, Uuid) {
        let dir = tempfile::tempdir().unwrap();
        let uuid = Uuid::new_v4();
        let writer = IbdWriter::create(dir.path().join("scratch.ibd"), &uuid).unwrap();
        (dir, writer, uuid)
    }

    #[test]
    fn uuid_header_occupies_the_first_sixteen_bytes() {
        let (_dir, mut writer, uuid) = scratch_ibd();
        assert_eq!(writer.offset(), 16);
        let header = writer.read_back(0, 16).unwrap();
        assert_eq!(header.as_slice(), uuid.as_bytes());
    }

    #[test]
    fn append_returns_strictly_increasing_offsets() {
        let (_dir, mut writer, _) = scratch_ibd();
        let first = writer.append(b"abc").unwrap();
        let second = writer.append(b"defgh").unwrap();
        assert_eq!(first, 16);
        assert_eq!(second, 19);
        assert_eq!(writer.offset(), 24);
    }

    #[test]
    fn read_back_does_not_disturb_the_append_position() {
        let (_dir, mut writer, _) = scratch_ibd();
        writer.append(b"first").unwrap();
        let echoed = writer.read_back(16, 5).unwrap();
        assert_eq!(echoed, b"first");
        let offset = writer.append(b"second").unwrap();
        assert_eq!(offset, 21);
        assert_eq!(writer.read_back(21, 6).unwrap(), b"second");
    }

    #[test]
    fn array_roundtrip_through_the_file() {
        let (_dir, mut writer, _) = scratch_ibd();
        let values = [100.5, 200.25, 300.0];
        let loc = writer
            .write_array(&values, DataType::F64, Codec::zlib())
            .unwrap();
        assert_eq!(loc.offset, 16);
        assert_eq!(loc.element_count, 3);
        let decoded = writer
            .read_array(&loc, DataType::F64, Codec::zlib())
            .unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn digest_covers_header_and_payload_in_order() {
        use sha1::{Digest, Sha1};

        let dir = tempfile::tempdir().unwrap();
        let uuid = Uuid::new_v4();
        let path = dir.path().join("digest.ibd");
        let mut writer = IbdWriter::create(&path, &uuid).unwrap();
        writer.append(b"payload bytes").unwrap();
        let reported = writer.finish().unwrap();

        let mut expected = Sha1::new();
        expected.update(std::fs::read(&path).unwrap());
        let expected: String = expected
            .finalize()
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect();
        assert_eq!(reported, expected);
    }
}
