//! In-memory firmware image, padded to whole transfer blocks.
//!
//! The image is read once, padded with [`PAD_BYTE`] up to the next multiple
//! of [`BLOCK_SIZE`] and never modified afterwards. Padding bytes are sent
//! and checksummed like any other payload byte.

use {
    crate::{
        error::{Error, Result},
        protocol::xmodem::{BLOCK_SIZE, Block},
    },
    log::info,
    std::{fs::File, io::Read, path::Path},
};

/// Fill value for the tail of the last block.
pub const PAD_BYTE: u8 = 0xFF;

/// Immutable firmware image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    data: Vec<u8>,
    len: usize,
}

impl FirmwareImage {
    /// Build an image from raw bytes.
    ///
    /// Empty input is rejected.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let mut data = bytes.into();
        let len = data.len();
        if len == 0 {
            return Err(Error::Validation("empty firmware image".into()));
        }
        data.resize(padded_len(len), PAD_BYTE);
        Ok(Self { data, len })
    }

    /// Read the whole of `reader` into an image.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::new(data)
    }

    /// Load an image from a file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let image = Self::from_reader(file)?;
        info!(
            "Read {} byte firmware file ({} blocks)",
            image.len(),
            image.block_count()
        );
        Ok(image)
    }

    /// Logical size, without padding.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; empty images cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size after padding.
    pub fn padded_len(&self) -> usize {
        self.data
            .len()
    }

    /// Number of transfer blocks.
    pub fn block_count(&self) -> usize {
        self.data
            .len()
            / BLOCK_SIZE
    }

    /// Padded contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Blocks in order, numbered from 1 and wrapping at 256.
    pub fn blocks(&self) -> impl Iterator<Item = Block<'_>> {
        self.data
            .chunks_exact(BLOCK_SIZE)
            .enumerate()
            .filter_map(|(index, chunk)| {
                <&[u8; BLOCK_SIZE]>::try_from(chunk)
                    .ok()
                    .map(|payload| Block::at(index, payload))
            })
    }
}

/// Smallest multiple of the block size that holds `len` bytes.
pub fn padded_len(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_image_rejected() {
        let err = FirmwareImage::new(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_padding_rule() {
        for len in [1usize, 2, 127, 128, 129, 255, 256, 300, 1000, 32_768] {
            let image = FirmwareImage::new(vec![0x00; len]).unwrap();
            let padded = image.padded_len();
            assert_eq!(padded % BLOCK_SIZE, 0, "len {len}");
            assert!(padded >= len && padded - len < BLOCK_SIZE, "len {len}");
            assert!(
                image.as_bytes()[len..]
                    .iter()
                    .all(|&b| b == PAD_BYTE),
                "len {len}"
            );
            assert_eq!(image.len(), len);
        }
    }

    #[test]
    fn test_300_bytes_is_three_blocks() {
        let image = FirmwareImage::new(vec![0x42; 300]).unwrap();
        assert_eq!(image.padded_len(), 384);
        assert_eq!(image.block_count(), 3);
        assert_eq!(
            image
                .blocks()
                .count(),
            3
        );
    }

    #[test]
    fn test_block_sequence_wraps() {
        let image = FirmwareImage::new(vec![0x11; BLOCK_SIZE * 258]).unwrap();
        let seqs: Vec<u8> = image
            .blocks()
            .map(|b| b.seq())
            .collect();
        assert_eq!(seqs.len(), 258);
        assert_eq!(&seqs[..3], &[1, 2, 3]);
        assert_eq!(&seqs[253..], &[254, 255, 0, 1, 2]);
    }

    #[test]
    fn test_from_reader() {
        let image = FirmwareImage::from_reader(&b"firmware"[..]).unwrap();
        assert_eq!(image.len(), 8);
        assert_eq!(&image.as_bytes()[..8], b"firmware");
        assert!(FirmwareImage::from_reader(&b""[..]).is_err());
    }

    #[test]
    fn test_from_missing_file() {
        let err = FirmwareImage::from_file("/nonexistent/xbfwup/image.ebl").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
