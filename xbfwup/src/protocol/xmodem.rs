//! XMODEM-CRC sender for the radio bootloader.
//!
//! ## Protocol Overview
//!
//! The bootloader receives 128-byte blocks with a CRC16 trailer:
//!
//! ```text
//! Block format:
//! +-----+-----+------+--------------+--------+
//! | SOH | SEQ | ~SEQ |  DATA (128)  | CRC16  |
//! +-----+-----+------+--------------+--------+
//! | 1   | 1   | 1    |     128      | 2 (BE) |
//! +-----+-----+------+--------------+--------+
//! ```
//!
//! Sequence numbers start at 1 and wrap from 255 to 0. Every block must be
//! answered with ACK; anything else aborts the transfer, there is no
//! block-level retry. After the last block the sender writes EOT and expects
//! a reply starting with ACK.

use {
    crate::{
        connection::SerialChannel,
        error::{Error, Result},
        image::FirmwareImage,
        port::Port,
        protocol::crc::crc16_xmodem,
    },
    byteorder::{BigEndian, WriteBytesExt},
    log::{debug, trace},
};

/// XMODEM control characters.
pub mod control {
    /// Start of Header (128-byte block).
    pub const SOH: u8 = 0x01;
    /// End of Transmission.
    pub const EOT: u8 = 0x04;
    /// Acknowledge.
    pub const ACK: u8 = 0x06;
    /// Not Acknowledge.
    pub const NAK: u8 = 0x15;
    /// CRC mode request character.
    pub const C: u8 = b'C';
}

/// Payload bytes per block.
pub const BLOCK_SIZE: usize = 128;

/// Bytes on the wire per block: header, payload and checksum.
pub const FRAME_LEN: usize = 3 + BLOCK_SIZE + 2;

/// Largest reply read during negotiation and confirmation.
const REPLY_MAX: usize = 128;

/// One block of the firmware image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    seq: u8,
    payload: &'a [u8; BLOCK_SIZE],
}

impl<'a> Block<'a> {
    /// Block with wire sequence number `seq`.
    pub fn new(seq: u8, payload: &'a [u8; BLOCK_SIZE]) -> Self {
        Self { seq, payload }
    }

    /// Block at 0-based `index` within an image; numbering starts at 1 and
    /// wraps modulo 256.
    #[allow(clippy::cast_possible_truncation)]
    pub fn at(index: usize, payload: &'a [u8; BLOCK_SIZE]) -> Self {
        Self::new((index + 1) as u8, payload)
    }

    /// Sequence number.
    pub fn seq(&self) -> u8 {
        self.seq
    }

    /// One's complement of the sequence number (`255 - seq`).
    pub fn seq_complement(&self) -> u8 {
        !self.seq
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8; BLOCK_SIZE] {
        self.payload
    }

    /// Checksum over the payload.
    pub fn checksum(&self) -> u16 {
        crc16_xmodem(self.payload)
    }

    /// Encode the block for the wire.
    #[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(FRAME_LEN);
        frame.push(control::SOH);
        frame.push(self.seq);
        frame.push(self.seq_complement());
        frame.extend_from_slice(self.payload);
        frame
            .write_u16::<BigEndian>(self.checksum())
            .unwrap();
        frame
    }
}

/// XMODEM sender bound to a channel in the blocking read regime.
pub struct XmodemSender<'a, P: Port> {
    channel: &'a mut SerialChannel<P>,
}

impl<'a, P: Port> XmodemSender<'a, P> {
    /// Create a sender over `channel`.
    pub fn new(channel: &'a mut SerialChannel<P>) -> Self {
        Self { channel }
    }

    /// Pick a transfer from the bootloader menu and check the receiver
    /// asked for XMODEM-CRC.
    ///
    /// The reply (e.g. `"\r\nbegin upload\r\nC"`) must end with `C`.
    pub fn negotiate(&mut self, selector: u8) -> Result<()> {
        self.channel
            .write_all(&[selector])?;
        let reply = self
            .channel
            .read_framed(REPLY_MAX)?;
        match reply.last() {
            Some(&control::C) => {
                debug!("Receiver requested CRC mode");
                Ok(())
            },
            Some(&other) => Err(Error::Protocol(format!(
                "unsupported transfer type 0x{other:02X}"
            ))),
            None => Err(Error::Protocol("failed to read programming go-ahead".into())),
        }
    }

    /// Send one block and wait for its ACK.
    ///
    /// `number` is the 1-based position of the block in the image, used
    /// for error reporting.
    pub fn send_block(&mut self, number: usize, block: &Block<'_>) -> Result<()> {
        trace!(
            "Block {number} (seq {}), crc 0x{:04X}",
            block.seq(),
            block.checksum()
        );
        self.channel
            .write_all(&block.encode())?;

        let reply = match self
            .channel
            .read_byte()
        {
            Ok(reply) => reply,
            Err(Error::Timeout(_)) => None,
            Err(e) => return Err(e),
        };
        match reply {
            Some(control::ACK) => Ok(()),
            reply => Err(Error::BlockRejected {
                block: number,
                reply,
            }),
        }
    }

    /// Send EOT and wait for the programming confirmation.
    pub fn finish(&mut self) -> Result<()> {
        debug!("Sending EOT");
        self.channel
            .write_all(&[control::EOT])?;

        let reply = match self
            .channel
            .read_framed(REPLY_MAX)
        {
            Ok(reply) => reply,
            Err(Error::Timeout(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        if reply.first() == Some(&control::ACK) {
            debug!("EOT acknowledged");
            Ok(())
        } else {
            Err(Error::Protocol(
                "failed to read programming confirmation".into(),
            ))
        }
    }

    /// Send every block of `image` in order. EOT is left to [`Self::finish`].
    ///
    /// `progress` is called with (blocks acknowledged, total blocks) after
    /// every block.
    pub fn send_blocks<F>(&mut self, image: &FirmwareImage, mut progress: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        let total = image.block_count();
        debug!(
            "Starting XMODEM transfer: {} bytes in {total} blocks",
            image.len()
        );

        for (index, block) in image
            .blocks()
            .enumerate()
        {
            self.send_block(index + 1, &block)?;
            progress(index + 1, total);
        }
        Ok(())
    }
}
