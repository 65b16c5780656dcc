//! Fixed-size message encoding.
//!
//! A mailbox only ever carries frames of one declared size. Message types
//! describe that size with [`Message::SIZE`] and spell out their layout with
//! the little-endian [`Writer`] and [`Reader`] cursors, so both ends of a
//! channel agree on the bytes without reinterpreting memory.

use crate::error::CodecError;

/// A record with a fixed wire size.
pub trait Message: Sized {
    /// Exact number of bytes of every encoded frame.
    const SIZE: usize;

    /// Writes the message. Bytes left unwritten stay zero.
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError>;

    /// Reads a message from a frame of exactly [`Self::SIZE`] bytes.
    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError>;
}

/// Encodes `message` into a zero-filled frame of `M::SIZE` bytes.
pub fn to_frame<M: Message>(message: &M) -> Result<Vec<u8>, CodecError> {
    let mut frame = vec![0u8; M::SIZE];
    let mut w = Writer::new(&mut frame);
    message.encode(&mut w)?;
    Ok(frame)
}

/// Decodes a frame, rejecting any length other than `M::SIZE`.
pub fn from_frame<M: Message>(frame: &[u8]) -> Result<M, CodecError> {
    if frame.len() != M::SIZE {
        return Err(CodecError::Length {
            expected: M::SIZE,
            actual: frame.len(),
        });
    }
    M::decode(&mut Reader::new(frame))
}

/// Write cursor over a frame buffer.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn reserve(&mut self, n: usize) -> Result<&mut [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                len: self.buf.len(),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&mut self.buf[start..start + n])
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Advances over `n` bytes, leaving them untouched.
    pub fn skip(&mut self, n: usize) -> Result<(), CodecError> {
        self.reserve(n).map(|_| ())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.put_bytes(&[value])
    }

    pub fn put_u16(&mut self, value: u16) -> Result<(), CodecError> {
        self.put_bytes(&value.to_le_bytes())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.put_bytes(&value.to_le_bytes())
    }

    pub fn put_i32(&mut self, value: i32) -> Result<(), CodecError> {
        self.put_bytes(&value.to_le_bytes())
    }

    pub fn put_i64(&mut self, value: i64) -> Result<(), CodecError> {
        self.put_bytes(&value.to_le_bytes())
    }
}

/// Read cursor over a received frame.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Borrows the next `n` bytes.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: n,
                len: self.buf.len(),
            });
        }
        let start = self.pos;
        self.pos += n;
        Ok(&self.buf[start..start + n])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        self.array().map(u32::from_le_bytes)
    }

    pub fn get_i32(&mut self) -> Result<i32, CodecError> {
        self.array().map(i32::from_le_bytes)
    }

    pub fn get_i64(&mut self) -> Result<i64, CodecError> {
        self.array().map(i64::from_le_bytes)
    }
}

/// Current envelope layout version.
pub const WIRE_VERSION: u8 = 1;

/// Bytes of envelope header preceding the user event.
pub const ENVELOPE_HEADER_LEN: usize = 2;

const FRAME_KILL: u8 = 0;
const FRAME_EVENT: u8 = 1;

/// Frame exchanged with an active object's mailbox.
///
/// Layout: `[version u8][frame kind u8][event: E::SIZE bytes]`. A kill frame
/// carries a zero-filled event area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<E> {
    Event(E),
    Kill,
}

impl<E> Envelope<E> {
    pub fn is_kill(&self) -> bool {
        matches!(self, Self::Kill)
    }
}

impl<E: Message> Message for Envelope<E> {
    const SIZE: usize = ENVELOPE_HEADER_LEN + E::SIZE;

    fn encode(&self, w: &mut Writer<'_>) -> Result<(), CodecError> {
        w.put_u8(WIRE_VERSION)?;
        match self {
            Self::Kill => {
                w.put_u8(FRAME_KILL)?;
                w.skip(E::SIZE)
            }
            Self::Event(event) => {
                w.put_u8(FRAME_EVENT)?;
                let start = w.position();
                event.encode(w)?;
                let written = w.position() - start;
                if written > E::SIZE {
                    return Err(CodecError::Length {
                        expected: E::SIZE,
                        actual: written,
                    });
                }
                w.skip(E::SIZE - written)
            }
        }
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let version = r.get_u8()?;
        if version != WIRE_VERSION {
            return Err(CodecError::UnknownVersion(version));
        }
        let frame = r.get_u8()?;
        let body = r.take(E::SIZE)?;
        match frame {
            FRAME_KILL => Ok(Self::Kill),
            FRAME_EVENT => E::decode(&mut Reader::new(body)).map(Self::Event),
            other => Err(CodecError::UnknownFrame(other)),
        }
    }
}
