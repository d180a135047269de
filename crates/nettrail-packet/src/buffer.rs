/// A byte buffer over a mutable or immutable byte slice.
///
/// Packet views borrow their backing storage and so may be created over an
/// inbound frame without copying, or over a scratch buffer when building an
/// outbound packet.
#[derive(Debug)]
pub enum Buffer<'a> {
    Immutable(&'a [u8]),
    Mutable(&'a mut [u8]),
}

impl Buffer<'_> {
    /// Access the buffer as an immutable slice of bytes.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Immutable(packet) => packet,
            Self::Mutable(packet) => packet,
        }
    }

    /// Access the buffer as a mutable slice of bytes.
    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Immutable(_) => panic!("write operation on a readonly buffer"),
            Self::Mutable(packet) => packet,
        }
    }

    /// Read the byte at a given offset.
    pub fn u8_at(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    /// Read the big-endian `u16` at a given offset.
    pub fn u16_at(&self, offset: usize) -> u16 {
        let bytes = &self.as_slice()[offset..offset + 2];
        u16::from_be_bytes([bytes[0], bytes[1]])
    }

    /// Write the byte at a given offset.
    pub fn set_u8(&mut self, offset: usize, val: u8) {
        self.as_slice_mut()[offset] = val;
    }

    /// Write a `u16` in big-endian order at a given offset.
    pub fn set_u16(&mut self, offset: usize, val: u16) {
        self.as_slice_mut()[offset..offset + 2].copy_from_slice(&val.to_be_bytes());
    }
}
