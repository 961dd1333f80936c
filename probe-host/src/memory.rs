use crate::error::Error;

/// The size of the address space of all supported cores.
pub(crate) const ADDRESS_SPACE_END: u64 = 1 << 32;

/// An interface to be implemented for drivers that allow target memory access.
pub trait MemoryInterface {
    /// Read a 32bit word of at `address`.
    ///
    /// The address where the read should be performed at has to be a multiple of 4.
    /// Returns [`Error::MemoryNotAligned`] if this does not hold true.
    fn read_word_32(&mut self, address: u64) -> Result<u32, Error> {
        let mut word = 0;
        self.read_32(address, std::slice::from_mut(&mut word))?;
        Ok(word)
    }

    /// Read an 8bit word of at `address`.
    fn read_word_8(&mut self, address: u64) -> Result<u8, Error> {
        let mut word = 0;
        self.read_8(address, std::slice::from_mut(&mut word))?;
        Ok(word)
    }

    /// Read a block of 32bit words at `address` in the target's endianness.
    ///
    /// The number of words read is `data.len()`.
    /// The address where the read should be performed at has to be a multiple of 4.
    /// Returns [`Error::MemoryNotAligned`] if this does not hold true.
    fn read_32(&mut self, address: u64, data: &mut [u32]) -> Result<(), Error>;

    /// Read a block of 8bit words at `address`.
    fn read_8(&mut self, address: u64, data: &mut [u8]) -> Result<(), Error>;

    /// Write a 32bit word at `address`.
    ///
    /// The address where the write should be performed at has to be a multiple of 4.
    /// Returns [`Error::MemoryNotAligned`] if this does not hold true.
    fn write_word_32(&mut self, address: u64, data: u32) -> Result<(), Error> {
        self.write_32(address, std::slice::from_ref(&data))
    }

    /// Write an 8bit word at `address`.
    fn write_word_8(&mut self, address: u64, data: u8) -> Result<(), Error> {
        self.write_8(address, std::slice::from_ref(&data))
    }

    /// Write a block of 32bit words at `address`.
    ///
    /// The number of words written is `data.len()`.
    /// The address where the write should be performed at has to be a multiple of 4.
    /// Returns [`Error::MemoryNotAligned`] if this does not hold true.
    fn write_32(&mut self, address: u64, data: &[u32]) -> Result<(), Error>;

    /// Write a block of 8bit words at `address`.
    fn write_8(&mut self, address: u64, data: &[u8]) -> Result<(), Error>;
}

/// Checks that an access of `len` bytes starting at `address` stays inside the address space.
pub(crate) fn check_range(address: u64, len: usize) -> Result<(), Error> {
    match address.checked_add(len as u64) {
        Some(end) if end <= ADDRESS_SPACE_END => Ok(()),
        _ => Err(Error::OutOfBounds { address, len }),
    }
}

/// Checks that `address` is a multiple of `alignment`.
pub(crate) fn check_alignment(address: u64, alignment: usize) -> Result<(), Error> {
    if address % alignment as u64 == 0 {
        Ok(())
    } else {
        Err(Error::MemoryNotAligned { address, alignment })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn range_at_end_of_address_space() {
        assert!(check_range(0xffff_fffc, 4).is_ok());
        assert!(matches!(
            check_range(0xffff_fffd, 4),
            Err(Error::OutOfBounds { len: 4, .. })
        ));
        assert!(check_range(u64::MAX, 1).is_err());
    }

    #[test]
    fn alignment() {
        assert!(check_alignment(0x2000_0004, 4).is_ok());
        assert!(matches!(
            check_alignment(0x2000_0002, 4),
            Err(Error::MemoryNotAligned { alignment: 4, .. })
        ));
    }
}
