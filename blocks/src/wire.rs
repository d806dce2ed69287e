//! Low-level byte reader for fixed-layout wire structures.

use crate::BlockError;
use almond_types::{Account, Amount, BlockHash, Signature};

/// A cursor over a byte slice. Every read is bounds-checked; running off the
/// end yields [`BlockError::Truncated`].
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn take(&mut self, count: usize) -> Result<&'a [u8], BlockError> {
        if self.remaining() < count {
            return Err(BlockError::Truncated);
        }
        let slice = &self.data[self.offset..self.offset + count];
        self.offset += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, BlockError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, BlockError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u64_le(&mut self) -> Result<u64, BlockError> {
        let bytes = self.take(8)?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
    }

    pub fn read_hash(&mut self) -> Result<BlockHash, BlockError> {
        let bytes = self.take(32)?;
        Ok(BlockHash::new(bytes.try_into().expect("32 bytes")))
    }

    pub fn read_account(&mut self) -> Result<Account, BlockError> {
        let bytes = self.take(32)?;
        Ok(Account::new(bytes.try_into().expect("32 bytes")))
    }

    pub fn read_amount_be(&mut self) -> Result<Amount, BlockError> {
        let bytes = self.take(16)?;
        Ok(Amount::from_be_bytes(bytes.try_into().expect("16 bytes")))
    }

    pub fn read_signature(&mut self) -> Result<Signature, BlockError> {
        let bytes = self.take(64)?;
        Ok(Signature(bytes.try_into().expect("64 bytes")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_in_order() {
        let mut data = Vec::new();
        data.push(0x07);
        data.extend_from_slice(&0x1234u16.to_le_bytes());
        data.extend_from_slice(&0xDEADBEEFu64.to_le_bytes());
        let mut reader = ByteReader::new(&data);
        assert_eq!(reader.read_u8().unwrap(), 0x07);
        assert_eq!(reader.read_u16_le().unwrap(), 0x1234);
        assert_eq!(reader.read_u64_le().unwrap(), 0xDEADBEEF);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn truncated_read_errors() {
        let data = [0u8; 3];
        let mut reader = ByteReader::new(&data);
        assert!(matches!(reader.read_u64_le(), Err(BlockError::Truncated)));
    }
}
