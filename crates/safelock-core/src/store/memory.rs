use super::{ERASED, Eeprom, REGION_SIZE, check_range};
use crate::error::StoreError;

/// In-memory persistent region for testing and simulation.
///
/// Keeps two images: the working image every write lands in, and the durable
/// image that [`Eeprom::commit`] copies it to. [`MemoryEeprom::power_cycle`]
/// throws the working image away, which is how tests observe a write that
/// never reached its durability barrier.
///
/// # Performance
///
/// - write: O(len)
/// - commit: O(region size)
#[derive(Debug, Clone)]
pub struct MemoryEeprom {
    working: Vec<u8>,
    durable: Vec<u8>,
    writes: usize,
    commits: usize,
}

impl MemoryEeprom {
    /// Create an erased region of the default size.
    pub fn new() -> Self {
        Self::filled(ERASED)
    }

    /// Create a region with every byte set to `byte`.
    pub fn filled(byte: u8) -> Self {
        Self::from_bytes(vec![byte; REGION_SIZE])
    }

    /// Create a region from a raw image, treated as already durable.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { working: bytes.clone(), durable: bytes, writes: 0, commits: 0 }
    }

    /// Simulate power loss: uncommitted writes are lost.
    pub fn power_cycle(&self) -> Self {
        Self::from_bytes(self.durable.clone())
    }

    /// Bytes that would survive power loss.
    pub fn durable_bytes(&self) -> &[u8] {
        &self.durable
    }

    /// Number of write calls that reached the medium.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Number of durability barriers issued.
    pub fn commit_count(&self) -> usize {
        self.commits
    }
}

impl Default for MemoryEeprom {
    fn default() -> Self {
        Self::new()
    }
}

impl Eeprom for MemoryEeprom {
    fn size(&self) -> usize {
        self.working.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        check_range(offset, buf.len(), self.working.len())?;
        buf.copy_from_slice(&self.working[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        check_range(offset, bytes.len(), self.working.len())?;
        self.working[offset..offset + bytes.len()].copy_from_slice(bytes);
        self.writes += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.durable.clone_from(&self.working);
        self.commits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_region_is_erased() {
        let eeprom = MemoryEeprom::new();
        assert_eq!(eeprom.size(), REGION_SIZE);
        assert!(eeprom.durable_bytes().iter().all(|&b| b == ERASED));
    }

    #[test]
    fn uncommitted_write_lost_on_power_cycle() {
        let mut eeprom = MemoryEeprom::new();
        eeprom.write(10, b"abc").unwrap();

        let mut buf = [0u8; 3];
        eeprom.read(10, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");

        let rebooted = eeprom.power_cycle();
        rebooted.read(10, &mut buf).unwrap();
        assert_eq!(buf, [ERASED; 3]);
    }

    #[test]
    fn committed_write_survives_power_cycle() {
        let mut eeprom = MemoryEeprom::new();
        eeprom.write(10, b"abc").unwrap();
        eeprom.commit().unwrap();

        let rebooted = eeprom.power_cycle();
        let mut buf = [0u8; 3];
        rebooted.read(10, &mut buf).unwrap();
        assert_eq!(&buf, b"abc");
        assert_eq!(eeprom.commit_count(), 1);
    }

    #[test]
    fn out_of_range_access_rejected() {
        let mut eeprom = MemoryEeprom::new();
        let result = eeprom.write(REGION_SIZE - 1, b"ab");
        assert!(matches!(result, Err(StoreError::OutOfRange { .. })));
        assert_eq!(eeprom.write_count(), 0);

        let mut buf = [0u8; 4];
        assert!(eeprom.read(usize::MAX, &mut buf).is_err());
    }
}
