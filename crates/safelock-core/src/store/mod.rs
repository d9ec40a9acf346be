//! Slotted secret store.
//!
//! A small, fixed set of named strings lives in a byte-addressable persistent
//! region. Each [`Slot`] owns a fixed offset, and every stored value is framed
//! as:
//!
//! ```text
//! ┌────────────┬───────────────────────┬────────────┐
//! │ marker (2) │ value (0..=61 bytes)  │ terminator │
//! └────────────┴───────────────────────┴────────────┘
//! ```
//!
//! The marker certifies that the bytes were deliberately written. Erased or
//! corrupt storage has no marker and reads back as the empty string, which is
//! exactly what an unset slot reads as. Nothing distinguishes "never written"
//! from "corrupted"; there is no per-slot checksum.
//!
//! # Durability
//!
//! [`SecretStore::write`] takes a [`Durability`]. Batched writes pass
//! [`Durability::Defer`] for all but the last, which passes
//! [`Durability::Commit`], so a batch costs one barrier on the medium.

mod memory;

pub use memory::MemoryEeprom;
use tracing::{debug, warn};

use crate::{error::StoreError, network::NetworkCredentials};

/// Prefix certifying a slot holds a deliberately written value.
pub const MARKER: [u8; 2] = [0xA5, 0x5A];

/// Byte ending a stored value.
pub const TERMINATOR: u8 = 0x00;

/// Bytes reserved per slot (marker, value and terminator).
pub const SLOT_SIZE: usize = 64;

/// Distance between consecutive slot offsets.
pub const SLOT_STRIDE: usize = 100;

/// Longest value a slot can hold.
pub const MAX_VALUE_LEN: usize = SLOT_SIZE - MARKER.len() - 1;

/// Size of the reserved persistent region.
pub const REGION_SIZE: usize = 1024;

/// Value of an erased byte on the medium.
pub const ERASED: u8 = 0xFF;

/// Device name used when none is stored.
pub const DEFAULT_DEVICE_NAME: &str = "safe";

/// Actuator pin used when none is stored.
pub const DEFAULT_ACTUATOR_PIN: &str = "5";

/// A named persistent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Administrative username (empty disables authentication)
    AdminUser,
    /// Administrative password
    AdminPassword,
    /// Name of the network to join
    NetworkName,
    /// Credential of the network to join
    NetworkCredential,
    /// Secret that unlocks the safe
    UnlockSecret,
    /// Name used for discovery and update channels
    DeviceName,
    /// Identifier of the pin driving the actuator
    ActuatorPin,
}

impl Slot {
    /// Every slot, in layout order.
    pub const ALL: [Slot; 7] = [
        Slot::AdminUser,
        Slot::AdminPassword,
        Slot::NetworkName,
        Slot::NetworkCredential,
        Slot::UnlockSecret,
        Slot::DeviceName,
        Slot::ActuatorPin,
    ];

    /// Fixed offset of the slot in the persistent region.
    pub const fn offset(self) -> usize {
        let index = match self {
            Slot::AdminUser => 0,
            Slot::AdminPassword => 1,
            Slot::NetworkName => 2,
            Slot::NetworkCredential => 3,
            Slot::UnlockSecret => 4,
            Slot::DeviceName => 5,
            Slot::ActuatorPin => 6,
        };
        index * SLOT_STRIDE
    }
}

/// Whether a write must reach durable storage before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Issue the durability barrier after writing
    Commit,
    /// Leave the write buffered until a later commit
    Defer,
}

/// Byte-addressable persistent medium (EEPROM, emulated flash page, file).
///
/// Writes may be buffered; only [`Eeprom::commit`] guarantees they survive
/// power loss.
pub trait Eeprom {
    /// Size of the region in bytes.
    fn size(&self) -> usize;

    /// Fill `buf` with the bytes starting at `offset`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Write `bytes` starting at `offset`.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError>;

    /// Make all previous writes durable.
    fn commit(&mut self) -> Result<(), StoreError>;
}

/// Check that `offset..offset + len` lies inside a region of `size` bytes.
pub(crate) fn check_range(offset: usize, len: usize, size: usize) -> Result<(), StoreError> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(StoreError::OutOfRange { offset, len, size }),
    }
}

/// Decode the raw bytes of one slot.
///
/// Returns the bytes after the marker up to the first terminator, or the
/// empty string when the marker is missing or the value is not UTF-8.
pub fn decode_slot(raw: &[u8]) -> String {
    let Some(body) = raw.strip_prefix(&MARKER) else {
        return String::new();
    };

    let end = body.iter().position(|&b| b == TERMINATOR).unwrap_or(body.len());
    String::from_utf8(body[..end].to_vec()).unwrap_or_default()
}

/// Encode a value into its framed slot representation.
pub fn encode_slot(slot: Slot, value: &str) -> Result<Vec<u8>, StoreError> {
    if value.len() > MAX_VALUE_LEN {
        return Err(StoreError::ValueTooLong { slot, len: value.len(), max: MAX_VALUE_LEN });
    }

    let mut framed = Vec::with_capacity(MARKER.len() + value.len() + 1);
    framed.extend_from_slice(&MARKER);
    framed.extend_from_slice(value.as_bytes());
    framed.push(TERMINATOR);
    Ok(framed)
}

/// Typed access to the slots of a persistent region.
#[derive(Debug, Clone)]
pub struct SecretStore<E> {
    eeprom: E,
}

impl<E: Eeprom> SecretStore<E> {
    /// Wrap a persistent medium.
    pub fn new(eeprom: E) -> Self {
        Self { eeprom }
    }

    /// Read one slot. Never fails: anything unreadable is unset.
    pub fn read(&self, slot: Slot) -> String {
        let mut raw = [ERASED; SLOT_SIZE];
        if let Err(err) = self.eeprom.read(slot.offset(), &mut raw) {
            warn!(?slot, %err, "slot unreadable, treating as unset");
            return String::new();
        }

        if !raw.starts_with(&MARKER) {
            debug!(?slot, "slot carries no marker, treating as unset");
        }
        decode_slot(&raw)
    }

    /// Write one slot.
    ///
    /// Oversized values are rejected before any byte reaches the medium.
    pub fn write(
        &mut self,
        slot: Slot,
        value: &str,
        durability: Durability,
    ) -> Result<(), StoreError> {
        let framed = encode_slot(slot, value)?;
        self.eeprom.write(slot.offset(), &framed)?;

        if durability == Durability::Commit {
            self.eeprom.commit()?;
        }
        debug!(?slot, ?durability, "slot written");
        Ok(())
    }

    /// Make every deferred write durable.
    pub fn commit(&mut self) -> Result<(), StoreError> {
        self.eeprom.commit()
    }

    /// Read every slot once.
    pub fn load(&self) -> Secrets {
        Secrets {
            admin_user: self.read(Slot::AdminUser),
            admin_password: self.read(Slot::AdminPassword),
            network_name: self.read(Slot::NetworkName),
            network_credential: self.read(Slot::NetworkCredential),
            unlock_secret: self.read(Slot::UnlockSecret),
            device_name: self.read(Slot::DeviceName),
            actuator_pin: self.read(Slot::ActuatorPin),
        }
    }

    /// Borrow the underlying medium.
    pub fn eeprom(&self) -> &E {
        &self.eeprom
    }

    /// Mutable access to the medium, for fault injection.
    pub fn eeprom_mut(&mut self) -> &mut E {
        &mut self.eeprom
    }

    /// Give the medium back, e.g. to boot again from it.
    pub fn into_inner(self) -> E {
        self.eeprom
    }
}

/// In-memory copy of every slot, loaded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secrets {
    /// Administrative username
    pub admin_user: String,
    /// Administrative password
    pub admin_password: String,
    /// Network to join
    pub network_name: String,
    /// Credential for that network
    pub network_credential: String,
    /// Unlock secret (empty when unlocked)
    pub unlock_secret: String,
    /// Stored device name, possibly empty
    pub device_name: String,
    /// Stored actuator pin, possibly empty
    pub actuator_pin: String,
}

impl Secrets {
    /// Device name with the default applied.
    pub fn device_name(&self) -> &str {
        if self.device_name.is_empty() { DEFAULT_DEVICE_NAME } else { self.device_name.as_str() }
    }

    /// Actuator pin with the default applied.
    pub fn actuator_pin(&self) -> &str {
        if self.actuator_pin.is_empty() { DEFAULT_ACTUATOR_PIN } else { self.actuator_pin.as_str() }
    }

    /// Whether requests must carry administrative credentials.
    pub fn requires_auth(&self) -> bool {
        !self.admin_user.is_empty()
    }

    /// Stored network to join, if a name is set.
    pub fn network(&self) -> Option<NetworkCredentials> {
        if self.network_name.is_empty() {
            return None;
        }
        Some(NetworkCredentials {
            name: self.network_name.clone(),
            credential: self.network_credential.clone(),
        })
    }

    /// Mutable access to the cached copy of a slot.
    pub fn slot_mut(&mut self, slot: Slot) -> &mut String {
        match slot {
            Slot::AdminUser => &mut self.admin_user,
            Slot::AdminPassword => &mut self.admin_password,
            Slot::NetworkName => &mut self.network_name,
            Slot::NetworkCredential => &mut self.network_credential,
            Slot::UnlockSecret => &mut self.unlock_secret,
            Slot::DeviceName => &mut self.device_name,
            Slot::ActuatorPin => &mut self.actuator_pin,
        }
    }
}
