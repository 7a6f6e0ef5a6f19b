//! Attached device registry
//!
//! The registry is an arena of `N` slots. Each slot holds at most one device,
//! keyed by the host port it's attached to. A [`DeviceId`] names the slot and
//! the slot's generation at insertion time; once the device is removed, the
//! generation moves on and stale ids no longer resolve.
//!
//! The registry isn't synchronized. The adapter keeps it behind the same
//! critical section as the device buffers.

/// Identifies a USB host port
///
/// This is the transport's handle for a root port (for example, a full-speed
/// or high-speed OTG controller). One CDC device attaches per port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct HostId(pub u8);

/// A stable handle to an attached device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt-03", derive(defmt::Format))]
pub struct DeviceId {
    slot: u8,
    generation: u16,
}

impl DeviceId {
    /// Construct an id from its raw parts
    ///
    /// Useful for transports and tests that need a placeholder. The parts
    /// aren't checked; an id that matches a live slot and generation
    /// resolves to that device, whoever built it.
    pub const fn from_raw(slot: u8, generation: u16) -> Self {
        DeviceId { slot, generation }
    }

    /// Returns the registry slot
    pub fn slot(&self) -> usize {
        self.slot as usize
    }

    /// Returns the slot generation
    pub fn generation(&self) -> u16 {
        self.generation
    }
}

struct Slot<T> {
    generation: u16,
    entry: Option<(HostId, T)>,
}

/// Fixed-size arena of devices
pub struct Registry<T, const N: usize> {
    slots: [Slot<T>; N],
}

impl<T, const N: usize> Registry<T, N> {
    /// Slot indices must fit a [`DeviceId`]
    const FITS: () = assert!(N <= u8::MAX as usize + 1, "registry holds at most 256 slots");

    pub fn new() -> Self {
        let () = Self::FITS;
        Registry {
            slots: core::array::from_fn(|_| Slot {
                generation: 0,
                entry: None,
            }),
        }
    }

    /// Insert a device for `host`
    ///
    /// Hands `value` back if every slot is taken, or if `host` already has a device.
    pub fn insert(&mut self, host: HostId, value: T) -> Result<DeviceId, T> {
        if self.find(host).is_some() {
            return Err(value);
        }
        let Some((index, slot)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.entry.is_none())
        else {
            return Err(value);
        };
        slot.generation = slot.generation.wrapping_add(1);
        slot.entry = Some((host, value));
        Ok(DeviceId {
            slot: index as u8,
            generation: slot.generation,
        })
    }

    /// Find the device attached to `host`
    pub fn find(&self, host: HostId) -> Option<DeviceId> {
        self.slots
            .iter()
            .enumerate()
            .find_map(|(index, slot)| match &slot.entry {
                Some((h, _)) if *h == host => Some(DeviceId {
                    slot: index as u8,
                    generation: slot.generation,
                }),
                _ => None,
            })
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.slot())?;
        (slot.generation == id.generation)
            .then_some(slot.entry.as_mut())
            .flatten()
            .map(|(_, value)| value)
    }

    /// Remove and return the device named by `id`
    pub fn remove(&mut self, id: DeviceId) -> Option<T> {
        let slot = self.slots.get_mut(id.slot())?;
        if slot.generation != id.generation {
            return None;
        }
        slot.entry.take().map(|(_, value)| value)
    }
}

impl<T, const N: usize> Default for Registry<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{HostId, Registry};

    #[test]
    fn insert_until_full() {
        let mut registry: Registry<u32, 2> = Registry::new();
        let a = registry.insert(HostId(0), 10).unwrap();
        let b = registry.insert(HostId(1), 20).unwrap();
        assert_ne!(a, b);
        assert_eq!(registry.insert(HostId(2), 30), Err(30));

        assert_eq!(registry.get_mut(a), Some(&mut 10));
        assert_eq!(registry.get_mut(b), Some(&mut 20));
        assert_eq!(registry.find(HostId(1)), Some(b));
    }

    #[test]
    fn one_device_per_host() {
        let mut registry: Registry<u32, 4> = Registry::new();
        registry.insert(HostId(3), 1).unwrap();
        assert_eq!(registry.insert(HostId(3), 2), Err(2));
        let id = registry.find(HostId(3)).unwrap();
        assert_eq!(registry.get_mut(id), Some(&mut 1));
    }

    #[test]
    fn find_by_host() {
        let mut registry: Registry<u32, 4> = Registry::new();
        registry.insert(HostId(0), 1).unwrap();
        let id = registry.insert(HostId(7), 2).unwrap();
        assert_eq!(registry.find(HostId(7)), Some(id));
        assert_eq!(registry.find(HostId(5)), None);
    }

    #[test]
    fn stale_id_does_not_alias() {
        let mut registry: Registry<u32, 1> = Registry::new();
        let old = registry.insert(HostId(0), 1).unwrap();
        assert_eq!(registry.remove(old), Some(1));
        assert!(registry.get_mut(old).is_none());

        let new = registry.insert(HostId(0), 2).unwrap();
        assert_eq!(old.slot(), new.slot());
        assert_ne!(old.generation(), new.generation());
        assert!(registry.get_mut(old).is_none());
        assert!(registry.remove(old).is_none());
        assert_eq!(registry.get_mut(new), Some(&mut 2));
    }
}
