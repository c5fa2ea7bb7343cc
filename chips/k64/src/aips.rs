// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral bridge (AIPS-Lite) access control.
//!
//! The K64 has two peripheral bridges, each serving 128 slots of 4 KiB. Every
//! slot has a 4-bit field in one of the bridge's peripheral access control
//! registers (PACR). When the supervisor-protect bit of a slot is set, user
//! mode accesses to it terminate with a bus error.
//!
//! Each box owns a bitmap of the slots it was granted. On a box switch the
//! supervisor-protect bits are rewritten so that exactly the slots of the
//! incoming box are open to user mode.

use core::cell::Cell;

use vmpu::acl::AclPermissions;
use vmpu::boxes::BoxId;
use vmpu::platform::peripheral::PeripheralAcl;
use vmpu::utilities::registers::interfaces::{Readable, Writeable};
use vmpu::utilities::registers::{register_structs, ReadWrite};
use vmpu::utilities::StaticRef;
use vmpu::ErrorCode;

pub const AIPS0_BASE: usize = 0x4000_0000;
pub const AIPS1_BASE: usize = 0x4008_0000;

/// Address space covered by one PACR field.
pub const AIPS_SLOT_SIZE: usize = 0x1000;

/// Slots per bridge.
pub const AIPS_SLOTS: usize = 128;

/// Slots that may be granted. The last two slots of the second bridge are
/// never opened to boxes.
pub const AIPS_GRANTABLE_SLOTS: usize = 0xfe;

const PACR_PER_BRIDGE: usize = 16;
const SLOTS_PER_PACR: usize = 8;
const BITMAP_WORDS: usize = 2 * AIPS_SLOTS / 32;

/// Supervisor protect bit of a PACR field.
const PACR_SP: u32 = 0b0100;

register_structs! {
    pub AipsRegisters {
        /// Master Privilege Register A
        (0x00 => pub mpra: ReadWrite<u32>),
        (0x04 => _reserved0),
        /// Peripheral Access Control Registers A to D
        (0x20 => pub pacr_a_d: [ReadWrite<u32>; 4]),
        (0x30 => _reserved1),
        /// Peripheral Access Control Registers E to P
        (0x40 => pub pacr_e_p: [ReadWrite<u32>; 12]),
        (0x70 => @END),
    }
}

pub const AIPS0: StaticRef<AipsRegisters> =
    unsafe { StaticRef::new(AIPS0_BASE as *const AipsRegisters) };
pub const AIPS1: StaticRef<AipsRegisters> =
    unsafe { StaticRef::new(AIPS1_BASE as *const AipsRegisters) };

impl AipsRegisters {
    fn pacr(&self, index: usize) -> &ReadWrite<u32> {
        if index < self.pacr_a_d.len() {
            &self.pacr_a_d[index]
        } else {
            &self.pacr_e_p[index - self.pacr_a_d.len()]
        }
    }
}

/// Bridge slot serving `address`, counting across both bridges.
pub fn slot_of(address: usize) -> Option<usize> {
    let slot = address.checked_sub(AIPS0_BASE)? / AIPS_SLOT_SIZE;
    if slot < AIPS_GRANTABLE_SLOTS {
        Some(slot)
    } else {
        None
    }
}

/// Bit position of `slot`'s field within its PACR. Slot 0 of a register
/// lives in bits 31:28.
const fn pacr_shift(slot: usize) -> usize {
    28 - 4 * (slot % SLOTS_PER_PACR)
}

/// Slot bitmap of one box.
struct SlotSet {
    words: [Cell<u32>; BITMAP_WORDS],
}

impl SlotSet {
    const fn new() -> SlotSet {
        SlotSet {
            words: [const { Cell::new(0) }; BITMAP_WORDS],
        }
    }

    fn contains(&self, slot: usize) -> bool {
        self.words[slot / 32].get() & (1 << (slot % 32)) != 0
    }

    fn insert(&self, slot: usize) {
        let word = &self.words[slot / 32];
        word.set(word.get() | 1 << (slot % 32));
    }
}

struct BoxPeripherals {
    granted: SlotSet,
    writable: SlotSet,
}

/// Peripheral ACLs of `NUM_BOXES` boxes, enforced by the two bridges.
pub struct Aips<const NUM_BOXES: usize> {
    bridges: [StaticRef<AipsRegisters>; 2],
    boxes: [BoxPeripherals; NUM_BOXES],
}

impl<const NUM_BOXES: usize> Aips<NUM_BOXES> {
    pub const fn new(aips0: StaticRef<AipsRegisters>, aips1: StaticRef<AipsRegisters>) -> Self {
        Aips {
            bridges: [aips0, aips1],
            boxes: [const {
                BoxPeripherals {
                    granted: SlotSet::new(),
                    writable: SlotSet::new(),
                }
            }; NUM_BOXES],
        }
    }

    fn slots(start: usize, size: usize) -> Option<core::ops::RangeInclusive<usize>> {
        let last = start.checked_add(size.max(1) - 1)?;
        Some(slot_of(start)?..=slot_of(last)?)
    }

    /// Write the supervisor-protect bits of one bridge for `peripherals`.
    fn apply(&self, bridge: usize, peripherals: &BoxPeripherals) {
        let registers = &self.bridges[bridge];
        for index in 0..PACR_PER_BRIDGE {
            let pacr = registers.pacr(index);
            let mut value = pacr.get();
            for field in 0..SLOTS_PER_PACR {
                let slot = bridge * AIPS_SLOTS + index * SLOTS_PER_PACR + field;
                let sp = PACR_SP << pacr_shift(field);
                if slot < AIPS_GRANTABLE_SLOTS && peripherals.granted.contains(slot) {
                    value &= !sp;
                } else {
                    value |= sp;
                }
            }
            pacr.set(value);
        }
    }
}

impl<const NUM_BOXES: usize> PeripheralAcl for Aips<NUM_BOXES> {
    fn add_acl(
        &self,
        box_id: BoxId,
        start: usize,
        size: usize,
        permissions: AclPermissions,
    ) -> Result<(), ErrorCode> {
        let peripherals = self.boxes.get(box_id.index()).ok_or(ErrorCode::INVAL)?;
        if size == 0 {
            return Err(ErrorCode::SIZE);
        }
        let slots = Self::slots(start, size).ok_or(ErrorCode::INVAL)?;

        if !permissions.contains(AclPermissions::SHARED) {
            let taken = self.boxes.iter().enumerate().any(|(id, other)| {
                id != box_id.index() && slots.clone().any(|slot| other.granted.contains(slot))
            });
            if taken {
                return Err(ErrorCode::ALREADY);
            }
        }

        for slot in slots {
            peripherals.granted.insert(slot);
            if permissions.intersects(AclPermissions::UWRITE) {
                peripherals.writable.insert(slot);
            }
        }
        Ok(())
    }

    fn find_acl(&self, box_id: BoxId, address: usize, size: usize) -> AclPermissions {
        let (peripherals, slots) = match (self.boxes.get(box_id.index()), Self::slots(address, size)) {
            (Some(peripherals), Some(slots)) => (peripherals, slots),
            _ => return AclPermissions::empty(),
        };
        let mut permissions = AclPermissions::READ | AclPermissions::WRITE | AclPermissions::PERIPHERAL;
        for slot in slots {
            if !peripherals.granted.contains(slot) {
                return AclPermissions::empty();
            }
            if !peripherals.writable.contains(slot) {
                permissions.remove(AclPermissions::UWRITE);
            }
        }
        permissions
    }

    fn switch(&self, _src: BoxId, dst: BoxId) {
        if let Some(peripherals) = self.boxes.get(dst.index()) {
            self.apply(0, peripherals);
            self.apply(1, peripherals);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::boxed::Box;

    fn bridge_in_memory() -> StaticRef<AipsRegisters> {
        let memory = Box::into_raw(Box::new([0u32; 0x70 / 4]));
        unsafe { StaticRef::new(memory as *const AipsRegisters) }
    }

    fn aips() -> Aips<3> {
        Aips::new(bridge_in_memory(), bridge_in_memory())
    }

    // UART0 and SIM on the first bridge, the GPIO ports on the second.
    const UART0: usize = 0x4006_a000;
    const SIM: usize = 0x4004_7000;
    const GPIOB: usize = 0x400f_f040;

    #[test]
    fn slot_numbering() {
        assert_eq!(slot_of(AIPS0_BASE), Some(0));
        assert_eq!(slot_of(UART0), Some(0x6a));
        assert_eq!(slot_of(AIPS1_BASE), Some(128));
        assert_eq!(slot_of(0x400f_d000), Some(0xfd));
        assert_eq!(slot_of(GPIOB), None);
        assert_eq!(slot_of(0x3fff_fffc), None);
        assert_eq!(pacr_shift(0), 28);
        assert_eq!(pacr_shift(7), 0);
    }

    #[test]
    fn granted_peripheral_is_found() {
        let aips = aips();
        aips.add_acl(BoxId::new(1), UART0, 0x20, AclPermissions::PERIPH)
            .unwrap();

        let permissions = aips.find_acl(BoxId::new(1), UART0 + 4, 1);
        assert!(permissions.contains(AclPermissions::UREAD | AclPermissions::UWRITE));
        assert!(permissions.contains(AclPermissions::PERIPHERAL));
        assert!(aips.find_acl(BoxId::new(2), UART0 + 4, 1).is_empty());
        assert!(aips.find_acl(BoxId::new(1), SIM, 4).is_empty());
    }

    #[test]
    fn read_only_grant_drops_user_write() {
        let aips = aips();
        let read_only = AclPermissions::UREAD | AclPermissions::SREAD | AclPermissions::PERIPHERAL;
        aips.add_acl(BoxId::new(1), SIM, 0x1000, read_only).unwrap();
        let permissions = aips.find_acl(BoxId::new(1), SIM + 0x10, 4);
        assert!(permissions.contains(AclPermissions::UREAD));
        assert!(!permissions.contains(AclPermissions::UWRITE));
    }

    #[test]
    fn access_spanning_an_ungranted_slot_is_denied() {
        let aips = aips();
        aips.add_acl(BoxId::new(1), UART0, 0x1000, AclPermissions::PERIPH)
            .unwrap();
        assert!(aips.find_acl(BoxId::new(1), UART0 + 0xffe, 4).is_empty());
    }

    #[test]
    fn invalid_grants() {
        let aips = aips();
        assert_eq!(
            aips.add_acl(BoxId::new(3), UART0, 0x20, AclPermissions::PERIPH),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(
            aips.add_acl(BoxId::new(1), UART0, 0, AclPermissions::PERIPH),
            Err(ErrorCode::SIZE)
        );
        assert_eq!(
            aips.add_acl(BoxId::new(1), 0x2000_0000, 0x20, AclPermissions::PERIPH),
            Err(ErrorCode::INVAL)
        );
        assert_eq!(
            aips.add_acl(BoxId::new(1), 0x400f_d000, 0x2000, AclPermissions::PERIPH),
            Err(ErrorCode::INVAL)
        );
    }

    #[test]
    fn peripherals_are_not_shared_by_default() {
        let aips = aips();
        aips.add_acl(BoxId::new(1), UART0, 0x20, AclPermissions::PERIPH)
            .unwrap();
        assert_eq!(
            aips.add_acl(BoxId::new(2), UART0 + 0x10, 4, AclPermissions::PERIPH),
            Err(ErrorCode::ALREADY)
        );
        // The same box may list a peripheral twice.
        assert_eq!(
            aips.add_acl(BoxId::new(1), UART0, 0x20, AclPermissions::PERIPH),
            Ok(())
        );
        assert_eq!(
            aips.add_acl(
                BoxId::new(2),
                UART0,
                0x20,
                AclPermissions::PERIPH | AclPermissions::SHARED
            ),
            Ok(())
        );
        assert!(!aips.find_acl(BoxId::new(2), UART0, 4).is_empty());
    }

    #[test]
    fn switch_opens_only_the_destination_slots() {
        let aips = aips();
        aips.add_acl(BoxId::new(1), UART0, 0x20, AclPermissions::PERIPH)
            .unwrap();
        aips.add_acl(BoxId::new(2), AIPS1_BASE + 0x3000, 0x20, AclPermissions::PERIPH)
            .unwrap();

        aips.switch(BoxId::new(0), BoxId::new(1));
        // UART0 is slot 0x6a: PACR index 13 (PACRN), field 2.
        let pacrn = aips.bridges[0].pacr(13).get();
        assert_eq!(pacrn, 0x4404_4444);
        assert_eq!(aips.bridges[0].pacr(0).get(), 0x4444_4444);
        assert_eq!(aips.bridges[1].pacr(0).get(), 0x4444_4444);

        aips.switch(BoxId::new(1), BoxId::new(2));
        assert_eq!(aips.bridges[0].pacr(13).get(), 0x4444_4444);
        assert_eq!(aips.bridges[1].pacr(0).get(), 0x4440_4444);
    }

    #[test]
    fn switch_keeps_other_pacr_bits() {
        let aips = aips();
        aips.bridges[0].pacr_a_d[0].set(0x1111_1111);
        aips.add_acl(BoxId::new(0), AIPS0_BASE + 0x1000, 0x20, AclPermissions::PERIPH)
            .unwrap();
        aips.switch(BoxId::new(0), BoxId::new(0));
        assert_eq!(aips.bridges[0].pacr(0).get(), 0x5155_5555);
    }

    #[test]
    fn last_slots_stay_protected() {
        let aips = aips();
        aips.switch(BoxId::new(0), BoxId::new(0));
        assert_eq!(aips.bridges[1].pacr(15).get(), 0x4444_4444);
    }
}
