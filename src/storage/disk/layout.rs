//! Slotted heap-page layout: a used-slot bitmap header followed by
//! fixed-size record slots. Each occupied slot stores a little-endian u16
//! payload length followed by the payload bytes.

use byteorder::{ByteOrder, LittleEndian};

/// Bytes reserved at the front of every slot for the payload length.
pub const RECORD_LEN_PREFIX: usize = 2;

/// Slots that fit on one page: each slot costs `record_bytes` plus one
/// header bit.
pub fn slots_per_page(page_bytes: usize, record_bytes: usize) -> usize {
    (page_bytes * 8) / (record_bytes * 8 + 1)
}

/// Bytes occupied by the used-slot bitmap.
pub fn header_bytes(slots: usize) -> usize {
    slots.div_ceil(8)
}

/// Byte offset of a slot within the page.
pub fn slot_offset(slots: usize, record_bytes: usize, slot: usize) -> usize {
    header_bytes(slots) + slot * record_bytes
}

pub fn slot_used(data: &[u8], slot: usize) -> bool {
    data[slot / 8] & (1 << (slot % 8)) != 0
}

pub fn set_slot_used(data: &mut [u8], slot: usize, used: bool) {
    if used {
        data[slot / 8] |= 1 << (slot % 8);
    } else {
        data[slot / 8] &= !(1 << (slot % 8));
    }
}

/// First unused slot on the page, if any.
pub fn find_free_slot(data: &[u8], slots: usize) -> Option<usize> {
    (0..slots).find(|&slot| !slot_used(data, slot))
}

/// Store a payload into a slot. The caller has already verified that the
/// payload and its length prefix fit in `record_bytes`.
pub fn write_record(data: &mut [u8], slots: usize, record_bytes: usize, slot: usize, payload: &[u8]) {
    debug_assert!(payload.len() + RECORD_LEN_PREFIX <= record_bytes);
    let offset = slot_offset(slots, record_bytes, slot);
    LittleEndian::write_u16(&mut data[offset..offset + RECORD_LEN_PREFIX], payload.len() as u16);
    data[offset + RECORD_LEN_PREFIX..offset + RECORD_LEN_PREFIX + payload.len()]
        .copy_from_slice(payload);
}

/// Payload bytes stored in a slot.
pub fn read_record(data: &[u8], slots: usize, record_bytes: usize, slot: usize) -> &[u8] {
    let offset = slot_offset(slots, record_bytes, slot);
    let len = LittleEndian::read_u16(&data[offset..offset + RECORD_LEN_PREFIX]) as usize;
    &data[offset + RECORD_LEN_PREFIX..offset + RECORD_LEN_PREFIX + len]
}

/// Zero a slot's bytes after its bit is cleared, so stale payloads never
/// survive a delete.
pub fn clear_record(data: &mut [u8], slots: usize, record_bytes: usize, slot: usize) {
    let offset = slot_offset(slots, record_bytes, slot);
    data[offset..offset + record_bytes].fill(0);
}
