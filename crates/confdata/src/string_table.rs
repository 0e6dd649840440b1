//! Interned string pool laid out in a single relocatable byte region.
//!
//! The region holds a 20-byte header, an open-addressed hash-slot array and
//! a packed arena of NUL-terminated strings, in that order. A *symbol* is
//! the byte offset of a string within the arena, so resolving a symbol is a
//! single offset addition with no side table. Symbol 0 is reserved for the
//! empty string, which also lets slot value 0 mean "empty slot".
//!
//! The caller owns the region and is responsible for resizing it: when
//! [`to_symbol`] reports the table full, enlarge the allocation, call
//! [`grow`], and retry. Everything the table needs lives inside the region,
//! so the bytes can be moved or copied freely.
//!
//! Slots are stored as 16-bit values while the table is small enough for
//! every symbol to fit one, halving index memory for the common case; past
//! the 64 KiB boundary the layout switches to 32-bit slots.

use crate::hash::lua_hash;

/// Target ratio of hash slots to interned strings.
const HASH_FACTOR: f32 = 2.0;

// Header fields, u32 little-endian each.
const TOTAL_BYTES: usize = 0;
const COUNT: usize = 4;
const NARROW_SLOTS: usize = 8;
const NUM_SLOTS: usize = 12;
const STRING_BYTES: usize = 16;

/// Size of the table header in bytes.
pub(crate) const HEADER_SIZE: usize = 20;

/// Smallest region a table can be laid out in: the header, one slot, and
/// room for a short string.
pub const MIN_BYTES: usize = HEADER_SIZE + 4 + 4;

/// Lay out an empty table across the whole of `table`.
///
/// `average_strlen` is the expected average length of the strings that will
/// be interned; it only tunes the slot-count heuristic.
///
/// # Panics
///
/// Panics if the region is smaller than [`MIN_BYTES`].
pub fn init(table: &mut [u8], average_strlen: usize) {
    assert!(table.len() >= MIN_BYTES);
    let total = table.len();

    let bytes_per_string = average_strlen as f32 + 1.0 + 2.0 * HASH_FACTOR;
    let num_strings = (total - HEADER_SIZE) as f32 / bytes_per_string;
    let num_slots = ((num_strings * HASH_FACTOR) as usize).max(1);
    let narrow = string_capacity_32(total, num_slots) <= 64 * 1024;
    let num_slots = clamp_slots(total, num_slots, narrow, 1);

    write_u32(table, TOTAL_BYTES, total as u32);
    write_u32(table, COUNT, 0);
    write_u32(table, NARROW_SLOTS, u32::from(narrow));
    write_u32(table, NUM_SLOTS, num_slots as u32);
    write_u32(table, STRING_BYTES, 1);

    let arena = arena_offset(num_slots, narrow);
    table[HEADER_SIZE..arena].fill(0);
    // The empty string lives at arena offset 0.
    table[arena] = 0;
}

/// Re-lay-out a table after its region has been enlarged.
///
/// The caller grows the allocation first; `grow` recomputes the slot layout
/// for the new size, moves the string arena into place and rebuilds the
/// hash index by walking the arena.
///
/// Symbols are arena offsets and the arena contents are moved verbatim, so
/// every previously issued symbol stays valid.
///
/// # Panics
///
/// Panics if the region shrank below the table's current size.
pub fn grow(table: &mut [u8]) {
    let old_total = read_u32(table, TOTAL_BYTES) as usize;
    let total = table.len();
    assert!(total >= old_total);

    let count = read_u32(table, COUNT) as usize;
    let old_slots = read_u32(table, NUM_SLOTS) as usize;
    let old_narrow = read_u32(table, NARROW_SLOTS) != 0;
    let string_bytes = read_u32(table, STRING_BYTES) as usize;

    let average_strlen = if count > 0 {
        string_bytes as f32 / count as f32
    } else {
        15.0
    };
    let bytes_per_string = average_strlen + 1.0 + 2.0 * HASH_FACTOR;
    let num_strings = (total - HEADER_SIZE) as f32 / bytes_per_string;
    let num_slots = ((num_strings * HASH_FACTOR) as usize).max(old_slots);
    // An arena past the 16-bit bound can never go back to narrow slots.
    let narrow = string_capacity_32(total, num_slots) <= 64 * 1024 && string_bytes <= 64 * 1024;
    let num_slots = clamp_slots(total, num_slots, narrow, old_slots);

    let old_arena = arena_offset(old_slots, old_narrow);
    let new_arena = arena_offset(num_slots, narrow);
    debug_assert!(new_arena + string_bytes <= total);
    table.copy_within(old_arena..old_arena + string_bytes, new_arena);

    write_u32(table, TOTAL_BYTES, total as u32);
    write_u32(table, NARROW_SLOTS, u32::from(narrow));
    write_u32(table, NUM_SLOTS, num_slots as u32);
    rebuild_index(table);
}

/// Shrink the table to the smallest layout that still satisfies the load
/// factor for the current contents.
///
/// Returns the new total size; the caller may then shrink the region to
/// that many bytes. Symbols stay valid.
pub fn pack(table: &mut [u8]) -> usize {
    let count = read_u32(table, COUNT) as usize;
    let old_slots = read_u32(table, NUM_SLOTS) as usize;
    let old_narrow = read_u32(table, NARROW_SLOTS) != 0;
    let string_bytes = read_u32(table, STRING_BYTES) as usize;

    let num_slots = ((count as f32 * HASH_FACTOR) as usize)
        .max(1)
        .max(count + 1);
    let narrow = string_bytes <= 64 * 1024;

    let old_arena = arena_offset(old_slots, old_narrow);
    let new_arena = arena_offset(num_slots, narrow);
    // A wide relayout of a table straddling the 16-bit bound can need more
    // room than the region has; packing is best-effort, so leave it alone.
    if new_arena + string_bytes > table.len() {
        return read_u32(table, TOTAL_BYTES) as usize;
    }
    table.copy_within(old_arena..old_arena + string_bytes, new_arena);

    let total = new_arena + string_bytes;
    write_u32(table, TOTAL_BYTES, total as u32);
    write_u32(table, NARROW_SLOTS, u32::from(narrow));
    write_u32(table, NUM_SLOTS, num_slots as u32);
    rebuild_index(table);
    total
}

/// Intern `s`, returning its symbol.
///
/// Returns the existing symbol when `s` was interned before; equal symbols
/// therefore mean equal strings. Returns `None` when the table is out of
/// space: the slot array is at its load-factor limit, the arena cannot take
/// the bytes, or the new symbol would not fit a 16-bit slot. The caller is
/// expected to enlarge the region, call [`grow`], and retry.
///
/// The empty string is always symbol 0.
pub fn to_symbol(table: &mut [u8], s: &str) -> Option<u32> {
    if s.is_empty() {
        return Some(0);
    }

    let total = read_u32(table, TOTAL_BYTES) as usize;
    let count = read_u32(table, COUNT);
    let narrow = read_u32(table, NARROW_SLOTS) != 0;
    let num_slots = read_u32(table, NUM_SLOTS) as usize;
    let string_bytes = read_u32(table, STRING_BYTES) as usize;
    let arena = arena_offset(num_slots, narrow);

    let mut i = (lua_hash(s.as_bytes()) as usize) % num_slots;
    loop {
        let sym = slot_get(table, narrow, i);
        if sym == 0 {
            break;
        }
        if stored_eq(table, arena, sym, s) {
            return Some(sym);
        }
        i = (i + 1) % num_slots;
    }

    // All capacity checks happen before any mutation, so a full table is
    // left exactly as it was.
    if count + 1 >= num_slots as u32 {
        return None;
    }
    if num_slots as f32 / ((count + 1) as f32) < HASH_FACTOR {
        return None;
    }
    if string_bytes + s.len() + 1 > total - arena {
        return None;
    }
    let symbol = string_bytes as u32;
    if narrow && symbol > u32::from(u16::MAX) {
        return None;
    }

    slot_set(table, narrow, i, symbol);
    write_u32(table, COUNT, count + 1);
    let dest = arena + string_bytes;
    table[dest..dest + s.len()].copy_from_slice(s.as_bytes());
    table[dest + s.len()] = 0;
    write_u32(table, STRING_BYTES, (string_bytes + s.len() + 1) as u32);
    Some(symbol)
}

/// Look up the symbol for `s` without ever inserting.
///
/// Returns `None` if `s` has not been interned.
#[must_use]
pub fn find_symbol(table: &[u8], s: &str) -> Option<u32> {
    if s.is_empty() {
        return Some(0);
    }

    let narrow = read_u32(table, NARROW_SLOTS) != 0;
    let num_slots = read_u32(table, NUM_SLOTS) as usize;
    let arena = arena_offset(num_slots, narrow);

    let mut i = (lua_hash(s.as_bytes()) as usize) % num_slots;
    loop {
        let sym = slot_get(table, narrow, i);
        if sym == 0 {
            return None;
        }
        if stored_eq(table, arena, sym, s) {
            return Some(sym);
        }
        i = (i + 1) % num_slots;
    }
}

/// Resolve a symbol to its interned string.
///
/// Only meaningful for symbols previously returned by [`to_symbol`] or
/// [`find_symbol`] on this table; anything else yields garbage.
#[must_use]
pub fn to_string(table: &[u8], symbol: u32) -> &str {
    let narrow = read_u32(table, NARROW_SLOTS) != 0;
    let num_slots = read_u32(table, NUM_SLOTS) as usize;
    let start = arena_offset(num_slots, narrow) + symbol as usize;
    let bytes = &table[start..];
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    std::str::from_utf8(&bytes[..len]).unwrap_or("")
}

/// Number of interned strings, not counting the reserved empty string.
#[must_use]
pub fn count(table: &[u8]) -> u32 {
    read_u32(table, COUNT)
}

/// Bytes of the region currently in use by the table.
#[must_use]
pub fn total_bytes(table: &[u8]) -> usize {
    read_u32(table, TOTAL_BYTES) as usize
}

/// Whether the hash slots are currently stored as 16-bit values.
#[must_use]
pub fn uses_16_bit_slots(table: &[u8]) -> bool {
    read_u32(table, NARROW_SLOTS) != 0
}

// --- layout helpers ---

fn slot_width(narrow: bool) -> usize {
    if narrow { 2 } else { 4 }
}

fn arena_offset(num_slots: usize, narrow: bool) -> usize {
    HEADER_SIZE + num_slots * slot_width(narrow)
}

/// String bytes left if the table were laid out with 32-bit slots.
fn string_capacity_32(total: usize, num_slots: usize) -> i64 {
    total as i64 - HEADER_SIZE as i64 - 4 * num_slots as i64
}

/// Keep the slot array from swallowing the whole arena.
fn clamp_slots(total: usize, num_slots: usize, narrow: bool, floor: usize) -> usize {
    let max_slots = (total - HEADER_SIZE - 1) / slot_width(narrow);
    num_slots.min(max_slots).max(floor)
}

fn slot_get(table: &[u8], narrow: bool, i: usize) -> u32 {
    if narrow {
        let off = HEADER_SIZE + i * 2;
        u32::from(u16::from_le_bytes([table[off], table[off + 1]]))
    } else {
        let off = HEADER_SIZE + i * 4;
        u32::from_le_bytes([table[off], table[off + 1], table[off + 2], table[off + 3]])
    }
}

fn slot_set(table: &mut [u8], narrow: bool, i: usize, symbol: u32) {
    if narrow {
        let off = HEADER_SIZE + i * 2;
        table[off..off + 2].copy_from_slice(&(symbol as u16).to_le_bytes());
    } else {
        let off = HEADER_SIZE + i * 4;
        table[off..off + 4].copy_from_slice(&symbol.to_le_bytes());
    }
}

fn stored_eq(table: &[u8], arena: usize, symbol: u32, s: &str) -> bool {
    let start = arena + symbol as usize;
    let end = start + s.len();
    end < table.len() && &table[start..end] == s.as_bytes() && table[end] == 0
}

/// Zero the slot array, then re-insert every arena string under the current
/// layout.
fn rebuild_index(table: &mut [u8]) {
    let narrow = read_u32(table, NARROW_SLOTS) != 0;
    let num_slots = read_u32(table, NUM_SLOTS) as usize;
    let string_bytes = read_u32(table, STRING_BYTES) as usize;
    let arena = arena_offset(num_slots, narrow);

    table[HEADER_SIZE..arena].fill(0);

    let mut off = 1;
    while off < string_bytes {
        let remaining = &table[arena + off..arena + string_bytes];
        let len = remaining
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(remaining.len());
        let hash = lua_hash(&table[arena + off..arena + off + len]);
        let mut i = (hash as usize) % num_slots;
        while slot_get(table, narrow, i) != 0 {
            i = (i + 1) % num_slots;
        }
        slot_set(table, narrow, i, off as u32);
        off += len + 1;
    }
}

fn read_u32(table: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([table[off], table[off + 1], table[off + 2], table[off + 3]])
}

fn write_u32(table: &mut [u8], off: usize, value: u32) {
    table[off..off + 4].copy_from_slice(&value.to_le_bytes());
}
