//! Hierarchical value store in a single relocatable buffer.
//!
//! A [`ConfigData`] owns one contiguous byte image: a 16-byte header, a
//! *value region* holding numbers and array/object blocks, and an embedded
//! string-table region (see [`string_table`](crate::string_table)). Values
//! are addressed by [`Loc`] handles rather than pointers, so the image is
//! self-contained: it can be written to disk, copied bytewise and reopened
//! with [`ConfigData::from_bytes`] without any fixups.
//!
//! The store is append-only: values are never freed within a `ConfigData`
//! lifetime, and arrays/objects grow by chaining fixed-capacity blocks so
//! that entries already written never move. Both properties together keep
//! every issued `Loc` valid across any number of buffer reallocations.
//!
//! Mutation requires exclusive access (`&mut self`); shared readers of an
//! immutable `ConfigData` are fine.

use crate::loc::{Kind, Loc};
use crate::string_table;

// Header fields, u32 little-endian each. The 4 reserved trailing bytes pad
// the header to 16 so the value region starts 8-aligned.
const USED_VALUE: usize = 0;
const VALUE_CAPACITY: usize = 4;
const ROOT: usize = 8;
const HEADER_SIZE: usize = 16;

/// Default size of each region when the caller passes 0.
const DEFAULT_REGION: usize = 8 * 1024;

/// Block capacity used when `add_array`/`add_object` get capacity 0.
const DEFAULT_BLOCK_CAPACITY: u32 = 16;

/// Array/object block header: `{capacity, count, next}`.
const BLOCK_HEADER: u32 = 12;

/// Slot-count tuning hint handed to the embedded string table.
const AVERAGE_STRLEN: usize = 15;

/// A store of typed configuration values in one relocatable buffer.
///
/// # Example
///
/// ```
/// use confdata::{ConfigData, Kind};
///
/// let mut cd = ConfigData::new();
/// let obj = cd.add_object(0);
/// let name = cd.add_string("amy");
/// cd.set(obj, "name", name);
/// cd.set_root(obj);
///
/// let found = cd.object_lookup(cd.root(), "name");
/// assert_eq!(found.kind(), Kind::String);
/// assert_eq!(cd.to_string(found), "amy");
/// assert!(cd.object_lookup(obj, "age").is_null());
/// ```
#[derive(Clone)]
pub struct ConfigData {
    /// The whole image: header, value region, string-table region.
    data: Vec<u8>,
}

impl ConfigData {
    /// Create an empty store with default region sizes (8 KiB each).
    ///
    /// The root starts as [`Loc::NULL`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0, 0)
    }

    /// Create an empty store with explicit initial region sizes in bytes.
    ///
    /// Passing 0 for either size selects the 8 KiB default. Both regions
    /// grow on demand, so the sizes only tune how soon the first
    /// reallocation happens.
    #[must_use]
    pub fn with_capacity(value_bytes: usize, string_bytes: usize) -> Self {
        let value_bytes = if value_bytes == 0 {
            DEFAULT_REGION
        } else {
            value_bytes
        };
        let string_bytes = if string_bytes == 0 {
            DEFAULT_REGION
        } else {
            string_bytes.max(string_table::MIN_BYTES)
        };

        let mut data = vec![0u8; HEADER_SIZE + value_bytes + string_bytes];
        write_u32(&mut data, VALUE_CAPACITY, value_bytes as u32);
        write_u32(&mut data, ROOT, Loc::NULL.raw());
        string_table::init(&mut data[HEADER_SIZE + value_bytes..], AVERAGE_STRLEN);
        ConfigData { data }
    }

    /// Reopen an image previously obtained from [`ConfigData::as_bytes`].
    ///
    /// The image is pointer-free, so a bytewise copy is a fully equivalent
    /// store: every `Loc` issued against the original resolves to the same
    /// value here.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        debug_assert!(bytes.len() >= HEADER_SIZE + string_table::MIN_BYTES);
        ConfigData { data: bytes }
    }

    /// Get the raw image bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    // --- root ---

    /// Get the root value.
    #[inline]
    #[must_use]
    pub fn root(&self) -> Loc {
        Loc::from_raw(read_u32(&self.data, ROOT))
    }

    /// Set the root value.
    #[inline]
    pub fn set_root(&mut self, root: Loc) {
        write_u32(&mut self.data, ROOT, root.raw());
    }

    // --- reading ---

    /// Decode a number handle.
    ///
    /// Reads of a handle that is not a number return `0.0`.
    #[must_use]
    pub fn to_number(&self, loc: Loc) -> f64 {
        if loc.kind() != Kind::Number {
            return 0.0;
        }
        let off = HEADER_SIZE + loc.offset() as usize;
        f64::from_le_bytes([
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
            self.data[off + 4],
            self.data[off + 5],
            self.data[off + 6],
            self.data[off + 7],
        ])
    }

    /// Decode a string handle.
    ///
    /// The returned slice borrows from the store and is invalidated by the
    /// next mutation. Reads of a handle that is not a string return `""`.
    #[must_use]
    pub fn to_string(&self, loc: Loc) -> &str {
        if loc.kind() != Kind::String {
            return "";
        }
        string_table::to_string(self.string_region(), loc.offset())
    }

    // --- writing ---

    /// Store a number and return its handle.
    pub fn add_number(&mut self, n: f64) -> Loc {
        let off = self.alloc_value(8, 8);
        let abs = HEADER_SIZE + off as usize;
        self.data[abs..abs + 8].copy_from_slice(&n.to_le_bytes());
        Loc::pack(Kind::Number, off)
    }

    /// Intern a string and return its handle.
    ///
    /// Interning the same string twice returns the same handle, so handle
    /// equality is string equality.
    pub fn add_string(&mut self, s: &str) -> Loc {
        loop {
            if let Some(sym) = string_table::to_symbol(self.string_region_mut(), s) {
                return Loc::pack(Kind::String, sym);
            }
            self.grow_string_region();
        }
    }

    /// Store an empty array and return its handle.
    ///
    /// `capacity` sizes the first block; 0 selects the default of 16.
    /// Pushing past a full block chains a new one of twice the capacity.
    pub fn add_array(&mut self, capacity: u32) -> Loc {
        let capacity = if capacity == 0 {
            DEFAULT_BLOCK_CAPACITY
        } else {
            capacity
        };
        let off = self.alloc_block(capacity, 4);
        Loc::pack(Kind::Array, off)
    }

    /// Store an empty object and return its handle.
    ///
    /// `capacity` sizes the first block; 0 selects the default of 16.
    pub fn add_object(&mut self, capacity: u32) -> Loc {
        let capacity = if capacity == 0 {
            DEFAULT_BLOCK_CAPACITY
        } else {
            capacity
        };
        let off = self.alloc_block(capacity, 8);
        Loc::pack(Kind::Object, off)
    }

    // --- arrays ---

    /// Number of items in an array. 0 for non-arrays.
    #[must_use]
    pub fn array_size(&self, array: Loc) -> u32 {
        if array.kind() != Kind::Array {
            return 0;
        }
        self.chain_len(array.offset())
    }

    /// Get the item at `index`, or [`Loc::NULL`] when out of range.
    #[must_use]
    pub fn array_item(&self, array: Loc, index: u32) -> Loc {
        if array.kind() != Kind::Array {
            return Loc::NULL;
        }
        let mut off = array.offset();
        let mut index = index;
        loop {
            let count = self.block_count(off);
            if index < count {
                return Loc::from_raw(self.vread_u32(off + BLOCK_HEADER + index * 4));
            }
            index -= count;
            let next = self.block_next(off);
            if next.is_null() {
                return Loc::NULL;
            }
            off = next.offset();
        }
    }

    /// Append `item` to an array.
    pub fn push(&mut self, array: Loc, item: Loc) {
        debug_assert_eq!(array.kind(), Kind::Array);
        if array.kind() != Kind::Array {
            return;
        }
        let tail = self.chain_tail(array.offset());
        let capacity = self.block_capacity(tail);
        let count = self.block_count(tail);

        let slot = if count == capacity {
            let fresh = self.alloc_block(capacity * 2, 4);
            self.vwrite_u32(tail + 8, Loc::pack(Kind::Array, fresh).raw());
            self.vwrite_u32(fresh + 4, 1);
            fresh + BLOCK_HEADER
        } else {
            self.vwrite_u32(tail + 4, count + 1);
            tail + BLOCK_HEADER + count * 4
        };
        self.vwrite_u32(slot, item.raw());
    }

    // --- objects ---

    /// Number of key/value pairs in an object. 0 for non-objects.
    #[must_use]
    pub fn object_size(&self, object: Loc) -> u32 {
        if object.kind() != Kind::Object {
            return 0;
        }
        self.chain_len(object.offset())
    }

    /// Get the key at `index` as a string handle, or [`Loc::NULL`] when out
    /// of range.
    #[must_use]
    pub fn object_keyloc(&self, object: Loc, index: u32) -> Loc {
        self.object_entry(object, index, 0)
    }

    /// Get the key at `index` as a string. `""` when out of range.
    #[must_use]
    pub fn object_key(&self, object: Loc, index: u32) -> &str {
        self.to_string(self.object_entry(object, index, 0))
    }

    /// Get the value at `index`, or [`Loc::NULL`] when out of range.
    #[must_use]
    pub fn object_value(&self, object: Loc, index: u32) -> Loc {
        self.object_entry(object, index, 4)
    }

    /// Look up `key` in an object, or [`Loc::NULL`] if absent.
    ///
    /// A key that was never interned anywhere in this store cannot match
    /// and returns null without walking the object.
    #[must_use]
    pub fn object_lookup(&self, object: Loc, key: &str) -> Loc {
        if object.kind() != Kind::Object {
            return Loc::NULL;
        }
        let Some(sym) = string_table::find_symbol(self.string_region(), key) else {
            return Loc::NULL;
        };
        let key_loc = Loc::pack(Kind::String, sym);

        let mut off = object.offset();
        loop {
            let count = self.block_count(off);
            for i in 0..count {
                let entry = off + BLOCK_HEADER + i * 8;
                if self.vread_u32(entry) == key_loc.raw() {
                    return Loc::from_raw(self.vread_u32(entry + 4));
                }
            }
            let next = self.block_next(off);
            if next.is_null() {
                return Loc::NULL;
            }
            off = next.offset();
        }
    }

    /// Set `key` to `value` in an object, interning the key first.
    pub fn set(&mut self, object: Loc, key: &str, value: Loc) {
        let key_loc = self.add_string(key);
        self.set_loc(object, key_loc, value);
    }

    /// Set an already-interned `key` to `value` in an object.
    ///
    /// An existing entry with the same key is overwritten in place, so
    /// repeated sets keep the original insertion position. A new key is
    /// appended after all existing entries.
    pub fn set_loc(&mut self, object: Loc, key: Loc, value: Loc) {
        debug_assert_eq!(object.kind(), Kind::Object);
        if object.kind() != Kind::Object {
            return;
        }

        let mut off = object.offset();
        let tail = loop {
            let count = self.block_count(off);
            for i in 0..count {
                let entry = off + BLOCK_HEADER + i * 8;
                if self.vread_u32(entry) == key.raw() {
                    self.vwrite_u32(entry + 4, value.raw());
                    return;
                }
            }
            let next = self.block_next(off);
            if next.is_null() {
                break off;
            }
            off = next.offset();
        };

        let capacity = self.block_capacity(tail);
        let count = self.block_count(tail);
        let entry = if count == capacity {
            let fresh = self.alloc_block(capacity * 2, 8);
            self.vwrite_u32(tail + 8, Loc::pack(Kind::Object, fresh).raw());
            self.vwrite_u32(fresh + 4, 1);
            fresh + BLOCK_HEADER
        } else {
            self.vwrite_u32(tail + 4, count + 1);
            tail + BLOCK_HEADER + count * 8
        };
        self.vwrite_u32(entry, key.raw());
        self.vwrite_u32(entry + 4, value.raw());
    }

    // --- maintenance ---

    /// Shrink the image to the minimum that holds the current contents.
    ///
    /// Packs the embedded string table, drops unused value-region capacity
    /// and truncates the buffer. Every issued `Loc` stays valid, and the
    /// store can keep growing afterwards. Returns the new image size.
    pub fn pack(&mut self) -> usize {
        let used = self.used_value();
        let st_off = HEADER_SIZE + self.value_capacity();
        let st_total = string_table::pack(&mut self.data[st_off..]);

        let new_st_off = HEADER_SIZE + used;
        self.data.copy_within(st_off..st_off + st_total, new_st_off);
        write_u32(&mut self.data, VALUE_CAPACITY, used as u32);
        self.data.truncate(new_st_off + st_total);
        self.data.len()
    }

    // --- regions ---

    fn used_value(&self) -> usize {
        read_u32(&self.data, USED_VALUE) as usize
    }

    fn value_capacity(&self) -> usize {
        read_u32(&self.data, VALUE_CAPACITY) as usize
    }

    fn string_region(&self) -> &[u8] {
        &self.data[HEADER_SIZE + self.value_capacity()..]
    }

    fn string_region_mut(&mut self) -> &mut [u8] {
        let off = HEADER_SIZE + self.value_capacity();
        &mut self.data[off..]
    }

    /// Reserve `size` bytes in the value region at the given alignment and
    /// return their region-relative offset. Grows the buffer when needed.
    fn alloc_value(&mut self, size: usize, align: usize) -> u32 {
        let used = self.used_value();
        let off = (used + align - 1) & !(align - 1);
        if off + size > self.value_capacity() {
            self.grow_value_region(off + size);
        }
        write_u32(&mut self.data, USED_VALUE, (off + size) as u32);
        debug_assert!(off as u32 <= Loc::MAX_OFFSET);
        off as u32
    }

    fn alloc_block(&mut self, capacity: u32, entry_size: u32) -> u32 {
        let off = self.alloc_value((BLOCK_HEADER + capacity * entry_size) as usize, 4);
        self.vwrite_u32(off, capacity);
        self.vwrite_u32(off + 4, 0);
        self.vwrite_u32(off + 8, Loc::NULL.raw());
        off
    }

    /// Double the value region (at least to `min_capacity`), shifting the
    /// string-table region up to stay adjacent. `Loc` offsets are relative
    /// to the region start and are unaffected.
    fn grow_value_region(&mut self, min_capacity: usize) {
        let old_capacity = self.value_capacity();
        // A freshly packed empty store has zero value capacity.
        let mut new_capacity = (old_capacity * 2).max(64);
        while new_capacity < min_capacity {
            new_capacity *= 2;
        }
        assert!(new_capacity <= Loc::MAX_OFFSET as usize + 1);

        let old_st_off = HEADER_SIZE + old_capacity;
        let new_st_off = HEADER_SIZE + new_capacity;
        let st_len = self.data.len() - old_st_off;

        self.data.resize(new_st_off + st_len, 0);
        self.data.copy_within(old_st_off..old_st_off + st_len, new_st_off);
        self.data[old_st_off..new_st_off].fill(0);
        write_u32(&mut self.data, VALUE_CAPACITY, new_capacity as u32);
    }

    /// Double the string-table region (it sits at the end of the image, so
    /// nothing else moves) and re-lay-out the table.
    fn grow_string_region(&mut self) {
        let st_off = HEADER_SIZE + self.value_capacity();
        let st_len = self.data.len() - st_off;
        self.data.resize(st_off + st_len * 2, 0);
        string_table::grow(&mut self.data[st_off..]);
    }

    // --- blocks ---

    fn block_capacity(&self, off: u32) -> u32 {
        self.vread_u32(off)
    }

    fn block_count(&self, off: u32) -> u32 {
        self.vread_u32(off + 4)
    }

    fn block_next(&self, off: u32) -> Loc {
        Loc::from_raw(self.vread_u32(off + 8))
    }

    fn chain_len(&self, mut off: u32) -> u32 {
        let mut total = 0;
        loop {
            total += self.block_count(off);
            let next = self.block_next(off);
            if next.is_null() {
                return total;
            }
            off = next.offset();
        }
    }

    fn chain_tail(&self, mut off: u32) -> u32 {
        loop {
            let next = self.block_next(off);
            if next.is_null() {
                return off;
            }
            off = next.offset();
        }
    }

    fn object_entry(&self, object: Loc, index: u32, field: u32) -> Loc {
        if object.kind() != Kind::Object {
            return Loc::NULL;
        }
        let mut off = object.offset();
        let mut index = index;
        loop {
            let count = self.block_count(off);
            if index < count {
                return Loc::from_raw(self.vread_u32(off + BLOCK_HEADER + index * 8 + field));
            }
            index -= count;
            let next = self.block_next(off);
            if next.is_null() {
                return Loc::NULL;
            }
            off = next.offset();
        }
    }

    // --- value-region access ---

    fn vread_u32(&self, off: u32) -> u32 {
        read_u32(&self.data, HEADER_SIZE + off as usize)
    }

    fn vwrite_u32(&mut self, off: u32, value: u32) {
        write_u32(&mut self.data, HEADER_SIZE + off as usize, value);
    }
}

impl Default for ConfigData {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConfigData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigData")
            .field("len", &self.data.len())
            .field("used_value_bytes", &self.used_value())
            .field("root", &self.root())
            .finish()
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn write_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}
