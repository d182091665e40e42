use alloc::vec::Vec;

/// Indexed color table built once per decode.
///
/// Entries are stored as `[r, g, b, a]`, already premultiplied when the
/// destination alpha type asked for it. Immutable after construction.
///
/// Out-of-range lookups resolve to opaque black rather than failing: BMP
/// tables are padded to `2^bpp` entries anyway, and hostile PNG index
/// bytes past the palette end must not be able to abort a decode.
#[derive(Clone, Debug)]
pub struct ColorTable {
    entries: Vec<[u8; 4]>,
}

impl ColorTable {
    /// Build a table from packed `[r, g, b, a]` entries.
    pub fn new(entries: Vec<[u8; 4]>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> [u8; 4] {
        self.entries
            .get(index)
            .copied()
            .unwrap_or([0, 0, 0, 0xFF])
    }

    /// True if any entry has alpha below 0xFF.
    pub fn has_translucent_entry(&self) -> bool {
        self.entries.iter().any(|e| e[3] != 0xFF)
    }
}
