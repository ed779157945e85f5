//! Category sets for categorical splits.

use serde::{Deserialize, Serialize};

/// Compact bitset for categorical membership (up to 64 categories inline).
///
/// A categorical split stores one set per side. Categories beyond 64 use
/// heap-allocated overflow storage.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatBitset {
    /// Inline bits for categories 0..63.
    bits: u64,
    /// Heap storage for categories 64+.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    overflow: Option<Box<[u64]>>,
}

impl CatBitset {
    /// Create an empty bitset.
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a bitset with a single category.
    #[inline]
    pub fn singleton(cat: u32) -> Self {
        let mut s = Self::empty();
        s.insert(cat);
        s
    }

    /// Check if a category is in the set.
    #[inline]
    pub fn contains(&self, cat: u32) -> bool {
        if cat < 64 {
            (self.bits >> cat) & 1 != 0
        } else {
            let idx = ((cat - 64) / 64) as usize;
            let bit = (cat - 64) % 64;
            self.overflow
                .as_ref()
                .and_then(|o| o.get(idx))
                .map_or(false, |&w| (w >> bit) & 1 != 0)
        }
    }

    /// Insert a category into the set.
    pub fn insert(&mut self, cat: u32) {
        if cat < 64 {
            self.bits |= 1u64 << cat;
        } else {
            let idx = ((cat - 64) / 64) as usize;
            let bit = (cat - 64) % 64;

            let overflow = self.overflow.get_or_insert_with(|| vec![0u64; idx + 1].into_boxed_slice());

            // Grow if needed
            if idx >= overflow.len() {
                let mut new_overflow = vec![0u64; idx + 1];
                new_overflow[..overflow.len()].copy_from_slice(overflow);
                *overflow = new_overflow.into_boxed_slice();
            }

            overflow[idx] |= 1u64 << bit;
        }
    }

    /// Check if the bitset is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits == 0 && self.overflow.as_ref().map_or(true, |o| o.iter().all(|&w| w == 0))
    }

    /// Iterate over member categories in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let inline = (0..64u32).filter(move |&c| (self.bits >> c) & 1 != 0);
        let overflow = self.overflow.iter().flat_map(|words| {
            words.iter().enumerate().flat_map(|(idx, &word)| {
                (0..64u32)
                    .filter(move |&bit| (word >> bit) & 1 != 0)
                    .map(move |bit| 64 + idx as u32 * 64 + bit)
            })
        });
        inline.chain(overflow)
    }

    /// Check whether the two sets share any category.
    pub fn intersects(&self, other: &CatBitset) -> bool {
        self.iter().any(|c| other.contains(c))
    }
}

impl PartialEq for CatBitset {
    fn eq(&self, other: &Self) -> bool {
        // Overflow storage may carry trailing zero words.
        self.iter().eq(other.iter())
    }
}

impl FromIterator<u32> for CatBitset {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = Self::empty();
        for cat in iter {
            set.insert(cat);
        }
        set
    }
}
