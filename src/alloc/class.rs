//! Size-class table lookups.
//!
//! Classes come from `runtime.toml` via the generated config; the default
//! table is eight power-of-two classes from 16 to 2048 bytes. Anything
//! larger bypasses the class machinery and goes straight to the system
//! allocator.

use crate::config::{MAX_SMALL, SIZE_CLASSES};

/// Number of size classes.
pub const NUM_CLASSES: usize = SIZE_CLASSES.len();

/// Index of the smallest class that fits `size`, or `None` when the
/// request is larger than every class.
#[inline]
pub fn class_for(size: usize) -> Option<usize> {
    if size > MAX_SMALL {
        return None;
    }
    // Eight entries: a linear scan beats a table-free log2 on the common
    // small sizes and keeps the table free-form for custom configs.
    SIZE_CLASSES.iter().position(|&c| c >= size)
}

/// Allocation size for a class index.
#[inline]
pub fn class_size(class: usize) -> usize {
    SIZE_CLASSES[class]
}
