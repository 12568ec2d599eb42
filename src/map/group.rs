//! 16-byte control-group scanning.
//!
//! One load per probe step answers "which of these 16 slots carry this
//! fingerprint?" as a 16-bit mask. SSE2 `pcmpeqb` + `movemask` on x86_64,
//! `vceqq_u8` with a manual bit-pack on aarch64, a byte loop elsewhere.
//! Everything above this module depends only on [`Group::match_eq`] and
//! [`Group::match_any2`] and friends, never on the lane layout.

/// Control bytes scanned per probe step.
pub const GROUP: usize = 16;

/// Control byte: never-used slot. Terminates probes.
pub const EMPTY: u8 = 0x80;

/// Control byte: tombstone. Probes continue across it.
pub const DELETED: u8 = 0xFE;

/// Whether a control byte holds a fingerprint (live slot).
#[inline]
pub const fn is_full(ctrl: u8) -> bool {
    ctrl & 0x80 == 0
}

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        use core::arch::x86_64::{
            __m128i, _mm_cmpeq_epi8, _mm_loadu_si128, _mm_movemask_epi8, _mm_or_si128,
            _mm_set1_epi8,
        };

        /// 16 control bytes in one SSE2 register.
        #[derive(Clone, Copy)]
        pub struct Group(__m128i);

        impl Group {
            /// Load 16 control bytes. Unaligned.
            ///
            /// # Safety
            ///
            /// `ptr..ptr + 16` must be readable; the table's mirrored tail
            /// guarantees this for any in-range slot index.
            #[inline]
            pub unsafe fn load(ptr: *const u8) -> Group {
                Group(unsafe { _mm_loadu_si128(ptr as *const __m128i) })
            }

            /// Mask of lanes equal to `byte`, bit i = lane i.
            #[inline]
            pub fn match_eq(self, byte: u8) -> u16 {
                unsafe {
                    let cmp = _mm_cmpeq_epi8(self.0, _mm_set1_epi8(byte as i8));
                    _mm_movemask_epi8(cmp) as u16
                }
            }

            /// Mask of lanes equal to `a` or `b`.
            #[inline]
            pub fn match_any2(self, a: u8, b: u8) -> u16 {
                unsafe {
                    let ca = _mm_cmpeq_epi8(self.0, _mm_set1_epi8(a as i8));
                    let cb = _mm_cmpeq_epi8(self.0, _mm_set1_epi8(b as i8));
                    _mm_movemask_epi8(_mm_or_si128(ca, cb)) as u16
                }
            }

            /// Mask of `EMPTY` lanes.
            #[inline]
            pub fn match_empty(self) -> u16 {
                self.match_eq(EMPTY)
            }

            /// Mask of `EMPTY` or `DELETED` lanes. Both are the only
            /// control values with the top bit set, so this is one
            /// movemask.
            #[inline]
            pub fn match_empty_or_deleted(self) -> u16 {
                unsafe { _mm_movemask_epi8(self.0) as u16 }
            }
        }
    } else if #[cfg(target_arch = "aarch64")] {
        use core::arch::aarch64::{
            uint8x16_t, vaddv_u8, vandq_u8, vceqq_u8, vdupq_n_u8, vget_high_u8, vget_low_u8,
            vld1q_u8, vorrq_u8,
        };

        /// 16 control bytes in one NEON register.
        #[derive(Clone, Copy)]
        pub struct Group(uint8x16_t);

        /// Per-lane bit weights for packing a byte mask into 16 bits.
        const LANE_BITS: [u8; 16] = [1, 2, 4, 8, 16, 32, 64, 128, 1, 2, 4, 8, 16, 32, 64, 128];

        impl Group {
            /// Load 16 control bytes. Unaligned.
            ///
            /// # Safety
            ///
            /// `ptr..ptr + 16` must be readable; the table's mirrored tail
            /// guarantees this for any in-range slot index.
            #[inline]
            pub unsafe fn load(ptr: *const u8) -> Group {
                Group(unsafe { vld1q_u8(ptr) })
            }

            /// Pack a 0x00/0xFF lane mask into 16 bits.
            #[inline]
            fn pack(mask: uint8x16_t) -> u16 {
                unsafe {
                    let bits = vandq_u8(mask, vld1q_u8(LANE_BITS.as_ptr()));
                    let lo = vaddv_u8(vget_low_u8(bits)) as u16;
                    let hi = vaddv_u8(vget_high_u8(bits)) as u16;
                    lo | (hi << 8)
                }
            }

            #[inline]
            pub fn match_eq(self, byte: u8) -> u16 {
                unsafe { Self::pack(vceqq_u8(self.0, vdupq_n_u8(byte))) }
            }

            #[inline]
            pub fn match_any2(self, a: u8, b: u8) -> u16 {
                unsafe {
                    let ca = vceqq_u8(self.0, vdupq_n_u8(a));
                    let cb = vceqq_u8(self.0, vdupq_n_u8(b));
                    Self::pack(vorrq_u8(ca, cb))
                }
            }

            #[inline]
            pub fn match_empty(self) -> u16 {
                self.match_eq(EMPTY)
            }

            #[inline]
            pub fn match_empty_or_deleted(self) -> u16 {
                self.match_any2(EMPTY, DELETED)
            }
        }
    } else {
        /// 16 control bytes, scanned a byte at a time.
        #[derive(Clone, Copy)]
        pub struct Group([u8; GROUP]);

        impl Group {
            /// Load 16 control bytes.
            ///
            /// # Safety
            ///
            /// `ptr..ptr + 16` must be readable; the table's mirrored tail
            /// guarantees this for any in-range slot index.
            #[inline]
            pub unsafe fn load(ptr: *const u8) -> Group {
                let mut bytes = [0u8; GROUP];
                unsafe { core::ptr::copy_nonoverlapping(ptr, bytes.as_mut_ptr(), GROUP) };
                Group(bytes)
            }

            #[inline]
            pub fn match_eq(self, byte: u8) -> u16 {
                let mut mask = 0u16;
                for (i, &b) in self.0.iter().enumerate() {
                    if b == byte {
                        mask |= 1 << i;
                    }
                }
                mask
            }

            #[inline]
            pub fn match_any2(self, a: u8, b: u8) -> u16 {
                self.match_eq(a) | self.match_eq(b)
            }

            #[inline]
            pub fn match_empty(self) -> u16 {
                self.match_eq(EMPTY)
            }

            #[inline]
            pub fn match_empty_or_deleted(self) -> u16 {
                self.match_any2(EMPTY, DELETED)
            }
        }
    }
}
