//! Generates the named-flag entry types on top of [`PointerTableEntry`](crate::PointerTableEntry).

/// Declares a `#[repr(transparent)]` wrapper around a
/// [`PointerTableEntry`](crate::PointerTableEntry) whose status bits are
/// exposed under the given names.
///
/// Each flag line reads `bit => getter / setter / builder`.
macro_rules! pointer_table_entry {
    (
        $(#[$meta:meta])*
        pub struct $ty:ident {
            $(
                $(#[$flag_meta:meta])*
                $bit:literal => $get:ident / $set:ident / $with:ident,
            )*
        }
    ) => {
        $(#[$meta])*
        #[repr(transparent)]
        #[derive(Copy, Clone, Default, PartialEq, Eq)]
        pub struct $ty($crate::PointerTableEntry);

        impl $ty {
            /// A zero (not present) entry.
            #[inline]
            #[must_use]
            pub const fn zero() -> Self {
                Self($crate::PointerTableEntry::new())
            }

            /// Wrap a raw 32-bit word.
            #[inline]
            #[must_use]
            pub const fn from_value(v: u32) -> Self {
                Self($crate::PointerTableEntry::from_value(v))
            }

            /// The raw 32-bit word.
            #[inline]
            #[must_use]
            pub const fn value(self) -> u32 {
                self.0.value()
            }

            /// The 4 KiB-aligned physical address stored in this entry.
            #[inline]
            #[must_use]
            pub const fn address(self) -> ::kernel_memory_addresses::PhysicalAddress {
                self.0.address()
            }

            /// Store `pa`, truncated to its 4 KiB boundary.
            #[inline]
            pub const fn set_address(&mut self, pa: ::kernel_memory_addresses::PhysicalAddress) {
                self.0.set_address(pa);
            }

            #[inline]
            #[must_use]
            pub const fn with_address(mut self, pa: ::kernel_memory_addresses::PhysicalAddress) -> Self {
                self.set_address(pa);
                self
            }

            /// The untyped view of this entry.
            #[inline]
            #[must_use]
            pub const fn bits(self) -> $crate::PointerTableEntry {
                self.0
            }

            $(
                $(#[$flag_meta])*
                #[inline]
                #[must_use]
                pub const fn $get(self) -> bool {
                    self.0.status_flag($bit)
                }

                #[inline]
                pub const fn $set(&mut self, value: bool) {
                    self.0.set_status_flag($bit, value);
                }

                #[inline]
                #[must_use]
                pub const fn $with(mut self, value: bool) -> Self {
                    self.$set(value);
                    self
                }
            )*
        }

        impl ::core::fmt::Debug for $ty {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, concat!(stringify!($ty), "({:#010x})"), self.value())
            }
        }
    };
}
