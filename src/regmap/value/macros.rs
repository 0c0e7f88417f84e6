/// Generates a checked accessor for one register value width.
macro_rules! impl_value_reader {
    (u8) => {
        /// Byte at `offset`, or `None` past the end.
        #[inline]
        pub fn read_u8_at(&self, offset: usize) -> Option<u8> {
            self.as_bytes().get(offset).copied()
        }
    };
    ($type:ty, $size:literal) => {
        paste::paste! {
            #[doc = "Decodes a `" $type "` from the " $size " bytes at `offset`."]
            #[doc = ""]
            #[doc = "Returns `None` if the buffer ends before `offset + " $size "`."]
            #[inline]
            pub fn [<read_ $type _at>](&self, offset: usize, endian: Endian) -> Option<$type> {
                let bytes = self.window::<$size>(offset)?;
                Some(match endian {
                    Endian::Big => <$type>::from_be_bytes(bytes),
                    Endian::Little => <$type>::from_le_bytes(bytes),
                })
            }
        }
    };
}

/// Generates the accessors for every width a register value can take,
/// plus the fixed-size window they decode from.
macro_rules! impl_value_readers {
    () => {
        impl_value_reader!(u8);
        impl_value_reader!(u16, 2);
        impl_value_reader!(u32, 4);

        #[inline]
        fn window<const W: usize>(&self, offset: usize) -> Option<[u8; W]> {
            let end = offset.checked_add(W)?;
            self.as_bytes().get(offset..end)?.try_into().ok()
        }
    };
}

pub(super) use impl_value_reader;
pub(super) use impl_value_readers;
