//! Fixed-size record encoding.

/// A value that a [`PagedStore`](crate::store::PagedStore) can hold.
///
/// Every record of a type occupies exactly `SIZE` bytes on disk. The store
/// file remembers `SIZE` when it is created and refuses to reopen with a
/// type of a different size.
///
/// # Example
/// ```
/// use pagedb::storage::Record;
///
/// let mut buf = [0u8; 8];
/// 42u64.write_to(&mut buf);
/// assert_eq!(u64::from_bytes(&buf), 42);
/// ```
pub trait Record: Sized {
    /// Encoded size in bytes.
    const SIZE: usize;

    /// Encode into `buf`, which is exactly `SIZE` bytes long.
    fn write_to(&self, buf: &mut [u8]);

    /// Decode from `buf`, which is exactly `SIZE` bytes long.
    fn from_bytes(buf: &[u8]) -> Self;
}

macro_rules! impl_record_for_int {
    ($($t:ty),*) => {
        $(
            impl Record for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                #[inline]
                fn write_to(&self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn from_bytes(buf: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(buf);
                    <$t>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_record_for_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

/// Fixed-width byte strings, ordered lexicographically.
impl<const N: usize> Record for [u8; N] {
    const SIZE: usize = N;

    #[inline]
    fn write_to(&self, buf: &mut [u8]) {
        buf.copy_from_slice(self);
    }

    #[inline]
    fn from_bytes(buf: &[u8]) -> Self {
        let mut raw = [0u8; N];
        raw.copy_from_slice(buf);
        raw
    }
}
