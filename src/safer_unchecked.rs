use core::slice::SliceIndex;

/// Unchecked slice access that stays checked in debug and test builds.
///
/// Release builds compile down to `get_unchecked`; everywhere else an
/// out-of-bounds access panics instead of being undefined behavior.
pub(crate) trait GetSaferUnchecked<T> {
    unsafe fn get_kinda_unchecked<I>(&self, index: I) -> &<I as SliceIndex<[T]>>::Output
    where
        I: SliceIndex<[T]>;
}

impl<T> GetSaferUnchecked<T> for [T] {
    #[cfg_attr(not(feature = "no-inline"), inline)]
    unsafe fn get_kinda_unchecked<I>(&self, index: I) -> &<I as SliceIndex<[T]>>::Output
    where
        I: SliceIndex<[T]>,
    {
        if cfg!(any(debug_assertions, test)) {
            &self[index]
        } else {
            unsafe { self.get_unchecked(index) }
        }
    }
}
