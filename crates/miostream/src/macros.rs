/// Formatted write, the variadic form of `vprintf`.
///
/// Works on anything with a `vprintf(&[u8], &[Arg])` method: [`Stream`],
/// [`MemStream`] and [`FileStream`]. Each argument goes through
/// `Arg::from`.
///
/// ```
/// use miostream::{Stream, printf};
///
/// let mut s = Stream::growable(Vec::new());
/// printf!(s, "%s=%04x", "id", 255u32).unwrap();
/// assert_eq!(s.as_memory().unwrap().as_bytes(), b"id=00ff");
/// ```
///
/// [`Stream`]: crate::Stream
/// [`MemStream`]: crate::MemStream
/// [`FileStream`]: crate::FileStream
#[macro_export]
macro_rules! printf {
    ($stream:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        $stream.vprintf(
            ::core::convert::AsRef::<[u8]>::as_ref($fmt),
            &[$($crate::Arg::from($arg)),*],
        )
    };
}
