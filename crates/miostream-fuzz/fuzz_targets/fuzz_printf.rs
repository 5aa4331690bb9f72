#![no_main]
use libfuzzer_sys::fuzz_target;
use miostream_core::stdio::printf::{self, Arg};

// Arbitrary format strings must not panic, and the bounded form must agree
// with the unbounded one on length and prefix.
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let (fmt, tail) = data.split_at(data.len().min(64));
    // Keep field widths small enough that rendering stays cheap.
    if fmt.windows(5).any(|w| w.iter().all(u8::is_ascii_digit)) {
        return;
    }
    let args = [
        Arg::Int(-7),
        Arg::Uint(u64::from(tail.first().copied().unwrap_or(3))),
        Arg::Float(1.5),
        Arg::Str(tail),
        Arg::Char(b'z'),
        Arg::Int(12),
    ];

    let mut full = Vec::new();
    let Ok(n) = printf::render(fmt, &args, &mut full) else {
        return;
    };
    assert_eq!(n, full.len());

    let mut dst = [0xAAu8; 32];
    let m = printf::format_bounded(&mut dst, fmt, &args).expect("same input formatted once already");
    assert_eq!(m, n);
    let kept = n.min(dst.len() - 1);
    assert_eq!(&dst[..kept], &full[..kept]);
    assert_eq!(dst[kept], 0);
});
