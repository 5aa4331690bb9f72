#![no_main]
use libfuzzer_sys::fuzz_target;
use miostream_core::stdio::printf::Arg;
use miostream_core::{CHUNK_SIZE, Cursor, MemStream, Whence};

// Drives a growable memory stream with operations decoded from the input
// and checks the structural invariants after every step.
fuzz_target!(|data: &[u8]| {
    let Some((&seed_len, rest)) = data.split_first() else {
        return;
    };
    let split = usize::from(seed_len).min(rest.len());
    let (content, ops) = rest.split_at(split);

    let mut s = MemStream::growable(content.to_vec());
    // Truncation may strand the cursor past the end until the next reposition.
    let mut stranded = false;

    for chunk in ops.chunks(3) {
        let [op, a, b] = match *chunk {
            [op, a, b] => [op, a, b],
            _ => break,
        };
        let arg = usize::from(u16::from_le_bytes([a, b]));
        let old_capacity = s.capacity();
        let mut repositioned = false;
        let mut wrote = false;

        match op % 12 {
            0 => {
                let mut dst = vec![0u8; arg % 512];
                let size = usize::from(a % 4) + 1;
                let n = s.read(&mut dst, size, dst.len() / size + 1);
                assert!(n <= dst.len() / size);
            }
            1 => {
                let _ = s.getc();
            }
            2 => {
                let mut dst = vec![0u8; usize::from(b)];
                if let Some(line) = s.gets(&mut dst) {
                    assert!(!line.is_empty() && line.len() < dst.len());
                    assert!(!line[..line.len() - 1].contains(&b'\n'));
                }
            }
            3 => {
                let had = s.pushback().is_some();
                if s.ungetc(a).is_some() {
                    assert!(!had);
                    assert!(!s.is_eof());
                    assert_eq!(s.pushback(), Some(a));
                }
            }
            4 => {
                let src = vec![a; arg % 300];
                wrote = s.write(&src, 1, src.len()) == src.len();
            }
            5 => wrote = s.putc(a).is_some(),
            6 => {
                let text = [a, b, b'\n'];
                wrote = s.puts(&text).is_ok();
            }
            7 => {
                let args = [
                    Arg::Int(i64::from(b % 40)),
                    Arg::Int(i64::from(a) - 128),
                    Arg::Str(&content[..content.len().min(8)]),
                ];
                wrote = s.vprintf(b"%*d|%s", &args).is_ok();
            }
            8 => {
                let whence = match b % 3 {
                    0 => Whence::Set,
                    1 => Whence::Cur,
                    _ => Whence::End,
                };
                let offset = i64::from(a) - 64;
                repositioned = s.seek(offset, whence).is_ok();
            }
            9 => {
                s.rewind();
                repositioned = true;
            }
            10 => {
                if let Ok(pos) = s.get_pos() {
                    let _ = s.getc();
                    repositioned = s.set_pos(pos).is_ok();
                    assert!(repositioned || stranded);
                }
            }
            _ => {
                let old_size = s.size();
                if s.try_resize(arg % 9000).is_ok() && arg % 9000 < old_size {
                    stranded = true;
                }
            }
        }

        assert!(s.capacity() >= s.size());
        if repositioned {
            stranded = false;
            assert_eq!(s.pushback(), None);
            assert!(!s.is_eof());
        }
        if wrote && s.capacity() != old_capacity {
            assert!(s.capacity() >= old_capacity + CHUNK_SIZE);
        }
        if !stranded && let Cursor::At(at) = s.cursor() {
            assert!(at <= s.size());
        }
    }
});
