//! printf formatting engine.
//!
//! Interprets C printf format strings against a typed argument pack and
//! renders the result into a byte vector. Both stream backings format through
//! here: the memory backing via [`format_bounded`] (snprintf semantics), the
//! file backing via [`render`] followed by a single host write.
//!
//! Reference: POSIX.1-2024 fprintf, ISO C11 7.21.6.1
//!
//! Arguments are already typed, so there is no default-promotion guessing:
//! `hh` and `h` narrow the value as C would, every other length modifier
//! keeps the full 64-bit value. `%n` is refused.

use std::ffi::CStr;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Directives
// ---------------------------------------------------------------------------

/// The `-+ #0` flag characters of one directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatFlags {
    pub left_justify: bool,
    pub force_sign: bool,
    pub space_sign: bool,
    pub alt_form: bool,
    pub zero_pad: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    None,
    Fixed(usize),
    /// `*`
    FromArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    None,
    Fixed(usize),
    /// `.*`
    FromArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthMod {
    None,
    Hh,
    H,
    L,
    Ll,
    Z,
    T,
    J,
    /// `L`
    BigL,
}

/// One `%` directive, minus the leading `%`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    pub flags: FormatFlags,
    pub width: Width,
    pub precision: Precision,
    pub length: LengthMod,
    pub conversion: u8,
}

/// A piece of a format string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a [u8]),
    /// `%%`
    Percent,
    Directive(FormatSpec),
}

// ---------------------------------------------------------------------------
// Arguments and errors
// ---------------------------------------------------------------------------

/// One printf argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arg<'a> {
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(u8),
    /// String bytes; a NUL ends the string early, as in C.
    Str(&'a [u8]),
    Ptr(usize),
}

impl Arg<'_> {
    fn as_signed(self) -> Option<i64> {
        match self {
            Arg::Int(v) => Some(v),
            Arg::Uint(v) => Some(v as i64),
            Arg::Char(c) => Some(i64::from(c)),
            _ => None,
        }
    }

    fn as_unsigned(self) -> Option<u64> {
        match self {
            Arg::Int(v) => Some(v as u64),
            Arg::Uint(v) => Some(v),
            Arg::Char(c) => Some(u64::from(c)),
            _ => None,
        }
    }
}

macro_rules! arg_from {
    ($variant:ident as $wide:ty: $($t:ty),*) => {
        $(
            impl From<$t> for Arg<'_> {
                fn from(v: $t) -> Self {
                    Arg::$variant(v as $wide)
                }
            }
        )*
    };
}

arg_from!(Int as i64: i8, i16, i32, i64, isize);
arg_from!(Uint as u64: u8, u16, u32, u64, usize);
arg_from!(Float as f64: f32, f64);

impl<'a> From<&'a str> for Arg<'a> {
    fn from(s: &'a str) -> Self {
        Arg::Str(s.as_bytes())
    }
}

impl<'a> From<&'a String> for Arg<'a> {
    fn from(s: &'a String) -> Self {
        Arg::Str(s.as_bytes())
    }
}

impl<'a> From<&'a [u8]> for Arg<'a> {
    fn from(s: &'a [u8]) -> Self {
        Arg::Str(s)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Arg<'a> {
    fn from(s: &'a [u8; N]) -> Self {
        Arg::Str(s)
    }
}

impl<'a> From<&'a CStr> for Arg<'a> {
    fn from(s: &'a CStr) -> Self {
        Arg::Str(s.to_bytes())
    }
}

impl<T> From<*const T> for Arg<'_> {
    fn from(p: *const T) -> Self {
        Arg::Ptr(p.addr())
    }
}

impl<T> From<*mut T> for Arg<'_> {
    fn from(p: *mut T) -> Self {
        Arg::Ptr(p.addr())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("no argument left for %{conversion}")]
    MissingArgument { conversion: char },
    #[error("argument {index} cannot be rendered by %{conversion}")]
    ArgumentType { index: usize, conversion: char },
    #[error("%{conversion} is not supported")]
    Unsupported { conversion: char },
    #[error("field width or precision of %{conversion} exceeds INT_MAX")]
    FieldOverflow { conversion: char },
    #[error("formatted length changed between sizing ({probe}) and rendering ({rendered})")]
    LengthMismatch { probe: usize, rendered: usize },
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn eat(&mut self, byte: u8) -> bool {
        let hit = self.peek() == Some(byte);
        self.pos += usize::from(hit);
        hit
    }

    /// Decimal digits at the cursor, saturating; `None` if there are none.
    fn number(&mut self) -> Option<usize> {
        let start = self.pos;
        let mut value = 0usize;
        while let Some(d) = self.peek().filter(u8::is_ascii_digit) {
            value = value.saturating_mul(10).saturating_add(usize::from(d - b'0'));
            self.pos += 1;
        }
        (self.pos > start).then_some(value)
    }
}

const CONVERSIONS: &[u8] = b"diuxXoscpnfFeEgGaA";

/// Parse the directive that follows a `%`.
///
/// Returns the directive and how many bytes of `fmt` it spans, or `None`
/// when the bytes do not end in a known conversion.
pub fn parse_directive(fmt: &[u8]) -> Option<(FormatSpec, usize)> {
    let mut s = Scanner { bytes: fmt, pos: 0 };

    let mut flags = FormatFlags::default();
    loop {
        let flag = match s.peek() {
            Some(b'-') => &mut flags.left_justify,
            Some(b'+') => &mut flags.force_sign,
            Some(b' ') => &mut flags.space_sign,
            Some(b'#') => &mut flags.alt_form,
            Some(b'0') => &mut flags.zero_pad,
            _ => break,
        };
        *flag = true;
        s.pos += 1;
    }
    // '+' beats ' ', '-' beats '0'.
    flags.space_sign &= !flags.force_sign;
    flags.zero_pad &= !flags.left_justify;

    let width = if s.eat(b'*') {
        Width::FromArg
    } else {
        s.number().map_or(Width::None, Width::Fixed)
    };

    let precision = if !s.eat(b'.') {
        Precision::None
    } else if s.eat(b'*') {
        Precision::FromArg
    } else {
        Precision::Fixed(s.number().unwrap_or(0))
    };

    let length = if s.eat(b'h') {
        if s.eat(b'h') { LengthMod::Hh } else { LengthMod::H }
    } else if s.eat(b'l') {
        if s.eat(b'l') { LengthMod::Ll } else { LengthMod::L }
    } else if s.eat(b'z') {
        LengthMod::Z
    } else if s.eat(b't') {
        LengthMod::T
    } else if s.eat(b'j') {
        LengthMod::J
    } else if s.eat(b'L') {
        LengthMod::BigL
    } else {
        LengthMod::None
    };

    let conversion = s.peek().filter(|c| CONVERSIONS.contains(c))?;
    s.pos += 1;

    let spec = FormatSpec {
        flags,
        width,
        precision,
        length,
        conversion,
    };
    Some((spec, s.pos))
}

/// Iterator over the [`Segment`]s of a format string.
///
/// A `%` that does not start a valid directive comes out as a one-byte
/// literal and scanning resumes right after it.
pub struct Segments<'a> {
    fmt: &'a [u8],
    pos: usize,
}

#[must_use]
pub fn segments(fmt: &[u8]) -> Segments<'_> {
    Segments { fmt, pos: 0 }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        let fmt = self.fmt;
        let rest = &fmt[self.pos..];
        let first = *rest.first()?;
        if first != b'%' {
            let run = rest.iter().position(|&b| b == b'%').unwrap_or(rest.len());
            self.pos += run;
            return Some(Segment::Literal(&rest[..run]));
        }
        if rest.get(1) == Some(&b'%') {
            self.pos += 2;
            return Some(Segment::Percent);
        }
        match parse_directive(&rest[1..]) {
            Some((spec, used)) => {
                self.pos += 1 + used;
                Some(Segment::Directive(spec))
            }
            None => {
                self.pos += 1;
                Some(Segment::Literal(&rest[..1]))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Render `fmt` with `args`, appending to `out`.
///
/// The format ends at its first NUL byte, if any. Returns the number of bytes
/// appended. Arguments left over after the last directive are ignored.
pub fn render(fmt: &[u8], args: &[Arg<'_>], out: &mut Vec<u8>) -> Result<usize, FormatError> {
    let start = out.len();
    let mut args = ArgCursor { args, next: 0 };
    for segment in segments(until_nul(fmt)) {
        match segment {
            Segment::Literal(lit) => out.extend_from_slice(lit),
            Segment::Percent => out.push(b'%'),
            Segment::Directive(spec) => render_spec(&spec, &mut args, out)?,
        }
    }
    Ok(out.len() - start)
}

/// snprintf: write at most `dst.len() - 1` bytes plus a NUL terminator.
///
/// Returns the full length the output would have had. An empty `dst` receives
/// nothing, not even the terminator.
pub fn format_bounded(dst: &mut [u8], fmt: &[u8], args: &[Arg<'_>]) -> Result<usize, FormatError> {
    let mut rendered = Vec::new();
    let n = render(fmt, args, &mut rendered)?;
    if let Some(room) = dst.len().checked_sub(1) {
        let copied = n.min(room);
        dst[..copied].copy_from_slice(&rendered[..copied]);
        dst[copied] = 0;
    }
    Ok(n)
}

struct ArgCursor<'s, 'a> {
    args: &'s [Arg<'a>],
    next: usize,
}

impl<'a> ArgCursor<'_, 'a> {
    fn take(&mut self, conversion: char) -> Result<(usize, Arg<'a>), FormatError> {
        let index = self.next;
        let arg = *self
            .args
            .get(index)
            .ok_or(FormatError::MissingArgument { conversion })?;
        self.next += 1;
        Ok((index, arg))
    }

    fn take_with<T>(
        &mut self,
        conversion: char,
        extract: impl FnOnce(Arg<'a>) -> Option<T>,
    ) -> Result<T, FormatError> {
        let (index, arg) = self.take(conversion)?;
        extract(arg).ok_or(FormatError::ArgumentType { index, conversion })
    }
}

fn render_spec(
    spec: &FormatSpec,
    args: &mut ArgCursor<'_, '_>,
    out: &mut Vec<u8>,
) -> Result<(), FormatError> {
    let conversion = char::from(spec.conversion);
    let mut spec = spec.clone();

    if spec.width == Width::FromArg {
        let w = args.take_with(conversion, Arg::as_signed)?;
        if w < 0 {
            spec.flags.left_justify = true;
            spec.flags.zero_pad = false;
        }
        spec.width = Width::Fixed(usize::try_from(w.unsigned_abs()).unwrap_or(usize::MAX));
    }
    if spec.precision == Precision::FromArg {
        let p = args.take_with(conversion, Arg::as_signed)?;
        spec.precision = match usize::try_from(p) {
            Ok(p) => Precision::Fixed(p),
            // A negative precision is taken as if it were omitted.
            Err(_) => Precision::None,
        };
    }

    let limit = i32::MAX as usize;
    let too_wide = matches!(spec.width, Width::Fixed(w) if w > limit)
        || matches!(spec.precision, Precision::Fixed(p) if p > limit);
    if too_wide {
        return Err(FormatError::FieldOverflow { conversion });
    }

    match spec.conversion {
        b'd' | b'i' => {
            let raw = args.take_with(conversion, Arg::as_signed)?;
            let value = match spec.length {
                LengthMod::Hh => i64::from(raw as i8),
                LengthMod::H => i64::from(raw as i16),
                _ => raw,
            };
            format_signed(value, &spec, out);
        }
        b'u' | b'o' | b'x' | b'X' => {
            let raw = args.take_with(conversion, Arg::as_unsigned)?;
            let value = match spec.length {
                LengthMod::Hh => u64::from(raw as u8),
                LengthMod::H => u64::from(raw as u16),
                _ => raw,
            };
            format_unsigned(value, &spec, out);
        }
        b'f' | b'F' | b'e' | b'E' | b'g' | b'G' | b'a' | b'A' => {
            let value = args.take_with(conversion, |arg| match arg {
                Arg::Float(v) => Some(v),
                _ => None,
            })?;
            format_float(value, &spec, out);
        }
        b'c' => {
            let byte = args.take_with(conversion, |arg| arg.as_unsigned().map(|v| v as u8))?;
            format_char(byte, &spec, out);
        }
        b's' => {
            let s = args.take_with(conversion, |arg| match arg {
                Arg::Str(s) => Some(s),
                _ => None,
            })?;
            format_str(until_nul(s), &spec, out);
        }
        b'p' => {
            let addr = args.take_with(conversion, |arg| match arg {
                Arg::Ptr(p) => Some(p),
                Arg::Uint(v) => usize::try_from(v).ok(),
                _ => None,
            })?;
            format_pointer(addr, &spec, out);
        }
        _ => return Err(FormatError::Unsupported { conversion }),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Renderers
// ---------------------------------------------------------------------------

/// Render a signed integer (`%d`, `%i`) to `buf` according to `spec`.
pub fn format_signed(value: i64, spec: &FormatSpec, buf: &mut Vec<u8>) {
    format_integer(value < 0, value.unsigned_abs(), true, spec, buf);
}

/// Render an unsigned integer (`%u`, `%o`, `%x`, `%X`) to `buf`.
pub fn format_unsigned(value: u64, spec: &FormatSpec, buf: &mut Vec<u8>) {
    format_integer(false, value, false, spec, buf);
}

fn format_integer(negative: bool, magnitude: u64, signed: bool, spec: &FormatSpec, buf: &mut Vec<u8>) {
    let (base, uppercase) = int_base(spec.conversion);
    let mut digits = [0u8; 64];
    let mut digit_count = render_digits(magnitude, base, uppercase, &mut digits);
    // Explicit zero precision with a zero value prints no digits.
    if magnitude == 0 && spec.precision == Precision::Fixed(0) {
        digit_count = 0;
    }
    let digit_slice = &digits[64 - digit_count..];

    let sign: &[u8] = if negative {
        b"-"
    } else if signed && spec.flags.force_sign {
        b"+"
    } else if signed && spec.flags.space_sign {
        b" "
    } else {
        b""
    };

    let min_digits = match spec.precision {
        Precision::Fixed(p) => p,
        _ => 1,
    };
    let mut zeros = min_digits.saturating_sub(digit_count);

    let prefix: &[u8] = match spec.conversion {
        // '#' on octal forces the first digit to be 0.
        b'o' if spec.flags.alt_form && zeros == 0 && digit_slice.first() != Some(&b'0') => b"0",
        b'x' if spec.flags.alt_form && magnitude != 0 => b"0x",
        b'X' if spec.flags.alt_form && magnitude != 0 => b"0X",
        _ => b"",
    };

    let content = sign.len() + prefix.len() + zeros + digit_count;
    let mut fill = resolve_width(spec).saturating_sub(content);
    // The '0' flag is ignored once a precision is given.
    if spec.flags.zero_pad && spec.precision == Precision::None {
        zeros += fill;
        fill = 0;
    }

    if !spec.flags.left_justify {
        pad(buf, b' ', fill);
    }
    buf.extend_from_slice(sign);
    buf.extend_from_slice(prefix);
    pad(buf, b'0', zeros);
    buf.extend_from_slice(digit_slice);
    if spec.flags.left_justify {
        pad(buf, b' ', fill);
    }
}

/// Render a floating-point value to `buf` according to `spec`.
///
/// Supports `%f`/`%F`, `%e`/`%E`, and `%g`/`%G`. Digit generation goes
/// through Rust's exact decimal formatting; width, sign and flag handling
/// follow POSIX.
pub fn format_float(value: f64, spec: &FormatSpec, buf: &mut Vec<u8>) {
    let precision = match spec.precision {
        Precision::Fixed(p) => p,
        _ => 6,
    };
    let uppercase = spec.conversion.is_ascii_uppercase();
    let negative = value.is_sign_negative();

    let sign: &[u8] = if negative {
        b"-"
    } else if spec.flags.force_sign {
        b"+"
    } else if spec.flags.space_sign {
        b" "
    } else {
        b""
    };

    let finite = value.is_finite();
    let hex = spec.conversion | 0x20 == b'a';
    let prefix: &[u8] = match (hex && finite, uppercase) {
        (false, _) => b"",
        (true, false) => b"0x",
        (true, true) => b"0X",
    };
    let body = if value.is_nan() {
        String::from(if uppercase { "NAN" } else { "nan" })
    } else if value.is_infinite() {
        String::from(if uppercase { "INF" } else { "inf" })
    } else {
        let abs = value.abs();
        match spec.conversion | 0x20 {
            b'e' => format_e(abs, precision, uppercase, spec.flags.alt_form),
            b'g' => format_g(abs, precision, uppercase, spec.flags.alt_form),
            b'a' => {
                let digits = match spec.precision {
                    Precision::Fixed(p) => Some(p),
                    _ => None,
                };
                format_a(abs, digits, uppercase, spec.flags.alt_form)
            }
            _ => format_f(abs, precision, spec.flags.alt_form),
        }
    };

    let content = sign.len() + prefix.len() + body.len();
    let fill = resolve_width(spec).saturating_sub(content);
    // Zero padding never applies to inf/nan.
    let zero_fill = spec.flags.zero_pad && finite;

    if !spec.flags.left_justify && !zero_fill {
        pad(buf, b' ', fill);
    }
    buf.extend_from_slice(sign);
    buf.extend_from_slice(prefix);
    if !spec.flags.left_justify && zero_fill {
        pad(buf, b'0', fill);
    }
    buf.extend_from_slice(body.as_bytes());
    if spec.flags.left_justify {
        pad(buf, b' ', fill);
    }
}

/// Render a string argument to `buf` according to `spec`.
///
/// Precision truncates the string if set.
pub fn format_str(s: &[u8], spec: &FormatSpec, buf: &mut Vec<u8>) {
    let max_len = match spec.precision {
        Precision::Fixed(p) => p,
        _ => s.len(),
    };
    let effective = &s[..s.len().min(max_len)];
    pad_around(effective, spec, buf);
}

/// Render a character to `buf` according to `spec`.
pub fn format_char(c: u8, spec: &FormatSpec, buf: &mut Vec<u8>) {
    pad_around(&[c], spec, buf);
}

/// Render a pointer to `buf` as `0x...` hex, or `(nil)` for null.
pub fn format_pointer(addr: usize, spec: &FormatSpec, buf: &mut Vec<u8>) {
    if addr == 0 {
        pad_around(b"(nil)", spec, buf);
        return;
    }
    let mut digits = [0u8; 64];
    let count = render_digits(addr as u64, 16, false, &mut digits);
    let mut text = Vec::with_capacity(2 + count);
    text.extend_from_slice(b"0x");
    text.extend_from_slice(&digits[64 - count..]);
    pad_around(&text, spec, buf);
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn until_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(n) => &bytes[..n],
        None => bytes,
    }
}

fn resolve_width(spec: &FormatSpec) -> usize {
    match spec.width {
        Width::Fixed(w) => w,
        _ => 0,
    }
}

fn int_base(conversion: u8) -> (u64, bool) {
    match conversion {
        b'o' => (8, false),
        b'x' => (16, false),
        b'X' => (16, true),
        _ => (10, false),
    }
}

/// Render `value` in the given `base` into the END of `buf`.
/// Returns the number of digits written.
fn render_digits(mut value: u64, base: u64, uppercase: bool, buf: &mut [u8; 64]) -> usize {
    if value == 0 {
        buf[63] = b'0';
        return 1;
    }
    let alpha = if uppercase { b'A' } else { b'a' };
    let mut pos = 64;
    while value > 0 {
        pos -= 1;
        let digit = (value % base) as u8;
        buf[pos] = if digit < 10 {
            b'0' + digit
        } else {
            alpha + (digit - 10)
        };
        value /= base;
    }
    64 - pos
}

fn pad(buf: &mut Vec<u8>, byte: u8, count: usize) {
    buf.resize(buf.len() + count, byte);
}

/// Emit `text` space-padded to the field width.
fn pad_around(text: &[u8], spec: &FormatSpec, buf: &mut Vec<u8>) {
    let fill = resolve_width(spec).saturating_sub(text.len());
    if !spec.flags.left_justify {
        pad(buf, b' ', fill);
    }
    buf.extend_from_slice(text);
    if spec.flags.left_justify {
        pad(buf, b' ', fill);
    }
}

/// `%f` / `%F`: fixed-point decimal.
fn format_f(value: f64, precision: usize, alt_form: bool) -> String {
    let mut s = format!("{value:.precision$}");
    if alt_form && precision == 0 {
        s.push('.');
    }
    s
}

/// `%e` / `%E`: d.ddde±XX with at least two exponent digits.
fn format_e(value: f64, precision: usize, uppercase: bool, alt_form: bool) -> String {
    let (mantissa, exp) = split_scientific(value, precision);
    let mut s = mantissa;
    if alt_form && precision == 0 {
        s.push('.');
    }
    s.push(if uppercase { 'E' } else { 'e' });
    s.push(if exp < 0 { '-' } else { '+' });
    s.push_str(&format!("{:02}", exp.unsigned_abs()));
    s
}

/// `%g` / `%G`: `%e` when the exponent is below -4 or at least the
/// precision, `%f` otherwise; trailing zeros dropped unless '#'.
fn format_g(value: f64, precision: usize, uppercase: bool, alt_form: bool) -> String {
    let p = precision.max(1);
    // Exponent after rounding to p significant digits.
    let (_, exp) = split_scientific(value, p - 1);
    let p = i64::try_from(p).unwrap_or(i64::MAX);
    let mut s = if exp >= -4 && i64::from(exp) < p {
        let frac_digits = usize::try_from(p - 1 - i64::from(exp)).unwrap_or(0);
        format_f(value, frac_digits, alt_form)
    } else {
        format_e(value, usize::try_from(p - 1).unwrap_or(0), uppercase, alt_form)
    };
    if !alt_form {
        strip_trailing_zeros(&mut s);
    }
    s
}

/// `%a` / `%A` without the `0x` prefix: one hex digit before the point,
/// `digits` after it (all significant ones when `None`), and a binary
/// exponent. Rounding is to nearest, ties to even.
fn format_a(value: f64, digits: Option<usize>, uppercase: bool, alt_form: bool) -> String {
    const FRACTION_DIGITS: usize = 13;
    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    let (lead, exp) = match (biased, fraction) {
        (0, 0) => (0u64, 0),
        (0, _) => (0, -1022),
        _ => (1, biased - 1023),
    };

    let mut significand = (lead << 52) | fraction;
    let kept = match digits {
        Some(p) if p < FRACTION_DIGITS => {
            let shift = 4 * (FRACTION_DIGITS - p) as u32;
            let rest = significand & ((1u64 << shift) - 1);
            let half = 1u64 << (shift - 1);
            significand >>= shift;
            if rest > half || (rest == half && significand & 1 == 1) {
                significand += 1;
            }
            p
        }
        _ => FRACTION_DIGITS,
    };

    let shift = 4 * kept as u32;
    let mut frac = if kept == 0 {
        String::new()
    } else {
        format!("{:0kept$x}", significand & ((1u64 << shift) - 1))
    };
    match digits {
        None => frac.truncate(frac.trim_end_matches('0').len()),
        Some(p) if p > FRACTION_DIGITS => frac.extend(std::iter::repeat_n('0', p - FRACTION_DIGITS)),
        Some(_) => {}
    }

    let mut out = format!("{:x}", significand >> shift);
    if !frac.is_empty() || alt_form {
        out.push('.');
    }
    out.push_str(&frac);
    out.push_str(&format!("p{exp:+}"));
    if uppercase {
        out.make_ascii_uppercase();
    }
    out
}

/// Rust renders `{:.2e}` as `1.23e4`; split that into mantissa and exponent.
fn split_scientific(value: f64, precision: usize) -> (String, i32) {
    let rendered = format!("{value:.precision$e}");
    match rendered.split_once('e') {
        Some((mantissa, exp)) => (mantissa.to_string(), exp.parse().unwrap_or(0)),
        None => (rendered, 0),
    }
}

/// Remove trailing zeros after the decimal point, keeping any exponent.
fn strip_trailing_zeros(s: &mut String) {
    let exp_at = s.find(['e', 'E']).unwrap_or(s.len());
    let (mantissa, exponent) = s.split_at(exp_at);
    if !mantissa.contains('.') {
        return;
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    *s = format!("{trimmed}{exponent}");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(conversion: u8) -> FormatSpec {
        FormatSpec {
            flags: FormatFlags::default(),
            width: Width::None,
            precision: Precision::None,
            length: LengthMod::None,
            conversion,
        }
    }

    fn sprintf(fmt: &str, args: &[Arg<'_>]) -> String {
        let mut out = Vec::new();
        let n = render(fmt.as_bytes(), args, &mut out).unwrap();
        assert_eq!(n, out.len());
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_simple_int() {
        let (spec, consumed) = parse_directive(b"d").unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(spec.conversion, b'd');
        assert_eq!(spec.width, Width::None);
        assert_eq!(spec.precision, Precision::None);
    }

    #[test]
    fn test_parse_width_precision() {
        let (spec, consumed) = parse_directive(b"10.5f").unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(spec.width, Width::Fixed(10));
        assert_eq!(spec.precision, Precision::Fixed(5));
    }

    #[test]
    fn test_parse_flags() {
        let (spec, _) = parse_directive(b"-+#010d").unwrap();
        assert!(spec.flags.left_justify);
        assert!(spec.flags.force_sign);
        assert!(spec.flags.alt_form);
        assert!(!spec.flags.zero_pad);
    }

    #[test]
    fn test_parse_length_modifiers() {
        assert_eq!(parse_directive(b"hhd").unwrap().0.length, LengthMod::Hh);
        assert_eq!(parse_directive(b"hd").unwrap().0.length, LengthMod::H);
        assert_eq!(parse_directive(b"llu").unwrap().0.length, LengthMod::Ll);
        assert_eq!(parse_directive(b"zu").unwrap().0.length, LengthMod::Z);
        assert_eq!(parse_directive(b"Lf").unwrap().0.length, LengthMod::BigL);
    }

    #[test]
    fn test_parse_star_width_and_precision() {
        let (spec, _) = parse_directive(b"*.*f").unwrap();
        assert_eq!(spec.width, Width::FromArg);
        assert_eq!(spec.precision, Precision::FromArg);
    }

    #[test]
    fn test_parse_rejects_unknown_conversion() {
        assert!(parse_directive(b"k").is_none());
        assert!(parse_directive(b"10").is_none());
    }

    #[test]
    fn test_segments_split_literals_and_directives() {
        let segs: Vec<_> = segments(b"a=%d, b=%s%%").collect();
        assert_eq!(segs.len(), 5);
        assert_eq!(segs[0], Segment::Literal(b"a="));
        assert!(matches!(segs[1], Segment::Directive(_)));
        assert_eq!(segs[2], Segment::Literal(b", b="));
        assert_eq!(segs[4], Segment::Percent);
        let bad: Vec<_> = segments(b"%k%").collect();
        assert_eq!(bad, [Segment::Literal(b"%"), Segment::Literal(b"k"), Segment::Literal(b"%")]);
    }

    #[test]
    fn test_parse_malformed_directive_is_literal() {
        assert_eq!(sprintf("100%k", &[]), "100%k");
        assert_eq!(sprintf("50%", &[]), "50%");
    }

    #[test]
    fn test_format_signed_basic() {
        let mut buf = Vec::new();
        format_signed(42, &spec(b'd'), &mut buf);
        assert_eq!(buf, b"42");
    }

    #[test]
    fn test_format_signed_width_and_flags() {
        assert_eq!(sprintf("[%5d]", &[Arg::Int(-42)]), "[  -42]");
        assert_eq!(sprintf("[%-5d]", &[Arg::Int(42)]), "[42   ]");
        assert_eq!(sprintf("[%05d]", &[Arg::Int(-42)]), "[-0042]");
        assert_eq!(sprintf("[%+d]", &[Arg::Int(7)]), "[+7]");
        assert_eq!(sprintf("[% d]", &[Arg::Int(7)]), "[ 7]");
    }

    #[test]
    fn test_zero_flag_ignored_with_precision() {
        assert_eq!(sprintf("[%08.3d]", &[Arg::Int(5)]), "[     005]");
    }

    #[test]
    fn test_precision_zero_int() {
        assert_eq!(sprintf("[%.0d]", &[Arg::Int(0)]), "[]");
        assert_eq!(sprintf("[%#.0o]", &[Arg::Uint(0)]), "[0]");
    }

    #[test]
    fn test_i64_min() {
        let mut buf = Vec::new();
        format_signed(i64::MIN, &spec(b'd'), &mut buf);
        assert_eq!(buf, b"-9223372036854775808");
    }

    #[test]
    fn test_unsigned_bases() {
        assert_eq!(sprintf("%x %X %o", &[255u32.into(), 255u32.into(), 8u32.into()]), "ff FF 10");
        assert_eq!(sprintf("%#x %#X %#o", &[255u32.into(), 255u32.into(), 8u32.into()]), "0xff 0XFF 010");
        assert_eq!(sprintf("%#x", &[Arg::Uint(0)]), "0");
        assert_eq!(sprintf("%#.3o", &[Arg::Uint(8)]), "010");
    }

    #[test]
    fn test_unsigned_ignores_sign_flags() {
        assert_eq!(sprintf("%+u", &[Arg::Uint(3)]), "3");
    }

    #[test]
    fn test_narrowing_length_modifiers() {
        assert_eq!(sprintf("%hhd", &[Arg::Int(300)]), "44");
        assert_eq!(sprintf("%hd", &[Arg::Int(70000)]), "4464");
        assert_eq!(sprintf("%hhu", &[Arg::Int(-1)]), "255");
        assert_eq!(sprintf("%ld", &[Arg::Int(1 << 40)]), "1099511627776");
        assert_eq!(sprintf("%d", &[Arg::Int(1 << 40)]), "1099511627776");
    }

    #[test]
    fn test_signed_reinterprets_unsigned() {
        assert_eq!(sprintf("%d", &[Arg::Uint(u64::MAX)]), "-1");
        assert_eq!(sprintf("%u", &[Arg::Int(-1)]), "18446744073709551615");
    }

    #[test]
    fn test_format_str() {
        assert_eq!(sprintf("[%s]", &["hello".into()]), "[hello]");
        assert_eq!(sprintf("[%.3s]", &["hello".into()]), "[hel]");
        assert_eq!(sprintf("[%7s]", &["hi".into()]), "[     hi]");
        assert_eq!(sprintf("[%-4s]", &["hi".into()]), "[hi  ]");
        assert_eq!(sprintf("[%s]", &[Arg::Str(b"ab\0cd")]), "[ab]");
    }

    #[test]
    fn test_format_char() {
        assert_eq!(sprintf("%c%c", &[Arg::Char(b'o'), Arg::Int(i64::from(b'k'))]), "ok");
        assert_eq!(sprintf("[%3c]", &[Arg::Char(b'x')]), "[  x]");
    }

    #[test]
    fn test_format_pointer() {
        assert_eq!(sprintf("%p", &[Arg::Ptr(0)]), "(nil)");
        assert_eq!(sprintf("%p", &[Arg::Ptr(0xdead)]), "0xdead");
        assert_eq!(sprintf("[%8p]", &[Arg::Ptr(0xbeef)]), "[  0xbeef]");
    }

    #[test]
    fn test_format_float_fixed() {
        assert_eq!(sprintf("%f", &[Arg::Float(3.5)]), "3.500000");
        assert_eq!(sprintf("%.2f", &[Arg::Float(-2.5)]), "-2.50");
        assert_eq!(sprintf("%.0f", &[Arg::Float(2.7)]), "3");
        assert_eq!(sprintf("%#.0f", &[Arg::Float(2.0)]), "2.");
        assert_eq!(sprintf("[%08.2f]", &[Arg::Float(-1.5)]), "[-0001.50]");
    }

    #[test]
    fn test_format_float_exponent() {
        assert_eq!(sprintf("%e", &[Arg::Float(1234.5)]), "1.234500e+03");
        assert_eq!(sprintf("%.2E", &[Arg::Float(0.000123)]), "1.23E-04");
        assert_eq!(sprintf("%.1e", &[Arg::Float(9.96)]), "1.0e+01");
        assert_eq!(sprintf("%e", &[Arg::Float(0.0)]), "0.000000e+00");
    }

    #[test]
    fn test_format_float_general() {
        assert_eq!(sprintf("%g", &[Arg::Float(100000.0)]), "100000");
        assert_eq!(sprintf("%g", &[Arg::Float(1000000.0)]), "1e+06");
        assert_eq!(sprintf("%g", &[Arg::Float(0.0001)]), "0.0001");
        assert_eq!(sprintf("%g", &[Arg::Float(0.00001)]), "1e-05");
        assert_eq!(sprintf("%g", &[Arg::Float(3.5)]), "3.5");
        assert_eq!(sprintf("%g", &[Arg::Float(0.0)]), "0");
        assert_eq!(sprintf("%#g", &[Arg::Float(1.0)]), "1.00000");
        assert_eq!(sprintf("%G", &[Arg::Float(1.5e-10)]), "1.5E-10");
    }

    #[test]
    fn test_format_float_special() {
        assert_eq!(sprintf("%f", &[Arg::Float(f64::NAN)]), "nan");
        assert_eq!(sprintf("%F", &[Arg::Float(f64::INFINITY)]), "INF");
        assert_eq!(sprintf("%f", &[Arg::Float(f64::NEG_INFINITY)]), "-inf");
        assert_eq!(sprintf("%+f", &[Arg::Float(f64::INFINITY)]), "+inf");
        assert_eq!(sprintf("[%06f]", &[Arg::Float(f64::INFINITY)]), "[   inf]");
    }

    #[test]
    fn test_star_width_and_precision() {
        assert_eq!(sprintf("[%*d]", &[Arg::Int(4), Arg::Int(7)]), "[   7]");
        assert_eq!(sprintf("[%*d]", &[Arg::Int(-4), Arg::Int(7)]), "[7   ]");
        assert_eq!(sprintf("[%.*f]", &[Arg::Int(1), Arg::Float(2.24)]), "[2.2]");
        assert_eq!(sprintf("[%.*s]", &[Arg::Int(-1), "abc".into()]), "[abc]");
    }

    #[test]
    fn test_missing_and_mismatched_arguments() {
        let mut out = Vec::new();
        assert_eq!(
            render(b"%d %d", &[Arg::Int(1)], &mut out),
            Err(FormatError::MissingArgument { conversion: 'd' })
        );
        assert_eq!(
            render(b"%s", &[Arg::Int(1)], &mut Vec::new()),
            Err(FormatError::ArgumentType { index: 0, conversion: 's' })
        );
        assert_eq!(
            render(b"%f", &[Arg::Int(1)], &mut Vec::new()),
            Err(FormatError::ArgumentType { index: 0, conversion: 'f' })
        );
    }

    #[test]
    fn test_hex_float() {
        assert_eq!(sprintf("%a", &[Arg::Float(1.0)]), "0x1p+0");
        assert_eq!(sprintf("%a", &[Arg::Float(3.5)]), "0x1.cp+1");
        assert_eq!(sprintf("%a", &[Arg::Float(0.1)]), "0x1.999999999999ap-4");
        assert_eq!(sprintf("%A", &[Arg::Float(-0.5)]), "-0X1P-1");
        assert_eq!(sprintf("%a", &[Arg::Float(0.0)]), "0x0p+0");
        assert_eq!(sprintf("%a", &[Arg::Float(f64::from_bits(1))]), "0x0.0000000000001p-1022");
        assert_eq!(sprintf("%#a", &[Arg::Float(1.0)]), "0x1.p+0");
    }

    #[test]
    fn test_hex_float_precision_and_padding() {
        assert_eq!(sprintf("%.1a", &[Arg::Float(1.0)]), "0x1.0p+0");
        assert_eq!(sprintf("%.0a", &[Arg::Float(1.5)]), "0x2p+0");
        assert_eq!(sprintf("%.0a", &[Arg::Float(2.5)]), "0x1p+1");
        assert_eq!(sprintf("%.1a", &[Arg::Float(1.03125)]), "0x1.0p+0");
        assert_eq!(sprintf("%.1a", &[Arg::Float(1.09375)]), "0x1.2p+0");
        assert_eq!(sprintf("%.15a", &[Arg::Float(3.5)]), "0x1.c00000000000000p+1");
        assert_eq!(sprintf("%012a", &[Arg::Float(-1.0)]), "-0x000001p+0");
        assert_eq!(sprintf("%-9a|", &[Arg::Float(1.0)]), "0x1p+0   |");
        assert_eq!(sprintf("%08a", &[Arg::Float(f64::INFINITY)]), "     inf");
    }

    #[test]
    fn test_percent_n_refused() {
        assert_eq!(
            render(b"abc%n", &[Arg::Ptr(0x1000)], &mut Vec::new()),
            Err(FormatError::Unsupported { conversion: 'n' })
        );
    }

    #[test]
    fn test_huge_width_rejected() {
        assert_eq!(
            render(b"%99999999999d", &[Arg::Int(1)], &mut Vec::new()),
            Err(FormatError::FieldOverflow { conversion: 'd' })
        );
    }

    #[test]
    fn test_format_stops_at_nul() {
        assert_eq!(sprintf("ab\0%d", &[]), "ab");
    }

    #[test]
    fn test_extra_arguments_ignored() {
        assert_eq!(sprintf("x", &[Arg::Int(1)]), "x");
    }

    #[test]
    fn test_format_bounded_truncates_and_terminates() {
        let mut dst = [0xAAu8; 4];
        let n = format_bounded(&mut dst, b"hello", &[]).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&dst, b"hel\0");
    }

    #[test]
    fn test_format_bounded_sizing_probe() {
        let mut one = [0xAAu8; 1];
        let n = format_bounded(&mut one, b"%d-%s", &[Arg::Int(12), "ab".into()]).unwrap();
        assert_eq!(n, 5);
        assert_eq!(one, [0]);

        let mut none: [u8; 0] = [];
        assert_eq!(format_bounded(&mut none, b"abc", &[]).unwrap(), 3);
    }

    #[test]
    fn test_arg_conversions() {
        assert_eq!(Arg::from(-3i8), Arg::Int(-3));
        assert_eq!(Arg::from(7usize), Arg::Uint(7));
        assert_eq!(Arg::from(1.5f32), Arg::Float(1.5));
        assert_eq!(Arg::from(c"hi"), Arg::Str(b"hi"));
        assert_eq!(Arg::from(b"raw"), Arg::Str(b"raw"));
        let owned = String::from("s");
        assert_eq!(Arg::from(&owned), Arg::Str(b"s"));
        assert_eq!(Arg::from(std::ptr::null::<u8>()), Arg::Ptr(0));
    }
}
