//! Error number definitions.
//!
//! Only the codes a stream operation can report are kept here. Values are the
//! Linux ones; the file backing passes host codes through untouched.

pub const EIO: i32 = 5;
pub const ENOMEM: i32 = 12;
pub const EINVAL: i32 = 22;
pub const ENOSPC: i32 = 28;
pub const EOVERFLOW: i32 = 75;

/// Short symbolic name for an errno value, used in logs and reports.
pub fn name(errno: i32) -> &'static str {
    match errno {
        0 => "0",
        EIO => "EIO",
        ENOMEM => "ENOMEM",
        EINVAL => "EINVAL",
        ENOSPC => "ENOSPC",
        EOVERFLOW => "EOVERFLOW",
        _ => "E?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(name(EINVAL), "EINVAL");
        assert_eq!(name(EOVERFLOW), "EOVERFLOW");
        assert_eq!(name(0), "0");
        assert_eq!(name(9999), "E?");
    }
}
