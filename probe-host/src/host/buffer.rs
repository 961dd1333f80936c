/// Copies `value` into `buffer` as a NUL terminated string and returns the size
/// of the buffer needed to hold all of it, terminator included.
///
/// Without a buffer (or with an empty one) nothing is copied, so a caller can
/// first ask for the size, and then call again with a buffer of that size.
/// A buffer which is too small receives a truncated, still terminated string.
pub fn fill_string_buffer(value: &str, buffer: Option<&mut [u8]>) -> usize {
    let bytes = value.as_bytes();
    let needed = bytes.len() + 1;

    if let Some(buffer) = buffer.filter(|buffer| !buffer.is_empty()) {
        let copied = needed.min(buffer.len()) - 1;
        buffer[..copied].copy_from_slice(&bytes[..copied]);
        buffer[copied] = 0;
    }

    needed
}

#[cfg(test)]
mod test {
    use super::fill_string_buffer;

    #[test]
    fn size_query() {
        assert_eq!(fill_string_buffer("stm32f407vgtx", None), 14);
        assert_eq!(fill_string_buffer("", None), 1);
        assert_eq!(fill_string_buffer("abc", Some(&mut [])), 4);
    }

    #[test]
    fn two_calls() {
        let needed = fill_string_buffer("0.3.0", None);
        let mut buffer = vec![0xaa; needed];

        assert_eq!(fill_string_buffer("0.3.0", Some(&mut buffer)), needed);
        assert_eq!(buffer, b"0.3.0\0");
    }

    #[test]
    fn truncated() {
        let mut buffer = [0xaa; 4];

        assert_eq!(fill_string_buffer("programming", Some(&mut buffer)), 12);
        assert_eq!(&buffer, b"pro\0");
    }
}
