use bytes::{BufMut, BytesMut};

/// Default message delimiter: newline.
pub const DEFAULT_DELIMITER: u8 = b'\n';

/// Encode a message into its wire form: the payload followed by one delimiter.
///
/// The payload is not inspected. If it contains `delimiter`, the receiving
/// side will see the message end at the first occurrence.
pub fn encode_message(payload: &[u8], delimiter: u8, dst: &mut BytesMut) {
    dst.reserve(payload.len() + 1);
    dst.put_slice(payload);
    dst.put_u8(delimiter);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReadBuffer;

    #[test]
    fn appends_single_delimiter() {
        let mut dst = BytesMut::new();
        encode_message(b"ping", b';', &mut dst);
        assert_eq!(dst.as_ref(), b"ping;");
    }

    #[test]
    fn empty_payload_is_just_the_delimiter() {
        let mut dst = BytesMut::new();
        encode_message(b"", b'\n', &mut dst);
        assert_eq!(dst.as_ref(), b"\n");
    }

    #[test]
    fn encoded_messages_decode_in_order() {
        let mut wire = BytesMut::new();
        encode_message(b"first", b';', &mut wire);
        encode_message(b"second", b';', &mut wire);

        let mut buf = ReadBuffer::new(b';');
        buf.extend_from_slice(&wire);

        assert_eq!(buf.take_message().unwrap().as_ref(), b"first");
        assert_eq!(buf.take_message().unwrap().as_ref(), b"second");
        assert!(buf.is_empty());
    }

    #[test]
    fn delimiter_inside_payload_truncates_on_decode() {
        let mut wire = BytesMut::new();
        encode_message(b"a;b", b';', &mut wire);

        let mut buf = ReadBuffer::new(b';');
        buf.extend_from_slice(&wire);

        assert_eq!(buf.take_message().unwrap().as_ref(), b"a");
        assert_eq!(buf.take_message().unwrap().as_ref(), b"b");
    }
}
