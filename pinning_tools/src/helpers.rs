use blake2::{Blake2b512, Digest};

/// Derives the content id for a blob of media bytes. The id is a Blake2b-512 hash of the bytes, hex encoded
/// with a `b2-` prefix. Identical bytes always produce the same id, which is what makes pinning idempotent.
pub fn content_id(bytes: &[u8]) -> String {
    let hash = Blake2b512::digest(bytes);
    format!("b2-{}", hex::encode(hash))
}

#[cfg(test)]
mod test {
    use super::content_id;

    #[test]
    fn content_id_is_deterministic() {
        let a = content_id(b"crop photo bytes");
        let b = content_id(b"crop photo bytes");
        assert_eq!(a, b);
        assert!(a.starts_with("b2-"));
        // 512-bit digest, hex encoded
        assert_eq!(a.len(), 3 + 128);
    }

    #[test]
    fn different_bytes_get_different_ids() {
        assert_ne!(content_id(b"field_1.jpg"), content_id(b"field_2.jpg"));
    }
}
