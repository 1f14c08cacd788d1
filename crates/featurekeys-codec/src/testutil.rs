//! Fixtures shared by the codec tests

/// Key captured from a live online store: `id_business_id` = 26546 in
/// project `instawork_feature_store`
pub const SAMPLE_KEY: &[u8] = b"\x01\x00\x00\x00\x02\x00\x00\x00\x0e\x00\x00\x00id_business_id\x04\x00\x00\x00\x08\x00\x00\x00\xb2g\x00\x00\x00\x00\x00\x00instawork_feature_store";

/// u32 length prefix followed by the column name
pub fn marker(column: &str) -> Vec<u8> {
    let mut out = u32::try_from(column.len()).unwrap().to_le_bytes().to_vec();
    out.extend_from_slice(column.as_bytes());
    out
}
