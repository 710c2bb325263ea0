//! # dag-pb Unwrapping
//!
//! Gateways sometimes return a single-block UnixFS file wrapped in dag-pb
//! instead of the raw bytes that were uploaded. Two nested protobuf records:
//!
//! - `PBNode`: field 2 `Links` (repeated), field 1 `Data` (bytes)
//! - UnixFS `Data`: field 1 `Type`, field 2 `Data` (file bytes), field 3 `filesize`
//!
//! Unwrapping never fails fatally; anything unexpected yields `None` and the
//! caller keeps the bytes as fetched.

/// UnixFS `Raw` node type.
const UNIXFS_RAW: u64 = 0;
/// UnixFS `File` node type.
const UNIXFS_FILE: u64 = 2;

fn read_varint(bytes: &[u8], pos: &mut usize) -> Option<u64> {
    let mut value: u64 = 0;
    for shift in (0..64).step_by(7) {
        let byte = *bytes.get(*pos)?;
        *pos += 1;
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

/// One decoded protobuf field.
enum FieldValue<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
}

/// Decode every top-level field of a protobuf message.
fn fields(bytes: &[u8]) -> Option<Vec<(u64, FieldValue<'_>)>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        let key = read_varint(bytes, &mut pos)?;
        let number = key >> 3;
        match key & 0x7 {
            0 => out.push((number, FieldValue::Varint(read_varint(bytes, &mut pos)?))),
            2 => {
                let len = usize::try_from(read_varint(bytes, &mut pos)?).ok()?;
                let end = pos.checked_add(len)?;
                out.push((number, FieldValue::Bytes(bytes.get(pos..end)?)));
                pos = end;
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Extract the file bytes of a single-block dag-pb/UnixFS node.
#[must_use]
pub fn unwrap(bytes: &[u8]) -> Option<Vec<u8>> {
    let outer = fields(bytes)?;
    let mut data = None;
    for (number, value) in &outer {
        match (number, value) {
            (1, FieldValue::Bytes(b)) => data = Some(*b),
            // Field 2 is Links: a multi-block file whose content is not in this block.
            _ => return None,
        }
    }

    let inner = fields(data?)?;
    let mut kind = None;
    let mut file = None;
    for (number, value) in inner {
        match (number, value) {
            (1, FieldValue::Varint(t)) => kind = Some(t),
            (2, FieldValue::Bytes(b)) => file = Some(b.to_vec()),
            _ => {}
        }
    }
    match kind {
        Some(UNIXFS_FILE | UNIXFS_RAW) => Some(file.unwrap_or_default()),
        _ => None,
    }
}

/// Bytes as a verifier should see them: JSON passes through, a wrapped block
/// is unwrapped, anything else is returned unchanged.
#[must_use]
pub fn unwrap_or_raw(bytes: Vec<u8>) -> (Vec<u8>, bool) {
    if serde_json::from_slice::<serde_json::Value>(&bytes).is_ok() {
        return (bytes, false);
    }
    match unwrap(&bytes) {
        Some(inner) => (inner, true),
        None => (bytes, false),
    }
}

fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn write_bytes_field(number: u64, bytes: &[u8], out: &mut Vec<u8>) {
    write_varint((number << 3) | 2, out);
    write_varint(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

/// Wrap bytes as a single-block UnixFS file node, the way a gateway would.
#[must_use]
pub fn wrap_file(file: &[u8]) -> Vec<u8> {
    let mut unixfs = Vec::new();
    write_varint(1 << 3, &mut unixfs);
    write_varint(UNIXFS_FILE, &mut unixfs);
    write_bytes_field(2, file, &mut unixfs);
    write_varint(3 << 3, &mut unixfs);
    write_varint(file.len() as u64, &mut unixfs);

    let mut node = Vec::new();
    write_bytes_field(1, &unixfs, &mut node);
    node
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwraps_wrapped_file() {
        let content = br#"{"a":1}"#;
        let wrapped = wrap_file(content);
        assert_eq!(unwrap(&wrapped).expect("unwrap"), content.to_vec());
    }

    #[test]
    fn unwrap_or_raw_passes_json_through() {
        let json = br#"{"a":1}"#.to_vec();
        assert_eq!(unwrap_or_raw(json.clone()), (json, false));
    }

    #[test]
    fn unwrap_or_raw_unwraps() {
        let (bytes, unwrapped) = unwrap_or_raw(wrap_file(b"[1]"));
        assert!(unwrapped);
        assert_eq!(bytes, b"[1]".to_vec());
    }

    #[test]
    fn garbage_falls_back() {
        assert!(unwrap(&[0xFF, 0xFF, 0xFF]).is_none());
        let garbage = vec![0x0A, 0x40, 0x01];
        assert_eq!(unwrap_or_raw(garbage.clone()), (garbage, false));
    }

    #[test]
    fn multi_block_nodes_are_not_unwrapped() {
        let mut node = Vec::new();
        write_bytes_field(2, b"link", &mut node);
        write_bytes_field(1, &[0x08, 0x02], &mut node);
        assert!(unwrap(&node).is_none());
    }

    #[test]
    fn large_content_varints() {
        let content = vec![b'x'; 300];
        assert_eq!(unwrap(&wrap_file(&content)).expect("unwrap"), content);
    }
}
