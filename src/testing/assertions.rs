//! Assertions over length-encoded record streams.

use std::io;

/// Decode a concatenation of length-encoded records (as written by
/// [`encode_record`](crate::pipeline::encode_record)).
///
/// # Errors
///
/// Returns [`io::ErrorKind::InvalidData`] if the bytes end mid-record, a
/// length is negative, or a field is not UTF-8.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use jobflow::pipeline::encode_record;
/// use jobflow::testing::decode_records;
///
/// let mut buf = BytesMut::new();
/// encode_record(&["a", "b"], &mut buf).unwrap();
/// assert_eq!(decode_records(&buf).unwrap(), vec![vec!["a", "b"]]);
/// ```
pub fn decode_records(mut bytes: &[u8]) -> io::Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    while !bytes.is_empty() {
        let count = take_len(&mut bytes)?;
        let mut fields = Vec::with_capacity(count);
        for _ in 0..count {
            let len = take_len(&mut bytes)?;
            let field = take(&mut bytes, len)?;
            let field = String::from_utf8(field.to_vec())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            fields.push(field);
        }
        records.push(fields);
    }
    Ok(records)
}

fn take<'a>(bytes: &mut &'a [u8], n: usize) -> io::Result<&'a [u8]> {
    if bytes.len() < n {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("record truncated: wanted {n} bytes, {} left", bytes.len()),
        ));
    }
    let (head, tail) = bytes.split_at(n);
    *bytes = tail;
    Ok(head)
}

fn take_len(bytes: &mut &[u8]) -> io::Result<usize> {
    let raw = take(bytes, 4)?;
    let len = i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]);
    usize::try_from(len)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, format!("negative length {len}")))
}

/// Assert that `bytes` holds exactly the `expected` records, in order.
///
/// # Panics
///
/// Panics if the bytes do not decode or the records differ.
pub fn assert_records_equal<S: AsRef<str>>(bytes: &[u8], expected: &[Vec<S>]) {
    let actual = decode_records(bytes).expect("Failed to decode length-encoded records");
    let expected: Vec<Vec<&str>> = expected
        .iter()
        .map(|r| r.iter().map(AsRef::as_ref).collect())
        .collect();

    assert_eq!(
        actual.len(),
        expected.len(),
        "Record count mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(a, e, "Record mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}");
    }
}
