use anyhow::Result;
use jobflow::decoder::StreamingResultDecoder;
use jobflow::error::DecodeError;
use jobflow::result::{ResultKind, WorkerResult};
use jobflow::testing::{ChunkedReader, mock_result_stream};
use serde_json::{Value, json};

const STREAM: &[u8] = b"{\"bucket\":{\"time\":1}}\n{\"quantiles\":{\"quantile_state\":\"q\"}}\n[1,2,3]\n\"text with \\n escape\"\n{\"flush\":{\"id\":\"7\"}}\n";

fn expected() -> Vec<Value> {
    vec![
        json!({"bucket": {"time": 1}}),
        json!({"quantiles": {"quantile_state": "q"}}),
        json!([1, 2, 3]),
        json!("text with \n escape"),
        json!({"flush": {"id": "7"}}),
    ]
}

fn decode_all<R: std::io::Read>(reader: R) -> Result<Vec<Value>> {
    let decoder: StreamingResultDecoder<R> = StreamingResultDecoder::new(reader);
    Ok(decoder.collect::<Result<Vec<_>, _>>()?)
}

#[test]
fn every_two_way_split_decodes_the_same() -> Result<()> {
    for split in 0..=STREAM.len() {
        let mut decoder: StreamingResultDecoder<_> = StreamingResultDecoder::push();
        let mut docs = decoder.decode_chunk(&STREAM[..split])?;
        docs.extend(decoder.decode_chunk(&STREAM[split..])?);
        assert_eq!(docs, expected(), "split at {split}");
        assert_eq!(decoder.pending_len(), 0);
    }
    Ok(())
}

#[test]
fn any_chunk_size_decodes_the_same() -> Result<()> {
    for size in 1..=9 {
        let docs = decode_all(ChunkedReader::fixed(STREAM.to_vec(), size))?;
        assert_eq!(docs, expected(), "chunk size {size}");
    }
    let docs = decode_all(ChunkedReader::new(STREAM.to_vec(), vec![3, 40, 1, 1, 17]))?;
    assert_eq!(docs, expected());
    Ok(())
}

#[test]
fn interrupted_reads_are_retried() -> Result<()> {
    let reader = ChunkedReader::fixed(STREAM.to_vec(), 5).interrupting();
    assert_eq!(decode_all(reader)?, expected());
    Ok(())
}

#[test]
fn incomplete_document_stays_pending() -> Result<()> {
    let mut decoder: StreamingResultDecoder<_> = StreamingResultDecoder::push();
    assert!(decoder.decode_chunk(b"{\"a\":")?.is_empty());
    assert_eq!(decoder.pending_len(), 5);

    let docs = decoder.decode_chunk(b"1}\n{\"b\"")?;
    assert_eq!(docs, vec![json!({"a": 1})]);
    assert_eq!(decoder.pending_len(), 4);
    Ok(())
}

#[test]
fn unterminated_tail_is_discarded_at_end_of_stream() -> Result<()> {
    let docs = decode_all(&b"{\"a\":1}\n{\"b\":2}"[..])?;
    assert_eq!(docs, vec![json!({"a": 1})]);
    Ok(())
}

#[test]
fn blank_spans_are_skipped() -> Result<()> {
    let docs = decode_all(&b"\n  \n{\"a\":1}\n\t\n{\"b\":2}\n\n"[..])?;
    assert_eq!(docs, vec![json!({"a": 1}), json!({"b": 2})]);
    Ok(())
}

#[test]
fn custom_separator() -> Result<()> {
    let mut decoder: StreamingResultDecoder<_> =
        StreamingResultDecoder::with_separator(std::io::empty(), 0);
    let docs = decoder.decode_chunk(b"{\"a\":\n1}\0{\"b\":2}\0")?;
    assert_eq!(docs, vec![json!({"a": 1}), json!({"b": 2})]);
    Ok(())
}

#[test]
fn malformed_document_ends_the_stream() {
    let mut decoder: StreamingResultDecoder<_> =
        StreamingResultDecoder::new(&b"{\"a\":1}\nnot json\n{\"c\":3}\n"[..]);

    assert_eq!(decoder.next().unwrap().unwrap(), json!({"a": 1}));
    match decoder.next() {
        Some(Err(DecodeError::Json { offset, .. })) => assert_eq!(offset, 8),
        other => panic!("expected a JSON error, got {other:?}"),
    }
    assert!(decoder.next().is_none());
    assert!(decoder.next().is_none());
}

#[test]
fn malformed_chunk_reports_offset_across_chunks() -> Result<()> {
    let mut decoder: StreamingResultDecoder<_> = StreamingResultDecoder::push();
    decoder.decode_chunk(b"{\"a\":1}\n{\"b\"")?;
    let err = decoder.decode_chunk(b":}\n").unwrap_err();
    assert!(matches!(err, DecodeError::Json { offset: 8, .. }), "got {err}");
    Ok(())
}

#[test]
fn malformed_chunk_keeps_the_documents_before_it() -> Result<()> {
    let mut decoder: StreamingResultDecoder<_> = StreamingResultDecoder::push();
    let err = decoder
        .decode_chunk(b"{\"a\":1}\n{\"b\":2}\nbad\n{\"c\":3}\n")
        .unwrap_err();
    assert!(matches!(err, DecodeError::Json { offset: 16, .. }), "got {err}");

    let docs = decoder.decode_chunk(b"")?;
    assert_eq!(docs, vec![json!({"a": 1}), json!({"b": 2}), json!({"c": 3})]);
    assert_eq!(decoder.pending_len(), 0);
    Ok(())
}

#[test]
fn read_errors_are_surfaced() {
    struct Broken;
    impl std::io::Read for Broken {
        fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("pipe closed"))
        }
    }

    let mut decoder: StreamingResultDecoder<_> = StreamingResultDecoder::new(Broken);
    assert!(matches!(decoder.next(), Some(Err(DecodeError::Io(_)))));
    assert!(decoder.next().is_none());
}

#[test]
fn typed_worker_results() -> Result<()> {
    let decoder: StreamingResultDecoder<_, WorkerResult> =
        StreamingResultDecoder::new(&b"{\"bucket\":{\"time\":1},\"records\":[]}\n{\"flush\":{\"id\":\"f\"}}\n{\"unknown\":1}\n"[..]);
    let results = decoder.collect::<Result<Vec<_>, _>>()?;

    assert_eq!(
        results[0].kinds(),
        vec![ResultKind::Bucket, ResultKind::Records]
    );
    assert_eq!(results[1].flush.as_ref().map(|f| f.id.as_str()), Some("f"));
    assert!(results[2].is_empty());
    Ok(())
}

#[test]
fn for_each_document_over_a_file() -> Result<()> {
    let docs = vec![json!({"quantiles": {"quantile_state": "a", "timestamp": 5}}); 3];
    let stream = mock_result_stream(&docs, b'\n')?;

    let mut decoder: StreamingResultDecoder<_, WorkerResult> =
        StreamingResultDecoder::new(stream.open()?);
    let mut timestamps = Vec::new();
    decoder.for_each_document(|doc| {
        timestamps.push(doc.quantiles.and_then(|q| q.timestamp));
    })?;

    assert_eq!(timestamps, vec![Some(5); 3]);
    Ok(())
}
