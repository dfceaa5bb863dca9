use anyhow::Result;
use jobflow::error::{ConfigError, TransformError};
use jobflow::record::{FieldRef, Record, RecordLayout};
use jobflow::transform::{
    ChainOutcome, Concat, Condition, DateFormatTransform, DoubleDateTransform, ExcludeFilterNumeric,
    ExcludeFilterRegex, FailurePolicy, Lowercase, Operator, RegexExtract, RegexSplit,
    TransformChain, TransformConfig, Trim, Uppercase, exclude_filter,
};
use jobflow::testing::RecordingSink;
use jobflow::{Transform, TransformOutcome};
use tracing::Span;

const IN: FieldRef = FieldRef::input(0);

fn record_with(value: &str, outputs: usize) -> Record {
    let mut record = Record::with_sizes(1, 0, outputs);
    record.load([value]);
    record
}

fn outputs(record: &Record) -> Vec<&str> {
    record
        .area(jobflow::Area::Output)
        .iter()
        .map(String::as_str)
        .collect()
}

// ---------- RegexExtract ----------

#[test]
fn extract_copies_groups_in_order() -> Result<()> {
    let t = RegexExtract::new(
        r"(\w+)-(\d+)",
        IN,
        vec![FieldRef::output(0), FieldRef::output(1)],
        Span::none(),
    )?;
    let mut record = record_with("id: abc-123", 2);

    assert_eq!(t.apply(&mut record)?, TransformOutcome::Ok);
    assert_eq!(outputs(&record), vec!["abc", "123"]);
    Ok(())
}

#[test]
fn extract_ignores_groups_beyond_writes() -> Result<()> {
    let t = RegexExtract::new(r"(a)(b)(c)", IN, vec![FieldRef::output(0)], Span::none())?;
    let mut record = record_with("abc", 1);

    assert_eq!(t.apply(&mut record)?, TransformOutcome::Ok);
    assert_eq!(outputs(&record), vec!["a"]);
    Ok(())
}

#[test]
fn extract_writes_empty_for_unmatched_optional_group() -> Result<()> {
    let t = RegexExtract::new(
        r"^(\w+)(?::(\d+))?$",
        IN,
        vec![FieldRef::output(0), FieldRef::output(1)],
        Span::none(),
    )?;
    let mut record = record_with("localhost", 2);
    record.set(FieldRef::output(1), "stale");

    assert_eq!(t.apply(&mut record)?, TransformOutcome::Ok);
    assert_eq!(outputs(&record), vec!["localhost", ""]);
    Ok(())
}

#[test]
fn extract_without_match_fails_and_leaves_outputs() -> Result<()> {
    let t = RegexExtract::new(
        r"(\d+)-(\d+)",
        IN,
        vec![FieldRef::output(0), FieldRef::output(1)],
        Span::none(),
    )?;
    let mut record = record_with("no digits here", 2);
    record.set(FieldRef::output(0), "keep-0");
    record.set(FieldRef::output(1), "keep-1");

    assert_eq!(t.apply(&mut record)?, TransformOutcome::Fail);
    assert_eq!(outputs(&record), vec!["keep-0", "keep-1"]);
    Ok(())
}

#[test]
fn extract_rejects_bad_pattern() {
    let err = RegexExtract::new("(unclosed", IN, vec![FieldRef::output(0)], Span::none())
        .err()
        .expect("pattern should not compile");
    assert!(matches!(err, ConfigError::InvalidRegex { ref pattern, .. } if pattern == "(unclosed"));
}

// ---------- RegexSplit ----------

#[test]
fn split_copies_as_many_parts_as_fit() -> Result<()> {
    let t = RegexSplit::new(
        ",",
        IN,
        vec![FieldRef::output(0), FieldRef::output(1)],
        Span::none(),
    )?;
    let mut record = record_with("a,b,c", 2);

    assert_eq!(t.apply(&mut record)?, TransformOutcome::Ok);
    assert_eq!(outputs(&record), vec!["a", "b"]);
    Ok(())
}

#[test]
fn split_drops_trailing_empty_parts() -> Result<()> {
    let t = RegexSplit::new(
        r"\s*,\s*",
        IN,
        vec![FieldRef::output(0), FieldRef::output(1), FieldRef::output(2)],
        Span::none(),
    )?;
    let mut record = record_with("x , y,,", 3);
    record.set(FieldRef::output(2), "untouched");

    assert_eq!(t.apply(&mut record)?, TransformOutcome::Ok);
    assert_eq!(outputs(&record), vec!["x", "y", "untouched"]);
    Ok(())
}

// ---------- Exclude filters ----------

fn numeric(op: Operator, operand: &str) -> Result<ExcludeFilterNumeric> {
    Ok(ExcludeFilterNumeric::new(
        Condition::new(op, operand)?,
        IN,
        Span::none(),
    )?)
}

fn outcome(t: &dyn Transform, value: &str) -> Result<TransformOutcome> {
    let mut record = record_with(value, 0);
    Ok(t.apply(&mut record)?)
}

#[test]
fn numeric_exclude_boundaries() -> Result<()> {
    let gte = numeric(Operator::Gte, "10")?;
    assert_eq!(outcome(&gte, "10")?, TransformOutcome::Exclude);
    assert_eq!(outcome(&gte, "10.000")?, TransformOutcome::Exclude);
    assert_eq!(outcome(&gte, "9.999")?, TransformOutcome::Ok);

    let gt = numeric(Operator::Gt, "10")?;
    assert_eq!(outcome(&gt, "10")?, TransformOutcome::Ok);
    assert_eq!(outcome(&gt, "10.001")?, TransformOutcome::Exclude);

    let lt = numeric(Operator::Lt, "0")?;
    assert_eq!(outcome(&lt, "-0.5")?, TransformOutcome::Exclude);
    assert_eq!(outcome(&lt, "0")?, TransformOutcome::Ok);

    let lte = numeric(Operator::Lte, "20.00001")?;
    assert_eq!(outcome(&lte, "20")?, TransformOutcome::Exclude);
    assert_eq!(outcome(&lte, "20.00002")?, TransformOutcome::Ok);

    let eq = numeric(Operator::Eq, "5")?;
    assert_eq!(outcome(&eq, "5.0")?, TransformOutcome::Exclude);
    assert_eq!(outcome(&eq, "5.0000001")?, TransformOutcome::Ok);
    Ok(())
}

#[test]
fn numeric_exclude_keeps_non_numeric_values() -> Result<()> {
    let gte = numeric(Operator::Gte, "10")?;
    assert_eq!(outcome(&gte, "ten")?, TransformOutcome::Ok);
    assert_eq!(outcome(&gte, "")?, TransformOutcome::Ok);
    Ok(())
}

#[test]
fn numeric_exclude_rejects_match_condition() -> Result<()> {
    let condition = Condition::new(Operator::Match, "a.*")?;
    assert!(matches!(
        ExcludeFilterNumeric::new(condition, IN, Span::none()),
        Err(ConfigError::InvalidCondition { .. })
    ));
    Ok(())
}

#[test]
fn regex_exclude_matches_whole_field() -> Result<()> {
    let t = ExcludeFilterRegex::new(Condition::new(Operator::Match, "error.*")?, IN, Span::none())?;
    assert_eq!(outcome(&t, "error: disk full")?, TransformOutcome::Exclude);
    assert_eq!(outcome(&t, "an error")?, TransformOutcome::Ok);
    Ok(())
}

#[test]
fn exclude_filter_picks_variant_by_operator() -> Result<()> {
    let by_number = exclude_filter(Condition::new(Operator::Gt, "1")?, IN, Span::none());
    assert_eq!(outcome(by_number.as_ref(), "2")?, TransformOutcome::Exclude);

    let by_pattern = exclude_filter(Condition::new(Operator::Match, "2")?, IN, Span::none());
    assert_eq!(outcome(by_pattern.as_ref(), "2")?, TransformOutcome::Exclude);
    assert_eq!(outcome(by_pattern.as_ref(), "22")?, TransformOutcome::Ok);
    Ok(())
}

// ---------- Date transforms ----------

#[test]
fn date_format_parses_to_epoch_millis() -> Result<()> {
    let t = DateFormatTransform::new("%Y-%m-%d %H:%M:%S", IN, FieldRef::output(0), Span::none())?;
    let mut record = record_with("2014-05-05 12:00:00", 1);

    assert_eq!(t.apply(&mut record)?, TransformOutcome::Ok);
    assert_eq!(outputs(&record), vec!["1399291200000"]);
    Ok(())
}

#[test]
fn date_format_honours_explicit_offset() -> Result<()> {
    let t = DateFormatTransform::new("%Y-%m-%dT%H:%M:%S%z", IN, FieldRef::output(0), Span::none())?;
    assert_eq!(t.epoch_ms("2014-05-05T14:00:00+0200")?, 1_399_291_200_000);
    Ok(())
}

#[test]
fn date_only_pattern_is_midnight_utc() -> Result<()> {
    let t = DateFormatTransform::new("%Y-%m-%d", IN, FieldRef::output(0), Span::none())?;
    assert_eq!(t.epoch_ms("2014-05-05")?, 1_399_248_000_000);
    Ok(())
}

#[test]
fn date_format_errors_on_unparseable_value() -> Result<()> {
    let t = DateFormatTransform::new("%Y-%m-%d %H:%M:%S", IN, FieldRef::output(0), Span::none())?;
    let mut record = record_with("yesterday", 1);

    let err = t.apply(&mut record).unwrap_err();
    let TransformError::CannotParseTimestamp { value, .. } = err;
    assert_eq!(value, "yesterday");
    assert_eq!(outputs(&record), vec![""]);
    Ok(())
}

#[test]
fn unparseable_timestamps_are_logged_as_warnings() {
    let sink = RecordingSink::new();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let format = DateFormatTransform::new("%Y-%m-%d", IN, FieldRef::output(0), Span::none())
            .expect("valid pattern");
        let epoch = DoubleDateTransform::new(true, IN, FieldRef::output(0), Span::none());
        assert!(format.apply(&mut record_with("yesterday", 1)).is_err());
        assert!(epoch.apply(&mut record_with("soon", 1)).is_err());
    });

    let logged = String::from_utf8_lossy(&sink.bytes()).into_owned();
    assert_eq!(logged.matches("bad timestamp").count(), 2, "got: {logged}");
    assert!(logged.contains("WARN"), "got: {logged}");
}

#[test]
fn date_format_rejects_bad_patterns() {
    for pattern in ["%Q-%m", "no specifiers"] {
        assert!(
            matches!(
                DateFormatTransform::new(pattern, IN, FieldRef::output(0), Span::none()),
                Err(ConfigError::InvalidDatePattern(_))
            ),
            "pattern {pattern:?} should be rejected"
        );
    }
}

#[test]
fn double_date_seconds_and_millis() -> Result<()> {
    let seconds = DoubleDateTransform::new(false, IN, FieldRef::output(0), Span::none());
    assert_eq!(seconds.epoch_ms("1399291200.5")?, 1_399_291_200_500);

    let millis = DoubleDateTransform::new(true, IN, FieldRef::output(0), Span::none());
    assert_eq!(millis.epoch_ms("1399291200500.9")?, 1_399_291_200_500);

    let mut record = record_with("1399291200", 1);
    assert_eq!(seconds.apply(&mut record)?, TransformOutcome::Ok);
    assert_eq!(outputs(&record), vec!["1399291200000"]);
    Ok(())
}

#[test]
fn double_date_rejects_non_numbers() {
    let t = DoubleDateTransform::new(false, IN, FieldRef::output(0), Span::none());
    assert!(t.epoch_ms("not a time").is_err());
    assert!(t.epoch_ms("NaN").is_err());
}

// ---------- Text transforms ----------

#[test]
fn text_transforms() -> Result<()> {
    let mut record = Record::with_sizes(2, 0, 4);
    record.load(["  Mixed Case ", "tail"]);

    Concat::new(".", vec![FieldRef::input(0), FieldRef::input(1)], FieldRef::output(0))
        .apply(&mut record)?;
    Lowercase::new(FieldRef::input(0), FieldRef::output(1)).apply(&mut record)?;
    Uppercase::new(FieldRef::input(1), FieldRef::output(2)).apply(&mut record)?;
    Trim::new(FieldRef::input(0), FieldRef::output(3)).apply(&mut record)?;

    assert_eq!(
        outputs(&record),
        vec!["  Mixed Case .tail", "  mixed case ", "TAIL", "Mixed Case"]
    );
    Ok(())
}

// ---------- TransformChain ----------

fn host_port_chain(policy: FailurePolicy) -> Result<(TransformChain, RecordLayout)> {
    let mut layout = RecordLayout::new(["addr"], ["host", "port", "label"]);
    let configs = vec![
        TransformConfig::new("extract", ["addr"])
            .with_arguments([r"^([a-z]+):(\d+)$"])
            .with_outputs(["host", "port"]),
        TransformConfig::new("uppercase", ["addr"]).with_outputs(["label"]),
    ];
    let chain = TransformChain::from_configs(&configs, &mut layout, policy, &Span::none())?;
    Ok((chain, layout))
}

#[test]
fn chain_continue_counts_failures() -> Result<()> {
    let (chain, layout) = host_port_chain(FailurePolicy::Continue)?;
    let mut record = Record::new(&layout);
    record.load(["not an address"]);

    assert_eq!(chain.apply(&mut record)?, ChainOutcome::Ok { failures: 1 });
    assert_eq!(outputs(&record), vec!["", "", "NOT AN ADDRESS"]);
    Ok(())
}

#[test]
fn chain_abort_stops_at_first_failure() -> Result<()> {
    let (chain, layout) = host_port_chain(FailurePolicy::AbortRecord)?;
    let mut record = Record::new(&layout);
    record.load(["not an address"]);

    assert_eq!(chain.apply(&mut record)?, ChainOutcome::Failed);
    assert_eq!(outputs(&record), vec!["", "", ""]);
    Ok(())
}

#[test]
fn chain_success_runs_everything() -> Result<()> {
    let (chain, layout) = host_port_chain(FailurePolicy::AbortRecord)?;
    let mut record = Record::new(&layout);
    record.load(["db:5432"]);

    assert_eq!(chain.apply(&mut record)?, ChainOutcome::Ok { failures: 0 });
    assert_eq!(outputs(&record), vec!["db", "5432", "DB:5432"]);
    Ok(())
}

#[test]
fn chain_exclude_short_circuits() -> Result<()> {
    let mut layout = RecordLayout::new(["level", "msg"], ["msg"]);
    let configs = vec![
        TransformConfig::new("exclude", ["level"])
            .with_condition(Condition::new(Operator::Match, "debug|trace")?),
        TransformConfig::new("uppercase", ["msg"]).with_outputs(["msg"]),
    ];
    let chain = TransformChain::from_configs(
        &configs,
        &mut layout,
        FailurePolicy::Continue,
        &Span::none(),
    )?;
    let mut record = Record::new(&layout);

    record.load(["debug", "quiet"]);
    assert_eq!(chain.apply(&mut record)?, ChainOutcome::Excluded);
    assert_eq!(outputs(&record), vec![""]);

    record.load(["warn", "loud"]);
    assert_eq!(chain.apply(&mut record)?, ChainOutcome::Ok { failures: 0 });
    assert_eq!(outputs(&record), vec!["LOUD"]);
    Ok(())
}

#[test]
fn chain_propagates_date_errors() -> Result<()> {
    let mut layout = RecordLayout::new(["ts"], ["time"]);
    let configs = vec![TransformConfig::new("epoch", ["ts"]).with_outputs(["time"])];
    let chain = TransformChain::from_configs(
        &configs,
        &mut layout,
        FailurePolicy::Continue,
        &Span::none(),
    )?;
    let mut record = Record::new(&layout);
    record.load(["soon"]);

    assert!(matches!(
        chain.apply(&mut record),
        Err(TransformError::CannotParseTimestamp { .. })
    ));
    Ok(())
}

#[test]
fn chain_rejects_refs_outside_layout() {
    let layout = RecordLayout::new(["only"], ["out"]);
    let transforms: Vec<Box<dyn Transform>> = vec![Box::new(Lowercase::new(
        FieldRef::input(3),
        FieldRef::output(0),
    ))];

    let err = TransformChain::new(transforms, &layout, FailurePolicy::Continue)
        .err()
        .expect("input[3] is out of bounds");
    assert!(matches!(
        err,
        ConfigError::FieldOutOfBounds { field, size: 1 } if field == FieldRef::input(3)
    ));
}

#[test]
fn intermediate_fields_use_scratch() -> Result<()> {
    let mut layout = RecordLayout::new(["raw"], ["word"]);
    let configs = vec![
        TransformConfig::new("trim", ["raw"]).with_outputs(["trimmed"]),
        TransformConfig::new("lowercase", ["trimmed"]).with_outputs(["word"]),
    ];
    let chain = TransformChain::from_configs(
        &configs,
        &mut layout,
        FailurePolicy::Continue,
        &Span::none(),
    )?;
    assert_eq!(layout.size(jobflow::Area::Scratch), 1);

    let mut record = Record::new(&layout);
    record.load(["  HeLLo "]);
    chain.apply(&mut record)?;
    assert_eq!(outputs(&record), vec!["hello"]);
    Ok(())
}
