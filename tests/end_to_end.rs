use flash_telemetry_parser::amf3::value::Value;
use flash_telemetry_parser::amf3::MetricReader;
use flash_telemetry_parser::telemetry::{Reporter, Timeline};
use pretty_assertions::assert_eq;

/// Encodes one synthetic record as a dynamic AMF3 object with the fields
/// the timeline builder expects (`name`, `time`, optional `span`).
fn encode_record(name: &str, time: i32, span: Option<i32>) -> Vec<u8> {
    let mut out = vec![0x0A]; // object marker
    out.push(0x0B); // new traits, dynamic, 0 sealed slots
    out.push(0x01); // empty class name

    let push_string = |out: &mut Vec<u8>, s: &str| {
        out.push(((s.len() as u32) << 1 | 1) as u8);
        out.extend_from_slice(s.as_bytes());
    };

    push_string(&mut out, "name");
    out.push(0x06);
    push_string(&mut out, name);

    push_string(&mut out, "time");
    out.push(0x04);
    out.extend(flash_telemetry_parser::amf3::encode_uint29(time as u32));

    if let Some(span) = span {
        push_string(&mut out, "span");
        out.push(0x04);
        out.extend(flash_telemetry_parser::amf3::encode_uint29(span as u32));
    }

    out.push(0x01); // terminator
    out
}

#[test]
fn decoding_a_capture_produces_an_ordered_category_report() {
    let mut bytes = Vec::new();
    bytes.extend(encode_record(".as.update", 4_000, Some(4_000)));
    bytes.extend(encode_record(".rend.screen", 14_667, Some(10_000)));
    bytes.extend(encode_record(".swf.frame", 16_667, None));
    bytes.extend(encode_record(".as.update", 20_667, Some(2_000)));
    bytes.extend(encode_record(".swf.frame", 33_333, None));

    let mut reader = MetricReader::new();
    reader.append_bytes(&bytes);

    let mut timeline = Timeline::new(".swf.frame", ".rend.screen");
    while let Some(value) = reader.read_record().unwrap() {
        timeline.ingest(value);
    }

    assert_eq!(timeline.frame_index().len(), 2);

    let mut reporter = Reporter::new(false);
    reporter.ingest_slice(timeline.records());
    let reports = reporter.category_reports(0);

    assert_eq!(reports[0].category, "Rendering");
    assert_eq!(reports[0].total_span.0, 10_000);
    assert_eq!(reports[1].category, "ActionScript");
    assert_eq!(reports[1].total_span.0, 6_000);
}

#[test]
fn truncated_capture_recovers_record_once_remaining_bytes_arrive() {
    let whole = encode_record(".as.update", 5_000, Some(1_000));

    let mut reader = MetricReader::new();
    reader.append_bytes(&whole[..whole.len() - 3]);
    assert!(reader.read_record().unwrap().is_none());

    reader.append_bytes(&whole[whole.len() - 3..]);
    let value = reader.read_record().unwrap().unwrap();
    let Value::Object(cell) = value else {
        panic!("expected object")
    };
    let obj = cell.borrow();
    let name = obj.dynamic_members.iter().find(|(k, _)| k == "name").unwrap().1.as_str();
    assert_eq!(name, Some(".as.update"));
}
