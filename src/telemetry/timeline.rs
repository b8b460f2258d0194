use tracing::warn;

use crate::amf3::Value;
use crate::telemetry::frame_index::FrameIndex;
use crate::telemetry::record::{Metric, Microseconds};

/// A provisional span pushed by `.prof.enter.time`/popped by
/// `.prof.exit.time`, reconstructing a span record from the producer's
/// bracketing point events. Bounded to guard against hostile input that
/// never emits a matching exit.
const PROFILE_STACK_LIMIT: usize = 1024;

struct ProvisionalSpan {
    name: String,
    start: Microseconds,
}

/// Session-level info fields the producer emits as individual point
/// records (`.swf.name`, `.swf.rate`, `.swf.start`, `.tlm.version`,
/// `.tlm.date`). Once four or more have been observed, further updates are
/// ignored — the producer re-emits these periodically and they don't
/// change within a session.
#[derive(Clone, Debug, Default)]
pub struct SessionInfo {
    pub name: Option<String>,
    pub frame_rate: Option<f64>,
    pub start_time: Option<Microseconds>,
    pub telemetry_version: Option<String>,
    pub capture_date: Option<String>,
}

impl SessionInfo {
    fn populated_count(&self) -> usize {
        [
            self.name.is_some(),
            self.frame_rate.is_some(),
            self.start_time.is_some(),
            self.telemetry_version.is_some(),
            self.capture_date.is_some(),
        ]
        .into_iter()
        .filter(|b| *b)
        .count()
    }

    fn observe(&mut self, name: &str, value: Option<&Value>) {
        if self.populated_count() >= 4 {
            return;
        }
        match name {
            ".swf.name" => self.name = value.and_then(Value::as_str).map(str::to_string),
            ".swf.rate" => self.frame_rate = value.and_then(Value::as_f64),
            ".swf.start" => {
                self.start_time = value.and_then(Value::as_f64).map(|v| Microseconds(v as u64))
            }
            ".tlm.version" => self.telemetry_version = value.and_then(Value::as_str).map(str::to_string),
            ".tlm.date" => self.capture_date = value.and_then(Value::as_str).map(str::to_string),
            _ => {}
        }
    }
}

/// Builds the flattened, time-ordered sequence of [`Metric`] records from
/// raw decoded telemetry values, maintaining frame/render marker indices
/// and session info alongside it.
pub struct Timeline {
    records: Vec<Metric>,
    current_time: Microseconds,
    prof_stack: Vec<ProvisionalSpan>,
    session_info: SessionInfo,
    frame_index: FrameIndex,
    render_index: FrameIndex,
    frame_marker: String,
    render_marker: String,
}

/// The fields a decoded record value may carry, extracted from the dynamic
/// members of its `Value::Object` shape: `name`, and one of `delta`/`time`,
/// plus optional `span` and `value`.
struct RawRecord {
    name: String,
    delta: Option<i64>,
    time: Option<i64>,
    span: Option<i64>,
    value: Option<Value>,
}

fn field<'a>(members: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    members.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

fn as_int(value: &Value) -> Option<i64> {
    value.as_f64().map(|v| v as i64)
}

fn extract(value: &Value) -> Option<RawRecord> {
    let Value::Object(cell) = value else {
        return None;
    };
    let obj = cell.borrow();
    let members = &obj.dynamic_members;
    let name = field(members, "name")?.as_str()?.to_string();
    Some(RawRecord {
        name,
        delta: field(members, "delta").and_then(as_int),
        time: field(members, "time").and_then(as_int),
        span: field(members, "span").and_then(as_int),
        value: field(members, "value").cloned(),
    })
}

impl Timeline {
    pub fn new(frame_marker: impl Into<String>, render_marker: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            current_time: Microseconds(0),
            prof_stack: Vec::new(),
            session_info: SessionInfo::default(),
            frame_index: FrameIndex::new(),
            render_index: FrameIndex::new(),
            frame_marker: frame_marker.into(),
            render_marker: render_marker.into(),
        }
    }

    pub fn records(&self) -> &[Metric] {
        &self.records
    }

    pub fn session_info(&self) -> &SessionInfo {
        &self.session_info
    }

    pub fn frame_index(&self) -> &FrameIndex {
        &self.frame_index
    }

    pub fn render_index(&self) -> &FrameIndex {
        &self.render_index
    }

    /// Normalize and ingest one decoded record. Records that don't carry a
    /// recognizable `name` field are logged and skipped, matching the
    /// "aggregator never fails" policy.
    pub fn ingest(&mut self, value: Value) {
        let Some(raw) = extract(&value) else {
            warn!("record carries no name field, skipping");
            return;
        };

        let time = if let Some(delta) = raw.delta {
            self.current_time = Microseconds(self.current_time.0.saturating_add(delta.max(0) as u64));
            self.current_time
        } else if let Some(t) = raw.time {
            self.current_time = Microseconds(t.max(0) as u64);
            self.current_time
        } else {
            self.current_time
        };

        self.session_info.observe(&raw.name, raw.value.as_ref());
        self.frame_index.note_time(time);
        self.render_index.note_time(time);

        match raw.name.as_str() {
            ".prof.enter.time" => self.profile_enter_time(time),
            ".prof.enter.name" => self.profile_enter_name(&raw.value),
            ".prof.exit.time" => self.profile_exit_time(time),
            _ => self.ingest_metric(raw, time),
        }
    }

    fn ingest_metric(&mut self, raw: RawRecord, time: Microseconds) {
        match raw.span {
            Some(span) if span >= 0 => {
                self.append_span(raw.name, time, Microseconds(span as u64));
            }
            Some(negative) => {
                warn!(span = negative, name = %raw.name, "negative span, skipping record");
            }
            None => {
                let position = self.records.len();
                let mut metric = Metric::point(raw.name, time);
                metric.value = raw.value;
                let is_frame = metric.name == self.frame_marker;
                let is_render = metric.name == self.render_marker;
                self.records.push(metric);
                if is_frame {
                    self.frame_index.observe(position, time);
                }
                if is_render {
                    self.render_index.observe(position, time);
                }
            }
        }
    }

    fn profile_enter_time(&mut self, time: Microseconds) {
        if self.prof_stack.len() >= PROFILE_STACK_LIMIT {
            warn!("profile stack depth limit reached, dropping enter");
            return;
        }
        self.prof_stack.push(ProvisionalSpan {
            name: "none".to_string(),
            start: time,
        });
    }

    fn profile_enter_name(&mut self, value: &Option<Value>) {
        let Some(top) = self.prof_stack.last_mut() else {
            warn!("profile enter.name with empty stack, skipping");
            return;
        };
        if let Some(name) = value.as_ref().and_then(Value::as_str) {
            top.name = format!(".as.{name}");
        }
    }

    fn profile_exit_time(&mut self, time: Microseconds) {
        let Some(frame) = self.prof_stack.pop() else {
            warn!("profile exit.time with empty stack, skipping");
            return;
        };
        if time.0 < frame.start.0 {
            warn!(start = frame.start.0, end = time.0, "negative profile span, skipping");
            return;
        }
        let span = Microseconds(time.0 - frame.start.0);
        self.append_span(frame.name, time, span);
    }

    /// Append a span record covering `[time - span, time)`, lifting any
    /// already-appended records that fall within that range out, nesting
    /// them one level deeper, and fragmenting the parent span into the
    /// gaps its children don't cover.
    fn append_span(&mut self, name: String, time: Microseconds, span: Microseconds) {
        let s = time.0.saturating_sub(span.0);
        let e = time.0;

        let mut children = Vec::new();
        while let Some(last) = self.records.last() {
            if last.time.0 >= s {
                children.push(self.records.pop().unwrap());
            } else {
                break;
            }
        }
        children.reverse();

        let mut gap_start = s;
        for mut child in children {
            let child_start = child.start().0;
            if child_start > gap_start {
                self.records.push(Metric {
                    name: name.clone(),
                    time: Microseconds(child_start),
                    depth: 0,
                    span: Some(Microseconds(child_start - gap_start)),
                    value: None,
                });
            }
            gap_start = child.time.0;
            child.depth += 1;
            self.records.push(child);
        }
        if gap_start < e {
            self.records.push(Metric {
                name,
                time: Microseconds(e),
                depth: 0,
                span: Some(Microseconds(e - gap_start)),
                value: None,
            });
        }
    }
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(".swf.frame", ".rend.screen")
    }
}
