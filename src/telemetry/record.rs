use derive_more::{Add, AddAssign, Display, From, Into, Sum};

use crate::amf3::Value;

/// Raw telemetry time, in microseconds since an arbitrary session epoch.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Display, From, Into, Add, AddAssign, Sum,
)]
pub struct Microseconds(pub u64);

/// One decoded telemetry event, normalized onto the timeline's time axis.
///
/// Point events (`span: None`) mark an instant; span events cover
/// `[time - span, time)`. `depth` is 0 for a record not nested under any
/// other span on the timeline, and increases by 1 per enclosing parent
/// after nested-span flattening.
#[derive(Clone, Debug)]
pub struct Metric {
    pub name: String,
    pub time: Microseconds,
    pub depth: u32,
    pub span: Option<Microseconds>,
    pub value: Option<Value>,
}

impl Metric {
    pub fn point(name: impl Into<String>, time: Microseconds) -> Self {
        Self {
            name: name.into(),
            time,
            depth: 0,
            span: None,
            value: None,
        }
    }

    pub fn span(name: impl Into<String>, time: Microseconds, span: Microseconds) -> Self {
        Self {
            name: name.into(),
            time,
            depth: 0,
            span: Some(span),
            value: None,
        }
    }

    pub fn start(&self) -> Microseconds {
        match self.span {
            Some(s) => Microseconds(self.time.0.saturating_sub(s.0)),
            None => self.time,
        }
    }

    pub fn category(&self) -> &str {
        const CATEGORIES: &[(&str, &str)] = &[
            ("as", "ActionScript"),
            ("rend", "Rendering"),
            ("network", "Network"),
            ("mem", "Memory"),
            ("tlm", "Telemetry"),
        ];
        let component = self.name.split('.').nth(1).unwrap_or("");
        CATEGORIES
            .iter()
            .find(|(key, _)| *key == component)
            .map(|(_, category)| *category)
            .unwrap_or("Player")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn category_maps_known_components() {
        let m = Metric::span("as.update", Microseconds(100), Microseconds(10));
        assert_eq!(m.category(), "ActionScript");
    }

    #[test]
    fn category_defaults_to_player() {
        let m = Metric::point("swf.frame", Microseconds(0));
        assert_eq!(m.category(), "Player");
    }

    #[test]
    fn start_subtracts_span_from_end_time() {
        let m = Metric::span("rend.screen", Microseconds(100), Microseconds(30));
        assert_eq!(m.start(), Microseconds(70));
    }
}
