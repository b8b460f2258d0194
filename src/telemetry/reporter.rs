use std::collections::HashMap;

use crate::telemetry::record::{Metric, Microseconds};

/// Running sum/count/max for a point metric in the Memory category, used
/// to report averages and peaks.
#[derive(Copy, Clone, Debug, Default)]
pub struct MemoryStats {
    pub sum: f64,
    pub count: u64,
    pub max: f64,
}

impl MemoryStats {
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    fn observe(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        if value > self.max {
            self.max = value;
        }
    }
}

/// One line of a category/metric report: a name, its accumulated span, and
/// its percent share of the enclosing category's total.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportLine {
    pub name: String,
    pub span: Microseconds,
    pub percent_of_category: f64,
}

#[derive(Clone, Debug, Default)]
pub struct CategoryReport {
    pub category: String,
    pub total_span: Microseconds,
    pub metrics: Vec<ReportLine>,
}

/// Aggregates a timeline slice into per-category and per-metric CPU totals,
/// plus memory averages/peaks when enabled.
pub struct Reporter {
    categories: HashMap<String, Microseconds>,
    metrics: HashMap<String, Microseconds>,
    metric_category: HashMap<String, String>,
    memory: HashMap<String, MemoryStats>,
    earliest: Option<Microseconds>,
    latest: Option<Microseconds>,
    track_memory: bool,
}

impl Reporter {
    pub fn new(track_memory: bool) -> Self {
        Self {
            categories: HashMap::new(),
            metrics: HashMap::new(),
            metric_category: HashMap::new(),
            memory: HashMap::new(),
            earliest: None,
            latest: None,
            track_memory,
        }
    }

    pub fn ingest_slice(&mut self, records: &[Metric]) {
        for record in records {
            self.ingest(record);
        }
    }

    fn ingest(&mut self, record: &Metric) {
        self.earliest = Some(self.earliest.map_or(record.time, |e| e.min(record.time)));
        self.latest = Some(self.latest.map_or(record.time, |l| l.max(record.time)));

        if let Some(span) = record.span {
            let category = record.category().to_string();
            *self.categories.entry(category.clone()).or_insert(Microseconds(0)) += span;
            *self.metrics.entry(record.name.clone()).or_insert(Microseconds(0)) += span;
            self.metric_category.entry(record.name.clone()).or_insert(category);
        } else if self.track_memory && record.category() == "Memory" {
            if let Some(value) = record.value.as_ref().and_then(|v| v.as_f64()) {
                self.memory.entry(record.name.clone()).or_default().observe(value);
            }
        }
    }

    /// Category reports sorted by descending total span; within each,
    /// metrics sorted by descending span, with any whose percent share of
    /// the category falls below `threshold_percent` suppressed.
    pub fn category_reports(&self, threshold_percent: u32) -> Vec<CategoryReport> {
        let mut categories: Vec<_> = self.categories.iter().collect();
        categories.sort_by(|a, b| b.1.cmp(a.1));

        categories
            .into_iter()
            .map(|(category, &total)| {
                let mut metrics: Vec<ReportLine> = self
                    .metric_category
                    .iter()
                    .filter(|(_, c)| *c == category)
                    .map(|(name, _)| {
                        let span = self.metrics.get(name).copied().unwrap_or(Microseconds(0));
                        let percent = if total.0 == 0 {
                            0.0
                        } else {
                            100.0 * span.0 as f64 / total.0 as f64
                        };
                        ReportLine {
                            name: name.clone(),
                            span,
                            percent_of_category: percent,
                        }
                    })
                    .filter(|line| line.percent_of_category >= threshold_percent as f64)
                    .collect();
                metrics.sort_by(|a, b| b.span.cmp(&a.span));
                CategoryReport {
                    category: category.clone(),
                    total_span: total,
                    metrics,
                }
            })
            .collect()
    }

    pub fn memory_reports(&self) -> Vec<(String, MemoryStats)> {
        let mut entries: Vec<_> = self.memory.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn earliest(&self) -> Option<Microseconds> {
        self.earliest
    }

    pub fn latest(&self) -> Option<Microseconds> {
        self.latest
    }
}
