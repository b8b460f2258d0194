//! Decodes AMF3-encoded Flash Player telemetry streams and reduces them
//! into per-category CPU, frame-cadence, and memory reports.
//!
//! The crate is split into three layers, mirroring the data flow from raw
//! bytes to report: [`amf3`] decodes the wire format into typed values,
//! [`telemetry`] turns a sequence of those values into a flattened,
//! indexed timeline and aggregates it into reports, and [`capture`] runs
//! the TCP listener that writes a raw telemetry stream to disk ahead of
//! decoding. [`config`] carries the settings all three share.

pub mod amf3;
pub mod capture;
pub mod config;
pub mod telemetry;
