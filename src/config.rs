use std::path::PathBuf;
use std::time::Duration;

/// Explicit configuration threaded through constructors; no module-level
/// statics or hidden globals.
#[derive(Clone, Debug)]
pub struct Config {
    pub capture_port: u16,
    pub capture_dir: PathBuf,
    pub listen_backlog: i32,
    pub accept_timeout: Duration,
    pub read_chunk_size: usize,
    pub frame_marker: String,
    pub render_marker: String,
    pub metric_threshold_percent: u32,
    pub show_memory: bool,
    pub show_metrics: bool,
    pub show_frames: bool,
    pub load_filter_percent: u32,
    pub range: Option<(u32, u32)>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture_port: 7934,
            capture_dir: PathBuf::from("flm"),
            listen_backlog: 5,
            accept_timeout: Duration::from_secs(2),
            read_chunk_size: 1024,
            frame_marker: ".swf.frame".to_string(),
            render_marker: ".rend.screen".to_string(),
            metric_threshold_percent: 0,
            show_memory: false,
            show_metrics: false,
            show_frames: false,
            load_filter_percent: 0,
            range: None,
        }
    }
}

impl Config {
    pub fn with_capture_port(mut self, port: u16) -> Self {
        self.capture_port = port;
        self
    }

    pub fn with_capture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = dir.into();
        self
    }

    pub fn with_range(mut self, range: Option<(u32, u32)>) -> Self {
        self.range = range;
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_the_external_interface_contract() {
        let config = Config::default();
        assert_eq!(config.capture_port, 7934);
        assert_eq!(config.listen_backlog, 5);
        assert_eq!(config.accept_timeout, Duration::from_secs(2));
        assert_eq!(config.read_chunk_size, 1024);
    }

    #[test]
    fn builder_setters_override_defaults() {
        let config = Config::default().with_capture_port(9000).with_range(Some((10, 20)));
        assert_eq!(config.capture_port, 9000);
        assert_eq!(config.range, Some((10, 20)));
    }
}
