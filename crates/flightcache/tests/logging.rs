//! Runs as its own test binary, since it installs the global logger.

use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flightcache::config::Config;
use flightcache::logging::{ensure_log_error, init_json_logging, init_logging};
use flightcache::{CoalescingCache, Ttl};
use flightcache_test::CallCounter;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<String> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_json_logging() {
    let captured = Captured::default();
    let writer = captured.clone();
    init_json_logging("flightcache=debug", move || writer.clone()).unwrap();

    // only one global logger can be installed
    assert!(init_json_logging("flightcache=debug", io::sink).is_err());
    assert!(init_logging(&Config::default()).is_err());

    let cache = CoalescingCache::<&str, u32>::default();
    let counter = CallCounter::new();
    let ttl = Ttl::After(Duration::from_millis(50));
    let result = cache.get_or_compute("a", ttl, counter.failing("boom")).await;
    assert!(result.is_err());

    ensure_log_error(&anyhow::anyhow!("config file empty"));

    let lines = captured.lines();
    let failed = lines
        .iter()
        .find(|line| line.contains("Cache production failed, removing record"))
        .expect("missing production failure");
    assert!(failed.contains(r#""level":"DEBUG""#));
    assert!(failed.contains(r#""is_refresh":false"#));

    let error = lines
        .iter()
        .find(|line| line.contains("config file empty"))
        .expect("missing logged error");
    assert!(error.contains(r#""level":"ERROR""#));
    assert!(error.contains(r#""target":"flightcache::logging""#));
}
