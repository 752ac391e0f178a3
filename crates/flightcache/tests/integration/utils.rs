use std::io::Write;

use flightcache::CoalescingCache;
use flightcache::config::Config;
use flightcache_test as test;

pub use test::CallCounter;

/// Setup tests and create a cache from a YAML configuration file.
///
/// The configuration is written to a temporary file and loaded the same way a deployment loads
/// it, so these tests also cover the config layer.
#[track_caller]
pub fn setup_cache(yaml: &str) -> CoalescingCache<String, String> {
    test::setup();

    let dir = test::tempdir();
    let path = dir.path().join("config.yml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = Config::get(Some(&path)).unwrap();
    CoalescingCache::new(config.cache)
}
