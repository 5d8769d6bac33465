#![allow(dead_code)]

use proptest::prelude::ProptestConfig;
use proptest::test_runner::RngSeed;
use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED5EED;

/// Installs a trace-level subscriber writing through the test harness.
///
/// Safe to call from every test; only the first call does anything.
pub fn init_test_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .with_target(true)
            .with_ansi(false)
            .try_init();
    });
}

/// A `ProptestConfig` running `cases` cases, seeded deterministically under CI.
///
/// An explicit `PROPTEST_RNG_SEED` still wins.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    if matches!(config.rng_seed, RngSeed::Random) && std::env::var("CI").is_ok() {
        config.rng_seed = RngSeed::Fixed(DEFAULT_PROPTEST_SEED);
    }
    config
}
