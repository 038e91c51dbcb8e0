/*!
# mvptimer devkit

Test doubles and fixtures for exercising the timer engine without a live
control panel, mob database or Discord:
- scripted scrape source with call counters and a pause gate
- counting window lookup
- recording presentation sink
- a harness wiring them to ledger and cache files in a temp dir
*/

pub mod fixtures;
pub mod harness;
pub mod stubs;

pub use fixtures::{at, base_time, init_test_logging, kill_row, minutes_before};
pub use harness::TestHarness;
pub use stubs::{RecordingSink, StubScrapeSource, StubWindowLookup};
