//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT sleep to wait for events. Streams
//! wait on the request lock and on I/O, never on timers.
//! **Exceptions**: the retry helper's interval between attempts, test code

use architectural_enforcement::{production_sources, report};

/// Files allowed to await a timer between attempts
const RETRY_FILES: &[&str] = &["retry.rs"];

#[test]
fn test_no_blocking_sleep_in_production_code() {
    let mut violations = Vec::new();

    for source in production_sources() {
        for (line_number, code) in source.code_lines() {
            if code.contains("thread::sleep(") {
                violations.push(source.violation(line_number, "Blocking sleep"));
            }
        }
    }

    report("No blocking sleep in production code", &violations);
}

#[test]
fn test_async_sleep_only_between_retries() {
    let mut violations = Vec::new();

    for source in production_sources() {
        if RETRY_FILES.contains(&source.file_name()) {
            continue;
        }
        for (line_number, code) in source.code_lines() {
            if code.contains("time::sleep(") || code.contains(".sleep(") {
                violations.push(source.violation(line_number, "Sleep outside retry logic"));
            }
        }
    }

    report("Sleep only between retry attempts", &violations);
}
