//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async production code MUST NOT block. HTTP goes through the
//! async reqwest client; stdin is read through `tokio::io`.
//! **Exceptions**: non-async functions (configuration loading runs before any
//! stream exists), test code

use architectural_enforcement::{production_sources, report};

#[test]
fn test_no_blocking_http_client() {
    let mut violations = Vec::new();

    for source in production_sources() {
        for (line_number, code) in source.code_lines() {
            if code.contains("reqwest::blocking") {
                violations.push(source.violation(line_number, "Blocking HTTP client"));
            }
        }
    }

    report("No blocking HTTP client", &violations);
}

#[test]
fn test_no_blocking_io_in_async_functions() {
    let mut violations = Vec::new();

    for source in production_sources() {
        for (line_number, code) in source.code_lines() {
            if !source.in_async_fn(line_number) {
                continue;
            }
            if code.contains("std::fs::") {
                violations.push(source.violation(line_number, "Blocking file I/O in async"));
            }
            if code.contains("std::net::") {
                violations.push(source.violation(line_number, "Blocking network I/O in async"));
            }
            if code.contains("std::io::stdin()") {
                violations.push(source.violation(line_number, "Blocking stdin in async"));
            }
        }
    }

    report("No blocking I/O in async code", &violations);
}
