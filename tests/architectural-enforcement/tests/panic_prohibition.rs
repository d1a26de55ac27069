//! Integration Test: Panic Prohibition
//!
//! **Policy**: Library code reports failures as `ConfigError`/`ApiError`
//! values. A panic inside a stream task would only surface at close time, so
//! runtime paths MUST NOT `unwrap()` or `expect()`.
//! **Exceptions**: test code

use architectural_enforcement::{production_sources, report};

#[test]
fn test_no_unwrap_in_production_code() {
    let mut violations = Vec::new();

    for source in production_sources() {
        for (line_number, code) in source.code_lines() {
            if code.contains(".unwrap()") {
                violations.push(source.violation(line_number, "unwrap()"));
            }
            if code.contains(".expect(") {
                violations.push(source.violation(line_number, "expect()"));
            }
            if code.contains("panic!(") || code.contains("unreachable!(") {
                violations.push(source.violation(line_number, "explicit panic"));
            }
        }
    }

    report("No panics on runtime paths", &violations);
}
