//! Pattern screening of request paths and query values for common attack
//! payloads.

use std::fmt;

use lazy_static::lazy_static;
use regex::RegexSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreatKind {
    SqlInjection,
    CrossSiteScripting,
    PathTraversal,
    CommandInjection,
}

impl fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThreatKind::SqlInjection => "sql_injection",
            ThreatKind::CrossSiteScripting => "xss",
            ThreatKind::PathTraversal => "path_traversal",
            ThreatKind::CommandInjection => "command_injection",
        };
        f.write_str(name)
    }
}

lazy_static! {
    static ref SQL_INJECTION: RegexSet = RegexSet::new([
        r"(?i)\b(UNION|SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|EXECUTE)\b",
        r"--",
        r"/\*.*\*/",
        r"xp_",
        r"sp_",
        r"0x[0-9a-f]+",
        r"\bOR\b.*=",
        r"\bAND\b.*=",
        r"'.*OR.*'.*=.*'",
    ])
    .expect("SQL injection patterns");

    // Matched against the lowercased input.
    static ref CROSS_SITE_SCRIPTING: RegexSet = RegexSet::new([
        r"<script[^>]*>.*</script>",
        r"javascript:",
        r"onerror\s*=",
        r"onload\s*=",
        r"onclick\s*=",
        r"<iframe",
        r"<embed",
        r"<object",
        r"eval\(",
        r"alert\(",
        r"document\.cookie",
        r"window\.location",
    ])
    .expect("XSS patterns");

    // Matched against the lowercased input.
    static ref PATH_TRAVERSAL: RegexSet = RegexSet::new([
        r"\.\./",
        r"\.\.\\",
        r"%2e%2e",
        r"%252e%252e",
        r"\.\.;",
    ])
    .expect("path traversal patterns");

    static ref COMMAND_INJECTION: RegexSet = RegexSet::new([
        r"[;&|]\s*(ls|cat|wget|curl|nc|bash|sh|cmd|powershell)\b",
        r"\$\(.*\)",
        r"`.*`",
        r">\s*/dev/",
    ])
    .expect("command injection patterns");
}

/// Returns the first kind of attack `input` looks like, if any.
pub fn detect(input: &str) -> Option<ThreatKind> {
    let lowered = input.to_lowercase();

    if SQL_INJECTION.is_match(input) {
        Some(ThreatKind::SqlInjection)
    } else if CROSS_SITE_SCRIPTING.is_match(&lowered) {
        Some(ThreatKind::CrossSiteScripting)
    } else if PATH_TRAVERSAL.is_match(&lowered) {
        Some(ThreatKind::PathTraversal)
    } else if COMMAND_INJECTION.is_match(input) {
        Some(ThreatKind::CommandInjection)
    } else {
        None
    }
}
