//! WHOIS query encoding

use super::ZoneConfig;

/// Token replaced by the queried domain in a query template
pub const QUERY_PLACEHOLDER: &str = "$addr";

/// Line terminator required by RFC 3912
pub const LINE_TERMINATOR: &str = "\r\n";

/// Render the bytes to send to `zone` for `target`.
///
/// A custom template is used verbatim after substitution, so it must carry
/// its own line terminator.
pub fn build_query(zone: &ZoneConfig, target: &str) -> String {
    match zone.query.as_deref() {
        Some(template) => template.replace(QUERY_PLACEHOLDER, target),
        None => format!("{}{}", target, LINE_TERMINATOR),
    }
}
