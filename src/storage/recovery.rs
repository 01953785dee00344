//! Recovery log of rejected settings payloads.
//!
//! Entries map an ISO-8601 timestamp to the raw JSON text that the fixer
//! rejected. Managers sharing one physical key keep their entries apart by
//! prefixing the timestamp with their own prefix.
//!
//! A key belongs to `prefix` only when the rest of it is a timestamp, so
//! nested prefixes such as `a.` and `a.b.` never see each other's entries.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// Timestamp → raw serialized payload.
pub type RecoveryLog = BTreeMap<String, String>;

fn entry_timestamp<'k>(key: &'k str, prefix: &str) -> Option<&'k str> {
    key.strip_prefix(prefix)
        .filter(|rest| DateTime::parse_from_rfc3339(rest).is_ok())
}

/// Entries under `prefix`, with the prefix stripped.
pub fn get_recovery(log: &RecoveryLog, prefix: &str) -> RecoveryLog {
    log.iter()
        .filter_map(|(key, text)| {
            entry_timestamp(key, prefix).map(|timestamp| (timestamp.to_string(), text.clone()))
        })
        .collect()
}

/// Replace every entry under `prefix` with `entries`; other prefixes are kept.
pub fn set_recovery(log: &RecoveryLog, prefix: &str, entries: &RecoveryLog) -> RecoveryLog {
    log.iter()
        .filter(|(key, _)| entry_timestamp(key, prefix).is_none())
        .map(|(key, text)| (key.clone(), text.clone()))
        .chain(
            entries
                .iter()
                .map(|(key, text)| (format!("{prefix}{key}"), text.clone())),
        )
        .collect()
}

/// `at` as an ISO-8601 UTC timestamp with millisecond precision.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Append `text` under `prefix` + timestamp of `at`, returning the full key used.
///
/// A taken timestamp is moved forward one millisecond at a time until free.
pub fn append_recovery(log: &mut RecoveryLog, prefix: &str, at: DateTime<Utc>, text: String) -> String {
    let mut at = at;
    loop {
        let key = format!("{prefix}{}", format_timestamp(at));
        if !log.contains_key(&key) {
            log.insert(key.clone(), text);
            return key;
        }
        at += TimeDelta::milliseconds(1);
    }
}
