//! INI-style fact output parsing.
//!
//! Gatherers print `key = value` lines. Only the default (unnamed)
//! section is read; everything from the first `[section]` header on is
//! ignored.

use crate::models::Facts;
use tracing::debug;

/// Parse raw gatherer stdout into a flat fact map.
pub fn parse_facts(raw: &[u8]) -> Facts {
    let text = String::from_utf8_lossy(raw);
    let mut facts = Facts::new();

    for line in text.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            break;
        }

        let Some(separator) = line.find(['=', ':']) else {
            debug!("Skipping gatherer output line without separator: {}", line);
            continue;
        };

        let key = line[..separator].trim();
        if key.is_empty() {
            continue;
        }

        let value = parse_value(line[separator + 1..].trim());
        facts.insert(key.to_string(), value);
    }

    facts
}

/// Unquote a value, or strip an inline comment from an unquoted one.
fn parse_value(raw: &str) -> String {
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return raw[1..raw.len() - 1].to_string();
        }
    }

    let mut previous_is_space = false;
    for (i, c) in raw.char_indices() {
        if (c == '#' || c == ';') && previous_is_space {
            return raw[..i].trim_end().to_string();
        }
        previous_is_space = c.is_whitespace();
    }

    raw.to_string()
}
