//! Metadata tag-count and value-size caps.

use serde_json::Value;

use crate::config::MetadataLimits;
use crate::types::{keys, Metadata};

/// Minimum free budget worth truncating a value into.
const MIN_TRUNCATION_BYTES: usize = 10;
const ELLIPSIS: &str = "...";

/// Trims metadata to a tag count and total value budget.
///
/// Engine keys ([`keys::RESERVED`]) always pass through whole and do not
/// count against either cap. The remaining keys are admitted priority tags
/// first, in their configured order, then in sorted order. A value that does
/// not fit the remaining budget is truncated (as a string, on a UTF-8
/// boundary) when at least a few bytes are left, otherwise it is dropped and
/// admission stops.
#[derive(Debug, Clone)]
pub struct MetadataLimiter {
    limits: MetadataLimits,
}

impl MetadataLimiter {
    pub fn new(limits: MetadataLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &MetadataLimits {
        &self.limits
    }

    /// Apply the caps, returning the kept metadata.
    pub fn limit(&self, metadata: Metadata) -> Metadata {
        let (mut kept, capped): (Metadata, Metadata) = metadata
            .into_iter()
            .partition(|(key, _)| keys::is_reserved(key));
        if capped.is_empty() {
            return kept;
        }

        let mut ordered: Vec<&String> = self
            .limits
            .priority_tags
            .iter()
            .filter(|tag| capped.contains_key(tag.as_str()))
            .collect();
        let mut rest: Vec<&String> = capped
            .keys()
            .filter(|k| !self.limits.priority_tags.contains(*k))
            .collect();
        rest.sort();
        ordered.extend(rest);

        let mut admitted = 0usize;
        let mut used_bytes = 0usize;

        for key in ordered {
            if admitted >= self.limits.max_tags {
                break;
            }
            let value = &capped[key];
            let rendered = render(value);
            let size = rendered.len();

            if used_bytes + size <= self.limits.max_value_bytes {
                kept.insert(key.clone(), value.clone());
                admitted += 1;
                used_bytes += size;
                continue;
            }

            let available = self.limits.max_value_bytes - used_bytes;
            if available > MIN_TRUNCATION_BYTES {
                let mut truncated =
                    truncate_to_bytes(&rendered, available - ELLIPSIS.len()).to_string();
                truncated.push_str(ELLIPSIS);
                tracing::warn!(
                    "Truncated metadata tag '{}': {} bytes -> {} bytes",
                    key,
                    size,
                    truncated.len()
                );
                kept.insert(key.clone(), Value::String(truncated));
                admitted += 1;
            } else {
                tracing::warn!("Skipped metadata tag '{}': would exceed value byte limit", key);
            }
            break;
        }

        if admitted < capped.len() {
            let mut excluded: Vec<&String> =
                capped.keys().filter(|k| !kept.contains_key(*k)).collect();
            excluded.sort();
            tracing::debug!("Excluded metadata tags: {:?}", excluded);
        }

        kept
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_to_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
