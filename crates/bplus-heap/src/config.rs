//! Heap configuration parameters.

use crate::error::HeapError;

/// Configuration for the runtime heap.
///
/// Validated at construction; all values are immutable after creation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeapConfig {
    /// Cap on the sum of live payload bytes. `None` means unlimited.
    ///
    /// Header bytes are not counted: the limit is expressed in the sizes
    /// the program asked for.
    pub max_heap_bytes: Option<usize>,

    /// Keep a registry of live blocks.
    ///
    /// Enables reliable double-free and foreign-pointer detection at the
    /// cost of a mutex acquisition on every alloc and free.
    pub track_allocations: bool,

    /// Fill a block's payload with [`HeapConfig::POISON_BYTE`] before
    /// releasing it.
    pub poison_freed: bool,
}

impl HeapConfig {
    /// Byte written over freed payloads when `poison_freed` is set.
    pub const POISON_BYTE: u8 = 0xDD;

    /// Environment variable holding the heap limit in bytes.
    pub const ENV_LIMIT: &'static str = "BPLUS_HEAP_LIMIT";

    /// Environment variable enabling the live-block registry.
    pub const ENV_TRACK: &'static str = "BPLUS_HEAP_TRACK";

    /// Environment variable enabling poisoning of freed payloads.
    pub const ENV_POISON: &'static str = "BPLUS_HEAP_POISON";

    /// Create a config with a heap limit and default values elsewhere.
    pub fn with_limit(max_heap_bytes: usize) -> Self {
        Self {
            max_heap_bytes: Some(max_heap_bytes),
            ..Self::default()
        }
    }

    /// Build a config from the process environment.
    ///
    /// Unset variables keep their defaults. A variable that is set but
    /// unparseable is an error rather than silently ignored.
    pub fn from_env() -> Result<Self, HeapError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    ///
    /// [`HeapConfig::from_env`] delegates here; tests pass a closure
    /// instead of mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, HeapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(Self::ENV_LIMIT) {
            config.max_heap_bytes = Some(parse_byte_size(&raw).ok_or_else(|| {
                HeapError::InvalidConfig {
                    reason: format!("{}={raw:?} is not a byte size", Self::ENV_LIMIT),
                }
            })?);
        }
        if let Some(raw) = lookup(Self::ENV_TRACK) {
            config.track_allocations = parse_flag(Self::ENV_TRACK, &raw)?;
        }
        if let Some(raw) = lookup(Self::ENV_POISON) {
            config.poison_freed = parse_flag(Self::ENV_POISON, &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the config for values the heap cannot honour.
    pub fn validate(&self) -> Result<(), HeapError> {
        if self.max_heap_bytes == Some(0) {
            return Err(HeapError::InvalidConfig {
                reason: "max_heap_bytes must be non-zero; use None for unlimited".into(),
            });
        }
        Ok(())
    }
}

/// Parse `"4096"`, `"64k"`, `"16M"`, `"2g"` into bytes.
fn parse_byte_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    let (digits, shift) = match raw.chars().last()? {
        'k' | 'K' => (&raw[..raw.len() - 1], 10),
        'm' | 'M' => (&raw[..raw.len() - 1], 20),
        'g' | 'G' => (&raw[..raw.len() - 1], 30),
        _ => (raw, 0),
    };
    let value: usize = digits.trim().parse().ok()?;
    value.checked_mul(1usize << shift)
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, HeapError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(HeapError::InvalidConfig {
            reason: format!("{key}={raw:?} is not a boolean flag"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_is_unlimited_and_untracked() {
        let config = HeapConfig::default();
        assert_eq!(config.max_heap_bytes, None);
        assert!(!config.track_allocations);
        assert!(!config.poison_freed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_limit_rejected() {
        let config = HeapConfig::with_limit(0);
        assert!(matches!(
            config.validate(),
            Err(HeapError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn empty_lookup_yields_default() {
        let config = HeapConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, HeapConfig::default());
    }

    #[test]
    fn lookup_reads_all_keys() {
        let config = HeapConfig::from_lookup(lookup_from(&[
            ("BPLUS_HEAP_LIMIT", "16M"),
            ("BPLUS_HEAP_TRACK", "yes"),
            ("BPLUS_HEAP_POISON", "1"),
        ]))
        .unwrap();
        assert_eq!(config.max_heap_bytes, Some(16 * 1024 * 1024));
        assert!(config.track_allocations);
        assert!(config.poison_freed);
    }

    #[test]
    fn bad_limit_is_error() {
        let result = HeapConfig::from_lookup(lookup_from(&[("BPLUS_HEAP_LIMIT", "lots")]));
        assert!(matches!(result, Err(HeapError::InvalidConfig { .. })));
    }

    #[test]
    fn bad_flag_is_error() {
        let result = HeapConfig::from_lookup(lookup_from(&[("BPLUS_HEAP_TRACK", "maybe")]));
        assert!(matches!(result, Err(HeapError::InvalidConfig { .. })));
    }

    #[test]
    fn zero_limit_from_env_is_error() {
        let result = HeapConfig::from_lookup(lookup_from(&[("BPLUS_HEAP_LIMIT", "0")]));
        assert!(matches!(result, Err(HeapError::InvalidConfig { .. })));
    }

    #[test]
    fn byte_size_suffixes() {
        assert_eq!(parse_byte_size("4096"), Some(4096));
        assert_eq!(parse_byte_size("64k"), Some(64 * 1024));
        assert_eq!(parse_byte_size(" 2G "), Some(2 << 30));
        assert_eq!(parse_byte_size("k"), None);
        assert_eq!(parse_byte_size(""), None);
    }

    #[test]
    fn byte_size_overflow_rejected() {
        let huge = format!("{}g", usize::MAX);
        assert_eq!(parse_byte_size(&huge), None);
    }
}
