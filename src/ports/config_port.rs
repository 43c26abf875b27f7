//! Typed configuration access.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Comma-separated list, upper-cased and trimmed. Falls back to
    /// `default` when the key is absent or holds no entries.
    fn get_symbols(&self, section: &str, key: &str, default: &[&str]) -> Vec<String> {
        let parsed: Vec<String> = self
            .get_string(section, key)
            .map(|s| {
                s.split(',')
                    .map(|t| t.trim().to_uppercase())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        if parsed.is_empty() {
            default.iter().map(|s| s.to_string()).collect()
        } else {
            parsed
        }
    }

    fn get_usize(&self, section: &str, key: &str, default: usize) -> usize {
        let value = self.get_int(section, key, default as i64);
        if value < 0 { default } else { value as usize }
    }
}
