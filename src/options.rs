use serde::Deserialize;

/// Default limit on nested `if`/`for` blocks.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Compile and render settings.
///
/// Deserializes with every field optional, so a host can embed it in its own
/// configuration file:
///
/// ```
/// let options: tinytmpl::Options = serde_json::from_str(r#"{ "max_depth": 8 }"#).unwrap();
/// assert_eq!(options.max_depth, 8);
/// assert!(options.trim_output);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Maximum number of simultaneously open blocks.
    pub max_depth: usize,
    /// Trim the rendered output and collapse doubled newlines.
    pub trim_output: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            trim_output: true,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_trim_output(mut self, trim_output: bool) -> Self {
        self.trim_output = trim_output;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_default() {
        let options: Options = serde_json::from_str("{}").unwrap();
        assert_eq!(options, Options::default());
    }

    #[test]
    fn builder_overrides() {
        let options = Options::new().with_max_depth(3).with_trim_output(false);
        assert_eq!(options.max_depth, 3);
        assert!(!options.trim_output);
    }
}
