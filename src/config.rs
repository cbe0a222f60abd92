//! `AnalysisConfig`: a plain `derive_builder` struct with accessor methods,
//! no CLI/file loading.

use derive_builder::Builder;

/// `max_search_depth` is modeled as `Option<usize>` rather than a
/// string-shaped `[*0..N]` range — a typed bound reads better on the Rust side of this
/// boundary, and `None` still means "unbounded" exactly like the empty
/// string does on the Cypher side; `compiler::query` re-renders it back to
/// the `[*0..N]`/`[*]` textual form when it builds a `CypherQuery`.
#[derive(Builder, Clone, Debug, Eq, PartialEq)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct AnalysisConfig {
    #[builder(default = "5")]
    max_iterations: usize,

    #[builder(setter(strip_option), default)]
    max_search_depth: Option<usize>,

    #[builder(default = "true")]
    ignore_actions_with_conditions: bool,

    #[builder(default)]
    except_attacks: Vec<String>,

    #[builder(default)]
    only_attacks: Vec<String>,
}

impl AnalysisConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if matches!(self.max_iterations, Some(0)) {
            return Err("max_iterations must be >= 1".to_string());
        }
        Ok(())
    }
}

impl AnalysisConfig {
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    #[inline]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    #[inline]
    pub fn max_search_depth(&self) -> Option<usize> {
        self.max_search_depth
    }

    #[inline]
    pub fn ignore_actions_with_conditions(&self) -> bool {
        self.ignore_actions_with_conditions
    }

    #[inline]
    pub fn except_attacks(&self) -> &[String] {
        &self.except_attacks
    }

    #[inline]
    pub fn only_attacks(&self) -> &[String] {
        &self.only_attacks
    }

    /// Whether `template_name` should run this pass, applying `except_attacks`
    /// then `only_attacks`.
    pub fn should_run(&self, template_name: &str) -> bool {
        if self.except_attacks.iter().any(|n| n == template_name) {
            return false;
        }
        if !self.only_attacks.is_empty() {
            return self.only_attacks.iter().any(|n| n == template_name);
        }
        true
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::builder().build().expect("default config always validates")
    }
}
