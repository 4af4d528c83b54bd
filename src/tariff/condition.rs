//! A named, described window contributing to a tier's applicability.

use crate::reading::Reading;

use super::window::Window;

/// One rate condition.
///
/// `key` names the inspected field and `description` renders the rule;
/// both exist only for diagnostics and default to what the window reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateCondition {
    key: String,
    description: String,
    window: Window,
}

impl RateCondition {
    /// Creates a condition whose key and description come from `window`.
    pub fn new(window: Window) -> Self {
        Self {
            key: window.field().to_string(),
            description: window.to_string(),
            window,
        }
    }

    /// Overrides the diagnostic key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Overrides the diagnostic description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Evaluates the condition.
    ///
    /// With `diagnostics` set, a failing evaluation logs the key and
    /// description at warn level. The result never depends on the flag.
    pub fn evaluate(&self, reading: &Reading, diagnostics: bool) -> bool {
        let matched = self.window.matches(reading);
        if diagnostics && !matched {
            tracing::warn!(
                key = %self.key,
                condition = %self.description,
                "no match for {}: {}",
                self.key,
                self.description
            );
        }
        matched
    }
}
