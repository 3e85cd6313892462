//! Scenarios: mock rules plus an ordered list of steps.
//!
//! A scenario is plain data. It can be built in code with
//! [`ScenarioBuilder`] or loaded from YAML:
//!
//! ```yaml
//! name: schedule filter
//! mocks:
//!   - url: "**/api/schedule"
//!     json: [{ "apparatus": "Sol" }]
//! steps:
//!   - action: navigate
//!     url: /schedule
//!   - action: click
//!     selector: "button:has-text('Sol')"
//!   - action: capture
//!     label: filtered
//! ```

use crate::assertion::TextMatch;
use crate::config::{HarnessConfig, Viewport};
use crate::locator::Selector;
use crate::network::{MockRegistry, MockRule};
use crate::result::{ProofError, ProofResult};
use crate::wait::ReadyCondition;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// =============================================================================
// STEPS
// =============================================================================

/// What a step does
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepKind {
    /// Load a URL and wait until ready
    Navigate {
        /// Absolute, or relative to the base URL
        url: String,
        /// Overrides the configured ready condition
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ready: Option<ReadyCondition>,
    },
    /// Wait until the selector matches anything
    WaitForSelector {
        /// Target
        selector: String,
    },
    /// Click the element
    Click {
        /// Target
        selector: String,
    },
    /// Move the pointer over the element
    Hover {
        /// Target
        selector: String,
    },
    /// Hold or release the primary button over the element
    SetPointerState {
        /// Target
        selector: String,
        /// `true` presses, `false` releases
        down: bool,
    },
    /// Wait until the element is visible
    AssertVisible {
        /// Target
        selector: String,
    },
    /// Wait until no match is visible
    AssertHidden {
        /// Target
        selector: String,
    },
    /// Wait until the element's text matches
    AssertText {
        /// Target
        selector: String,
        /// Expected text
        expected: String,
        /// Exact or substring comparison
        #[serde(default)]
        mode: TextMatch,
    },
    /// Wait until an attribute has a value
    AssertAttribute {
        /// Target
        selector: String,
        /// Attribute name
        attr: String,
        /// Expected value
        expected: String,
    },
    /// Save a screenshot
    Capture {
        /// File label
        label: String,
        /// Overrides the configured screenshot mode
        #[serde(default, skip_serializing_if = "Option::is_none")]
        full_page: Option<bool>,
    },
    /// Focus the element and type
    TypeText {
        /// Target
        selector: String,
        /// Text to insert
        text: String,
    },
    /// Press a named key
    PressKey {
        /// Key name, e.g. `Enter`
        key: String,
    },
    /// Mouse-wheel scroll
    Scroll {
        /// Horizontal delta
        #[serde(default)]
        dx: f32,
        /// Vertical delta
        #[serde(default)]
        dy: f32,
    },
    /// Resize the viewport
    SetViewport {
        /// Width in CSS pixels
        width: u32,
        /// Height in CSS pixels
        height: u32,
    },
}

impl StepKind {
    /// Selector this step targets, if any
    #[must_use]
    pub fn selector(&self) -> Option<&str> {
        match self {
            Self::WaitForSelector { selector }
            | Self::Click { selector }
            | Self::Hover { selector }
            | Self::SetPointerState { selector, .. }
            | Self::AssertVisible { selector }
            | Self::AssertHidden { selector }
            | Self::AssertText { selector, .. }
            | Self::AssertAttribute { selector, .. }
            | Self::TypeText { selector, .. } => Some(selector),
            Self::Navigate {
                ready: Some(ReadyCondition::SelectorPresent { selector }),
                ..
            } => Some(selector),
            _ => None,
        }
    }

    /// Snake-case action name
    #[must_use]
    pub const fn action(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::WaitForSelector { .. } => "wait_for_selector",
            Self::Click { .. } => "click",
            Self::Hover { .. } => "hover",
            Self::SetPointerState { .. } => "set_pointer_state",
            Self::AssertVisible { .. } => "assert_visible",
            Self::AssertHidden { .. } => "assert_hidden",
            Self::AssertText { .. } => "assert_text",
            Self::AssertAttribute { .. } => "assert_attribute",
            Self::Capture { .. } => "capture",
            Self::TypeText { .. } => "type_text",
            Self::PressKey { .. } => "press_key",
            Self::Scroll { .. } => "scroll",
            Self::SetViewport { .. } => "set_viewport",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Navigate { url, .. } => write!(f, "navigate {url}"),
            Self::SetPointerState { selector, down } => {
                let state = if *down { "down" } else { "up" };
                write!(f, "pointer {state} {selector}")
            }
            Self::AssertText {
                selector, expected, ..
            } => write!(f, "assert_text {selector} {expected:?}"),
            Self::AssertAttribute {
                selector,
                attr,
                expected,
            } => write!(f, "assert_attribute {selector} {attr}={expected:?}"),
            Self::Capture { label, .. } => write!(f, "capture {label}"),
            Self::TypeText { selector, .. } => write!(f, "type_text {selector}"),
            Self::PressKey { key } => write!(f, "press_key {key}"),
            Self::Scroll { dx, dy } => write!(f, "scroll {dx},{dy}"),
            Self::SetViewport { width, height } => write!(f, "set_viewport {width}x{height}"),
            other => match other.selector() {
                Some(selector) => write!(f, "{} {selector}", other.action()),
                None => f.write_str(other.action()),
            },
        }
    }
}

/// One instruction plus its timeout and failure policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// The action
    #[serde(flatten)]
    pub kind: StepKind,
    /// Overrides the configured timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Failure is recorded as skipped and the run continues
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl From<StepKind> for Step {
    fn from(kind: StepKind) -> Self {
        Self {
            kind,
            timeout_ms: None,
            optional: false,
        }
    }
}

impl Step {
    /// Navigate using the default ready condition
    #[must_use]
    pub fn navigate(url: impl Into<String>) -> Self {
        StepKind::Navigate {
            url: url.into(),
            ready: None,
        }
        .into()
    }

    /// Navigate with an explicit ready condition
    #[must_use]
    pub fn navigate_until(url: impl Into<String>, ready: ReadyCondition) -> Self {
        StepKind::Navigate {
            url: url.into(),
            ready: Some(ready),
        }
        .into()
    }

    /// Wait for a selector to match
    #[must_use]
    pub fn wait_for_selector(selector: impl Into<String>) -> Self {
        StepKind::WaitForSelector {
            selector: selector.into(),
        }
        .into()
    }

    /// Click
    #[must_use]
    pub fn click(selector: impl Into<String>) -> Self {
        StepKind::Click {
            selector: selector.into(),
        }
        .into()
    }

    /// Hover
    #[must_use]
    pub fn hover(selector: impl Into<String>) -> Self {
        StepKind::Hover {
            selector: selector.into(),
        }
        .into()
    }

    /// Press or release over an element
    #[must_use]
    pub fn set_pointer_state(selector: impl Into<String>, down: bool) -> Self {
        StepKind::SetPointerState {
            selector: selector.into(),
            down,
        }
        .into()
    }

    /// Assert visible
    #[must_use]
    pub fn assert_visible(selector: impl Into<String>) -> Self {
        StepKind::AssertVisible {
            selector: selector.into(),
        }
        .into()
    }

    /// Assert hidden or absent
    #[must_use]
    pub fn assert_hidden(selector: impl Into<String>) -> Self {
        StepKind::AssertHidden {
            selector: selector.into(),
        }
        .into()
    }

    /// Assert exact text
    #[must_use]
    pub fn assert_text(selector: impl Into<String>, expected: impl Into<String>) -> Self {
        StepKind::AssertText {
            selector: selector.into(),
            expected: expected.into(),
            mode: TextMatch::Exact,
        }
        .into()
    }

    /// Assert the text contains `expected`
    #[must_use]
    pub fn assert_text_contains(selector: impl Into<String>, expected: impl Into<String>) -> Self {
        StepKind::AssertText {
            selector: selector.into(),
            expected: expected.into(),
            mode: TextMatch::Contains,
        }
        .into()
    }

    /// Assert an attribute value
    #[must_use]
    pub fn assert_attribute(
        selector: impl Into<String>,
        attr: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        StepKind::AssertAttribute {
            selector: selector.into(),
            attr: attr.into(),
            expected: expected.into(),
        }
        .into()
    }

    /// Screenshot
    #[must_use]
    pub fn capture(label: impl Into<String>) -> Self {
        StepKind::Capture {
            label: label.into(),
            full_page: None,
        }
        .into()
    }

    /// Focus and type
    #[must_use]
    pub fn type_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        StepKind::TypeText {
            selector: selector.into(),
            text: text.into(),
        }
        .into()
    }

    /// Key press
    #[must_use]
    pub fn press_key(key: impl Into<String>) -> Self {
        StepKind::PressKey { key: key.into() }.into()
    }

    /// Wheel scroll
    #[must_use]
    pub fn scroll(dx: f32, dy: f32) -> Self {
        StepKind::Scroll { dx, dy }.into()
    }

    /// Resize
    #[must_use]
    pub fn set_viewport(width: u32, height: u32) -> Self {
        StepKind::SetViewport { width, height }.into()
    }

    /// Set this step's timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Mark the step optional
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Short human-readable description
    #[must_use]
    pub fn describe(&self) -> String {
        if self.optional {
            format!("{} (optional)", self.kind)
        } else {
            self.kind.to_string()
        }
    }

    fn validate(&self, index: usize) -> ProofResult<()> {
        let context = |err: ProofError| match err {
            ProofError::Configuration { message } => {
                ProofError::configuration(format!("step {index} ({}): {message}", self.kind.action()))
            }
            other => other,
        };
        if let Some(selector) = self.kind.selector() {
            Selector::parse(selector).map_err(context)?;
        }
        match &self.kind {
            StepKind::SetViewport { width, height } => {
                Viewport::new(*width, *height).validate().map_err(context)?;
            }
            StepKind::PressKey { key } if key.trim().is_empty() => {
                return Err(context(ProofError::configuration("key name must not be empty")));
            }
            StepKind::Navigate { url, .. } if url.trim().is_empty() => {
                return Err(context(ProofError::configuration("url must not be empty")));
            }
            StepKind::Scroll { dx, dy } if !dx.is_finite() || !dy.is_finite() => {
                return Err(context(ProofError::configuration("scroll deltas must be finite")));
            }
            _ => {}
        }
        if self.timeout_ms == Some(0) {
            return Err(context(ProofError::configuration("timeout_ms must be positive")));
        }
        Ok(())
    }
}

// =============================================================================
// SCENARIO
// =============================================================================

/// A named verification flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name
    pub name: String,
    /// Settings embedded in the scenario file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<HarnessConfig>,
    /// Mock rules, in registration order
    #[serde(default)]
    pub mocks: Vec<MockRule>,
    /// Steps, in execution order
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Start building a scenario
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ScenarioBuilder {
        ScenarioBuilder::new(name)
    }

    /// Parse a YAML scenario
    ///
    /// # Errors
    ///
    /// `Configuration` if the document does not describe a scenario.
    pub fn from_yaml_str(yaml: &str) -> ProofResult<Self> {
        serde_yaml_ng::from_str(yaml)
            .map_err(|e| ProofError::configuration(format!("invalid scenario: {e}")))
    }

    /// Load a YAML scenario file
    ///
    /// # Errors
    ///
    /// `Io` if unreadable, `Configuration` if malformed.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> ProofResult<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml).map_err(|err| match err {
            ProofError::Configuration { message } => {
                ProofError::configuration(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Serialize back to YAML
    ///
    /// # Errors
    ///
    /// Serialization errors.
    pub fn to_yaml(&self) -> ProofResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Build the mock registry, rules in order
    ///
    /// # Errors
    ///
    /// `Configuration` for a malformed pattern or status.
    pub fn registry(&self) -> ProofResult<MockRegistry> {
        MockRegistry::from_rules(self.mocks.iter().cloned())
    }

    /// Check everything that can be checked without a browser, including
    /// the embedded `config`
    ///
    /// # Errors
    ///
    /// `Configuration` naming the first bad selector, pattern, viewport or step.
    pub fn validate(&self) -> ProofResult<()> {
        if let Some(config) = &self.config {
            config.validate()?;
        }
        self.validate_steps()
    }

    /// Check name, mocks and steps, leaving the embedded `config` alone.
    ///
    /// For callers that layer their own settings over the file's before
    /// validating the result.
    ///
    /// # Errors
    ///
    /// `Configuration` naming the first bad selector, pattern or step.
    pub fn validate_steps(&self) -> ProofResult<()> {
        if self.name.trim().is_empty() {
            return Err(ProofError::configuration("scenario name must not be empty"));
        }
        self.registry()?;
        for (index, step) in self.steps.iter().enumerate() {
            step.validate(index)?;
        }
        Ok(())
    }
}

/// Builds a [`Scenario`] in code
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    scenario: Scenario,
}

impl ScenarioBuilder {
    /// Empty scenario named `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            scenario: Scenario {
                name: name.into(),
                config: None,
                mocks: Vec::new(),
                steps: Vec::new(),
            },
        }
    }

    /// Add a mock rule
    #[must_use]
    pub fn mock(mut self, rule: MockRule) -> Self {
        self.scenario.mocks.push(rule);
        self
    }

    /// Append a step
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.scenario.steps.push(step);
        self
    }

    /// Append several steps
    #[must_use]
    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scenario.steps.extend(steps);
        self
    }

    /// Embed settings
    #[must_use]
    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.scenario.config = Some(config);
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> Scenario {
        self.scenario
    }
}
