//! Steps and options: the selectable surface of a workflow
//!
//! A step is an ordered stage of the workflow that owns a sequence of
//! options. Option order is display order, nothing more. Each option is
//! available by default unless the author declares it disabled, in which
//! case only an `Enable` constraint can make it selectable.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Keys ─────────────────────────────────────────────────────────────

/// Stable key identifying a step within a workflow
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StepKey(pub String);

impl StepKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Display for StepKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key identifying an option, unique within its step
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptionKey(pub String);

impl OptionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Display for OptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully qualified reference to one option at one step.
///
/// Serializes as the string `"step.option"` so it can key JSON maps.
/// Step keys must not contain `.` (model validation rejects them);
/// option keys may, since parsing splits on the first `.` only.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionRef {
    pub step: StepKey,
    pub option: OptionKey,
}

impl OptionRef {
    pub fn new(step: impl Into<String>, option: impl Into<String>) -> Self {
        Self {
            step: StepKey::new(step),
            option: OptionKey::new(option),
        }
    }
}

impl std::fmt::Display for OptionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.step, self.option)
    }
}

impl std::str::FromStr for OptionRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((step, option)) if !step.is_empty() && !option.is_empty() => Ok(Self {
                step: StepKey::new(step),
                option: OptionKey::new(option),
            }),
            _ => Err(format!(
                "invalid option reference '{s}', expected 'step.option'"
            )),
        }
    }
}

impl Serialize for OptionRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OptionRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Step Option ──────────────────────────────────────────────────────

/// A selectable choice within a step
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepOption {
    /// Key unique within the owning step
    pub key: OptionKey,
    /// Display label
    pub label: String,
    /// Whether this option starts out selectable. Disabled-by-default
    /// options only become selectable through an `Enable` constraint.
    pub available_by_default: bool,
    /// Metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl StepOption {
    /// Create an option that is available by default
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: OptionKey::new(key),
            label: label.into(),
            available_by_default: true,
            metadata: HashMap::new(),
        }
    }

    /// Mark this option as disabled until a constraint enables it
    pub fn disabled_by_default(mut self) -> Self {
        self.available_by_default = false;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

// ── Step ─────────────────────────────────────────────────────────────

/// An ordered stage of the workflow containing selectable options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Stable key identifying this step
    pub key: StepKey,
    /// Human-readable title
    pub title: String,
    /// The options offered at this step, in display order
    pub options: Vec<StepOption>,
}

impl Step {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: StepKey::new(key),
            title: title.into(),
            options: Vec::new(),
        }
    }

    pub fn with_option(mut self, option: StepOption) -> Self {
        self.options.push(option);
        self
    }

    /// Get an option by key
    pub fn option(&self, key: &OptionKey) -> Option<&StepOption> {
        self.options.iter().find(|o| &o.key == key)
    }

    /// Check whether this step offers the given option
    pub fn has_option(&self, key: &OptionKey) -> bool {
        self.option(key).is_some()
    }

    /// Number of options at this step
    pub fn option_count(&self) -> usize {
        self.options.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_defaults() {
        let opt = StepOption::new("basic", "Basic");
        assert!(opt.available_by_default);

        let locked = StepOption::new("advanced", "Advanced").disabled_by_default();
        assert!(!locked.available_by_default);
    }

    #[test]
    fn test_step_lookup() {
        let step = Step::new("plan", "Choose a plan")
            .with_option(StepOption::new("free", "Free"))
            .with_option(StepOption::new("premium", "Premium"));

        assert_eq!(step.option_count(), 2);
        assert!(step.has_option(&OptionKey::new("free")));
        assert!(!step.has_option(&OptionKey::new("enterprise")));
        assert_eq!(step.option(&OptionKey::new("premium")).unwrap().label, "Premium");
    }

    #[test]
    fn test_option_ref_display() {
        let r = OptionRef::new("plan", "premium");
        assert_eq!(format!("{}", r), "plan.premium");
    }

    #[test]
    fn test_option_ref_parse() {
        let r: OptionRef = "plan.premium".parse().unwrap();
        assert_eq!(r, OptionRef::new("plan", "premium"));
        assert!("noseparator".parse::<OptionRef>().is_err());
        assert!(".premium".parse::<OptionRef>().is_err());
        assert!("plan.".parse::<OptionRef>().is_err());
    }

    #[test]
    fn test_option_ref_serde_round_trip() {
        // Option keys may contain dots; parsing splits on the first one.
        let r = OptionRef::new("plan", "tier.premium");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, "\"plan.tier.premium\"");
        let back: OptionRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_option_metadata() {
        let opt = StepOption::new("premium", "Premium").with_metadata("tier", "paid");
        assert_eq!(opt.metadata.get("tier").unwrap(), "paid");
    }
}
