use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("policy step {step} has no action name")]
    EmptyAction { step: usize },

    #[error("policy step {step} ('{action}') has invalid value '{value}'")]
    InvalidValue { step: usize, action: String, value: String },

    #[error("action '{action}' is not supported; valid actions: {valid}")]
    UnsupportedAction { action: String, valid: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PolicyStep {
    pub action: String,
    pub value: Option<f32>,
}

impl fmt::Display for PolicyStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(value) => write!(f, "{}={}", self.action, value),
            None => f.write_str(&self.action),
        }
    }
}

/// Controllable policy script: `action[=seconds]` steps separated by `;`,
/// e.g. `green=15;yellow=3;red=20;loop`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlPolicy {
    steps: Vec<PolicyStep>,
}

impl ControlPolicy {
    pub fn parse(text: &str) -> Result<Self, PolicyError> {
        let mut steps = Vec::new();
        for (step, raw) in text.split(';').map(str::trim).filter(|raw| !raw.is_empty()).enumerate() {
            let (action, value) = match raw.split_once('=') {
                Some((action, value)) => (action.trim(), Some(value.trim())),
                None => (raw, None),
            };
            if action.is_empty() {
                return Err(PolicyError::EmptyAction { step });
            }
            let value = match value {
                Some(value) => {
                    let parsed = value.parse::<f32>().ok().filter(|parsed| parsed.is_finite() && *parsed >= 0.0);
                    match parsed {
                        Some(parsed) => Some(parsed),
                        None => {
                            return Err(PolicyError::InvalidValue {
                                step,
                                action: action.to_string(),
                                value: value.to_string(),
                            })
                        }
                    }
                }
                None => None,
            };
            steps.push(PolicyStep { action: action.to_ascii_lowercase(), value });
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[PolicyStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn validate_against<S: AsRef<str>>(&self, valid_actions: &[S]) -> Result<(), PolicyError> {
        for step in &self.steps {
            if !valid_actions.iter().any(|valid| valid.as_ref().eq_ignore_ascii_case(&step.action)) {
                let valid = valid_actions.iter().map(|valid| valid.as_ref()).collect::<Vec<_>>().join(", ");
                return Err(PolicyError::UnsupportedAction { action: step.action.clone(), valid });
            }
        }
        Ok(())
    }
}

impl FromStr for ControlPolicy {
    type Err = PolicyError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

impl fmt::Display for ControlPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, step) in self.steps.iter().enumerate() {
            if index > 0 {
                f.write_str(";")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}
