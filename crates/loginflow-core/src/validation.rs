//! Client-side credential validation.
//!
//! Each field has its own pattern rule. Rules are pure and total: any string
//! (including the empty string) maps to a validity flag without side effects.

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::ValidationConfig;
use crate::form::{Credentials, Field};

/// A single pattern rule applied to a field value.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
}

impl Rule {
    /// Compiles a rule from a regular expression.
    ///
    /// # Errors
    /// Returns an error if the pattern is not a valid regular expression.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern =
            Regex::new(pattern).with_context(|| format!("Invalid validation pattern: {pattern}"))?;
        Ok(Self { pattern })
    }

    /// Returns true if `value` satisfies the rule.
    pub fn validate(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }

    /// The source pattern of this rule.
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Per-field validation results.
///
/// Only produced by [`Validator::check`]; there are no setters, so a value of
/// this type always reflects some concrete credentials snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationState {
    username: bool,
    password: bool,
}

impl ValidationState {
    pub fn username(&self) -> bool {
        self.username
    }

    pub fn password(&self) -> bool {
        self.password
    }

    pub fn get(&self, field: Field) -> bool {
        match field {
            Field::Username => self.username,
            Field::Password => self.password,
        }
    }

    /// Returns true when no entry is false.
    pub fn all_valid(&self) -> bool {
        self.username && self.password
    }
}

/// Display flags for a single input field.
///
/// An empty field is neither successful nor in danger; it simply has not been
/// filled in yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldFlags {
    pub success: bool,
    pub danger: bool,
}

impl FieldFlags {
    pub fn new(value: &str, valid: bool) -> Self {
        let filled = !value.is_empty();
        Self {
            success: filled && valid,
            danger: filled && !valid,
        }
    }
}

/// Username and password rules.
#[derive(Debug, Clone)]
pub struct Validator {
    username: Rule,
    password: Rule,
}

impl Validator {
    pub fn new(username: Rule, password: Rule) -> Self {
        Self { username, password }
    }

    /// Builds a validator from config.
    ///
    /// Logs a warning when both fields share one pattern: username and
    /// password have different shapes and a shared rule is usually a mistake.
    ///
    /// # Errors
    /// Returns an error if either pattern fails to compile.
    pub fn from_config(config: &ValidationConfig) -> Result<Self> {
        let username = Rule::new(&config.username_pattern).context("username rule")?;
        let password = Rule::new(&config.password_pattern).context("password rule")?;
        let validator = Self::new(username, password);
        if validator.shares_rule() {
            tracing::warn!(
                pattern = validator.username.as_str(),
                "username and password share the same validation pattern"
            );
        }
        Ok(validator)
    }

    /// Returns true if both fields are checked against the same pattern.
    pub fn shares_rule(&self) -> bool {
        self.username.as_str() == self.password.as_str()
    }

    pub fn rule(&self, field: Field) -> &Rule {
        match field {
            Field::Username => &self.username,
            Field::Password => &self.password,
        }
    }

    /// Validates a single field value.
    pub fn validate(&self, field: Field, value: &str) -> bool {
        self.rule(field).validate(value)
    }

    /// Computes the validation state for a credentials snapshot.
    pub fn check(&self, credentials: &Credentials) -> ValidationState {
        ValidationState {
            username: self.username.validate(&credentials.username),
            password: self.password.validate(&credentials.password),
        }
    }
}

#[cfg(test)]
pub(crate) fn default_validator() -> Validator {
    Validator::from_config(&ValidationConfig::default()).unwrap()
}
