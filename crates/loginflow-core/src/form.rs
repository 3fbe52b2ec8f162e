//! Login form fields.
//!
//! `FieldStore` owns the credentials being typed and keeps the derived
//! validation state in lockstep: every write recomputes it before returning.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::validation::{FieldFlags, ValidationState, Validator};

/// A login form input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Username,
    Password,
}

impl Field {
    pub fn all() -> &'static [Field] {
        &[Field::Username, Field::Password]
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Username => "username",
            Field::Password => "password",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "username" => Ok(Self::Username),
            "password" => Ok(Self::Password),
            _ => Err(format!("Unknown field: {value} (expected username or password)")),
        }
    }
}

/// Username/password pair entered by the user.
///
/// Serializes to exactly the two form fields sent to the token endpoint.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Username => &self.username,
            Field::Password => &self.password,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Partial credentials update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct CredentialsPatch {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CredentialsPatch {
    pub fn field(field: Field, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match field {
            Field::Username => Self {
                username: value,
                ..Self::default()
            },
            Field::Password => Self {
                password: value,
                ..Self::default()
            },
        }
    }
}

/// Current form values plus their derived validation state.
#[derive(Debug, Clone)]
pub struct FieldStore {
    credentials: Credentials,
    validation: ValidationState,
    validator: Validator,
}

impl FieldStore {
    pub fn new(validator: Validator) -> Self {
        let credentials = Credentials::default();
        let validation = validator.check(&credentials);
        Self {
            credentials,
            validation,
            validator,
        }
    }

    /// Sets one field, leaving the other untouched.
    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        self.merge(CredentialsPatch::field(field, value));
    }

    /// Merges a partial update and recomputes validation.
    pub fn merge(&mut self, patch: CredentialsPatch) {
        if let Some(username) = patch.username {
            self.credentials.username = username;
        }
        if let Some(password) = patch.password {
            self.credentials.password = password;
        }
        self.validation = self.validator.check(&self.credentials);
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn validation(&self) -> ValidationState {
        self.validation
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Returns true when every field passes its rule.
    pub fn can_submit(&self) -> bool {
        self.validation.all_valid()
    }

    pub fn flags(&self, field: Field) -> FieldFlags {
        FieldFlags::new(self.credentials.get(field), self.validation.get(field))
    }
}
