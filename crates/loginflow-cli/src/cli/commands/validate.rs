//! `validate` command: dry-run a field value against its rule.

use anyhow::Result;
use loginflow_core::config::Config;
use loginflow_core::form::Field;
use loginflow_core::validation::Validator;

pub fn run(config: &Config, field: Field, value: &str) -> Result<()> {
    let validator = Validator::from_config(&config.validation)?;
    if validator.validate(field, value) {
        println!("{field}: valid");
        Ok(())
    } else {
        anyhow::bail!(
            "{field}: invalid (must match {})",
            validator.rule(field).as_str()
        )
    }
}
