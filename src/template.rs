//! Variable interpolation for launch configuration fields.
//!
//! Actions are written as `{{ ... }}`. The built-in [`TemplateContext`]
//! understands `{{timestamp}}`, `{{uuid}}` and ``{{user `name`}}``.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while expanding a template string.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TemplateError {
    /// A `{{` was opened without a matching `}}`.
    #[error("unterminated template action in {0:?}")]
    Unterminated(String),
    /// The action names a function the context does not provide.
    #[error("function {0:?} not defined")]
    UnknownFunction(String),
    /// A `user` action referenced a variable that was never set.
    #[error("user variable {0:?} not defined")]
    UnknownVariable(String),
}

/// Expands template actions embedded in a raw configuration value.
pub trait TemplateExpander {
    /// Returns `raw` with every action replaced by its value.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when an action is malformed or cannot be
    /// evaluated.
    fn expand(&self, raw: &str) -> Result<String, TemplateError>;
}

impl<F> TemplateExpander for F
where
    F: Fn(&str) -> Result<String, TemplateError>,
{
    fn expand(&self, raw: &str) -> Result<String, TemplateError> {
        self(raw)
    }
}

/// Default expansion context.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TemplateContext {
    timestamp: u64,
    user_variables: BTreeMap<String, String>,
}

impl TemplateContext {
    /// Creates a context whose `timestamp` is the current UNIX time.
    #[must_use]
    pub fn new() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        Self {
            timestamp,
            user_variables: BTreeMap::new(),
        }
    }

    /// Pins the value returned by `{{timestamp}}`.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Defines a variable readable through ``{{user `name`}}``.
    #[must_use]
    pub fn with_user_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_variables.insert(name.into(), value.into());
        self
    }

    fn evaluate(&self, action: &str) -> Result<String, TemplateError> {
        let (function, argument) = action
            .split_once(char::is_whitespace)
            .map_or((action, ""), |(name, rest)| (name, rest.trim()));

        match function {
            "timestamp" if argument.is_empty() => Ok(self.timestamp.to_string()),
            "uuid" if argument.is_empty() => Ok(Uuid::new_v4().to_string()),
            "user" => {
                let name = argument.trim_matches('`').trim_matches('"');
                self.user_variables
                    .get(name)
                    .cloned()
                    .ok_or_else(|| TemplateError::UnknownVariable(name.to_owned()))
            }
            _ => Err(TemplateError::UnknownFunction(action.to_owned())),
        }
    }
}

impl Default for TemplateContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateExpander for TemplateContext {
    fn expand(&self, raw: &str) -> Result<String, TemplateError> {
        let mut output = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some((literal, opened)) = rest.split_once("{{") {
            output.push_str(literal);
            let (action, after) = opened
                .split_once("}}")
                .ok_or_else(|| TemplateError::Unterminated(raw.to_owned()))?;
            output.push_str(&self.evaluate(action.trim())?);
            rest = after;
        }
        output.push_str(rest);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn context() -> TemplateContext {
        TemplateContext::new()
            .with_timestamp(1_700_000_000)
            .with_user_variable("image", "ubuntu-22.04")
    }

    #[rstest]
    #[case("plain", "plain")]
    #[case("img-{{timestamp}}", "img-1700000000")]
    #[case("{{ timestamp }}", "1700000000")]
    #[case("{{user `image`}}", "ubuntu-22.04")]
    #[case("{{ user `image` }}-{{timestamp}}", "ubuntu-22.04-1700000000")]
    fn expands_known_actions(context: TemplateContext, #[case] raw: &str, #[case] expected: &str) {
        assert_eq!(context.expand(raw).as_deref(), Ok(expected));
    }

    #[rstest]
    fn uuid_action_yields_fresh_identifier(context: TemplateContext) {
        let expanded = context
            .expand("{{uuid}}")
            .unwrap_or_else(|err| panic!("uuid should expand: {err}"));
        assert!(
            Uuid::parse_str(&expanded).is_ok(),
            "not a uuid: {expanded}"
        );
    }

    #[rstest]
    fn unterminated_action_is_rejected(context: TemplateContext) {
        assert_eq!(
            context.expand("img-{{timestamp"),
            Err(TemplateError::Unterminated(String::from("img-{{timestamp")))
        );
    }

    #[rstest]
    fn unknown_function_is_rejected(context: TemplateContext) {
        assert_eq!(
            context.expand("{{ isotime }}"),
            Err(TemplateError::UnknownFunction(String::from("isotime")))
        );
    }

    #[rstest]
    fn unknown_user_variable_is_rejected(context: TemplateContext) {
        assert_eq!(
            context.expand("{{user `flavor`}}"),
            Err(TemplateError::UnknownVariable(String::from("flavor")))
        );
    }

    #[test]
    fn closures_act_as_expanders() {
        let upper = |raw: &str| Ok::<_, TemplateError>(raw.to_uppercase());
        assert_eq!(upper.expand("abc"), Ok(String::from("ABC")));
    }
}
