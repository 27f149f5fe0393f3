//! Causes: the events dispatched into a machine.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name given to the cause that drives [`Machine::start`](crate::Machine::start).
pub const START_CAUSE: &str = "$start";

/// An event instance: a name plus an optional payload.
///
/// Causes are immutable once constructed and flow unchanged through one full
/// dispatch, so every hook invoked during that dispatch sees the same value.
///
/// # Example
///
/// ```rust
/// use hsm_engine::Cause;
/// use serde_json::json;
///
/// let plain = Cause::new("tick");
/// assert!(plain.is("tick"));
/// assert!(plain.data().is_none());
///
/// let loaded = Cause::with_data("load", json!({ "id": 7 }));
/// assert_eq!(loaded.data().unwrap()["id"], 7);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
}

impl Cause {
    /// Create a cause without payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
        }
    }

    /// Create a cause carrying a JSON payload.
    pub fn with_data(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data: Some(data),
        }
    }

    /// Create a cause from any serializable payload.
    pub fn serialized<T: Serialize>(
        name: impl Into<String>,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::with_data(name, serde_json::to_value(data)?))
    }

    /// The cause used while entering the initial configuration.
    pub fn start() -> Self {
        Self::new(START_CAUSE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }

    /// Check the cause name.
    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Decode the payload into a typed value.
    ///
    /// Returns `None` when the cause carries no payload.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.data
            .as_ref()
            .map(|value| T::deserialize(value.clone()))
    }
}

impl From<&str> for Cause {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Cause {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
