use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::Deref;

/// A [`SecretString`] that can be read from configuration files.
///
/// Debug output stays redacted; the value is only exposed when serialized or
/// when handed to the replication client through [`ExposeSecret`].
#[derive(Clone, Debug)]
pub struct SerializableSecretString(SecretString);

impl Deref for SerializableSecretString {
    type Target = SecretString;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for SerializableSecretString {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&str> for SerializableSecretString {
    fn from(value: &str) -> Self {
        Self(value.to_owned().into())
    }
}

impl Serialize for SerializableSecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.0.expose_secret())
    }
}

impl<'de> Deserialize<'de> for SerializableSecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        Ok(Self(string.into()))
    }
}
