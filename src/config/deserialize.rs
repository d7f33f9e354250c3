// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles target strings and non-empty command queues.

use nonempty::NonEmpty;
use serde::Deserialize;

use super::Target;

pub fn deserialize_target_option<'de, D>(deserializer: D) -> Result<Option<Target>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<TargetEntry> = Option::deserialize(deserializer)?;
    opt.map(TargetEntry::into_target)
        .transpose()
        .map_err(serde::de::Error::custom)
}

pub fn deserialize_commands<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one shell command is required"))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TargetEntry {
    Simple(String),
    Detailed(Target),
}

impl TargetEntry {
    fn into_target(self) -> Result<Target, String> {
        match self {
            TargetEntry::Simple(s) => Target::parse(&s),
            TargetEntry::Detailed(t) => Ok(t),
        }
    }
}
