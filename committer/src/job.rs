//! The view of a running job that the committer is handed by the job-driving framework.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};

/// Identifies one execution of a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a job as tracked by the framework.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    StrumDisplay,
    AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
    Killed,
}

impl JobState {
    /// The states a job may be aborted with.
    pub fn is_abort_state(&self) -> bool {
        matches!(self, JobState::Failed | JobState::Killed)
    }
}

/// String key/value settings of a job. Keys the committer reads are listed in [`crate::config`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration(HashMap<String, String>);

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Builder-style [`Self::set`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A job execution: its id, its configuration and its current state. Owned by the framework;
/// the committer only reads it.
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: JobId,
    configuration: Configuration,
    state: JobState,
}

impl JobContext {
    /// A context for a running job.
    pub fn new(job_id: impl Into<String>, configuration: Configuration) -> Self {
        Self {
            job_id: JobId::new(job_id),
            configuration,
            state: JobState::Running,
        }
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = state;
        self
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn state(&self) -> JobState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_parses_framework_names() {
        assert_eq!("FAILED".parse::<JobState>().unwrap(), JobState::Failed);
        assert_eq!("killed".parse::<JobState>().unwrap(), JobState::Killed);
        assert_eq!(JobState::Succeeded.to_string(), "SUCCEEDED");
        assert!("DONE".parse::<JobState>().is_err());
    }

    #[test]
    fn only_failed_and_killed_abort() {
        assert!(JobState::Failed.is_abort_state());
        assert!(JobState::Killed.is_abort_state());
        assert!(!JobState::Running.is_abort_state());
        assert!(!JobState::Succeeded.is_abort_state());
    }

    #[test]
    fn configuration_deserializes_from_json_object() {
        let conf: Configuration =
            serde_json::from_str(r#"{"load.output.table.id": "events", "other": "x"}"#).unwrap();
        assert_eq!(conf.get("load.output.table.id"), Some("events"));
        assert_eq!(conf.get("missing"), None);
        assert_eq!(conf.iter().count(), 2);
    }

    #[test]
    fn context_starts_running() {
        let ctx = JobContext::new("job_1", Configuration::new().with("a", "b"));
        assert_eq!(ctx.state(), JobState::Running);
        assert_eq!(ctx.job_id().as_str(), "job_1");
        assert_eq!(ctx.configuration().get("a"), Some("b"));
        assert_eq!(ctx.with_state(JobState::Killed).state(), JobState::Killed);
    }
}
