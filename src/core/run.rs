//! Structured run specification.
//!
//! A [`RunSpec`] describes *what* to invoke independently of when: either a
//! prompt for the agent or a raw command, plus modifiers. Two distinct
//! pipelines operate on it:
//!
//! - [`RunSpec::from_value`] + [`RunSpec::normalized`]: tolerant decode for
//!   records read back from disk — invalid values drop to unset so a
//!   corrupted or partially-written record never fails to load;
//! - [`RunSpec::validate`]: the strict complement applied before anything
//!   is persisted or installed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use super::types::RunFormat;

/// Errors from strict run-spec validation.
#[derive(Debug, Error)]
pub enum SpecError {
    /// Neither `prompt` nor `command` is populated.
    #[error("job has no prompt or command to run")]
    MissingPrompt,

    /// Both `prompt` and `command` are populated.
    #[error("prompt and command are mutually exclusive")]
    PromptAndCommand,

    /// `attachUrl` is not a well-formed URL.
    #[error("invalid attach URL: '{0}'")]
    InvalidUrl(String),

    /// `port` is zero.
    #[error("port must be a positive integer")]
    InvalidPort,

    /// The job name is empty after trimming.
    #[error("job name must not be empty")]
    EmptyName,
}

/// The structured description of one agent invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunSpec {
    /// Prompt text for the agent. Mutually exclusive with `command`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Raw command for the agent to execute. Mutually exclusive with
    /// `prompt`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Argument string for command mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    /// Attachment paths, passed in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Present only when true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<bool>,
    /// Present only when true. `continue` is a keyword, hence the rename.
    #[serde(rename = "continue", skip_serializing_if = "Option::is_none")]
    pub continue_session: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_format: Option<RunFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attach_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u32>,
}

impl RunSpec {
    /// Tolerant decode from arbitrary JSON.
    ///
    /// Mistyped fields become unset instead of failing the record. Whether
    /// silently dropping an invalid `port`/`runFormat` here (rather than
    /// surfacing a warning) masks user error is an open question; the
    /// behavior is kept for corrupted-record recovery.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        let string = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        let boolean = |key: &str| obj.get(key).and_then(Value::as_bool);

        Self {
            prompt: string("prompt"),
            command: string("command"),
            arguments: string("arguments"),
            files: obj.get("files").and_then(Value::as_array).map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            }),
            agent: string("agent"),
            model: string("model"),
            variant: string("variant"),
            title: string("title"),
            share: boolean("share"),
            continue_session: boolean("continue"),
            session: string("session"),
            run_format: string("runFormat").as_deref().and_then(RunFormat::parse),
            attach_url: string("attachUrl"),
            port: obj
                .get("port")
                .and_then(Value::as_u64)
                .and_then(|p| u32::try_from(p).ok()),
        }
    }

    /// Leniently normalize: trim strings to unset when empty, keep booleans
    /// only when true, and drop invalid URL/port values back to unset.
    pub fn normalized(&self) -> Self {
        let trim = |field: &Option<String>| {
            field
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            prompt: trim(&self.prompt),
            command: trim(&self.command),
            arguments: trim(&self.arguments),
            files: self
                .files
                .as_ref()
                .map(|files| {
                    files
                        .iter()
                        .map(|f| f.trim().to_string())
                        .filter(|f| !f.is_empty())
                        .collect::<Vec<_>>()
                })
                .filter(|files| !files.is_empty()),
            agent: trim(&self.agent),
            model: trim(&self.model),
            variant: trim(&self.variant),
            title: trim(&self.title),
            share: self.share.filter(|&s| s),
            continue_session: self.continue_session.filter(|&c| c),
            session: trim(&self.session),
            run_format: self.run_format,
            attach_url: trim(&self.attach_url).filter(|u| Url::parse(u).is_ok()),
            port: self.port.filter(|&p| p > 0),
        }
    }

    /// Strict validation, applied before persistence or install.
    pub fn validate(&self) -> Result<(), SpecError> {
        match (&self.prompt, &self.command) {
            (None, None) => return Err(SpecError::MissingPrompt),
            (Some(_), Some(_)) => return Err(SpecError::PromptAndCommand),
            _ => {}
        }
        if let Some(url) = &self.attach_url {
            Url::parse(url).map_err(|_| SpecError::InvalidUrl(url.clone()))?;
        }
        if self.port == Some(0) {
            return Err(SpecError::InvalidPort);
        }
        Ok(())
    }

    /// Merge caller-supplied overrides over this spec, field by field.
    /// Set fields in `overrides` win; unset fields keep this spec's value.
    pub fn merged_with(&self, overrides: &RunSpec) -> Self {
        let pick = |ours: &Option<String>, theirs: &Option<String>| {
            theirs.clone().or_else(|| ours.clone())
        };
        Self {
            prompt: pick(&self.prompt, &overrides.prompt),
            command: pick(&self.command, &overrides.command),
            arguments: pick(&self.arguments, &overrides.arguments),
            files: overrides.files.clone().or_else(|| self.files.clone()),
            agent: pick(&self.agent, &overrides.agent),
            model: pick(&self.model, &overrides.model),
            variant: pick(&self.variant, &overrides.variant),
            title: pick(&self.title, &overrides.title),
            share: overrides.share.or(self.share),
            continue_session: overrides.continue_session.or(self.continue_session),
            session: pick(&self.session, &overrides.session),
            run_format: overrides.run_format.or(self.run_format),
            attach_url: pick(&self.attach_url, &overrides.attach_url),
            port: overrides.port.or(self.port),
        }
    }
}
