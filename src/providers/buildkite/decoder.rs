//! Normalizes raw, polymorphic job records into an ordered job sequence.
//!
//! Each raw node is inspected for its type discriminator before any
//! variant-specific parsing happens. Command and wait jobs are parsed into
//! their typed form. Trigger jobs that fired are kept in command form, carrying
//! the triggered build. Every other variant is logged and dropped. The
//! returned sequence is always oldest first.

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

use super::slug::BuildSlug;
use super::types::{CommandJob, Job, JobState, WaitJob};
use crate::error::{CITraceError, Result};

/// Wire dialect of the job records being decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchema {
    /// GraphQL `jobs.edges[].node`, discriminated by `__typename`, newest first
    GraphQl,
    /// REST `jobs[]`, discriminated by `type`, oldest first
    Rest,
}

enum JobKind {
    Command,
    Trigger,
    Wait,
    Unhandled,
}

impl JobSchema {
    fn discriminator_field(self) -> &'static str {
        match self {
            Self::GraphQl => "__typename",
            Self::Rest => "type",
        }
    }

    fn kind(self, discriminator: &str) -> JobKind {
        match (self, discriminator) {
            (Self::GraphQl, "JobTypeCommand") | (Self::Rest, "script") => JobKind::Command,
            (Self::GraphQl, "JobTypeTrigger") | (Self::Rest, "trigger") => JobKind::Trigger,
            (Self::GraphQl, "JobTypeWait") | (Self::Rest, "waiter") => JobKind::Wait,
            _ => JobKind::Unhandled,
        }
    }

    fn newest_first(self) -> bool {
        matches!(self, Self::GraphQl)
    }
}

/// Decodes raw job nodes into command and wait jobs, oldest first.
///
/// Command jobs in state `SKIPPED` are dropped, as are trigger jobs without a
/// triggered build and all variants other than command, trigger and wait.
///
/// # Errors
///
/// Returns `CITraceError::Decode` if a node is not an object, a command or wait
/// node lacks a required field, or a timestamp is not strict RFC 3339.
pub fn decode(nodes: Vec<Value>, schema: JobSchema) -> Result<Vec<Job>> {
    let mut jobs = Vec::with_capacity(nodes.len());

    for node in nodes {
        let discriminator = node
            .as_object()
            .ok_or_else(|| CITraceError::Decode(format!("job record is not an object: {node}")))?
            .get(schema.discriminator_field())
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match schema.kind(&discriminator) {
            JobKind::Command => push_command(&mut jobs, parse_command(node, schema)?),
            JobKind::Trigger => match parse_trigger(node, schema)? {
                Some(trigger) => push_command(&mut jobs, trigger),
                None => info!("Trigger job without a triggered build, dropping"),
            },
            JobKind::Wait => jobs.push(Job::Wait(parse_wait(node, schema)?)),
            JobKind::Unhandled => info!("Unhandled job type {discriminator:?}"),
        }
    }

    if schema.newest_first() {
        jobs.reverse();
    }

    Ok(jobs)
}

fn push_command(jobs: &mut Vec<Job>, command: CommandJob) {
    if command.state == JobState::Skipped {
        debug!("Dropping skipped job {}", command.display_name());
        return;
    }
    jobs.push(Job::Command(command));
}

/// A trigger job in command form, so its triggered build nests under its span.
fn parse_trigger(node: Value, schema: JobSchema) -> Result<Option<CommandJob>> {
    let mut trigger = parse_command(node, schema)?;
    if trigger.triggered.is_none() {
        return Ok(None);
    }

    // Trigger steps never run on an agent and may have no start time
    trigger.started_at = trigger
        .started_at
        .or(trigger.runnable_at)
        .or(trigger.created_at);

    Ok(Some(trigger))
}

fn parse_command(node: Value, schema: JobSchema) -> Result<CommandJob> {
    let command = match schema {
        JobSchema::GraphQl => {
            let node: GraphQlCommandNode = from_node(node, "command")?;
            RawCommand {
                uuid: node.uuid,
                label: node.label,
                command: node.command,
                state: node.state,
                created_at: node.created_at,
                runnable_at: node.runnable_at,
                started_at: node.started_at,
                finished_at: node.finished_at,
                triggered: node.triggered,
            }
        }
        JobSchema::Rest => {
            let job: RestCommandJob = from_node(node, "command")?;
            RawCommand {
                uuid: job.id,
                label: job.name,
                command: job.command,
                state: job.state,
                created_at: job.created_at,
                runnable_at: job.runnable_at,
                started_at: job.started_at,
                finished_at: job.finished_at,
                triggered: job.triggered_build,
            }
        }
    };

    let triggered = command.triggered.map(TriggerRef::resolve).transpose()?;

    Ok(CommandJob {
        uuid: command.uuid,
        label: command.label.unwrap_or_default(),
        state: command.state,
        command: command.command.unwrap_or_default(),
        created_at: command.created_at,
        runnable_at: command.runnable_at,
        started_at: command.started_at,
        finished_at: command.finished_at,
        triggered,
    })
}

fn parse_wait(node: Value, schema: JobSchema) -> Result<WaitJob> {
    match schema {
        JobSchema::GraphQl => {
            let node: GraphQlWaitNode = from_node(node, "wait")?;
            Ok(WaitJob {
                uuid: node.uuid,
                state: node.state,
            })
        }
        JobSchema::Rest => {
            let job: RestWaitJob = from_node(node, "wait")?;
            Ok(WaitJob {
                uuid: job.id,
                state: job
                    .state
                    .unwrap_or_else(|| JobState::Other("UNKNOWN".to_string())),
            })
        }
    }
}

fn from_node<T: serde::de::DeserializeOwned>(node: Value, variant: &str) -> Result<T> {
    serde_json::from_value(node)
        .map_err(|e| CITraceError::Decode(format!("invalid {variant} job: {e}")))
}

struct RawCommand {
    uuid: String,
    label: Option<String>,
    command: Option<String>,
    state: JobState,
    created_at: Option<DateTime<Utc>>,
    runnable_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    triggered: Option<TriggerRef>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphQlCommandNode {
    uuid: String,
    label: Option<String>,
    command: Option<String>,
    state: JobState,
    #[serde(default, deserialize_with = "timestamp::optional")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    runnable_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    finished_at: Option<DateTime<Utc>>,
    triggered: Option<TriggerRef>,
}

#[derive(Deserialize)]
struct GraphQlWaitNode {
    uuid: String,
    state: JobState,
}

#[derive(Deserialize)]
struct RestCommandJob {
    id: String,
    name: Option<String>,
    command: Option<String>,
    state: JobState,
    #[serde(default, deserialize_with = "timestamp::optional")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    runnable_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    started_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    finished_at: Option<DateTime<Utc>>,
    triggered_build: Option<TriggerRef>,
}

#[derive(Deserialize)]
struct RestWaitJob {
    id: String,
    state: Option<JobState>,
}

/// Reference to a triggered child build, by slug or URL.
#[derive(Deserialize)]
struct TriggerRef {
    slug: Option<String>,
    #[serde(alias = "webUrl")]
    web_url: Option<String>,
    url: Option<String>,
}

impl TriggerRef {
    fn resolve(self) -> Result<BuildSlug> {
        let resolved = if let Some(slug) = &self.slug {
            BuildSlug::parse(slug)
        } else if let Some(url) = self.web_url.as_ref().or(self.url.as_ref()) {
            BuildSlug::from_url(url)
        } else {
            return Err(CITraceError::Decode(
                "triggered build reference has neither slug nor url".to_string(),
            ));
        };

        resolved.map_err(|e| CITraceError::Decode(format!("invalid triggered build: {e}")))
    }
}

/// Strict RFC 3339 timestamps. `null` and missing fields decode to `None`.
pub(crate) mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer};

    pub fn optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|ts| ts.with_timezone(&Utc))
                    .map_err(|e| de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
            })
            .transpose()
    }
}
