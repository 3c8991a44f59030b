//! Turns raw Bitbucket pipeline documents into [`Pipeline`] snapshots.
//!
//! Upstream documents are loosely shaped: any field may be missing and nested
//! objects may be absent at any depth. Missing values fall back to defaults,
//! while values that are present but unparseable are reported as
//! [`MonitorError::Normalization`] naming the field.

use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use crate::error::{MonitorError, Result};
use crate::pipeline::{CommitInfo, Pipeline, PipelineStatus, Step, Variable, SECRET_MASK};

const DEFAULT_PIPELINE_NAME: &str = "default";

/// Walks `path` through nested objects, stopping at the first missing key.
pub fn value_at<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(doc, |current, key| current.get(key))
}

pub fn str_at<'a>(doc: &'a Value, path: &[&str]) -> Option<&'a str> {
    value_at(doc, path).and_then(Value::as_str)
}

fn string_or_default(doc: &Value, path: &[&str]) -> String {
    str_at(doc, path).unwrap_or_default().to_string()
}

/// Parses an optional ISO-8601 timestamp at `field`.
///
/// A missing field, `null` or empty string is absent. Anything else must be a
/// valid timestamp; a trailing `Z` is read as `+00:00`.
pub fn timestamp_at(doc: &Value, field: &str) -> Result<Option<DateTime<Utc>>> {
    let raw = match doc.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim(),
        Some(other) => {
            return Err(MonitorError::normalization(
                field,
                format!("expected a timestamp string, found {other}"),
            ))
        }
    };

    let normalized = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(stripped) => format!("{stripped}+00:00"),
        None => raw.to_string(),
    };

    DateTime::parse_from_rfc3339(&normalized)
        .map(|dt| Some(dt.with_timezone(&Utc)))
        .map_err(|e| MonitorError::normalization(field, format!("invalid timestamp '{raw}': {e}")))
}

fn result_name(doc: &Value) -> Option<String> {
    str_at(doc, &["state", "result", "name"])
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
}

fn normalize_commit(pipeline: &Value) -> Result<CommitInfo> {
    let empty = Value::Null;
    let commit = pipeline
        .get("commit")
        .or_else(|| value_at(pipeline, &["target", "commit"]))
        .unwrap_or(&empty);

    let author = str_at(commit, &["author", "user", "display_name"])
        .or_else(|| str_at(commit, &["author", "display_name"]))
        .or_else(|| str_at(commit, &["author", "raw"]))
        .unwrap_or_default()
        .to_string();

    Ok(CommitInfo {
        hash: string_or_default(commit, &["hash"]),
        message: string_or_default(commit, &["message"]).trim_end().to_string(),
        author,
        date: timestamp_at(commit, "date")?,
    })
}

/// Reads the `secured` flag, failing closed: only an absent flag, `null`,
/// `false`, `"false"`, `""` or `0` count as unsecured.
fn is_secured(raw: &Value) -> bool {
    match raw.get("secured") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(flag)) => {
            let flag = flag.trim();
            !(flag.is_empty() || flag.eq_ignore_ascii_case("false") || flag == "0")
        }
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

/// Maps one raw variable document, masking secured values unconditionally.
pub fn normalize_variable(raw: &Value) -> Variable {
    let secured = is_secured(raw);
    let value = if secured {
        SECRET_MASK.to_string()
    } else {
        string_or_default(raw, &["value"])
    };

    Variable {
        key: string_or_default(raw, &["key"]),
        value,
        secured,
    }
}

pub fn normalize_step(raw: &Value) -> Result<Step> {
    let started_at = timestamp_at(raw, "started_on")?;
    let completed_at = timestamp_at(raw, "completed_on")?;

    let duration_seconds = match (started_at, completed_at) {
        (Some(start), Some(end)) => Some((end - start).num_seconds()),
        _ => None,
    };

    Ok(Step {
        name: string_or_default(raw, &["name"]),
        status: PipelineStatus::parse(str_at(raw, &["state", "name"]).unwrap_or_default()),
        result: result_name(raw),
        started_at,
        completed_at,
        duration_seconds,
    })
}

/// Builds a [`Pipeline`] snapshot from a pipeline document and its steps and
/// variables.
///
/// # Errors
///
/// Returns [`MonitorError::Normalization`] when a timestamp field is present
/// but is not valid ISO-8601, or when a terminal pipeline carries no
/// timestamp at all to use as its completion time.
pub fn normalize_pipeline(raw: &Value, steps: &[Value], variables: &[Value]) -> Result<Pipeline> {
    let status = PipelineStatus::parse(str_at(raw, &["state", "name"]).unwrap_or_default());
    let created_at = timestamp_at(raw, "created_on")?;
    let upstream_completed_at = timestamp_at(raw, "completed_on")?;

    let steps = steps.iter().map(normalize_step).collect::<Result<Vec<_>>>()?;
    let variables: Vec<Variable> = variables.iter().map(normalize_variable).collect();

    // completed_at is set exactly when the status is terminal
    let completed_at = if status.is_terminal() {
        let completed_at = upstream_completed_at
            .or_else(|| steps.iter().filter_map(|s| s.completed_at).max())
            .or(created_at)
            .ok_or_else(|| {
                MonitorError::normalization("completed_on", "terminal pipeline has no completion time")
            })?;
        Some(completed_at)
    } else {
        None
    };

    let pipeline = Pipeline {
        id: string_or_default(raw, &["uuid"]),
        repository: string_or_default(raw, &["repository", "full_name"]),
        branch: string_or_default(raw, &["target", "ref_name"]),
        pipeline_definition_name: str_at(raw, &["target", "selector", "pattern"])
            .unwrap_or(DEFAULT_PIPELINE_NAME)
            .to_string(),
        result: result_name(raw),
        status,
        created_at,
        completed_at,
        commit: normalize_commit(raw)?,
        variables,
        steps,
    };

    debug!(
        "Normalized pipeline {} ({}): {} steps, {} variables",
        pipeline.id,
        pipeline.status,
        pipeline.steps.len(),
        pipeline.variables.len()
    );

    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn full_pipeline_doc() -> Value {
        json!({
            "uuid": "{11111111-2222-3333-4444-555555555555}",
            "repository": { "full_name": "acme/widgets" },
            "target": {
                "ref_name": "main",
                "selector": { "type": "custom", "pattern": "deploy-prod" },
                "commit": {
                    "hash": "abcdef0123456789",
                    "message": "Fix flaky test\n",
                    "author": { "raw": "Jo <jo@example.com>", "user": { "display_name": "Jo Doe" } },
                    "date": "2024-03-01T09:58:00+00:00"
                }
            },
            "state": { "name": "COMPLETED", "result": { "name": "SUCCESSFUL" } },
            "created_on": "2024-03-01T10:00:00.123456Z",
            "completed_on": "2024-03-01T10:04:10Z"
        })
    }

    #[test]
    fn test_value_at_missing_intermediate() {
        let doc = json!({ "target": { "ref_name": "main" } });
        assert_eq!(str_at(&doc, &["target", "ref_name"]), Some("main"));
        assert_eq!(value_at(&doc, &["target", "selector", "pattern"]), None);
        assert_eq!(value_at(&doc, &["state", "name"]), None);
        assert_eq!(str_at(&json!({ "target": "not-an-object" }), &["target", "ref_name"]), None);
    }

    #[test]
    fn test_normalize_full_document() {
        let pipeline = normalize_pipeline(&full_pipeline_doc(), &[], &[]).unwrap();

        assert_eq!(pipeline.id, "{11111111-2222-3333-4444-555555555555}");
        assert_eq!(pipeline.repository, "acme/widgets");
        assert_eq!(pipeline.branch, "main");
        assert_eq!(pipeline.pipeline_definition_name, "deploy-prod");
        assert_eq!(pipeline.status, PipelineStatus::Completed);
        assert_eq!(pipeline.result.as_deref(), Some("SUCCESSFUL"));
        assert_eq!(pipeline.commit.hash, "abcdef0123456789");
        assert_eq!(pipeline.commit.message, "Fix flaky test");
        assert_eq!(pipeline.commit.author, "Jo Doe");
        assert_eq!(
            pipeline.completed_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 4, 10).unwrap())
        );
        assert_eq!(pipeline.duration_seconds(), Some(249));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let pipeline = normalize_pipeline(&json!({}), &[], &[]).unwrap();

        assert_eq!(pipeline.id, "");
        assert_eq!(pipeline.repository, "");
        assert_eq!(pipeline.branch, "");
        assert_eq!(pipeline.pipeline_definition_name, "default");
        assert_eq!(pipeline.status, PipelineStatus::Unknown(String::new()));
        assert_eq!(pipeline.result, None);
        assert_eq!(pipeline.created_at, None);
        assert_eq!(pipeline.completed_at, None);
        assert_eq!(pipeline.commit, CommitInfo::default());
        assert!(pipeline.variables.is_empty());
        assert!(pipeline.steps.is_empty());
    }

    #[test]
    fn test_top_level_commit_with_plain_author() {
        let doc = json!({
            "commit": { "hash": "feed", "author": { "display_name": "Sam" } },
            "target": { "commit": { "hash": "ignored" } }
        });
        let pipeline = normalize_pipeline(&doc, &[], &[]).unwrap();
        assert_eq!(pipeline.commit.hash, "feed");
        assert_eq!(pipeline.commit.author, "Sam");
        assert_eq!(pipeline.commit.date, None);
    }

    #[test]
    fn test_secured_variable_is_masked() {
        let variables = vec![
            json!({ "key": "DEPLOY_TOKEN", "value": "hunter2-very-secret", "secured": true }),
            json!({ "key": "REGION", "value": "eu-west-1", "secured": false }),
            json!({ "key": "NO_VALUE", "secured": true }),
            json!({ "key": "PLAIN" }),
        ];
        let pipeline = normalize_pipeline(&json!({}), &[], &variables).unwrap();

        assert_eq!(pipeline.variables[0].value, SECRET_MASK);
        assert!(pipeline.variables[0].secured);
        assert_eq!(pipeline.variables[1].value, "eu-west-1");
        assert_eq!(pipeline.variables[2].value, SECRET_MASK);
        assert_eq!(pipeline.variables[3].value, "");
        assert!(!pipeline.variables[3].secured);
        assert_eq!(SECRET_MASK.len(), 8);
    }

    #[test]
    fn test_truthy_secured_flags_are_masked() {
        for flag in [json!("true"), json!("yes"), json!(1), json!(2.5), json!({}), json!([true])] {
            let variable = normalize_variable(&json!({ "key": "K", "value": "hunter2", "secured": flag }));
            assert_eq!(variable.value, SECRET_MASK, "flag {flag}");
            assert!(variable.secured, "flag {flag}");
        }
    }

    #[test]
    fn test_falsy_secured_flags_keep_value() {
        for flag in [json!(null), json!(false), json!("false"), json!("FALSE"), json!(""), json!("0"), json!(0)] {
            let variable = normalize_variable(&json!({ "key": "K", "value": "visible", "secured": flag }));
            assert_eq!(variable.value, "visible", "flag {flag}");
            assert!(!variable.secured, "flag {flag}");
        }
    }

    #[test]
    fn test_secret_never_reaches_display_map() {
        let variables = vec![json!({ "key": "DEPLOY_TOKEN", "value": "hunter2-very-secret", "secured": true })];
        let pipeline = normalize_pipeline(&full_pipeline_doc(), &[], &variables).unwrap();

        let rendered = serde_json::to_string(&pipeline.to_display_map().unwrap()).unwrap();
        assert!(!rendered.contains("hunter2-very-secret"));
        assert!(!format!("{pipeline:?}").contains("hunter2-very-secret"));
    }

    #[test]
    fn test_step_duration_truncated_to_seconds() {
        let steps = vec![json!({
            "name": "Build",
            "state": { "name": "COMPLETED", "result": { "name": "SUCCESSFUL" } },
            "started_on": "2024-03-01T10:00:00.900Z",
            "completed_on": "2024-03-01T10:01:15.100Z"
        })];
        let pipeline = normalize_pipeline(&json!({}), &steps, &[]).unwrap();
        let step = &pipeline.steps[0];

        assert_eq!(step.name, "Build");
        assert_eq!(step.status, PipelineStatus::Completed);
        assert_eq!(step.result.as_deref(), Some("SUCCESSFUL"));
        assert_eq!(step.duration_seconds, Some(74));
    }

    #[test]
    fn test_step_duration_absent_without_both_timestamps() {
        let steps = vec![
            json!({ "name": "Deploy", "state": { "name": "IN_PROGRESS" }, "started_on": "2024-03-01T10:00:00Z" }),
            json!({ "name": "Wait", "state": { "name": "PENDING" } }),
        ];
        let pipeline = normalize_pipeline(&json!({}), &steps, &[]).unwrap();

        assert_eq!(pipeline.steps[0].duration_seconds, None);
        assert_eq!(pipeline.steps[0].duration_str(), "Not completed");
        assert_eq!(pipeline.steps[1].duration_seconds, None);
        assert_eq!(pipeline.steps[1].started_at, None);
    }

    #[test]
    fn test_zero_length_step_has_zero_duration() {
        let steps = vec![json!({
            "started_on": "2024-03-01T10:00:00Z",
            "completed_on": "2024-03-01T10:00:00Z"
        })];
        let pipeline = normalize_pipeline(&json!({}), &steps, &[]).unwrap();
        assert_eq!(pipeline.steps[0].duration_seconds, Some(0));
        assert_eq!(pipeline.steps[0].duration_str(), "0s");
    }

    #[test]
    fn test_malformed_completed_on_names_field() {
        let mut doc = full_pipeline_doc();
        doc["completed_on"] = json!("not-a-date");

        let err = normalize_pipeline(&doc, &[], &[]).unwrap_err();
        match err {
            MonitorError::Normalization { field, .. } => assert_eq!(field, "completed_on"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_step_timestamp_fails() {
        let steps = vec![json!({ "started_on": "2024-13-45T99:00:00Z" })];
        let err = normalize_pipeline(&json!({}), &steps, &[]).unwrap_err();
        assert!(matches!(err, MonitorError::Normalization { ref field, .. } if field == "started_on"));
    }

    #[test]
    fn test_non_string_timestamp_fails() {
        let err = timestamp_at(&json!({ "created_on": 1_700_000_000 }), "created_on").unwrap_err();
        assert!(err.to_string().contains("created_on"));
    }

    #[test]
    fn test_absent_completed_on_for_running_pipeline() {
        let mut doc = full_pipeline_doc();
        doc["state"] = json!({ "name": "IN_PROGRESS" });
        doc.as_object_mut().unwrap().remove("completed_on");

        let pipeline = normalize_pipeline(&doc, &[], &[]).unwrap();
        assert_eq!(pipeline.completed_at, None);
        assert!(!pipeline.is_terminal());
    }

    #[test]
    fn test_completed_on_dropped_while_not_terminal() {
        let mut doc = full_pipeline_doc();
        doc["state"] = json!({ "name": "RUNNING" });

        let pipeline = normalize_pipeline(&doc, &[], &[]).unwrap();
        assert_eq!(pipeline.completed_at, None);
    }

    #[test]
    fn test_terminal_without_completed_on_falls_back_to_last_step() {
        let mut doc = full_pipeline_doc();
        doc.as_object_mut().unwrap().remove("completed_on");
        let steps = vec![
            json!({ "started_on": "2024-03-01T10:00:05Z", "completed_on": "2024-03-01T10:02:00Z" }),
            json!({ "started_on": "2024-03-01T10:02:00Z", "completed_on": "2024-03-01T10:03:30Z" }),
        ];

        let pipeline = normalize_pipeline(&doc, &steps, &[]).unwrap();
        assert_eq!(
            pipeline.completed_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 3, 30).unwrap())
        );

        let pipeline = normalize_pipeline(&doc, &[], &[]).unwrap();
        assert_eq!(pipeline.completed_at, pipeline.created_at);
    }

    #[test]
    fn test_terminal_without_any_timestamp_is_malformed() {
        let err = normalize_pipeline(&json!({ "state": { "name": "SUCCESSFUL" } }), &[], &[]).unwrap_err();
        assert!(matches!(err, MonitorError::Normalization { ref field, .. } if field == "completed_on"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_completed_at_present_iff_terminal() {
        let steps = vec![json!({ "started_on": "2024-03-01T10:00:00Z", "completed_on": "2024-03-01T10:01:00Z" })];
        for status in ["PENDING", "RUNNING", "PAUSED", "STOPPED", "SUCCESSFUL", "FAILED", "ERROR", "odd"] {
            let doc = json!({ "state": { "name": status }, "created_on": "2024-03-01T09:59:00Z" });
            let pipeline = normalize_pipeline(&doc, &steps, &[]).unwrap();
            assert_eq!(pipeline.is_terminal(), pipeline.completed_at.is_some(), "{status}");
        }
    }

    #[test]
    fn test_lower_case_status_is_recognised() {
        let doc = json!({ "state": { "name": "successful" }, "completed_on": "2024-03-01T10:00:00Z" });
        let pipeline = normalize_pipeline(&doc, &[], &[]).unwrap();
        assert_eq!(pipeline.status, PipelineStatus::Successful);
        assert!(pipeline.completed_at.is_some());
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let doc = full_pipeline_doc();
        let steps = vec![json!({ "name": "Build", "started_on": "2024-03-01T10:00:00Z" })];
        let vars = vec![json!({ "key": "A", "value": "1" })];
        assert_eq!(
            normalize_pipeline(&doc, &steps, &vars).unwrap(),
            normalize_pipeline(&doc, &steps, &vars).unwrap()
        );
    }
}
