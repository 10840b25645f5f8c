//! 実行履歴から「いま実行中の step 名」を割り出す

use serde::Deserialize;
use serde_json::Value;

use crate::ports::{HistoryEvent, HistoryEventKind};

/// Execution ARN of `execution_name` under `state_machine_arn`.
pub fn execution_arn(state_machine_arn: &str, execution_name: &str) -> String {
    format!(
        "{}:{}",
        state_machine_arn.replace(":stateMachine:", ":execution:"),
        execution_name
    )
}

/// Pick the step name out of a newest-first history page.
///
/// With a resource ARN, the latest Lambda/activity scheduled for that ARN
/// wins (this is what keeps parallel branches apart). Otherwise the latest
/// `TaskStateEntered` is used, but never one that has already been exited.
pub fn current_task_name(events: &[HistoryEvent], resource_arn: Option<&str>) -> Option<String> {
    if let Some(arn) = resource_arn {
        let scheduled = events
            .iter()
            .filter(|e| e.scheduled_resource() == Some(arn))
            .find_map(|e| {
                let previous = e.previous_event_id?;
                events
                    .iter()
                    .find(|p| p.id == previous)
                    .and_then(|p| p.entered_task_name())
            });
        if let Some(name) = scheduled {
            return Some(name.to_string());
        }
    }

    for event in events {
        match &event.kind {
            HistoryEventKind::StateExited { .. } => break,
            HistoryEventKind::TaskStateEntered { name } => return Some(name.clone()),
            _ => {}
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct ArnMapping {
    arn: String,
    name: String,
}

/// Look the resource ARN up in `workflow_config.arns_to_name_mappings`.
pub fn mapped_task_name(message: &Value, resource_arn: Option<&str>) -> Option<String> {
    let arn = resource_arn?;
    let mappings = message
        .get("workflow_config")?
        .get("arns_to_name_mappings")?
        .clone();
    let mappings: Vec<ArnMapping> = serde_json::from_value(mappings).ok()?;
    mappings
        .into_iter()
        .find(|m| m.arn == arn)
        .map(|m| m.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entered(id: u64, name: &str) -> HistoryEvent {
        HistoryEvent::new(
            id,
            id.checked_sub(1),
            HistoryEventKind::TaskStateEntered { name: name.into() },
        )
    }

    fn scheduled(id: u64, resource: &str) -> HistoryEvent {
        HistoryEvent::new(
            id,
            Some(id - 1),
            HistoryEventKind::LambdaFunctionScheduled {
                resource: resource.into(),
            },
        )
    }

    #[test]
    fn builds_execution_arn() {
        assert_eq!(
            execution_arn("arn:aws:states:us-east-1:1:stateMachine:Ingest", "run-1"),
            "arn:aws:states:us-east-1:1:execution:Ingest:run-1"
        );
    }

    #[test]
    fn parallel_branches_resolve_by_resource() {
        // newest first: branch B entered after branch A
        let events = vec![
            scheduled(4, "arn:lambda:b"),
            entered(3, "SyncB"),
            scheduled(2, "arn:lambda:a"),
            entered(1, "SyncA"),
        ];
        assert_eq!(
            current_task_name(&events, Some("arn:lambda:a")).as_deref(),
            Some("SyncA")
        );
        assert_eq!(current_task_name(&events, None).as_deref(), Some("SyncB"));
    }

    #[test]
    fn unknown_resource_falls_back_to_latest_entered() {
        let events = vec![scheduled(2, "arn:lambda:a"), entered(1, "Discover")];
        assert_eq!(
            current_task_name(&events, Some("arn:lambda:zzz")).as_deref(),
            Some("Discover")
        );
    }

    #[test]
    fn stops_at_exited_states() {
        let events = vec![
            HistoryEvent::new(
                2,
                Some(1),
                HistoryEventKind::StateExited {
                    name: "Discover".into(),
                },
            ),
            entered(1, "Discover"),
        ];
        assert_eq!(current_task_name(&events, None), None);
    }

    #[test]
    fn arn_mappings() {
        let message = json!({
            "workflow_config": {
                "arns_to_name_mappings": [ { "arn": "arn:lambda:a", "name": "SyncA" } ]
            }
        });
        assert_eq!(
            mapped_task_name(&message, Some("arn:lambda:a")).as_deref(),
            Some("SyncA")
        );
        assert_eq!(mapped_task_name(&message, Some("arn:lambda:b")), None);
        assert_eq!(mapped_task_name(&message, None), None);
    }
}
