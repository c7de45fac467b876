use serde::Serialize;
use tracing::{info, info_span};

/// Domain event for audit logging.
/// Structured for JSON serialization to enable machine-readable audit trails.
#[derive(Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// The watcher started.
    SystemStartup {
        /// Component that started.
        component: String,
    },
    /// The watcher is stopping.
    SystemShutdown {
        /// Why it stopped.
        reason: String,
    },
    /// A task was refused at admission.
    TaskRejected {
        /// Application of the refused task.
        app: String,
        /// Submitting author.
        author: String,
        /// Refusal reason.
        reason: String,
    },
    /// An image override was committed to a GitOps repository.
    GitOpsCommitted {
        /// Application whose override changed.
        app: String,
        /// Task that triggered the change.
        task_id: String,
        /// Repository location.
        repository: String,
        /// Overridden parameters as `name=value`.
        parameters: Vec<String>,
    },
}

/// Logs an audit event to the dedicated audit channel as structured JSON.
/// This uses a specific `target` which can be filtered by the subscriber to redirect to a secure file.
pub fn log_audit(event: &AuditEvent) {
    let span = info_span!(target: "audit", "audit_event");
    let _enter = span.enter();

    let json = serde_json::to_string(event).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"));
    info!(target: "audit", audit_json = %json, "Audit event");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_events_serialize_with_tag() {
        let event = AuditEvent::GitOpsCommitted {
            app: "demo".into(),
            task_id: "0000".into(),
            repository: "git@github.com:org/gitops.git@main:apps/demo".into(),
            parameters: vec!["app.image.tag=v1".into()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "git_ops_committed");
        assert_eq!(json["parameters"][0], "app.image.tag=v1");

        let json = serde_json::to_value(AuditEvent::TaskRejected {
            app: String::new(),
            author: "bob".into(),
            reason: "app must not be empty".into(),
        })
        .unwrap();
        assert_eq!(json["event_type"], "task_rejected");
    }

    #[test]
    fn test_log_audit_variants() {
        log_audit(&AuditEvent::SystemStartup {
            component: "rollout-watcher".into(),
        });
        log_audit(&AuditEvent::SystemShutdown {
            reason: "ctrl-c".into(),
        });
    }
}
