//! Integration tests for events

#[cfg(test)]
mod tests {
    use plugpm_events::*;

    #[tokio::test]
    async fn test_event_emitter_order() {
        let (tx, mut rx) = channel();

        tx.emit(ResolverEvent::ResolutionStarted {
            install: vec!["test-opt-dep3-1.0.0".to_string()],
            remove: Vec::new(),
            upgrade: Vec::new(),
            strategy: "cudf".to_string(),
        });
        tx.emit(ResolverEvent::ResolutionFailed {
            message: "No solution found.".to_string(),
            code: Some("resolver.solver_failure".to_string()),
        });

        let first = rx.recv().await.unwrap();
        assert!(matches!(first.event, ResolverEvent::ResolutionStarted { .. }));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second.event, ResolverEvent::ResolutionFailed { .. }));
        assert_eq!(second.meta.level, EventLevel::Error);
        assert_ne!(first.meta.event_id, second.meta.event_id);
    }

    #[tokio::test]
    async fn test_emit_with_meta_keeps_correlation() {
        let (tx, mut rx) = channel();
        let event = ResolverEvent::conflict_detected(
            vec![("nuxeo".to_string(), "9.10.0-HF01".to_string())],
            "Update impossible for nuxeo-9.10.0-HF01".to_string(),
            DependencyConflictType::InstalledBreakage,
        );
        let meta = EventMeta::new(event.level(), EventSource::RESOLVER)
            .with_correlation_id("request-42")
            .with_label("strategy", "legacy");
        tx.emit_with_meta(EventMessage { meta, event });

        let message = rx.recv().await.unwrap();
        assert_eq!(message.meta.correlation_id.as_deref(), Some("request-42"));
        assert_eq!(message.meta.labels.get("strategy").map(String::as_str), Some("legacy"));
        assert_eq!(message.meta.tracing_level(), tracing::Level::WARN);
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit(ResolverEvent::NonOptimalSolution {
            criteria: "-removed,-changed,-notuptodate,-new".to_string(),
        });
    }

    #[test]
    fn test_conflict_type_serialization() {
        let event = ResolverEvent::conflict_detected(
            Vec::new(),
            "loop".to_string(),
            DependencyConflictType::CircularDependency,
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DependencyConflictDetected");
        let back: ResolverEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(
            back,
            ResolverEvent::DependencyConflictDetected {
                conflict_type: DependencyConflictType::CircularDependency,
                ..
            }
        ));
    }
}
