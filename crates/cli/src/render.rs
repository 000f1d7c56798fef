//! Terminal rendering of controller events.

use squeezer_core::controller::{format_size, UiEvent};
use squeezer_core::media_store::MediaRecord;

/// How `compress` prints UI events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFormat {
    Text,
    Json,
}

/// Renders one event, or `None` if it has no terminal representation.
pub fn render_event(event: &UiEvent, format: EventFormat) -> Option<String> {
    if format == EventFormat::Json {
        return serde_json::to_string(event).ok();
    }

    match event {
        UiEvent::StateChanged { snapshot, .. } => Some(format!("[{}]", snapshot.state)),
        UiEvent::OriginalSize { text, .. } => Some(format!("Original size: {}", text)),
        UiEvent::Progress { percent, .. } => Some(format!("Progress: {}%", percent)),
        UiEvent::FinalSize { text, .. } => Some(format!("Compressed size: {}", text)),
        UiEvent::ElapsedTime { text, .. } => Some(format!("Elapsed: {}", text)),
        UiEvent::Failure { message, .. } => Some(format!("Compression failed: {}", message)),
        UiEvent::Cancelled { .. } => Some("Compression cancelled".to_string()),
        UiEvent::HideProgress { .. } => None,
    }
}

/// One line per record for `squeeze list`.
pub fn render_record(record: &MediaRecord, authority: &str) -> String {
    format!(
        "{:>6}  {:>10}  {}  {}",
        record.id,
        format_size(record.size_bytes),
        record.display_name,
        record.content_uri(authority)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use squeezer_core::stager::DirectFileStager;
    use squeezer_core::testing::{fixtures, EngineStep, MockEngine, MockResolver};
    use squeezer_core::{
        ControllerConfig, EngineOptions, JobController, QualityConfig, SourceReference,
    };
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn collect_events(script: Vec<EngineStep>) -> Vec<UiEvent> {
        let temp = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        engine.set_script(script);
        let (controller, mut rx) = JobController::new(
            ControllerConfig::default(),
            Arc::new(MockResolver::new()),
            Arc::new(DirectFileStager::new(temp.path().join("out"))),
            engine,
            tokio::runtime::Handle::current(),
        );
        let source = fixtures::small_file(temp.path(), "clip.mp4", 2048).unwrap();

        let job = controller
            .submit(
                SourceReference::from(source),
                QualityConfig::default(),
                EngineOptions::default(),
            )
            .unwrap();
        job.wait().await.unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_text_rendering_of_successful_job() {
        let events = collect_events(vec![
            EngineStep::Start,
            EngineStep::Progress(50.0),
            EngineStep::Succeed { output_bytes: 1024 },
        ])
        .await;

        let lines: Vec<String> = events
            .iter()
            .filter_map(|e| render_event(e, EventFormat::Text))
            .collect();

        assert!(lines.contains(&"[compressing]".to_string()));
        assert!(lines.contains(&"Original size: 2 KB".to_string()));
        assert!(lines.contains(&"Progress: 50%".to_string()));
        assert!(lines.contains(&"Compressed size: 1 KB".to_string()));
        assert!(lines.contains(&"[succeeded]".to_string()));
    }

    #[tokio::test]
    async fn test_json_rendering_is_tagged() {
        let events = collect_events(vec![
            EngineStep::Start,
            EngineStep::Fail("bad stream".to_string()),
        ])
        .await;

        let failure = events
            .iter()
            .find(|e| matches!(e, UiEvent::Failure { .. }))
            .unwrap();
        let line = render_event(failure, EventFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["event"], "failure");
        assert_eq!(value["message"], "bad stream");
    }
}
