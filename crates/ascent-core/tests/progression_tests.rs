use ascent_classifier::{base_score, ClassifierConfig};
use ascent_core::{
    Applied, AscentError, EngineConfig, EventNormalizer, InboundEvent, ProgressionEngine,
};
use ascent_metrics::{LinkKind, MetricsStore, ProjectId, StoreError};
use ascent_test_utils::{
    automation, chat, full_journey, level, level_three_activity, link, member_joined, message,
    paper, seed_level, setup, through_level_two, DelayedStore, FailingNotifier,
    RecordingNotifier, UnavailableStore, PROJECT,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

async fn ingest_all(normalizer: &EventNormalizer, events: Vec<InboundEvent>) {
    for event in events {
        normalizer.ingest(event).await.unwrap();
    }
}

async fn steps(store: &dyn MetricsStore, project: &str) -> Vec<(u8, u8)> {
    store
        .transitions(&ProjectId::from(project))
        .await
        .unwrap()
        .iter()
        .map(|c| (c.previous_level.value(), c.new_level.value()))
        .collect()
}

#[tokio::test]
async fn full_journey_reaches_completion_one_level_at_a_time() {
    let notifier = RecordingNotifier::new();
    let (store, normalizer) = setup(&EngineConfig::default(), notifier.clone());

    ingest_all(&normalizer, full_journey(PROJECT)).await;

    assert_eq!(
        steps(store.as_ref(), PROJECT).await,
        vec![(1, 2), (2, 3), (3, 4), (4, 5), (5, 6), (6, 7)]
    );
    let project = store.project(&ProjectId::from(PROJECT)).await.unwrap();
    assert!(project.completed);
    assert_eq!(
        notifier.templates(),
        vec![
            "level-2-reached",
            "level-3-reached",
            "level-4-reached",
            "level-5-reached",
            "level-6-reached",
            "level-7-reached",
            "journey-complete",
        ]
    );
    assert_eq!(notifier.emails().len(), 7);
}

#[tokio::test]
async fn completed_project_ignores_further_events() {
    let notifier = RecordingNotifier::new();
    let (store, normalizer) = setup(&EngineConfig::default(), notifier.clone());
    ingest_all(&normalizer, full_journey(PROJECT)).await;

    // Replay the whole history plus fresh activity
    ingest_all(&normalizer, full_journey(PROJECT)).await;
    let report = normalizer.ingest(chat(PROJECT, 500)).await.unwrap();

    assert!(!report.progress.moved());
    assert_eq!(steps(store.as_ref(), PROJECT).await.len(), 6);
    assert_eq!(notifier.count(PROJECT, "journey-complete"), 1);
    assert_eq!(notifier.messages().len(), 7);

    // Metrics are still recorded after completion
    let snapshot = store.snapshot(&ProjectId::from(PROJECT)).await.unwrap();
    assert_eq!(snapshot.messages_count(), 51);
}

#[tokio::test]
async fn gate_examples_from_member_counts() {
    let (store, normalizer) = setup(&EngineConfig::default(), RecordingNotifier::new());
    seed_level(&store, PROJECT, 2).await;

    normalizer.ingest(automation(PROJECT, 3)).await.unwrap();
    let status = normalizer
        .engine()
        .status(&ProjectId::from(PROJECT))
        .await
        .unwrap();
    assert_eq!(status.level, level(2));
    assert_eq!(status.missing, vec!["memberCount>=4".to_string()]);

    let report = normalizer.ingest(member_joined(PROJECT, 4)).await.unwrap();
    assert_eq!(report.progress.changes.len(), 1);
    assert_eq!(report.progress.changes[0].new_level, level(3));
}

#[tokio::test]
async fn duplicate_message_never_double_counts() {
    let (store, normalizer) = setup(&EngineConfig::default(), RecordingNotifier::new());

    for _ in 0..3 {
        normalizer.ingest(chat(PROJECT, 1)).await.unwrap();
        normalizer.ingest(paper(PROJECT, 1)).await.unwrap();
    }

    let snapshot = store.snapshot(&ProjectId::from(PROJECT)).await.unwrap();
    assert_eq!(snapshot.messages_count(), 1);
    assert_eq!(snapshot.papers_shared(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_replays_of_one_message_count_once() {
    let (store, normalizer) = setup(&EngineConfig::default(), RecordingNotifier::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let normalizer = Arc::clone(&normalizer);
            tokio::spawn(async move { normalizer.ingest(chat(PROJECT, 7)).await })
        })
        .collect();
    let reports = futures::future::join_all(handles).await;

    let counted = reports
        .into_iter()
        .map(|r| r.unwrap().unwrap())
        .filter(|r| matches!(r.applied, Applied::Message(_)))
        .count();
    assert_eq!(counted, 1);

    let snapshot = store.snapshot(&ProjectId::from(PROJECT)).await.unwrap();
    assert_eq!(snapshot.messages_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_triggers_write_level_four_once() {
    for round in 0..20 {
        let project = format!("race-{round}");
        let notifier = RecordingNotifier::new();
        let (store, normalizer) = setup(&EngineConfig::default(), notifier.clone());

        let mut events = through_level_two(&project);
        events.extend(level_three_activity(&project));
        // Hold back the final message so the gate is one short
        let last = events.pop().unwrap();
        ingest_all(&normalizer, events).await;
        assert_eq!(store.project(&ProjectId::from(project.as_str())).await.unwrap().level, level(3));

        let a = {
            let normalizer = Arc::clone(&normalizer);
            tokio::spawn(async move { normalizer.ingest(last).await })
        };
        let b = {
            let normalizer = Arc::clone(&normalizer);
            let extra = chat(&project, 999);
            tokio::spawn(async move { normalizer.ingest(extra).await })
        };
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        let writes = a.progress.changes.len() + b.progress.changes.len();
        assert_eq!(writes, 1, "round {round}");
        assert_eq!(steps(store.as_ref(), &project).await, vec![(1, 2), (2, 3), (3, 4)]);
        assert_eq!(notifier.count(&project, "level-4-reached"), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn redundant_engine_calls_fire_one_notification() {
    let notifier = RecordingNotifier::new();
    let (store, normalizer) = setup(&EngineConfig::default(), notifier.clone());
    seed_level(&store, PROJECT, 6).await;
    store
        .set_link_once(&ProjectId::from(PROJECT), LinkKind::Blogpost, "https://b.example.org/1")
        .await
        .unwrap();
    store
        .set_link_once(&ProjectId::from(PROJECT), LinkKind::Thread, "https://t.example.org/1")
        .await
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = Arc::clone(normalizer.engine());
            tokio::spawn(async move { engine.advance(&ProjectId::from(PROJECT)).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(steps(store.as_ref(), PROJECT).await.last(), Some(&(6, 7)));
    assert_eq!(notifier.count(PROJECT, "level-7-reached"), 1);
    assert_eq!(notifier.emails().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lost_memo_never_duplicates_a_level() {
    // Two engines with independent guards over one store, as after a restart
    let notifier = RecordingNotifier::new();
    let (store, normalizer) = setup(&EngineConfig::default(), notifier.clone());
    let restarted = Arc::new(ProgressionEngine::new(
        &EngineConfig::default(),
        Arc::clone(&store) as _,
        notifier.clone(),
    ));

    ingest_all(&normalizer, through_level_two(PROJECT)).await;
    let mut activity = level_three_activity(PROJECT);
    let last = activity.pop().unwrap();
    ingest_all(&normalizer, activity).await;

    // Satisfy the gate without triggering either engine
    if let InboundEvent::MessageArrived {
        project_id,
        community_id,
        message_id,
        ..
    } = last
    {
        store
            .apply_message(
                &project_id,
                &community_id,
                &message_id,
                ascent_metrics::ActivityKind::Message,
                10.0,
            )
            .await
            .unwrap();
    }

    let project = ProjectId::from(PROJECT);
    let first = Arc::clone(normalizer.engine());
    let (a, b) = tokio::join!(
        tokio::spawn({
            let project = project.clone();
            async move { first.advance(&project).await }
        }),
        tokio::spawn({
            let project = project.clone();
            async move { restarted.advance(&project).await }
        })
    );
    a.unwrap().unwrap();
    b.unwrap().unwrap();

    assert_eq!(steps(store.as_ref(), PROJECT).await, vec![(1, 2), (2, 3), (3, 4)]);
    assert_eq!(notifier.count(PROJECT, "level-4-reached"), 1);
}

#[tokio::test]
async fn dispatch_failure_keeps_the_transition() {
    let notifier = FailingNotifier::new();
    let (store, normalizer) = setup(&EngineConfig::default(), notifier.clone());

    let mut reports = Vec::new();
    for event in through_level_two(PROJECT) {
        reports.push(normalizer.ingest(event).await.unwrap());
    }

    assert_eq!(steps(store.as_ref(), PROJECT).await, vec![(1, 2), (2, 3)]);
    assert_eq!(notifier.attempts(), 4);
    let requested: usize = reports.iter().map(|r| r.progress.notifications.len()).sum();
    assert_eq!(requested, 2);
}

#[tokio::test]
async fn unavailable_store_is_retryable_and_not_counted() {
    let normalizer = EventNormalizer::from_config(
        &EngineConfig::default(),
        Arc::new(UnavailableStore),
        RecordingNotifier::new(),
    );

    let err = normalizer.ingest(chat(PROJECT, 1)).await.unwrap_err();
    assert!(matches!(err, AscentError::Store(StoreError::Unavailable(_))));
    assert!(err.is_retryable());
    assert_eq!(normalizer.classifier().tracked_authors(), 0);
}

const FOLLOW_UP: &str = "Centrifuge calibration drifted again during the afternoon shift";

/// Quality delta of a fresh message after `m1` was delivered twice
async fn follow_up_delta(overlapping: bool) -> f64 {
    let config = EngineConfig::default().with_classifier(ClassifierConfig {
        max_messages_per_minute: 2,
        ..ClassifierConfig::default()
    });
    let normalizer = EventNormalizer::from_config(
        &config,
        DelayedStore::new(Duration::from_millis(50)),
        RecordingNotifier::new(),
    );
    let first = message(
        PROJECT,
        "m1",
        "author-1",
        "Plate 1 looks healthy after the overnight incubation run",
    );

    if overlapping {
        let (a, b) = tokio::join!(normalizer.ingest(first.clone()), normalizer.ingest(first));
        let applied = [a.unwrap().applied, b.unwrap().applied];
        assert_eq!(
            applied
                .iter()
                .filter(|a| **a == Applied::DuplicateMessage)
                .count(),
            1
        );
    } else {
        normalizer.ingest(first.clone()).await.unwrap();
        normalizer.ingest(first).await.unwrap();
    }

    let report = normalizer
        .ingest(message(PROJECT, "m2", "author-1", FOLLOW_UP))
        .await
        .unwrap();
    match report.applied {
        Applied::Message(classification) => classification.quality_delta,
        other => panic!("unexpected effect {other:?}"),
    }
}

#[tokio::test]
async fn overlapping_replay_leaves_author_history_alone() {
    let sequential = follow_up_delta(false).await;
    let overlapping = follow_up_delta(true).await;

    assert!((sequential - base_score(FOLLOW_UP.chars().count())).abs() < f64::EPSILON);
    assert!((overlapping - sequential).abs() < f64::EPSILON);
}

#[tokio::test]
async fn malformed_json_is_rejected_without_mutation() {
    let (store, normalizer) = setup(&EngineConfig::default(), RecordingNotifier::new());

    for payload in [
        "not json",
        r#"{"kind":"message_arrived","projectId":"p1"}"#,
        r#"{"kind":"link_verified","projectId":"p1","url":"https://a.example.org"}"#,
        r#"{"kind":"link_verified","projectId":"p1","linkKind":"space","url":"x"}"#,
        r#"{"kind":"member_joined","projectId":" ","communityId":"c","newMemberCount":4}"#,
    ] {
        let err = normalizer.ingest_json(payload).await.unwrap_err();
        assert!(matches!(err, AscentError::Normalize(_)), "{payload}");
        assert!(!err.is_retryable());
    }

    assert_eq!(store.project_count(), 0);
}

#[tokio::test]
async fn failure_in_one_project_leaves_others_untouched() {
    let (store, normalizer) = setup(&EngineConfig::default(), RecordingNotifier::new());
    ingest_all(&normalizer, through_level_two("a")).await;

    let err = normalizer
        .ingest(InboundEvent::MemberJoined {
            project_id: "a".into(),
            community_id: "someone-elses-guild".into(),
            new_member_count: 40,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AscentError::Store(StoreError::CommunityMismatch { .. })));

    ingest_all(&normalizer, through_level_two("b")).await;
    assert_eq!(steps(store.as_ref(), "a").await, vec![(1, 2), (2, 3)]);
    assert_eq!(steps(store.as_ref(), "b").await, vec![(1, 2), (2, 3)]);
    assert_eq!(
        store.snapshot(&ProjectId::from("a")).await.unwrap().member_count(),
        5
    );
}

#[tokio::test]
async fn write_once_links_keep_first_value() {
    let (store, normalizer) = setup(&EngineConfig::default(), RecordingNotifier::new());

    let first = normalizer.ingest(link(PROJECT, LinkKind::Space)).await.unwrap();
    let second = normalizer
        .ingest(InboundEvent::LinkVerified {
            project_id: PROJECT.into(),
            kind: LinkKind::Space,
            url: "https://elsewhere.example.org/replacement".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(first.applied, Applied::Link { kind: LinkKind::Space, newly_set: true });
    assert_eq!(second.applied, Applied::Link { kind: LinkKind::Space, newly_set: false });
    let snapshot = store.snapshot(&ProjectId::from(PROJECT)).await.unwrap();
    assert_eq!(
        snapshot.social.and_then(|s| s.space_url),
        Some(format!("https://media.example.org/{PROJECT}/space"))
    );
}
