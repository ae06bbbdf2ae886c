mod support;

use std::sync::atomic::Ordering;

use chrono::Duration;

use stylecal_core::domain::{Category, GOOGLE_CALENDAR_PROVIDER};
use stylecal_core::ports::CredentialStore;
use stylecal_core::{CalendarError, RuleAdminError, UpcomingFilter};
use support::{harness, now};
use uuid::Uuid;

#[tokio::test]
async fn end_to_end_recommendations() {
    let h = harness();
    h.store.seed_default_rules();
    let formal_a = h.store.add_product(Some("formal"), Some(true));
    let casual = h.store.add_product(Some("casual"), Some(true));
    let formal_b = h.store.add_product(Some("Formal"), Some(true));
    h.store.add_product(Some("formal"), Some(false));

    let user = Uuid::new_v4();
    h.store.connect(user, 3600);
    h.google.push_event("e1", "Job interview", "confirmed");
    h.google.push_event("e2", "Shopping with friends", "confirmed");
    h.google.push_event("e3", "Quiet evening", "confirmed");

    let recs = h.service.recommendations(user, now()).await.unwrap();
    assert_eq!(recs.len(), 3);

    assert_eq!(recs[0].event_id, "e1");
    assert_eq!(recs[0].category, Some(Category::Formal));
    assert_eq!(recs[0].pool.iter().map(|p| p.id).collect::<Vec<_>>(), vec![formal_a, formal_b]);

    assert_eq!(recs[1].category, Some(Category::Casual));
    assert_eq!(recs[1].pool.iter().map(|p| p.id).collect::<Vec<_>>(), vec![casual]);

    assert_eq!(recs[2].category, None);
    assert!(recs[2].pool.is_empty());
}

#[tokio::test]
async fn sync_is_idempotent() {
    let h = harness();
    h.store.seed_default_rules();
    let user = Uuid::new_v4();
    h.store.connect(user, 3600);
    h.google.push_event("e1", "Wedding ceremony planning", "confirmed");
    h.google.push_event("e2", "random lunch", "confirmed");

    let first = h.service.sync_now(user, now()).await.unwrap();
    let second = h.service.sync_now(user, now()).await.unwrap();
    assert_eq!(first.synced, 2);
    assert_eq!(second.synced, 2);

    let stored = h.store.stored_events(user);
    assert_eq!(stored.len(), 2);
    let wedding = stored.iter().find(|e| e.external_event_id == "e1").unwrap();
    assert_eq!(wedding.occasion_label, Some(Category::Formal));
    assert_eq!(wedding.location.as_deref(), Some("Kuala Lumpur"));
    assert_eq!(wedding.raw_payload["summary"], "Wedding ceremony planning");
    let lunch = stored.iter().find(|e| e.external_event_id == "e2").unwrap();
    assert_eq!(lunch.occasion_label, None);
}

#[tokio::test]
async fn resync_updates_rows_in_place() {
    let h = harness();
    h.store.seed_default_rules();
    let user = Uuid::new_v4();
    h.store.connect(user, 3600);
    h.google.push_event("e1", "Coffee", "confirmed");
    h.service.sync_now(user, now()).await.unwrap();

    h.google.items.lock().unwrap().clear();
    h.google.push_event("e1", "Coffee before the concert", "confirmed");
    h.service.sync_now(user, now()).await.unwrap();

    let stored = h.service.synced_events(user).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].title, "Coffee before the concert");
    assert_eq!(stored[0].occasion_label, Some(Category::Streetwear));
}

#[tokio::test]
async fn cancelled_events_are_never_stored_or_recommended() {
    let h = harness();
    h.store.seed_default_rules();
    h.store.add_product(Some("formal"), Some(true));
    let user = Uuid::new_v4();
    h.store.connect(user, 3600);
    h.google.push_event("gone", "Wedding", "cancelled");
    h.google.push_event("kept", "Hangout", "confirmed");

    let report = h.service.sync_now(user, now()).await.unwrap();
    assert_eq!(report.synced, 1);
    assert!(h.store.stored_events(user).iter().all(|e| e.external_event_id != "gone"));

    let recs = h.service.recommendations(user, now()).await.unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].event_id, "kept");
}

#[tokio::test]
async fn expiring_credential_is_refreshed_before_fetching() {
    let h = harness();
    let user = Uuid::new_v4();
    h.store.connect(user, 30);
    h.google.push_event("e1", "Meeting", "confirmed");

    h.service.list_upcoming(user, UpcomingFilter::default(), now()).await.unwrap();

    assert_eq!(h.google.refresh_calls(), 1);
    assert_eq!(h.google.seen_tokens.lock().unwrap().as_slice(), ["refreshed-token"]);
    let stored = h
        .store
        .get_credential(user, GOOGLE_CALENDAR_PROVIDER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "refreshed-token");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-token"));
}

#[tokio::test]
async fn valid_credential_is_used_without_refresh() {
    let h = harness();
    let user = Uuid::new_v4();
    h.store.connect(user, 3600);

    h.service.list_upcoming(user, UpcomingFilter::default(), now()).await.unwrap();

    assert_eq!(h.google.refresh_calls(), 0);
    assert_eq!(h.google.seen_tokens.lock().unwrap().as_slice(), ["stored-token"]);
}

#[tokio::test]
async fn failure_kinds_are_distinguished() {
    let h = harness();
    let user = Uuid::new_v4();

    let err = h.service.sync_now(user, now()).await.unwrap_err();
    assert!(matches!(err, CalendarError::NotConnected));

    h.store.connect(user, 3600);
    *h.google.events_status.lock().unwrap() = Some(503);
    let err = h.service.sync_now(user, now()).await.unwrap_err();
    match err {
        CalendarError::UpstreamFetch(e) => assert_eq!(e.status, Some(503)),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(h.store.stored_events(user).is_empty());

    let expired = Uuid::new_v4();
    h.store.connect(expired, -5);
    *h.google.refresh_fails.lock().unwrap() = true;
    let err = h.service.sync_now(expired, now()).await.unwrap_err();
    assert!(matches!(err, CalendarError::RefreshFailed(_)));
    // No fetch happens after a failed refresh, and no silent retry.
    assert_eq!(h.google.refresh_calls(), 1);
    assert_eq!(h.google.list_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn write_failure_propagates() {
    let h = harness();
    let user = Uuid::new_v4();
    h.store.connect(user, 3600);
    h.google.push_event("e1", "Interview", "confirmed");
    *h.store.fail_event_writes.lock().unwrap() = true;

    let err = h.service.sync_now(user, now()).await.unwrap_err();
    assert!(matches!(err, CalendarError::Write(_)));
}

#[tokio::test]
async fn connect_stores_credential_from_grant() {
    let h = harness();
    let user = Uuid::new_v4();

    let credential = h.service.connect(user, "good-code", now()).await.unwrap();
    assert_eq!(credential.expires_at, Some(now().timestamp() + 3599));

    let stored = h
        .store
        .get_credential(user, GOOGLE_CALENDAR_PROVIDER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, credential);

    let err = h.service.connect(user, "bad-code", now()).await.unwrap_err();
    assert!(matches!(err, CalendarError::GrantFailed(_)));
}

#[tokio::test]
async fn reconnect_without_refresh_token_keeps_the_stored_one() {
    let h = harness();
    let user = Uuid::new_v4();
    h.store.connect(user, 3600);

    let credential = h.service.connect(user, "repeat-consent", now()).await.unwrap();
    assert_eq!(credential.access_token, "granted-token");
    assert_eq!(credential.refresh_token.as_deref(), Some("refresh-token"));

    let stored = h
        .store
        .get_credential(user, GOOGLE_CALENDAR_PROVIDER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-token"));

    // Once the new access token expires, the kept refresh token is used.
    let later = now() + Duration::hours(2);
    h.service.list_upcoming(user, UpcomingFilter::default(), later).await.unwrap();
    assert_eq!(h.google.refresh_calls(), 1);
}

#[tokio::test]
async fn listing_is_limited_and_classified_by_rules() {
    let h = harness();
    h.store.seed_default_rules();
    let user = Uuid::new_v4();
    h.store.connect(user, 3600);
    for i in 0..12 {
        h.google.push_event(&format!("e{i}"), "Board meeting", "confirmed");
    }

    let events = h.service.list_upcoming(user, UpcomingFilter::search("board"), now()).await.unwrap();
    assert_eq!(events.len(), 10);
    assert!(events.iter().all(|e| e.occasion == Some(Category::Formal)));
}

#[tokio::test]
async fn listing_filter_only_narrows_the_window() {
    let h = harness();
    let user = Uuid::new_v4();
    h.store.connect(user, 3600);

    let filter = UpcomingFilter {
        search: Some("  ".into()),
        from: Some(now() - Duration::days(2)),
        to: Some(now() + Duration::days(2)),
    };
    h.service.list_upcoming(user, filter, now()).await.unwrap();

    let queries = h.google.queries.lock().unwrap();
    assert_eq!(queries[0].time_min, now());
    assert_eq!(queries[0].time_max, now() + Duration::days(2));
    assert_eq!(queries[0].search, None);
    assert_eq!(queries[0].max_results, Some(10));
}

//=========================================================================================
// Rule administration
//=========================================================================================

#[tokio::test]
async fn rule_edits_apply_to_the_next_classification() {
    let h = harness();
    h.store.seed_default_rules();
    let user = Uuid::new_v4();
    h.store.connect(user, 3600);
    h.google.push_event("e1", "Gala night", "confirmed");

    let before = h.service.list_upcoming(user, UpcomingFilter::default(), now()).await.unwrap();
    assert_eq!(before[0].occasion, None);

    let added = h.rules.add_keyword("formal", "  GALA ").await.unwrap();
    assert_eq!(added.keyword, "gala");
    let after = h.service.list_upcoming(user, UpcomingFilter::default(), now()).await.unwrap();
    assert_eq!(after[0].occasion, Some(Category::Formal));

    h.rules.remove_keyword(added.id).await.unwrap();
    let removed = h.service.list_upcoming(user, UpcomingFilter::default(), now()).await.unwrap();
    assert_eq!(removed[0].occasion, None);
}

#[tokio::test]
async fn duplicate_keyword_names_owning_category() {
    let h = harness();
    h.store.seed_default_rules();

    for target in ["formal", "casual", "streetwear"] {
        match h.rules.add_keyword(target, "Wedding").await {
            Err(RuleAdminError::DuplicateKeyword { keyword, category }) => {
                assert_eq!(keyword, "wedding");
                assert_eq!(category, Category::Formal);
            }
            other => panic!("expected duplicate, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn invalid_input_is_rejected_before_persistence() {
    let h = harness();

    let err = h.rules.add_keyword("business", "pitch").await.unwrap_err();
    assert!(matches!(err, RuleAdminError::Validation(_)));

    let err = h.rules.add_keyword("casual", " x ").await.unwrap_err();
    assert!(matches!(err, RuleAdminError::Validation(_)));

    assert!(h.store.rules.lock().unwrap().is_empty());
    assert!(h.store.keywords.lock().unwrap().is_empty());
}

#[tokio::test]
async fn first_keyword_creates_rule_with_default_priority() {
    let h = harness();
    h.rules.add_keyword("streetwear", "skate").await.unwrap();
    h.rules.add_keyword("formal", "gala").await.unwrap();

    let rules = h.rules.list_rules().await.unwrap();
    let order: Vec<_> = rules.iter().map(|r| (r.rule.target_category, r.rule.priority)).collect();
    assert_eq!(order, vec![(Category::Formal, 3), (Category::Streetwear, 1)]);
}

#[tokio::test]
async fn soft_deleted_keyword_stays_reserved() {
    let h = harness();
    h.store.seed_default_rules();
    let shopping = h.rules.add_keyword("casual", "brunch").await.unwrap();
    h.rules.remove_keyword(shopping.id).await.unwrap();

    let listed = h.rules.list_rules().await.unwrap();
    assert!(listed
        .iter()
        .flat_map(|r| r.keywords.iter())
        .all(|k| k.keyword != "brunch"));
    assert_eq!(h.store.keywords.lock().unwrap().iter().filter(|k| k.keyword == "brunch").count(), 1);

    let err = h.rules.add_keyword("formal", "brunch").await.unwrap_err();
    assert!(matches!(
        err,
        RuleAdminError::DuplicateKeyword { category: Category::Casual, .. }
    ));

    let restored = h.rules.add_keyword("casual", "brunch").await.unwrap();
    assert!(restored.enabled);
    assert_eq!(restored.id, shopping.id);
}

#[tokio::test]
async fn restoring_a_keyword_re_enables_its_rule() {
    let h = harness();
    h.store.seed_default_rules();
    let user = Uuid::new_v4();
    h.store.connect(user, 3600);
    h.google.push_event("e1", "Sunday brunch", "confirmed");

    let brunch = h.rules.add_keyword("casual", "brunch").await.unwrap();
    h.rules.remove_keyword(brunch.id).await.unwrap();
    for rule in h.store.rules.lock().unwrap().iter_mut() {
        if rule.target_category == Category::Casual {
            rule.enabled = false;
        }
    }

    h.rules.add_keyword("casual", "brunch").await.unwrap();

    let events = h.service.list_upcoming(user, UpcomingFilter::default(), now()).await.unwrap();
    assert_eq!(events[0].occasion, Some(Category::Casual));
}

#[tokio::test]
async fn removing_unknown_keyword_is_not_found() {
    let h = harness();
    let err = h.rules.remove_keyword(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, RuleAdminError::NotFound(_)));
}
