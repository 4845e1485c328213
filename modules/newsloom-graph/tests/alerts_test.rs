//! Detection and alert lifecycle tests against an in-memory store.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use newsloom_common::{AlertKind, Config, EntityKind, Severity};
use newsloom_graph::reader::AlertFilter;
use newsloom_graph::{EngineError, Pipeline, Store, StoreReader, StoreWriter};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 21, 12, 0, 0).unwrap()
}

fn days_ago(n: i64) -> NaiveDate {
    now().date_naive() - Duration::days(n)
}

async fn store() -> Store {
    let store = Store::connect("sqlite::memory:").await.unwrap();
    store.migrate().await.unwrap();
    store
}

/// Seed one article into a cluster, dated `age` days ago.
async fn seed_cluster_article(writer: &StoreWriter, cluster_id: i64, age: i64) {
    writer
        .insert_article(
            &format!("Cluster {cluster_id} article {age}d"),
            days_ago(age),
            Some(cluster_id),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn growing_cluster_raises_a_medium_surge() {
    let store = store().await;
    let writer = StoreWriter::new(store.clone());

    let cluster = writer.insert_cluster("transit", 0).await.unwrap();
    // 8 articles in the previous window, 15 in the recent one: 1.875x.
    for age in [8, 9, 10, 11, 12, 13, 14, 10] {
        seed_cluster_article(&writer, cluster, age).await;
    }
    for age in [0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7] {
        seed_cluster_article(&writer, cluster, age).await;
    }

    let pipeline = Pipeline::new(store.clone(), &Config::default()).unwrap();
    let stats = pipeline.detect(now()).await.unwrap();
    assert_eq!(stats.surges, 1);

    let reader = StoreReader::new(store);
    let alerts = reader
        .list_alerts(&AlertFilter {
            kind: Some(AlertKind::TopicSurge),
            ..AlertFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.severity, Severity::Medium);
    assert_eq!(alert.context["cluster_id"], cluster);
    assert_eq!(alert.context["current_count"], 15);
    assert_eq!(alert.context["previous_count"], 8);
    assert!(!alert.acknowledged);
}

#[tokio::test]
async fn modest_growth_stays_quiet() {
    let store = store().await;
    let writer = StoreWriter::new(store.clone());

    let cluster = writer.insert_cluster("courts", 0).await.unwrap();
    // 8 vs 11 is a 1.375x ratio, below the 1.5x trigger.
    for age in [8, 9, 10, 11, 12, 13, 14, 10] {
        seed_cluster_article(&writer, cluster, age).await;
    }
    for age in [0, 0, 1, 1, 2, 2, 3, 3, 4, 5, 6] {
        seed_cluster_article(&writer, cluster, age).await;
    }

    let pipeline = Pipeline::new(store.clone(), &Config::default()).unwrap();
    let stats = pipeline.detect(now()).await.unwrap();
    assert_eq!(stats.surges, 0);
    assert_eq!(stats.alerts_created(), 0);
}

#[tokio::test]
async fn tripled_volume_is_a_high_severity_surge() {
    let store = store().await;
    let writer = StoreWriter::new(store.clone());

    let cluster = writer.insert_cluster("wildfire", 0).await.unwrap();
    for age in [8, 10, 12] {
        seed_cluster_article(&writer, cluster, age).await;
    }
    for age in [0, 1, 2, 3, 4, 5, 6, 7, 2] {
        seed_cluster_article(&writer, cluster, age).await;
    }

    let pipeline = Pipeline::new(store.clone(), &Config::default()).unwrap();
    pipeline.detect(now()).await.unwrap();

    let reader = StoreReader::new(store);
    let alerts = reader
        .list_alerts(&AlertFilter {
            kind: Some(AlertKind::TopicSurge),
            ..AlertFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].severity, Severity::High);
}

#[tokio::test]
async fn revived_storyline_raises_exactly_one_reactivation() {
    let store = store().await;
    let writer = StoreWriter::new(store.clone());

    let a = writer
        .insert_article("Mine closure announced", days_ago(21), None)
        .await
        .unwrap();
    let b = writer
        .insert_article("Mine closure confirmed", days_ago(20), None)
        .await
        .unwrap();
    writer.insert_similarity(a, b, 0.9, &[]).await.unwrap();

    let pipeline = Pipeline::new(store.clone(), &Config::default()).unwrap();
    let stats = pipeline.rebuild(now()).await.unwrap();
    // Three weeks of silence: no reactivation on the initial build.
    assert_eq!(stats.detection.reactivations, 0);

    let reader = StoreReader::new(store.clone());
    let storyline_id = reader
        .list_storylines(&Default::default())
        .await
        .unwrap()[0]
        .id;

    // A related follow-up lands today. Only an entity-backed edge can
    // bridge a three-week gap.
    let c = writer
        .insert_article("Mine site cleanup resumes", days_ago(0), None)
        .await
        .unwrap();
    writer.insert_similarity(b, c, 0.6, &[4, 5]).await.unwrap();

    let stats = pipeline.refresh(now()).await.unwrap();
    assert_eq!(stats.weave.storylines_grown, 1);
    assert_eq!(stats.detection.reactivations, 1);

    let alerts = reader
        .list_alerts(&AlertFilter {
            kind: Some(AlertKind::StoryReactivation),
            ..AlertFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.context["storyline_id"], storyline_id);
    assert_eq!(alert.context["dormant_days"], 20);
    assert_eq!(alert.context["new_article_ids"][0], c);
    assert_eq!(alert.severity, Severity::Medium);
}

#[tokio::test]
async fn rerunning_detection_suppresses_open_duplicates() {
    let store = store().await;
    let writer = StoreWriter::new(store.clone());

    let cluster = writer.insert_cluster("energy", 0).await.unwrap();
    for age in [8, 10] {
        seed_cluster_article(&writer, cluster, age).await;
    }
    for age in [0, 1, 2, 3] {
        seed_cluster_article(&writer, cluster, age).await;
    }

    let pipeline = Pipeline::new(store.clone(), &Config::default()).unwrap();
    let first = pipeline.detect(now()).await.unwrap();
    assert_eq!(first.surges, 1);
    assert_eq!(first.suppressed, 0);

    let second = pipeline.detect(now()).await.unwrap();
    assert_eq!(second.alerts_created(), 0);
    assert_eq!(second.suppressed, 1);

    let reader = StoreReader::new(store);
    let alerts = reader.list_alerts(&AlertFilter::default()).await.unwrap();
    assert_eq!(alerts.len(), 1);
}

#[tokio::test]
async fn acknowledged_alert_no_longer_suppresses() {
    let store = store().await;
    let writer = StoreWriter::new(store.clone());

    let cluster = writer.insert_cluster("housing", 0).await.unwrap();
    for age in [8, 10] {
        seed_cluster_article(&writer, cluster, age).await;
    }
    for age in [0, 1, 2, 3] {
        seed_cluster_article(&writer, cluster, age).await;
    }

    let pipeline = Pipeline::new(store.clone(), &Config::default()).unwrap();
    pipeline.detect(now()).await.unwrap();

    let reader = StoreReader::new(store.clone());
    let alert_id = reader.list_alerts(&AlertFilter::default()).await.unwrap()[0].id;
    assert!(writer.acknowledge_alert(alert_id).await.unwrap());

    // The condition still holds, and with the previous alert closed the
    // next run reports it again.
    let rerun = pipeline.detect(now()).await.unwrap();
    assert_eq!(rerun.surges, 1);
    assert_eq!(rerun.suppressed, 0);
}

#[tokio::test]
async fn acknowledging_twice_is_a_noop() {
    let store = store().await;
    let writer = StoreWriter::new(store.clone());

    let cluster = writer.insert_cluster("water", 0).await.unwrap();
    for age in [8, 10] {
        seed_cluster_article(&writer, cluster, age).await;
    }
    for age in [0, 1, 2, 3] {
        seed_cluster_article(&writer, cluster, age).await;
    }
    let pipeline = Pipeline::new(store.clone(), &Config::default()).unwrap();
    pipeline.detect(now()).await.unwrap();

    let reader = StoreReader::new(store.clone());
    let alert_id = reader.list_alerts(&AlertFilter::default()).await.unwrap()[0].id;

    assert!(writer.acknowledge_alert(alert_id).await.unwrap());
    assert!(!writer.acknowledge_alert(alert_id).await.unwrap());

    let alerts = reader.list_alerts(&AlertFilter::default()).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].acknowledged);
}

#[tokio::test]
async fn acknowledging_unknown_alert_is_not_found() {
    let store = store().await;
    let writer = StoreWriter::new(store);

    match writer.acknowledge_alert(12345).await {
        Err(EngineError::AlertNotFound(id)) => assert_eq!(id, 12345),
        other => panic!("expected AlertNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn brand_new_entity_with_enough_mentions_is_flagged() {
    let store = store().await;
    let writer = StoreWriter::new(store.clone());

    let newcomer = writer
        .insert_entity("Harbor Futures Group", EntityKind::Org)
        .await
        .unwrap();
    let veteran = writer
        .insert_entity("City Hall", EntityKind::Org)
        .await
        .unwrap();
    let minor = writer
        .insert_entity("Side Character", EntityKind::Person)
        .await
        .unwrap();

    for i in 0..5i64 {
        let article = writer
            .insert_article(&format!("Harbor deal {i}"), days_ago(i + 1), None)
            .await
            .unwrap();
        writer.insert_mention(article, newcomer, 1.0).await.unwrap();
    }

    // The veteran is active now but has history.
    let old_article = writer
        .insert_article("City Hall archive", days_ago(30), None)
        .await
        .unwrap();
    writer.insert_mention(old_article, veteran, 1.0).await.unwrap();
    for i in 0..6i64 {
        let article = writer
            .insert_article(&format!("City Hall now {i}"), days_ago(i), None)
            .await
            .unwrap();
        writer.insert_mention(article, veteran, 1.0).await.unwrap();
    }

    // The minor actor is new but below the mention floor.
    for i in 0..3i64 {
        let article = writer
            .insert_article(&format!("Cameo {i}"), days_ago(i), None)
            .await
            .unwrap();
        writer.insert_mention(article, minor, 1.0).await.unwrap();
    }

    let pipeline = Pipeline::new(store.clone(), &Config::default()).unwrap();
    let stats = pipeline.detect(now()).await.unwrap();
    assert_eq!(stats.new_actors, 1);

    let reader = StoreReader::new(store);
    let alerts = reader
        .list_alerts(&AlertFilter {
            kind: Some(AlertKind::NewActor),
            ..AlertFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.context["entity_id"], newcomer);
    assert_eq!(alert.context["name"], "Harbor Futures Group");
    assert_eq!(alert.context["mentions_7d"], 5);
    // Exactly at the floor: low severity.
    assert_eq!(alert.severity, Severity::Low);
}

#[tokio::test]
async fn alert_listing_respects_filters_and_page_cap() {
    let store = store().await;
    let writer = StoreWriter::new(store.clone());

    // Two clusters surging at different steepness for mixed severities.
    let medium = writer.insert_cluster("medium-surge", 0).await.unwrap();
    for age in [8, 9, 10, 11] {
        seed_cluster_article(&writer, medium, age).await;
    }
    for age in [0, 1, 2, 3, 4, 5, 6, 7] {
        seed_cluster_article(&writer, medium, age).await;
    }
    let high = writer.insert_cluster("high-surge", 0).await.unwrap();
    for age in [9] {
        seed_cluster_article(&writer, high, age).await;
    }
    for age in [0, 1, 2] {
        seed_cluster_article(&writer, high, age).await;
    }

    let pipeline = Pipeline::new(store.clone(), &Config::default()).unwrap();
    let stats = pipeline.detect(now()).await.unwrap();
    assert_eq!(stats.surges, 2);

    let reader = StoreReader::new(store);

    let high_only = reader
        .list_alerts(&AlertFilter {
            severity: Some(Severity::High),
            ..AlertFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(high_only.len(), 1);
    assert_eq!(high_only[0].context["cluster_id"], high);

    let since_future = reader
        .list_alerts(&AlertFilter {
            since: Some(now() + Duration::hours(1)),
            ..AlertFilter::default()
        })
        .await
        .unwrap();
    assert!(since_future.is_empty());

    let capped = reader
        .list_alerts(&AlertFilter {
            limit: Some(1),
            ..AlertFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(capped.len(), 1);
}
