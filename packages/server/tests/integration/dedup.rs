use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use landwatch_server::detection::run_sweep;
use landwatch_server::entity::{alert, plot};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tokio_util::sync::CancellationToken;

use crate::common::TestApp;

async fn alerts_for(app: &TestApp, plot_id: i32) -> Vec<alert::Model> {
    alert::Entity::find()
        .filter(alert::Column::PlotId.eq(plot_id))
        .all(&app.db)
        .await
        .unwrap()
}

/// Move every alert on `plot_id` back in time by `age`.
async fn age_alerts(app: &TestApp, plot_id: i32, age: Duration) {
    for existing in alerts_for(app, plot_id).await {
        let created_at = Utc::now() - age;
        let mut active: alert::ActiveModel = existing.into();
        active.created_at = Set(created_at);
        active.detected_at = Set(created_at);
        active.update(&app.db).await.unwrap();
    }
}

mod window {
    use super::*;

    #[tokio::test]
    async fn identical_result_after_a_day_is_alerted_again() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;
        app.detector.set_percent(plot_id, 40.0);

        let first = app.detect(plot_id, &token).await;
        assert!(first.body["alert"].is_object(), "{}", first.text);
        age_alerts(&app, plot_id, Duration::hours(25)).await;

        let second = app.detect(plot_id, &token).await;

        assert_eq!(second.status, 200, "{}", second.text);
        assert!(second.body["alert"].is_object());
        assert_ne!(second.body["alert"]["id"], first.body["alert"]["id"]);
        assert_eq!(alerts_for(&app, plot_id).await.len(), 2);
    }

    #[tokio::test]
    async fn identical_result_just_inside_the_window_is_suppressed() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;
        app.detector.set_percent(plot_id, 40.0);

        app.detect(plot_id, &token).await;
        age_alerts(&app, plot_id, Duration::hours(23) + Duration::minutes(59)).await;

        let second = app.detect(plot_id, &token).await;

        assert_eq!(second.status, 200, "{}", second.text);
        assert!(second.body["alert"].is_null());
        assert_eq!(alerts_for(&app, plot_id).await.len(), 1);
    }

    #[tokio::test]
    async fn sweep_alerts_again_once_the_window_has_passed() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;
        app.detector.set_percent(plot_id, 40.0);
        let ctx = app.sweep_context();

        run_sweep(&ctx, &CancellationToken::new()).await;
        age_alerts(&app, plot_id, Duration::hours(25)).await;
        let report = run_sweep(&ctx, &CancellationToken::new()).await;

        assert_eq!(report.alerts_created, 1);
        assert_eq!(report.duplicates, 0);
        assert_eq!(alerts_for(&app, plot_id).await.len(), 2);
        assert_eq!(app.notifier.sent_to("alice@example.com").len(), 2);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test]
    async fn simultaneous_runs_create_one_alert_per_source() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;
        app.detector.set_percent(plot_id, 40.0);
        let ctx = app.sweep_context();
        let cancel = CancellationToken::new();

        let (first, second, report) = tokio::join!(
            app.detect(plot_id, &token),
            app.detect(plot_id, &token),
            run_sweep(&ctx, &cancel),
        );

        assert_eq!(first.status, 200, "{}", first.text);
        assert_eq!(second.status, 200, "{}", second.text);
        let manual_created = [&first, &second]
            .iter()
            .filter(|res| res.body["alert"].is_object())
            .count();
        assert_eq!(manual_created, 1);
        assert_eq!(report.alerts_created, 1);
        assert!(report.failed.is_empty());

        let alerts = alerts_for(&app, plot_id).await;
        assert_eq!(alerts.len(), 2);
        let manual = alerts
            .iter()
            .filter(|a| a.source.as_str() == "manual")
            .count();
        let automated = alerts
            .iter()
            .filter(|a| a.source.as_str() == "automated")
            .count();
        assert_eq!((manual, automated), (1, 1));
    }

    #[tokio::test]
    async fn plot_deleted_while_detection_waits_is_not_found() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;
        app.detector.set_percent(plot_id, 40.0);

        let guard = app.state.alert_gate.lock(plot_id).await;

        let (res, ()) = tokio::join!(app.detect(plot_id, &token), async {
            tokio::time::timeout(StdDuration::from_secs(5), async {
                while app.detector.calls().is_empty() {
                    tokio::time::sleep(StdDuration::from_millis(10)).await;
                }
            })
            .await
            .expect("detection never reached the service");

            plot::Entity::delete_by_id(plot_id)
                .exec(&app.db)
                .await
                .unwrap();
            drop(guard);
        });

        assert_eq!(res.status, 404, "{}", res.text);
        assert_eq!(res.body["code"], "NOT_FOUND");
        assert!(alerts_for(&app, plot_id).await.is_empty());
    }
}
