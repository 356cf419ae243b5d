use landwatch_server::detection::run_sweep;
use landwatch_server::entity::{alert, plot};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use tokio_util::sync::CancellationToken;

use crate::common::{OPERATOR_EMAIL, TestApp};

async fn alerts_for(app: &TestApp, plot_id: i32) -> Vec<alert::Model> {
    alert::Entity::find()
        .filter(alert::Column::PlotId.eq(plot_id))
        .all(&app.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn failing_plot_does_not_stop_the_sweep() {
    let app = TestApp::spawn().await;
    let alice = app.create_authenticated_user("alice").await;
    let bob = app.create_authenticated_user("bob").await;
    let a = app.create_plot(&alice, "Plot A").await;
    let b = app.create_plot(&bob, "Plot B").await;
    let c = app.create_plot(&alice, "Plot C").await;
    app.detector.set_percent(a, 40.0);
    app.detector.fail_for(b, "Earth Engine quota exceeded");
    app.detector.set_percent(c, 20.0);

    let report = run_sweep(&app.sweep_context(), &CancellationToken::new()).await;

    assert_eq!(report.processed, 2);
    assert_eq!(report.alerts_created, 2);
    assert_eq!(report.failed, vec![b]);

    let a_alerts = alerts_for(&app, a).await;
    assert_eq!(a_alerts.len(), 1);
    assert_eq!(a_alerts[0].source.as_str(), "automated");
    assert_eq!(a_alerts[0].severity.as_str(), "high");
    assert_eq!(a_alerts[0].description, "Automated daily detection");
    assert!(alerts_for(&app, b).await.is_empty());
    assert_eq!(alerts_for(&app, c).await[0].severity.as_str(), "medium");

    let owner_mail = app.notifier.sent_to("alice@example.com");
    assert_eq!(owner_mail.len(), 2);
    assert!(
        owner_mail
            .iter()
            .any(|m| m.subject == "Landwatch Alert: HIGH change detected"
                && m.text.contains("Plot A"))
    );

    let operator_mail = app.notifier.sent_to(OPERATOR_EMAIL);
    assert_eq!(operator_mail.len(), 1);
    assert_eq!(
        operator_mail[0].subject,
        format!("Landwatch Cron Failure: Plot {b}")
    );
    assert!(operator_mail[0].text.contains("Plot B"));
    assert!(operator_mail[0].text.contains("Earth Engine quota exceeded"));
    assert!(app.notifier.sent_to("bob@example.com").is_empty());
}

#[tokio::test]
async fn second_sweep_suppresses_identical_alerts() {
    let app = TestApp::spawn().await;
    let token = app.create_authenticated_user("alice").await;
    let plot_id = app.create_plot(&token, "North Field").await;
    app.detector.set_percent(plot_id, 40.0);
    let ctx = app.sweep_context();

    run_sweep(&ctx, &CancellationToken::new()).await;
    let report = run_sweep(&ctx, &CancellationToken::new()).await;

    assert_eq!(report.alerts_created, 0);
    assert_eq!(report.duplicates, 1);
    assert_eq!(alerts_for(&app, plot_id).await.len(), 1);
    assert_eq!(app.notifier.sent().len(), 1);
}

#[tokio::test]
async fn manual_and_automated_alerts_are_deduplicated_separately() {
    let app = TestApp::spawn().await;
    let token = app.create_authenticated_user("alice").await;
    let plot_id = app.create_plot(&token, "North Field").await;
    app.detector.set_percent(plot_id, 40.0);

    app.detect(plot_id, &token).await;
    let report = run_sweep(&app.sweep_context(), &CancellationToken::new()).await;

    assert_eq!(report.alerts_created, 1);
    assert_eq!(alerts_for(&app, plot_id).await.len(), 2);
}

#[tokio::test]
async fn small_changes_raise_nothing_and_send_nothing() {
    let app = TestApp::spawn().await;
    let token = app.create_authenticated_user("alice").await;
    let plot_id = app.create_plot(&token, "North Field").await;
    app.detector.set_percent(plot_id, 3.0);

    let report = run_sweep(&app.sweep_context(), &CancellationToken::new()).await;

    assert_eq!(report.processed, 1);
    assert_eq!(report.alerts_created, 0);
    assert!(alerts_for(&app, plot_id).await.is_empty());
    assert!(app.notifier.sent().is_empty());

    let stored = plot::Entity::find_by_id(plot_id)
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.last_checked_at.is_some());
}

#[tokio::test]
async fn mail_failure_keeps_the_alert() {
    let app = TestApp::spawn().await;
    let token = app.create_authenticated_user("alice").await;
    let plot_id = app.create_plot(&token, "North Field").await;
    app.detector.set_percent(plot_id, 40.0);
    app.notifier.set_failing(true);

    let report = run_sweep(&app.sweep_context(), &CancellationToken::new()).await;

    assert_eq!(report.alerts_created, 1);
    assert!(report.failed.is_empty());
    assert_eq!(alerts_for(&app, plot_id).await.len(), 1);
}

#[tokio::test]
async fn cancelled_sweep_skips_remaining_plots() {
    let app = TestApp::spawn().await;
    let token = app.create_authenticated_user("alice").await;
    app.create_plot(&token, "North Field").await;
    app.create_plot(&token, "South Field").await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = run_sweep(&app.sweep_context(), &cancel).await;

    assert_eq!(report.skipped, 2);
    assert_eq!(report.processed, 0);
    assert!(app.detector.calls().is_empty());
}

#[tokio::test]
async fn plots_are_processed_in_id_order_when_sequential() {
    let app = TestApp::spawn().await;
    let token = app.create_authenticated_user("alice").await;
    let first = app.create_plot(&token, "First").await;
    let second = app.create_plot(&token, "Second").await;

    run_sweep(&app.sweep_context(), &CancellationToken::new()).await;

    let order: Vec<String> = app
        .detector
        .calls()
        .into_iter()
        .map(|c| c.plot_id)
        .collect();
    assert_eq!(order, vec![first.to_string(), second.to_string()]);
}

#[tokio::test]
async fn plot_deleted_mid_sweep_is_skipped_without_operator_mail() {
    let app = TestApp::spawn().await;
    let token = app.create_authenticated_user("alice").await;
    let plot_id = app.create_plot(&token, "North Field").await;
    app.detector.set_percent(plot_id, 40.0);
    let ctx = app.sweep_context();

    let guard = app.state.alert_gate.lock(plot_id).await;
    let cancel = CancellationToken::new();
    let (report, ()) = tokio::join!(run_sweep(&ctx, &cancel), async {
        while app.detector.calls().is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        plot::Entity::delete_by_id(plot_id)
            .exec(&app.db)
            .await
            .unwrap();
        drop(guard);
    });

    assert_eq!(report.skipped, 1);
    assert!(report.failed.is_empty());
    assert!(alerts_for(&app, plot_id).await.is_empty());
    assert!(app.notifier.sent().is_empty());
}
