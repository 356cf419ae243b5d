use serde_json::json;

use crate::common::{TestApp, routes};

mod create {
    use super::*;

    #[tokio::test]
    async fn owner_can_create_a_plot() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;

        let res = app
            .post_with_token(
                routes::PLOTS,
                &json!({
                    "name": "  North Field ",
                    "coordinates": [[-1.28, 36.81], [-1.28, 36.82], [-1.29, 36.82]],
                    "area": 2.5,
                }),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["name"], "North Field");
        assert_eq!(res.body["coordinates"].as_array().unwrap().len(), 3);
        assert_eq!(res.body["area"], 2.5);
        assert!(res.body["lastCheckedAt"].is_null());
        assert!(res.body["ownerId"].is_number());
    }

    #[tokio::test]
    async fn fewer_than_three_vertices_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;

        let res = app
            .post_with_token(
                routes::PLOTS,
                &json!({"name": "Line", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}),
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn out_of_range_coordinates_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;

        let res = app
            .post_with_token(
                routes::PLOTS,
                &json!({"name": "Bad", "coordinates": [[95.0, 0.0], [1.0, 1.0], [1.0, 0.0]]}),
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn requires_authentication() {
        let app = TestApp::spawn().await;

        let res = app
            .post_without_token(
                routes::PLOTS,
                &json!({"name": "X", "coordinates": [[0.0, 0.0], [1.0, 1.0], [1.0, 0.0]]}),
            )
            .await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }
}

mod read {
    use super::*;

    #[tokio::test]
    async fn list_shows_only_own_plots_with_alert_counts() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice").await;
        let bob = app.create_authenticated_user("bob").await;

        let alerted = app.create_plot(&alice, "North Field").await;
        app.create_plot(&alice, "South Field").await;
        app.create_plot(&bob, "Bob's Farm").await;

        app.detector.set_percent(alerted, 40.0);
        assert_eq!(app.detect(alerted, &alice).await.status, 200);

        let res = app.get_with_token(routes::PLOTS, &alice).await;

        assert_eq!(res.status, 200);
        let plots = res.body.as_array().unwrap();
        assert_eq!(plots.len(), 2);
        assert_eq!(plots[0]["name"], "North Field");
        assert_eq!(plots[0]["alertCount"], 1);
        assert_eq!(plots[1]["alertCount"], 0);
    }

    #[tokio::test]
    async fn another_users_plot_reads_as_missing() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice").await;
        let bob = app.create_authenticated_user("bob").await;
        let plot_id = app.create_plot(&alice, "North Field").await;

        let res = app.get_with_token(&routes::plot(plot_id), &bob).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod update {
    use super::*;

    #[tokio::test]
    async fn owner_can_rename_and_clear_area() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;

        let res = app
            .patch_with_token(
                &routes::plot(plot_id),
                &json!({"name": "Upper Field", "area": null}),
                &token,
            )
            .await;

        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["name"], "Upper Field");
        assert!(res.body["area"].is_null());
        assert_eq!(res.body["coordinates"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn outline_must_stay_valid() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;

        let res = app
            .patch_with_token(
                &routes::plot(plot_id),
                &json!({"coordinates": [[0.0, 0.0]]}),
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn non_owner_cannot_update() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice").await;
        let bob = app.create_authenticated_user("bob").await;
        let plot_id = app.create_plot(&alice, "North Field").await;

        let res = app
            .patch_with_token(&routes::plot(plot_id), &json!({"name": "Mine"}), &bob)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn deleting_a_plot_removes_its_alerts_and_documents() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;

        app.detector.set_percent(plot_id, 40.0);
        assert_eq!(app.detect(plot_id, &token).await.status, 200);
        let upload = app
            .upload_with_token(Some(plot_id), "deed.pdf", b"%PDF-1.4".to_vec(), None, &token)
            .await;
        assert_eq!(upload.status, 201, "{}", upload.text);
        let doc_id = upload.id();

        let res = app.delete_with_token(&routes::plot(plot_id), &token).await;
        assert_eq!(res.status, 204);

        let get = app.get_with_token(&routes::plot(plot_id), &token).await;
        assert_eq!(get.status, 404);

        let alerts = app.get_with_token(routes::ALERTS, &token).await;
        assert_eq!(alerts.body, json!([]));

        let content = app
            .get_with_token(&routes::document_content(doc_id), &token)
            .await;
        assert_eq!(content.status, 404);
    }

    #[tokio::test]
    async fn non_owner_cannot_delete() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice").await;
        let bob = app.create_authenticated_user("bob").await;
        let plot_id = app.create_plot(&alice, "North Field").await;

        let res = app.delete_with_token(&routes::plot(plot_id), &bob).await;
        assert_eq!(res.status, 404);

        let still_there = app.get_with_token(&routes::plot(plot_id), &alice).await;
        assert_eq!(still_there.status, 200);
    }
}
