use crate::common::{MAX_UPLOAD_SIZE, TestApp, routes};

mod upload {
    use super::*;

    #[tokio::test]
    async fn owner_can_upload_and_download_a_document() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;
        let bytes = b"%PDF-1.4 title deed".to_vec();

        let res = app
            .upload_with_token(
                Some(plot_id),
                "title-deed.pdf",
                bytes.clone(),
                Some("title_deed"),
                &token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["plotId"], plot_id);
        assert_eq!(res.body["filename"], "title-deed.pdf");
        assert_eq!(res.body["contentType"], "application/pdf");
        assert_eq!(res.body["type"], "title_deed");
        assert_eq!(res.body["size"], bytes.len());
        assert_eq!(res.body["sha256"].as_str().unwrap().len(), 64);
        assert!(res.body.get("storageKey").is_none());

        let download = app
            .client
            .get(app.url(&routes::document_content(res.id())))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .unwrap();
        assert_eq!(download.status().as_u16(), 200);
        assert_eq!(download.headers()["content-type"], "application/pdf");
        assert_eq!(
            download.headers()["content-disposition"],
            "attachment; filename=\"title-deed.pdf\""
        );
        assert_eq!(download.bytes().await.unwrap().as_ref(), bytes.as_slice());
    }

    #[tokio::test]
    async fn type_defaults_to_other() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;

        let res = app
            .upload_with_token(Some(plot_id), "survey.png", vec![1, 2, 3], None, &token)
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["type"], "other");
        assert_eq!(res.body["contentType"], "image/png");
    }

    #[tokio::test]
    async fn hidden_and_dot_dot_filenames_are_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;

        for name in [".env", "..", ".hidden.pdf"] {
            let res = app
                .upload_with_token(Some(plot_id), name, vec![1], None, &token)
                .await;
            assert_eq!(res.status, 400, "{name} should be rejected");
            assert_eq!(res.body["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn missing_plot_id_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;

        let res = app
            .upload_with_token(None, "deed.pdf", vec![1], None, &token)
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;

        let res = app
            .upload_with_token(
                Some(plot_id),
                "big.bin",
                vec![0u8; MAX_UPLOAD_SIZE as usize + 1],
                None,
                &token,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn cannot_attach_to_another_users_plot() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice").await;
        let bob = app.create_authenticated_user("bob").await;
        let plot_id = app.create_plot(&alice, "North Field").await;

        let res = app
            .upload_with_token(Some(plot_id), "deed.pdf", vec![1], None, &bob)
            .await;

        assert_eq!(res.status, 404);
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn lists_documents_per_plot_and_overall() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let north = app.create_plot(&token, "North Field").await;
        let south = app.create_plot(&token, "South Field").await;
        app.upload_with_token(Some(north), "a.pdf", vec![1], None, &token)
            .await;
        app.upload_with_token(Some(south), "b.pdf", vec![2], None, &token)
            .await;

        let all = app.get_with_token(routes::DOCUMENTS, &token).await;
        assert_eq!(all.status, 200);
        assert_eq!(all.body.as_array().unwrap().len(), 2);

        let north_docs = app
            .get_with_token(&routes::plot_documents(north), &token)
            .await;
        let docs = north_docs.body.as_array().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["filename"], "a.pdf");
    }

    #[tokio::test]
    async fn other_users_documents_are_not_listed() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice").await;
        let bob = app.create_authenticated_user("bob").await;
        let plot_id = app.create_plot(&alice, "North Field").await;
        app.upload_with_token(Some(plot_id), "a.pdf", vec![1], None, &alice)
            .await;

        let res = app.get_with_token(routes::DOCUMENTS, &bob).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().unwrap().len(), 0);
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn deleted_document_is_gone() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("alice").await;
        let plot_id = app.create_plot(&token, "North Field").await;
        let doc_id = app
            .upload_with_token(Some(plot_id), "a.pdf", vec![1], None, &token)
            .await
            .id();

        let res = app.delete_with_token(&routes::document(doc_id), &token).await;
        assert_eq!(res.status, 204);

        let content = app
            .get_with_token(&routes::document_content(doc_id), &token)
            .await;
        assert_eq!(content.status, 404);
    }

    #[tokio::test]
    async fn non_owner_cannot_delete_or_read() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice").await;
        let bob = app.create_authenticated_user("bob").await;
        let plot_id = app.create_plot(&alice, "North Field").await;
        let doc_id = app
            .upload_with_token(Some(plot_id), "a.pdf", vec![1], None, &alice)
            .await
            .id();

        let read = app
            .get_with_token(&routes::document_content(doc_id), &bob)
            .await;
        assert_eq!(read.status, 404);

        let res = app.delete_with_token(&routes::document(doc_id), &bob).await;
        assert_eq!(res.status, 404);
    }
}
