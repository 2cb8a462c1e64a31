use serde_json::json;

use crate::common::{TestApp, routes};

mod create {
    use super::*;

    #[tokio::test]
    async fn fields_come_back_in_request_order() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let admin = app.institution_admin("dean", inst).await;

        let res = app
            .post_with_token(
                routes::FORM_TEMPLATES,
                &json!({
                    "form_name": "Surgical logbook",
                    "score": "SCORE",
                    "scale_description": "1 = poor, 5 = excellent",
                    "institution_id": inst,
                    "field_templates": [
                        {"name": "Procedure", "type": "text"},
                        {"name": "Role", "type": "select", "options": ["Observer", " Assistant ", ""]},
                        {"name": "Competence", "type": "scale", "scale_options": ["1", "2", "3"]},
                        {"name": "Date", "type": "date", "options": ["ignored"]},
                        {"name": "Notes", "type": "textArea", "section": "Reflection"},
                    ],
                }),
                &admin.token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        let names: Vec<&str> = res.body["field_templates"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Procedure", "Role", "Competence", "Date", "Notes"]);

        let ids = res.field_ids();
        assert_eq!(res.body["field_template_ids"], json!(ids));
        assert_eq!(res.body["field_templates"][1]["options"], json!(["Observer", "Assistant"]));
        assert_eq!(res.body["field_templates"][3]["options"], json!([]));
        assert_eq!(res.body["field_templates"][2]["scale_options"], json!(["1", "2", "3"]));
        assert_eq!(res.body["field_templates"][4]["section"], "Reflection");

        let fetched = app
            .get_with_token(&routes::form_template(res.id()), &admin.token)
            .await;
        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.field_ids(), ids);
    }

    #[tokio::test]
    async fn select_without_options_is_rejected() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;

        let res = app
            .post_with_token(
                routes::FORM_TEMPLATES,
                &json!({
                    "form_name": "Broken",
                    "institution_id": inst,
                    "field_templates": [{"name": "Pick one", "type": "select", "options": []}],
                }),
                &app.root_token,
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn template_needs_at_least_one_field() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let res = app.create_template(&app.root_token, inst, "Empty", 0).await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn scored_template_requires_scale_description() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let res = app
            .post_with_token(
                routes::FORM_TEMPLATES,
                &json!({
                    "form_name": "Scored",
                    "score": "OTHER",
                    "institution_id": inst,
                    "field_templates": [{"name": "Only", "type": "text"}],
                }),
                &app.root_token,
            )
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn form_name_is_unique_per_institution() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let b = app.create_institution("Hospital B", "hb").await;

        let res = app.create_template(&app.root_token, a, "Logbook", 1).await;
        assert_eq!(res.status, 201);
        let res = app.create_template(&app.root_token, a, "Logbook", 1).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "CONFLICT");
        let res = app.create_template(&app.root_token, b, "Logbook", 1).await;
        assert_eq!(res.status, 201, "{}", res.text);
    }

    #[tokio::test]
    async fn members_without_admin_rights_cannot_create() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let tom = app.signup("tom", "tutor", Some(inst)).await;

        let res = app.create_template(&tom.token, inst, "Logbook", 1).await;
        assert_eq!(res.status, 403);
    }
}

mod read {
    use super::*;

    #[tokio::test]
    async fn listing_is_scoped_to_memberships() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let b = app.create_institution("Hospital B", "hb").await;
        app.create_template(&app.root_token, a, "A form", 1).await;
        let foreign = app.create_template(&app.root_token, b, "B form", 1).await;
        let alice = app.signup("alice", "resident", Some(a)).await;

        let res = app.get_with_token(routes::FORM_TEMPLATES, &alice.token).await;
        assert_eq!(res.status, 200);
        let names: Vec<&str> = res
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["form_name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["A form"]);

        let res = app
            .get_with_token(&routes::form_template(foreign.id()), &alice.token)
            .await;
        assert_eq!(res.status, 403);

        let res = app
            .get_with_token(
                &format!("{}?institution_id={b}", routes::FORM_TEMPLATES),
                &alice.token,
            )
            .await;
        assert_eq!(res.status, 403);

        let res = app.get_with_token(routes::FORM_TEMPLATES, &app.root_token).await;
        assert_eq!(res.body.as_array().unwrap().len(), 2);
    }
}

mod update_and_delete {
    use super::*;

    #[tokio::test]
    async fn replacing_fields_renumbers_them() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let created = app.create_template(&app.root_token, inst, "Logbook", 3).await;

        let res = app
            .put_with_token(
                &routes::form_template(created.id()),
                &json!({
                    "form_name": "Logbook v2",
                    "field_templates": [
                        {"name": "Second", "type": "text"},
                        {"name": "First", "type": "text"},
                    ],
                }),
                &app.root_token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["form_name"], "Logbook v2");
        let fields = res.body["field_templates"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0]["name"], "Second");
        assert_eq!(fields[0]["position"], 0);
        assert_eq!(fields[1]["position"], 1);
    }

    #[tokio::test]
    async fn template_with_submissions_cannot_be_deleted_or_refielded() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let alice = app.signup("alice", "resident", Some(inst)).await;
        let tom = app.signup("tom", "tutor", Some(inst)).await;
        let created = app.create_template(&app.root_token, inst, "Logbook", 2).await;
        let ids = created.field_ids();

        let sub = app
            .create_submission(&alice.token, created.id(), alice.id, tom.id, &ids[..1])
            .await;
        assert_eq!(sub.status, 201, "{}", sub.text);

        let res = app
            .delete_with_token(&routes::form_template(created.id()), &app.root_token)
            .await;
        assert_eq!(res.status, 400);

        let res = app
            .put_with_token(
                &routes::form_template(created.id()),
                &json!({"field_templates": [{"name": "New", "type": "text"}]}),
                &app.root_token,
            )
            .await;
        assert_eq!(res.status, 400);

        // Answered fields are pinned.
        let res = app
            .delete_with_token(&routes::field_template(ids[0] as i32), &app.root_token)
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn deleting_a_field_closes_the_gap_and_completes_pending_submissions() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let alice = app.signup("alice", "resident", Some(inst)).await;
        let tom = app.signup("tom", "tutor", Some(inst)).await;
        let created = app.create_template(&app.root_token, inst, "Logbook", 3).await;
        let ids = created.field_ids();

        let sub = app
            .create_submission(&alice.token, created.id(), alice.id, tom.id, &[ids[0], ids[2]])
            .await;
        assert_eq!(sub.body["status"], "pending");

        let res = app
            .delete_with_token(&routes::field_template(ids[1] as i32), &app.root_token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["deleted_field_id"], ids[1]);

        let tpl = app
            .get_with_token(&routes::form_template(created.id()), &app.root_token)
            .await;
        assert_eq!(tpl.field_ids(), vec![ids[0], ids[2]]);
        assert_eq!(tpl.body["field_templates"][1]["position"], 1);

        let res = app
            .get_with_token(&routes::submission(sub.id()), &alice.token)
            .await;
        assert_eq!(res.body["status"], "completed");
    }

    #[tokio::test]
    async fn last_field_cannot_be_deleted() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let created = app.create_template(&app.root_token, inst, "Logbook", 1).await;
        let ids = created.field_ids();

        let res = app
            .delete_with_token(&routes::field_template(ids[0] as i32), &app.root_token)
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn unused_template_is_deleted() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let created = app.create_template(&app.root_token, inst, "Logbook", 2).await;

        let res = app
            .delete_with_token(&routes::form_template(created.id()), &app.root_token)
            .await;
        assert_eq!(res.status, 204);
        let res = app
            .get_with_token(&routes::form_template(created.id()), &app.root_token)
            .await;
        assert_eq!(res.status, 404);
    }
}
