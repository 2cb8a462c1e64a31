use serde_json::json;

use crate::common::{PASSWORD, TestApp, routes};

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn super_admin_creates_institution_and_becomes_its_admin() {
        let app = TestApp::spawn().await;
        let res = app
            .post_with_token(
                routes::INSTITUTIONS,
                &json!({"name": "General Hospital", "code": "gh-01", "description": "Teaching hospital"}),
                &app.root_token,
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["code"], "GH-01");
        assert_eq!(res.body["is_active"], true);
        assert_eq!(res.body["settings"], json!({}));
        assert_eq!(res.body["admin_ids"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn plain_members_cannot_create_institutions() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice", "resident", None).await;
        let res = app
            .post_with_token(
                routes::INSTITUTIONS,
                &json!({"name": "Shadow Clinic", "code": "sc"}),
                &alice.token,
            )
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn duplicate_name_or_code_is_a_conflict() {
        let app = TestApp::spawn().await;
        app.create_institution("General Hospital", "gh").await;

        for body in [
            json!({"name": "General Hospital", "code": "other"}),
            json!({"name": "Other Hospital", "code": "GH"}),
        ] {
            let res = app
                .post_with_token(routes::INSTITUTIONS, &body, &app.root_token)
                .await;
            assert_eq!(res.status, 400, "{}", res.text);
            assert_eq!(res.code(), "CONFLICT");
        }
    }

    #[tokio::test]
    async fn deleting_institution_with_users_is_rejected_and_changes_nothing() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        app.signup("alice", "resident", Some(inst)).await;
        app.signup("tom", "tutor", Some(inst)).await;
        let created = app
            .create_template(&app.root_token, inst, "Logbook", 2)
            .await;
        assert_eq!(created.status, 201, "{}", created.text);

        let res = app
            .delete_with_token(&routes::institution(inst), &app.root_token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(
            res.body["message"],
            "Cannot delete institution. It has 2 associated users."
        );

        let res = app
            .get_with_token(&routes::institution(inst), &app.root_token)
            .await;
        assert_eq!(res.status, 200);
        let res = app
            .get_with_token(&routes::form_template(created.id()), &app.root_token)
            .await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn soft_deleted_members_still_block_deletion() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let bob = app.signup("bob", "resident", Some(inst)).await;
        let tom = app.signup("tom", "tutor", Some(inst)).await;
        let tpl = app.create_template(&app.root_token, inst, "Logbook", 1).await;
        let submission = app
            .create_submission(&bob.token, tpl.id(), bob.id, tom.id, &[])
            .await;
        assert_eq!(submission.status, 201, "{}", submission.text);

        for user in [&bob, &tom] {
            let res = app
                .delete_json_with_token(routes::ME, &json!({"password": PASSWORD}), &user.token)
                .await;
            assert_eq!(res.status, 200, "{}", res.text);
        }

        let res = app
            .delete_with_token(&routes::institution(inst), &app.root_token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "CONFLICT");

        let res = app
            .get_with_token(&routes::submission(submission.id()), &app.root_token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
    }

    #[tokio::test]
    async fn empty_institution_is_deleted_with_its_templates() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let created = app
            .create_template(&app.root_token, inst, "Logbook", 2)
            .await;
        assert_eq!(created.status, 201);

        let res = app
            .delete_with_token(&routes::institution(inst), &app.root_token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app
            .get_with_token(&routes::institution(inst), &app.root_token)
            .await;
        assert_eq!(res.status, 404);
        let res = app
            .get_with_token(&routes::form_template(created.id()), &app.root_token)
            .await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn only_super_admin_deletes_and_toggles() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let admin = app.institution_admin("dean", inst).await;

        let res = app
            .delete_with_token(&routes::institution(inst), &admin.token)
            .await;
        assert_eq!(res.status, 403);
        let res = app
            .patch_with_token(&routes::institution_toggle(inst), &json!({}), &admin.token)
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn institution_admin_updates_details() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let admin = app.institution_admin("dean", inst).await;

        let res = app
            .put_with_token(
                &routes::institution(inst),
                &json!({"address": "1 Main St", "settings": {"theme": "dark"}}),
                &admin.token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["address"], "1 Main St");
        assert_eq!(res.body["settings"]["theme"], "dark");

        let res = app
            .put_with_token(
                &routes::institution(inst),
                &json!({"settings": [1, 2, 3]}),
                &admin.token,
            )
            .await;
        assert_eq!(res.status, 400);
    }
}

mod membership {
    use super::*;

    #[tokio::test]
    async fn user_joins_active_institution_once() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let alice = app.signup("alice", "resident", None).await;

        let res = app
            .post_with_token(&routes::institution_join(inst), &json!({}), &alice.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["id"], inst);

        let res = app
            .post_with_token(&routes::institution_join(inst), &json!({}), &alice.token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "CONFLICT");

        let res = app.get_with_token(routes::MY_INSTITUTIONS, &alice.token).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn inactive_institution_cannot_be_joined() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        app.patch_with_token(&routes::institution_toggle(inst), &json!({}), &app.root_token)
            .await;
        let alice = app.signup("alice", "resident", None).await;

        let res = app
            .post_with_token(&routes::institution_join(inst), &json!({}), &alice.token)
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn directory_lists_every_institution() {
        let app = TestApp::spawn().await;
        app.create_institution("Hospital A", "ha").await;
        app.create_institution("Hospital B", "hb").await;
        let alice = app.signup("alice", "resident", None).await;

        let res = app.get_with_token(routes::ALL_INSTITUTIONS, &alice.token).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().unwrap().len(), 2);

        let res = app.get_with_token(routes::MY_INSTITUTIONS, &alice.token).await;
        assert_eq!(res.body.as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn non_member_cannot_read_institution() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let b = app.create_institution("Hospital B", "hb").await;
        let alice = app.signup("alice", "resident", Some(a)).await;

        let res = app.get_with_token(&routes::institution(a), &alice.token).await;
        assert_eq!(res.status, 200);
        let res = app.get_with_token(&routes::institution(b), &alice.token).await;
        assert_eq!(res.status, 403);
    }
}

mod admins {
    use super::*;

    #[tokio::test]
    async fn last_admin_cannot_be_removed() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let res = app
            .get_with_token(&routes::institution(inst), &app.root_token)
            .await;
        let root_id = res.body["admin_ids"][0].as_i64().unwrap() as i32;

        let res = app
            .delete_with_token(&routes::institution_admin(inst, root_id), &app.root_token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn admin_can_be_added_listed_and_removed() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let dean = app.institution_admin("dean", inst).await;

        let res = app
            .get_with_token(&routes::institution_admins(inst), &dean.token)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().unwrap().len(), 2);

        let res = app
            .post_with_token(
                &routes::institution_admins(inst),
                &json!({"user_id": dean.id}),
                &dean.token,
            )
            .await;
        assert_eq!(res.status, 400);

        let res = app
            .delete_with_token(&routes::institution_admin(inst, dean.id), &app.root_token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert!(!res.body["admin_ids"]
            .as_array()
            .unwrap()
            .contains(&json!(dean.id)));

        // Pure admins lose their membership with the admin seat.
        let res = app.get_with_token(&routes::institution(inst), &dean.token).await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn stats_count_members_by_role() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let dean = app.institution_admin("dean", inst).await;
        app.signup("alice", "resident", Some(inst)).await;
        app.signup("bob", "resident", Some(inst)).await;
        app.signup("tom", "tutor", Some(inst)).await;

        let res = app
            .get_with_token(&routes::institution_stats(inst), &dean.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["residents"], 2);
        assert_eq!(res.body["tutors"], 1);
        assert_eq!(res.body["admins"], 2);
        assert_eq!(res.body["submissions"], 0);

        let alice = app.login("alice", crate::common::PASSWORD).await;
        let res = app
            .get_with_token(&routes::institution_stats(inst), &alice)
            .await;
        assert_eq!(res.status, 403);
    }
}
