use serde_json::json;

use crate::common::{TestApp, TestUser, routes};

struct Fixture {
    app: TestApp,
    inst: i32,
    alice: TestUser,
    tom: TestUser,
    template_id: i32,
    field_ids: Vec<i64>,
}

/// One institution, a resident, a tutor and a three-field template.
async fn fixture() -> Fixture {
    let app = TestApp::spawn().await;
    let inst = app.create_institution("General Hospital", "gh").await;
    let alice = app.signup("alice", "resident", Some(inst)).await;
    let tom = app.signup("tom", "tutor", Some(inst)).await;
    let created = app.create_template(&app.root_token, inst, "Logbook", 3).await;
    assert_eq!(created.status, 201, "{}", created.text);
    Fixture {
        template_id: created.id(),
        field_ids: created.field_ids(),
        app,
        inst,
        alice,
        tom,
    }
}

mod completeness {
    use super::*;

    #[tokio::test]
    async fn submission_completes_once_every_field_has_a_record() {
        let f = fixture().await;

        let res = f
            .app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, f.tom.id, &f.field_ids[..2])
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["status"], "pending");
        assert_eq!(res.body["required_fields"], 3);
        assert_eq!(res.body["field_records"].as_array().unwrap().len(), 2);
        let id = res.id();

        let res = f
            .app
            .put_with_token(
                &routes::submission_review(id),
                &json!({"field_records": [{"field_template_id": f.field_ids[2], "value": "done"}]}),
                &f.tom.token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["status"], "completed");
        assert_eq!(res.body["field_records"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn full_submission_is_completed_on_creation() {
        let f = fixture().await;
        let res = f
            .app
            .create_submission(&f.tom.token, f.template_id, f.alice.id, f.tom.id, &f.field_ids)
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["status"], "completed");
    }

    #[tokio::test]
    async fn completed_submission_rejects_further_review() {
        let f = fixture().await;
        let id = f
            .app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, f.tom.id, &f.field_ids)
            .await
            .id();

        let res = f
            .app
            .put_with_token(
                &routes::submission_review(id),
                &json!({"field_records": [{"field_template_id": f.field_ids[0], "value": "again"}]}),
                &f.tom.token,
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "CONFLICT");
    }

    #[tokio::test]
    async fn answered_field_cannot_be_answered_twice() {
        let f = fixture().await;
        let id = f
            .app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, f.tom.id, &f.field_ids[..1])
            .await
            .id();

        let res = f
            .app
            .put_with_token(
                &routes::submission_review(id),
                &json!({"field_records": [{"field_template_id": f.field_ids[0], "value": "twice"}]}),
                &f.tom.token,
            )
            .await;
        assert_eq!(res.status, 400);

        let res = f.app.get_with_token(&routes::submission(id), &f.alice.token).await;
        assert_eq!(res.body["status"], "pending");
        assert_eq!(res.body["field_records"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn records_for_foreign_fields_are_rejected() {
        let f = fixture().await;
        let other = f
            .app
            .create_template(&f.app.root_token, f.inst, "Other form", 1)
            .await;
        let foreign = other.field_ids();

        let res = f
            .app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, f.tom.id, &foreign)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn duplicate_fields_in_one_request_are_rejected() {
        let f = fixture().await;
        let dup = [f.field_ids[0], f.field_ids[0]];
        let res = f
            .app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, f.tom.id, &dup)
            .await;
        assert_eq!(res.status, 400);
    }
}

mod participants {
    use super::*;

    #[tokio::test]
    async fn tutor_must_hold_tutor_role() {
        let f = fixture().await;
        let bob = f.app.signup("bob", "resident", Some(f.inst)).await;
        let res = f
            .app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, bob.id, &[])
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn participants_must_belong_to_the_institution() {
        let f = fixture().await;
        let outsider = f.app.signup("otto", "tutor", None).await;
        let res = f
            .app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, outsider.id, &[])
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn bystander_cannot_submit_for_others() {
        let f = fixture().await;
        let bob = f.app.signup("bob", "resident", Some(f.inst)).await;
        let res = f
            .app
            .create_submission(&bob.token, f.template_id, f.alice.id, f.tom.id, &[])
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn bystander_cannot_review_or_delete() {
        let f = fixture().await;
        let bob = f.app.signup("bob", "resident", Some(f.inst)).await;
        let id = f
            .app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, f.tom.id, &[])
            .await
            .id();

        let res = f
            .app
            .put_with_token(
                &routes::submission_review(id),
                &json!({"field_records": [{"field_template_id": f.field_ids[0], "value": "x"}]}),
                &bob.token,
            )
            .await;
        assert_eq!(res.status, 403);

        let res = f.app.delete_with_token(&routes::submission(id), &bob.token).await;
        assert_eq!(res.status, 403);

        let res = f.app.delete_with_token(&routes::submission(id), &f.alice.token).await;
        assert_eq!(res.status, 204);
        let res = f.app.get_with_token(&routes::submission(id), &f.alice.token).await;
        assert_eq!(res.status, 404);
    }
}

mod scoping {
    use super::*;

    #[tokio::test]
    async fn submissions_of_other_institutions_are_invisible() {
        let f = fixture().await;
        let other = f.app.create_institution("Other Hospital", "oh").await;
        let mallory = f.app.signup("mallory", "tutor", Some(other)).await;
        let id = f
            .app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, f.tom.id, &f.field_ids[..1])
            .await
            .id();

        let res = f.app.get_with_token(&routes::submission(id), &mallory.token).await;
        assert_eq!(res.status, 403);

        let res = f
            .app
            .get_with_token(&routes::user_submissions(f.alice.id), &mallory.token)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body.as_array().unwrap().len(), 0);

        let res = f
            .app
            .get_with_token(
                &format!("{}?institution_id={}", routes::user_submissions(f.alice.id), f.inst),
                &mallory.token,
            )
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn user_submissions_cover_both_roles_newest_first() {
        let f = fixture().await;
        let first = f
            .app
            .post_with_token(
                routes::SUBMISSIONS,
                &json!({
                    "form_template_id": f.template_id,
                    "resident_id": f.alice.id,
                    "tutor_id": f.tom.id,
                    "submission_date": "2024-01-01T00:00:00Z",
                }),
                &f.alice.token,
            )
            .await;
        assert_eq!(first.status, 201, "{}", first.text);
        let second = f
            .app
            .post_with_token(
                routes::SUBMISSIONS,
                &json!({
                    "form_template_id": f.template_id,
                    "resident_id": f.alice.id,
                    "tutor_id": f.tom.id,
                    "submission_date": "2024-06-01T00:00:00Z",
                }),
                &f.alice.token,
            )
            .await;

        for user in [&f.alice, &f.tom] {
            let res = f
                .app
                .get_with_token(&routes::user_submissions(user.id), &user.token)
                .await;
            assert_eq!(res.status, 200);
            let ids: Vec<i64> = res
                .body
                .as_array()
                .unwrap()
                .iter()
                .map(|s| s["id"].as_i64().unwrap())
                .collect();
            assert_eq!(ids, vec![second.id() as i64, first.id() as i64]);
        }
    }

    #[tokio::test]
    async fn resident_stats_reflect_submission_status() {
        let f = fixture().await;
        f.app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, f.tom.id, &f.field_ids)
            .await;
        f.app
            .create_submission(&f.alice.token, f.template_id, f.alice.id, f.tom.id, &[])
            .await;

        let res = f
            .app
            .get_with_token(&routes::resident(f.alice.id), &f.alice.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["stats"], json!({"total": 2, "completed": 1, "pending": 1}));
        assert_eq!(res.body["submissions"].as_array().unwrap().len(), 2);
    }
}
