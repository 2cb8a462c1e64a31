use serde_json::json;

use crate::common::{PASSWORD, TestApp, routes};

mod signup_and_login {
    use super::*;

    #[tokio::test]
    async fn resident_can_sign_up_into_an_institution() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({
                    "username": "  alice ",
                    "password": PASSWORD,
                    "name": "Alice",
                    "role": "resident",
                    "institution_id": inst,
                }),
            )
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["username"], "alice");
        assert_eq!(res.body["roles"], json!(["resident"]));
        assert_eq!(res.body["institutions"], json!([inst]));
        assert!(res.body.get("password").is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected_and_first_account_survives() {
        let app = TestApp::spawn().await;
        let first = app.signup("alice", "resident", None).await;

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({
                    "username": "alice",
                    "password": "another-password",
                    "name": "Impostor",
                    "role": "tutor",
                }),
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "USERNAME_TAKEN");

        let me = app.get_with_token(routes::ME, &first.token).await;
        assert_eq!(me.status, 200);
        assert_eq!(me.body["name"], "alice name");
        assert_eq!(me.body["roles"], json!(["resident"]));

        // The original password still works.
        app.login("alice", PASSWORD).await;
    }

    #[tokio::test]
    async fn signup_cannot_self_assign_admin_roles() {
        let app = TestApp::spawn().await;
        for role in ["admin", "superadmin", "janitor"] {
            let res = app
                .post_without_token(
                    routes::SIGNUP,
                    &json!({
                        "username": format!("u_{role}"),
                        "password": PASSWORD,
                        "name": "Someone",
                        "role": role,
                    }),
                )
                .await;
            assert_eq!(res.status, 400, "role {role} should be rejected");
            assert_eq!(res.code(), "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn signup_into_inactive_institution_fails() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("Closed Clinic", "cc").await;
        let res = app
            .patch_with_token(&routes::institution_toggle(inst), &json!({}), &app.root_token)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["is_active"], false);

        let res = app
            .post_without_token(
                routes::SIGNUP,
                &json!({
                    "username": "bob",
                    "password": PASSWORD,
                    "name": "Bob",
                    "role": "tutor",
                    "institution_id": inst,
                }),
            )
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let app = TestApp::spawn().await;
        app.signup("alice", "resident", None).await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": "not-the-password"}),
            )
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "INVALID_CREDENTIALS");

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "nobody", "password": PASSWORD}),
            )
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "INVALID_CREDENTIALS");
    }

    #[tokio::test]
    async fn login_returns_user_and_password_change_flag() {
        let app = TestApp::spawn().await;
        app.signup("alice", "resident", None).await;

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": PASSWORD}),
            )
            .await;
        assert_eq!(res.status, 200);
        assert!(res.body["token"].is_string());
        assert_eq!(res.body["require_password_change"], false);
        assert_eq!(res.body["user"]["username"], "alice");
    }
}

mod authentication {
    use super::*;

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app.get_without_token(routes::ME).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_MISSING");
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app.get_with_token(routes::ME, "not-a-jwt").await;
        assert_eq!(res.status, 401);
        assert_eq!(res.code(), "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn token_of_deleted_account_stops_working() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice", "resident", None).await;

        let res = app
            .delete_json_with_token(routes::ME, &json!({"password": PASSWORD}), &alice.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.get_with_token(routes::ME, &alice.token).await;
        assert_eq!(res.status, 401);

        let res = app
            .post_without_token(
                routes::LOGIN,
                &json!({"username": "alice", "password": PASSWORD}),
            )
            .await;
        assert_eq!(res.status, 401);
    }
}

mod own_account {
    use super::*;

    #[tokio::test]
    async fn change_password_requires_old_password() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice", "resident", None).await;

        let res = app
            .put_with_token(
                routes::CHANGE_PASSWORD,
                &json!({"old_password": "wrong-password", "new_password": "brand-new-pass"}),
                &alice.token,
            )
            .await;
        assert_eq!(res.status, 400);

        let res = app
            .put_with_token(
                routes::CHANGE_PASSWORD,
                &json!({"old_password": PASSWORD, "new_password": "brand-new-pass"}),
                &alice.token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert!(res.body["token"].is_string());

        app.login("alice", "brand-new-pass").await;
    }

    #[tokio::test]
    async fn update_me_changes_profile_fields() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice", "resident", None).await;

        let res = app
            .put_with_token(
                routes::ME,
                &json!({"name": "Alice Liddell", "email": "alice@example.org"}),
                &alice.token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["name"], "Alice Liddell");
        assert_eq!(res.body["email"], "alice@example.org");

        let res = app
            .put_with_token(routes::ME, &json!({"email": null}), &alice.token)
            .await;
        assert_eq!(res.status, 200);
        assert!(res.body["email"].is_null());
        assert_eq!(res.body["name"], "Alice Liddell");
    }

    #[tokio::test]
    async fn update_me_rejects_taken_username() {
        let app = TestApp::spawn().await;
        app.signup("alice", "resident", None).await;
        let bob = app.signup("bob", "tutor", None).await;

        let res = app
            .put_with_token(routes::ME, &json!({"username": "alice"}), &bob.token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "USERNAME_TAKEN");
    }

    #[tokio::test]
    async fn delete_me_requires_correct_password() {
        let app = TestApp::spawn().await;
        let alice = app.signup("alice", "resident", None).await;

        let res = app
            .delete_json_with_token(routes::ME, &json!({"password": "nope-nope"}), &alice.token)
            .await;
        assert_eq!(res.status, 401);

        let me = app.get_with_token(routes::ME, &alice.token).await;
        assert_eq!(me.status, 200);
    }

    #[tokio::test]
    async fn institution_admin_cannot_delete_own_account() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let admin = app.institution_admin("dean", inst).await;

        let res = app
            .delete_json_with_token(routes::ME, &json!({"password": PASSWORD}), &admin.token)
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "CONFLICT");
    }
}

mod directory {
    use super::*;

    #[tokio::test]
    async fn user_listing_is_scoped_to_shared_institutions() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let b = app.create_institution("Hospital B", "hb").await;
        let alice = app.signup("alice", "resident", Some(a)).await;
        app.signup("tom", "tutor", Some(a)).await;
        app.signup("bob", "resident", Some(b)).await;

        let res = app.get_with_token(routes::USERS, &alice.token).await;
        assert_eq!(res.status, 200);
        let mut names: Vec<&str> = res
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["username"].as_str().unwrap())
            .collect();
        names.sort();
        assert!(names.contains(&"alice"));
        assert!(names.contains(&"tom"));
        assert!(!names.contains(&"bob"));

        let res = app
            .get_with_token(&format!("{}?institution_id={b}", routes::USERS), &alice.token)
            .await;
        assert_eq!(res.status, 403);
    }

    #[tokio::test]
    async fn tutors_listing_filters_by_role() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let alice = app.signup("alice", "resident", Some(a)).await;
        app.signup("tom", "tutor", Some(a)).await;

        let res = app.get_with_token(routes::TUTORS, &alice.token).await;
        assert_eq!(res.status, 200);
        let names: Vec<&str> = res
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["username"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["tom"]);
    }

    #[tokio::test]
    async fn users_outside_shared_institutions_are_hidden() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let b = app.create_institution("Hospital B", "hb").await;
        let alice = app.signup("alice", "resident", Some(a)).await;
        let bob = app.signup("bob", "resident", Some(b)).await;

        let res = app.get_with_token(&routes::user(bob.id), &alice.token).await;
        assert_eq!(res.status, 403);

        let res = app.get_with_token(&routes::user(alice.id), &alice.token).await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn admin_can_assign_supervisor_and_tutor_sees_resident() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let admin = app.institution_admin("dean", a).await;
        let alice = app.signup("alice", "resident", Some(a)).await;
        let tom = app.signup("tom", "tutor", Some(a)).await;

        let res = app
            .put_with_token(
                &routes::user(alice.id),
                &json!({"supervisor_id": tom.id}),
                &admin.token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["supervisor_id"], tom.id);

        let res = app
            .get_with_token(&routes::tutor_residents(tom.id), &tom.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let residents = res.body["residents"].as_array().unwrap();
        assert_eq!(residents.len(), 1);
        assert_eq!(residents[0]["username"], "alice");
        assert_eq!(residents[0]["stats"]["total"], 0);

        let res = app.get_with_token(&routes::resident(alice.id), &tom.token).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["resident"]["id"], alice.id);
    }

    #[tokio::test]
    async fn supervisor_must_be_a_tutor() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let admin = app.institution_admin("dean", a).await;
        let alice = app.signup("alice", "resident", Some(a)).await;
        let bob = app.signup("bob", "resident", Some(a)).await;

        let res = app
            .put_with_token(
                &routes::user(alice.id),
                &json!({"supervisor_id": bob.id}),
                &admin.token,
            )
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn institution_admin_deletes_member_but_not_outsider() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let b = app.create_institution("Hospital B", "hb").await;
        let admin = app.institution_admin("dean", a).await;
        let alice = app.signup("alice", "resident", Some(a)).await;
        let bob = app.signup("bob", "resident", Some(b)).await;

        let res = app.delete_with_token(&routes::user(bob.id), &admin.token).await;
        assert_eq!(res.status, 403);

        let res = app.delete_with_token(&routes::user(alice.id), &admin.token).await;
        assert_eq!(res.status, 200, "{}", res.text);

        let res = app.get_with_token(&routes::user(alice.id), &app.root_token).await;
        assert_eq!(res.status, 404);
    }
}

mod cross_institution {
    use super::*;
    use crate::common::TestUser;

    struct TwoHospitals {
        app: TestApp,
        a: i32,
        dean: TestUser,
        alice: TestUser,
        tom: TestUser,
    }

    /// Alice and Tom belong to A and B, Tom supervises Alice, and their only
    /// submission lives in B. Dean administers A alone.
    async fn two_hospitals() -> TwoHospitals {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let b = app.create_institution("Hospital B", "hb").await;
        let dean = app.institution_admin("dean", a).await;
        let alice = app.signup("alice", "resident", Some(a)).await;
        let tom = app.signup("tom", "tutor", Some(a)).await;
        for user in [&alice, &tom] {
            let res = app
                .post_with_token(&routes::institution_join(b), &json!({}), &user.token)
                .await;
            assert_eq!(res.status, 200, "{}", res.text);
        }

        let res = app
            .put_with_token(
                &routes::user(alice.id),
                &json!({"supervisor_id": tom.id}),
                &dean.token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);

        let tpl = app.create_template(&app.root_token, b, "BetaForm", 1).await;
        assert_eq!(tpl.status, 201, "{}", tpl.text);
        let res = app
            .create_submission(&alice.token, tpl.id(), alice.id, tom.id, &[])
            .await;
        assert_eq!(res.status, 201, "{}", res.text);

        TwoHospitals {
            app,
            a,
            dean,
            alice,
            tom,
        }
    }

    #[tokio::test]
    async fn resident_details_omit_foreign_submissions() {
        let h = two_hospitals().await;

        let res = h
            .app
            .get_with_token(&routes::resident(h.alice.id), &h.dean.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert!(res.body["submissions"].as_array().unwrap().is_empty());
        assert_eq!(res.body["stats"]["total"], 0);

        let res = h
            .app
            .get_with_token(&routes::resident(h.alice.id), &h.alice.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["submissions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tutor_residents_count_only_shared_institutions() {
        let h = two_hospitals().await;

        let res = h
            .app
            .get_with_token(&routes::tutor_residents(h.tom.id), &h.dean.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let residents = res.body["residents"].as_array().unwrap();
        assert_eq!(residents.len(), 1);
        assert_eq!(residents[0]["stats"]["total"], 0);

        let res = h
            .app
            .get_with_token(&routes::tutor_residents(h.tom.id), &h.tom.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["residents"][0]["stats"]["total"], 1);
    }

    #[tokio::test]
    async fn user_list_totals_count_only_caller_institutions() {
        let h = two_hospitals().await;

        let res = h
            .app
            .get_with_token(&format!("{}?institution_id={}", routes::USERS, h.a), &h.dean.token)
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        let users = res.body.as_array().unwrap();
        assert!(!users.is_empty());
        assert!(users.iter().all(|u| u["total_submissions"] == 0), "{}", res.text);

        let res = h.app.get_with_token(routes::USERS, &h.tom.token).await;
        assert_eq!(res.status, 200, "{}", res.text);
        let alice = res
            .body
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["id"] == h.alice.id)
            .unwrap();
        assert_eq!(alice["total_submissions"], 1);
    }
}
