use serde_json::json;

use crate::common::{PASSWORD, TestApp, routes};

mod console_access {
    use super::*;

    #[tokio::test]
    async fn console_is_super_admin_only() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let admin = app.institution_admin("dean", inst).await;

        for path in [routes::SA_USERS, routes::SA_STATS] {
            let res = app.get_with_token(path, &admin.token).await;
            assert_eq!(res.status, 403, "{path}");
        }
    }

    #[tokio::test]
    async fn second_super_admin_can_use_the_console() {
        let app = TestApp::spawn().await;
        let res = app
            .post_with_token(
                routes::SA_CREATE_SUPERADMIN,
                &json!({"username": "root2", "password": PASSWORD, "name": "Second Root"}),
                &app.root_token,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);

        let token = app.login("root2", PASSWORD).await;
        let res = app.get_with_token(routes::SA_STATS, &token).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["super_admins"], 2);
    }
}

mod user_accounts {
    use super::*;

    #[tokio::test]
    async fn created_user_must_change_password() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;

        let res = app
            .post_with_token(
                routes::SA_USERS,
                &json!({
                    "username": "tom",
                    "password": PASSWORD,
                    "name": "Tom",
                    "roles": ["tutor", "admin"],
                    "institution_ids": [inst],
                }),
                &app.root_token,
            )
            .await;
        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["is_first_login"], true);
        assert_eq!(res.body["roles"], json!(["tutor", "admin"]));
        assert_eq!(res.body["institutions"], json!([inst]));

        let login = app
            .post_without_token(routes::LOGIN, &json!({"username": "tom", "password": PASSWORD}))
            .await;
        assert_eq!(login.body["require_password_change"], true);
    }

    #[tokio::test]
    async fn create_user_validates_roles_and_institutions() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;

        let cases = [
            (json!(["tutor"]), json!([]), 400),
            (json!([]), json!([inst]), 400),
            (json!(["superadmin"]), json!([inst]), 400),
            (json!(["tutor"]), json!([inst + 100]), 404),
        ];
        for (i, (roles, institutions, status)) in cases.into_iter().enumerate() {
            let res = app
                .post_with_token(
                    routes::SA_USERS,
                    &json!({
                        "username": format!("user{i}"),
                        "password": PASSWORD,
                        "name": "Someone",
                        "roles": roles,
                        "institution_ids": institutions,
                    }),
                    &app.root_token,
                )
                .await;
            assert_eq!(res.status, status, "case {i}: {}", res.text);
        }
    }

    #[tokio::test]
    async fn list_filters_by_institution_and_counts_submissions() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let b = app.create_institution("Hospital B", "hb").await;
        let alice = app.signup("alice", "resident", Some(a)).await;
        let tom = app.signup("tom", "tutor", Some(a)).await;
        app.signup("bob", "resident", Some(b)).await;
        let tpl = app.create_template(&app.root_token, a, "Logbook", 1).await;
        app.create_submission(&alice.token, tpl.id(), alice.id, tom.id, &[])
            .await;

        let res = app
            .get_with_token(&format!("{}?institution_id={a}", routes::SA_USERS), &app.root_token)
            .await;
        assert_eq!(res.status, 200);
        let users = res.body.as_array().unwrap();
        let find = |name: &str| users.iter().find(|u| u["username"] == name).cloned();
        assert_eq!(find("alice").unwrap()["total_submissions"], 1);
        assert_eq!(find("tom").unwrap()["total_submissions"], 1);
        assert!(find("bob").is_none());

        let res = app
            .get_with_token(&format!("{}?search=BO", routes::SA_USERS), &app.root_token)
            .await;
        let names: Vec<&str> = res
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["username"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["bob"]);
    }

    #[tokio::test]
    async fn update_user_replaces_roles_and_resets_password() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let alice = app.signup("alice", "resident", Some(inst)).await;

        let res = app
            .put_with_token(
                &routes::sa_user(alice.id),
                &json!({"roles": ["tutor"], "password": "temporary-pass"}),
                &app.root_token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["roles"], json!(["tutor"]));
        assert_eq!(res.body["is_first_login"], true);

        app.login("alice", "temporary-pass").await;
    }

    #[tokio::test]
    async fn replacing_institutions_keeps_administered_ones() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let b = app.create_institution("Hospital B", "hb").await;
        let dean = app.institution_admin("dean", a).await;

        let res = app
            .patch_with_token(
                &routes::sa_user_institutions(dean.id),
                &json!({"institution_ids": [b]}),
                &app.root_token,
            )
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "CONFLICT");

        let res = app
            .patch_with_token(
                &routes::sa_user_institutions(dean.id),
                &json!({"institution_ids": [a, b]}),
                &app.root_token,
            )
            .await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(res.body["institutions"], json!([a, b]));
    }

    #[tokio::test]
    async fn delete_rejects_super_admins_and_participants() {
        let app = TestApp::spawn().await;
        let inst = app.create_institution("General Hospital", "gh").await;
        let alice = app.signup("alice", "resident", Some(inst)).await;
        let tom = app.signup("tom", "tutor", Some(inst)).await;
        let bob = app.signup("bob", "resident", Some(inst)).await;
        let tpl = app.create_template(&app.root_token, inst, "Logbook", 1).await;
        app.create_submission(&alice.token, tpl.id(), alice.id, tom.id, &[])
            .await;

        let other = app
            .post_with_token(
                routes::SA_CREATE_SUPERADMIN,
                &json!({"username": "root2", "password": PASSWORD, "name": "Second Root"}),
                &app.root_token,
            )
            .await;
        assert_eq!(other.status, 201, "{}", other.text);
        assert_eq!(other.body["is_super_admin"], true);

        let res = app
            .delete_with_token(&routes::sa_user(other.id()), &app.root_token)
            .await;
        assert_eq!(res.status, 400);

        let res = app.delete_with_token(&routes::sa_user(alice.id), &app.root_token).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.code(), "CONFLICT");

        let res = app.delete_with_token(&routes::sa_user(bob.id), &app.root_token).await;
        assert_eq!(res.status, 200, "{}", res.text);
        let res = app.get_with_token(&routes::sa_user(bob.id), &app.root_token).await;
        assert_eq!(res.status, 404);
    }
}

mod platform {
    use super::*;

    #[tokio::test]
    async fn platform_stats_count_everything() {
        let app = TestApp::spawn().await;
        let a = app.create_institution("Hospital A", "ha").await;
        let b = app.create_institution("Hospital B", "hb").await;
        app.patch_with_token(&routes::institution_toggle(b), &json!({}), &app.root_token)
            .await;
        let alice = app.signup("alice", "resident", Some(a)).await;
        let tom = app.signup("tom", "tutor", Some(a)).await;
        let tpl = app.create_template(&app.root_token, a, "Logbook", 1).await;
        app.create_submission(&alice.token, tpl.id(), alice.id, tom.id, &tpl.field_ids())
            .await;
        app.create_submission(&alice.token, tpl.id(), alice.id, tom.id, &[])
            .await;

        let res = app.get_with_token(routes::SA_STATS, &app.root_token).await;
        assert_eq!(res.status, 200, "{}", res.text);
        assert_eq!(
            res.body,
            json!({
                "institutions": 2,
                "active_institutions": 1,
                "users": 3,
                "super_admins": 1,
                "form_templates": 1,
                "submissions": 2,
                "completed_submissions": 1,
            })
        );
    }
}
