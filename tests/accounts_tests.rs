mod common;

use axum::http::StatusCode;
use common::{spawn_app, spawn_app_with, spawn_app_with_failing_notifier};
use serde_json::json;

#[tokio::test]
async fn register_returns_public_fields_and_rejects_duplicate_mobile() {
    let app = spawn_app().await;

    let (status, body) = app
        .post(
            "/register",
            None,
            json!({"mobile": "123", "username": "user1", "password": "user-password1"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({"mobile": "123", "username": "user1", "email": ""})
    );

    let (status, body) = app
        .post(
            "/register",
            None,
            json!({"mobile": "123", "username": "user2", "password": "user-password2"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"mobile": ["user with this mobile already exists."]})
    );
}

#[tokio::test]
async fn duplicate_username_and_mobile_are_reported_together() {
    let app = spawn_app().await;
    app.register("user1", "123", "user-password1").await;

    let (status, body) = app
        .post(
            "/register",
            None,
            json!({"mobile": "123", "username": "user1", "password": "other"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["username"],
        json!(["A user with that username already exists."])
    );
    assert_eq!(body["mobile"], json!(["user with this mobile already exists."]));
}

#[tokio::test]
async fn missing_fields_are_required() {
    let app = spawn_app().await;

    let (status, body) = app.post("/register", None, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "mobile": ["This field is required."],
            "password": ["This field is required."],
        })
    );

    let (status, body) = app
        .post(
            "/register",
            None,
            json!({"mobile": "", "username": "", "password": ""}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "mobile": ["This field may not be blank."],
            "password": ["This field may not be blank."],
        })
    );
}

#[tokio::test]
async fn username_can_be_left_out() {
    let app = spawn_app().await;

    let (status, body) = app
        .post(
            "/register",
            None,
            json!({"mobile": "123", "password": "user-password1"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({"mobile": "123", "username": null, "email": ""})
    );

    let (status, body) = app
        .post(
            "/register",
            None,
            json!({"mobile": "456", "username": "", "password": "user-password1"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], json!(null));
}

#[tokio::test]
async fn username_characters_are_restricted() {
    let app = spawn_app().await;

    let (status, body) = app
        .post(
            "/register",
            None,
            json!({"mobile": "123", "username": "bad name!", "password": "user-password1"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["username"],
        json!(["Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."])
    );

    let (_, token) = app.active_user("user.name+1@home", "456").await;
    let (status, body) = app
        .patch("/me", Some(&token), json!({"username": "no/slash"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array());
}

#[tokio::test]
async fn wrongly_typed_body_is_a_field_error() {
    let app = spawn_app().await;

    let (status, body) = app
        .post(
            "/register",
            None,
            json!({"mobile": 123, "username": "user1", "password": "user-password1"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["mobile"].as_array().unwrap().len(), 1);
    assert!(app.state.store.get_user_by_username("user1").await.unwrap().is_none());

    let (_, token) = app.active_user("user2", "456").await;
    let (status, body) = app
        .patch("/me", Some(&token), json!({"first_name": ["Ada"]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["first_name"].is_array());
}

#[tokio::test]
async fn failed_delivery_still_registers_with_a_live_code() {
    let (app, failing) = spawn_app_with_failing_notifier().await;

    let (status, body) = app
        .post(
            "/register",
            None,
            json!({"mobile": "123", "username": "user1", "password": "user-password1"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "user1");

    let key = failing.attempted_keys.lock().unwrap()[0].clone();
    let (status, _) = app.get(&format!("/verify?code={key}"), None).await;
    assert_eq!(status, StatusCode::OK);
    app.login("user1", "user-password1").await;
}

#[tokio::test]
async fn registration_issues_one_code_and_leaves_user_inactive() {
    let app = spawn_app().await;
    let id = app.register("user1", "123", "user-password1").await;

    let user = app.state.store.get_user(id).await.unwrap().unwrap();
    assert!(!user.is_active);
    assert_eq!(app.notifier.count(), 1);

    let delivery = app.notifier.deliveries.lock().unwrap()[0].clone();
    let code: u32 = delivery.code.parse().unwrap();
    assert!((100_000..=999_999).contains(&code));
    assert_ne!(delivery.verification_key, delivery.code);
}

#[tokio::test]
async fn registration_joins_default_group_exactly_once() {
    let app = spawn_app().await;
    let id = app.register("user1", "123", "user-password1").await;

    let groups = app.state.store.group_repo();
    let group = groups.get_by_name("users").await.unwrap().unwrap();
    assert_eq!(groups.member_count(group.id, id).await.unwrap(), 1);

    let user = app.state.store.get_user(id).await.unwrap().unwrap();
    let added = app
        .state
        .account_service
        .attach_default_group(&user)
        .await
        .unwrap();
    assert!(!added);
    assert_eq!(groups.member_count(group.id, id).await.unwrap(), 1);
}

#[tokio::test]
async fn login_checks_password_before_activation() {
    let app = spawn_app().await;
    app.register("user1", "123", "user-password1").await;

    let (status, body) = app
        .post(
            "/login",
            None,
            json!({"username": "user1", "password": "user-password1"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "user is not activated yet");

    let (status, body) = app
        .post(
            "/login",
            None,
            json!({"username": "user1", "password": "wrong"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid username or password");

    let (status, body) = app
        .post(
            "/login",
            None,
            json!({"username": "nobody", "password": "user-password1"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid username or password");
}

#[tokio::test]
async fn verify_activates_once() {
    let app = spawn_app().await;
    let id = app.register("user1", "123", "user-password1").await;
    let key = app.notifier.last_key_for(id).unwrap();

    let (status, body) = app.get(&format!("/verify?code={key}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "user has been successfully activated");
    assert!(app.state.store.get_user(id).await.unwrap().unwrap().is_active);

    let (status, body) = app.get(&format!("/verify?code={key}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid verification code");

    let token = app.login("user1", "user-password1").await;
    assert!(!token.is_empty());
}

#[tokio::test]
async fn verify_rejects_empty_and_unknown_codes() {
    let app = spawn_app().await;

    for uri in ["/verify", "/verify?code=", "/verify?code=%20"] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["message"], "verification code is empty");
    }

    let (status, body) = app.get("/verify?code=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid verification code");
}

#[tokio::test]
async fn verify_for_deleted_user_is_not_found() {
    let app = spawn_app().await;
    let id = app.register("user1", "123", "user-password1").await;
    let key = app.notifier.last_key_for(id).unwrap();

    app.state.store.user_repo().delete(id).await.unwrap();

    let (status, _) = app.get(&format!("/verify?code={key}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn codes_from_the_database_cache_redeem_too() {
    let app = spawn_app_with(|c| c.verification.cache_backend = "database".to_string()).await;
    let id = app.register("user1", "123", "user-password1").await;
    let key = app.notifier.last_key_for(id).unwrap();

    let (status, _) = app.get(&format!("/verify?code={key}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/verify?code={key}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn token_is_reused_until_logout() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("user1", "123").await;

    assert_eq!(app.login("user1", "secret-pass").await, token);

    let (status, _) = app.get("/logout", Some(&token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get("/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Invalid token.");

    let fresh = app.login("user1", "secret-pass").await;
    assert_ne!(fresh, token);
}

#[tokio::test]
async fn protected_routes_require_credentials() {
    let app = spawn_app().await;

    for uri in ["/logout", "/me", "/users"] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["detail"], "Authentication credentials were not provided.");
    }
}

#[tokio::test]
async fn own_password_change_needs_old_password() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("user1", "123").await;

    let (status, body) = app
        .patch(
            "/password",
            Some(&token),
            json!({"old_password": "wrong", "new_password": "next-pass"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid username or password");

    let (status, body) = app
        .patch(
            "/password",
            Some(&token),
            json!({"username": "user1", "old_password": "secret-pass", "new_password": "next-pass"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "password has been updated");

    let (status, _) = app
        .post(
            "/login",
            None,
            json!({"username": "user1", "password": "secret-pass"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    app.login("user1", "next-pass").await;

    // Existing sessions survive a password change.
    let (status, _) = app.get("/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unprivileged_user_cannot_change_someone_else() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("user1", "123").await;
    app.active_user("user2", "456").await;

    let (status, body) = app
        .patch(
            "/password",
            Some(&token),
            json!({"username": "user2", "old_password": "secret-pass", "new_password": "x"}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "permission denied");

    app.login("user2", "secret-pass").await;
}

#[tokio::test]
async fn privileged_user_sets_any_password_without_old_one() {
    let app = spawn_app().await;
    let (_, admin) = app.superuser("admin", "999").await;
    app.active_user("user1", "123").await;

    let (status, _) = app
        .patch(
            "/password",
            Some(&admin),
            json!({"username": "user1", "new_password": "reset-pass"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    app.login("user1", "reset-pass").await;

    let (status, _) = app
        .patch(
            "/password",
            Some(&admin),
            json!({"username": "ghost", "new_password": "reset-pass"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn me_shows_and_updates_profile_only() {
    let app = spawn_app().await;
    let (id, token) = app.active_user("user1", "123").await;

    let (status, body) = app.get("/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["username"], "user1");
    assert_eq!(body["groups"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .patch(
            "/me",
            Some(&token),
            json!({"first_name": "Ada", "is_superuser": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Ada");

    let user = app.state.store.get_user(id).await.unwrap().unwrap();
    assert!(!user.is_superuser);

    let (status, body) = app
        .patch("/me", Some(&token), json!({"mobile": "12-34"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["mobile"], json!(["Enter a valid mobile number."]));
}

#[tokio::test]
async fn reissued_code_activates_inactive_account() {
    let app = spawn_app().await;
    let id = app.register("user1", "123", "user-password1").await;
    let first = app.notifier.last_key_for(id).unwrap();

    let issued = app.state.account_service.reissue_code("user1").await.unwrap();
    assert_ne!(issued.verification_key, first);
    assert_eq!(app.notifier.count(), 2);

    let (status, _) = app
        .get(&format!("/verify?code={}", issued.verification_key), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    assert!(app.state.account_service.reissue_code("user1").await.is_err());
}

#[tokio::test]
async fn expired_code_is_invalid() {
    let app = spawn_app_with(|c| c.verification.ttl_seconds = 1).await;
    let id = app.register("user1", "123", "user-password1").await;
    let key = app.notifier.last_key_for(id).unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let (status, body) = app.get(&format!("/verify?code={key}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid verification code");
    assert!(!app.state.store.get_user(id).await.unwrap().unwrap().is_active);
}
