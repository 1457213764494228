mod common;

use axum::http::StatusCode;
use common::{TestApp, spawn_app};
use serde_json::{Value, json};

/// A superuser token, a category and one published post.
async fn seeded() -> (TestApp, String, i64, i64) {
    let app = spawn_app().await;
    let (_, admin) = app.superuser("admin", "999").await;

    let (status, category) = app
        .post("/blog/categories", Some(&admin), json!({"name": "rust"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let category = category["id"].as_i64().unwrap();

    let (status, post) = app
        .post(
            "/blog/posts",
            Some(&admin),
            json!({
                "title": "Hello World",
                "content": "first post",
                "category": category,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{post}");
    let post = post["id"].as_i64().unwrap();

    (app, admin, category, post)
}

/// A regular user whose default group holds the configured permissions.
async fn member(app: &TestApp, username: &str, mobile: &str) -> String {
    let (_, token) = app.active_user(username, mobile).await;
    bookshelves::cli::cmd_init_groups(&app.state.config)
        .await
        .unwrap();
    token
}

fn single(body: &Value, id: i64) -> &Value {
    let map = body.as_object().unwrap();
    assert_eq!(map.len(), 1);
    &map[&id.to_string()]
}

#[tokio::test]
async fn post_creation_defaults_slug_and_validates() {
    let (app, admin, category, post) = seeded().await;

    let (status, body) = app.get(&format!("/blog/posts/{post}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let full = single(&body, post);
    assert_eq!(full["slug"], "hello-world");
    assert_eq!(full["publisher"], 1);
    assert_eq!(full["commentsCount"], 0);
    assert_eq!(full["average_stars"], 0.0);

    let (status, body) = app
        .post(
            "/blog/posts",
            Some(&admin),
            json!({"title": "Other", "content": "x", "slug": "hello-world", "category": category}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["slug"], json!(["post with this slug already exists."]));

    let (status, body) = app.post("/blog/posts", Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    for field in ["title", "content", "category"] {
        assert_eq!(body[field], json!(["This field is required."]), "{field}");
    }

    let (status, body) = app
        .post(
            "/blog/posts",
            Some(&admin),
            json!({"title": "Third", "content": "x", "category": 4242}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["category"],
        json!(["Invalid pk \"4242\" - object does not exist."])
    );
}

#[tokio::test]
async fn reads_are_public_and_count_visits() {
    let (app, _admin, _category, post) = seeded().await;

    let (status, body) = app.get("/blog/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(single(&body, post)["visited"], 0);

    app.get(&format!("/blog/posts/{post}"), None).await;
    let (_, body) = app.get("/blog/posts/Hello%20World", None).await;
    assert_eq!(single(&body, post)["visited"], 2);

    let (status, body) = app.get("/blog/posts/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post with your value does not exist");
}

#[tokio::test]
async fn writes_need_permission() {
    let (app, _admin, category, post) = seeded().await;
    let token = member(&app, "user1", "123").await;

    let (status, _) = app
        .post(
            "/blog/posts",
            Some(&token),
            json!({"title": "Mine", "content": "x", "category": category}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&format!("/blog/posts/{post}"), Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post("/blog/posts", None, json!({"title": "Anon"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Authentication credentials were not provided.");
}

#[tokio::test]
async fn update_and_delete_post() {
    let (app, admin, _category, post) = seeded().await;

    let (status, body) = app
        .put(
            &format!("/blog/posts/{post}"),
            Some(&admin),
            json!({"brief": "short", "is_draft": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["brief"], "short");
    assert_eq!(body["is_draft"], true);
    assert_eq!(body["title"], "Hello World");

    let (status, body) = app
        .put(
            &format!("/blog/posts/{post}"),
            Some(&admin),
            json!({"previous": post}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["previous"].is_array());

    let (status, _) = app.delete(&format!("/blog/posts/{post}"), Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/blog/posts/{post}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/blog/posts", None).await;
    assert!(body.as_object().unwrap().is_empty());
}

#[tokio::test]
async fn stars_are_bounded_and_upserted() {
    let (app, _admin, _category, post) = seeded().await;
    let alice = member(&app, "alice", "123").await;
    let bob = member(&app, "bob", "456").await;
    let uri = format!("/blog/posts/{post}/stars");

    for (star, message) in [
        (0, "Ensure this value is greater than or equal to 1."),
        (6, "Ensure this value is less than or equal to 5."),
    ] {
        let (status, body) = app.post(&uri, Some(&alice), json!({"star": star})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["star"], json!([message]));
    }

    let (status, _) = app.post(&uri, Some(&alice), json!({"star": 2})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post(&uri, Some(&alice), json!({"star": 4})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post(&uri, Some(&bob), json!({"star": 5})).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.get(&format!("/blog/posts/{post}"), None).await;
    let full = single(&body, post);
    assert_eq!(full["stars"].as_array().unwrap().len(), 2);
    assert_eq!(full["average_stars"], 4.5);

    let (status, body) = app.get("/blog/me/stars", Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["star"], 4);
}

#[tokio::test]
async fn comments_wait_for_approval() {
    let (app, admin, _category, post) = seeded().await;
    let token = member(&app, "user1", "123").await;

    let (status, comment) = app
        .post(
            &format!("/blog/posts/{post}/comments"),
            Some(&token),
            json!({"message": "nice"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["is_approved"], false);
    let comment_id = comment["id"].as_i64().unwrap();

    let (_, body) = app.get(&format!("/blog/posts/{post}/comments"), None).await;
    assert_eq!(body, json!([]));

    let (status, _) = app
        .put(
            &format!("/blog/comments/{comment_id}/approve"),
            Some(&token),
            json!({"is_approved": true}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(
            &format!("/blog/comments/{comment_id}/approve"),
            Some(&admin),
            json!({"is_approved": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_approved"], true);

    let (status, reply) = app
        .post(
            &format!("/blog/posts/{post}/comments/{comment_id}/replies"),
            Some(&admin),
            json!({"message": "thanks"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["reply_to"], comment_id);

    let (_, body) = app.get(&format!("/blog/posts/{post}"), None).await;
    let full = single(&body, post);
    assert_eq!(full["commentsCount"], 1);
    assert_eq!(full["comments"][0]["message"], "nice");

    let (status, body) = app
        .post(
            &format!("/blog/posts/{post}/comments"),
            Some(&token),
            json!({"message": "   "}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_array());

    let (status, _) = app
        .delete(&format!("/blog/comments/{comment_id}"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = app.get(&format!("/blog/posts/{post}/comments"), None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn tags_attach_and_detach() {
    let (app, admin, _category, post) = seeded().await;

    let (status, body) = app
        .post(
            &format!("/blog/posts/{post}/tags"),
            Some(&admin),
            json!({"name": "async"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let tag_id = body["tags"][0].as_i64().unwrap();

    let (status, body) = app
        .post("/blog/tags", Some(&admin), json!({"name": "async"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["name"], json!(["tag with this name already exists."]));

    let (status, body) = app.get("/blog/tags/async/posts", None).await;
    assert_eq!(status, StatusCode::OK);
    single(&body, post);

    let uri = format!("/blog/posts/{post}/tags/{tag_id}");
    let (status, body) = app.delete(&uri, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!([]));

    let (status, body) = app.delete(&uri, Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Post does not have a tag with your value");

    let (status, body) = app.get("/blog/tags", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "async");
}

#[tokio::test]
async fn deleting_category_moves_posts() {
    let (app, admin, category, post) = seeded().await;

    let (status, child) = app
        .post(
            "/blog/categories",
            Some(&admin),
            json!({"name": "tokio", "parent": category}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(child["parent"], category);

    let (status, body) = app
        .post(
            "/blog/categories",
            Some(&admin),
            json!({"name": "tokio", "parent": category}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["name"],
        json!(["category with this name and parent already exists."])
    );

    let (status, _) = app
        .put(
            &format!("/blog/categories/{category}"),
            Some(&admin),
            json!({"parent": category}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .delete(&format!("/blog/categories/{category}"), Some(&admin))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/blog/categories/{category}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, deleted) = app.get("/blog/categories/deleted", None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get(&format!("/blog/posts/{post}"), None).await;
    assert_eq!(single(&body, post)["category"], deleted["id"]);

    let (status, _) = app
        .delete(
            &format!("/blog/categories/{}", deleted["id"]),
            Some(&admin),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bookmarks_need_only_authentication() {
    let (app, _admin, _category, post) = seeded().await;
    let (user_id, token) = app.active_user("user1", "123").await;
    let uri = format!("/blog/posts/{post}/bookmark");

    let (status, _) = app.request("POST", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.request("POST", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookmarks"], json!([user_id]));

    let (_, body) = app.get("/blog/me/bookmarks", Some(&token)).await;
    assert_eq!(body[0]["id"], post);

    let (status, body) = app.delete(&uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookmarks"], json!([]));

    let (_, body) = app.get("/blog/me/bookmarks", Some(&token)).await;
    assert_eq!(body, json!([]));
}
