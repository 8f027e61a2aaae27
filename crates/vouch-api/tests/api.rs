use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use vouch_api::objects::FsObjectStore;
use vouch_api::scratch::MemoryScratch;
use vouch_api::{AppState, AppStateInner, cleanup, router};
use vouch_db::Database;
use vouch_types::{NewDraft, ProofPayload};

const ADMIN: &str = "admin-token";

struct TestApp {
    app: Router,
    state: AppState,
    _dir: TempDir,
}

async fn test_app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::open(&dir.path().join("vouch.db")).unwrap());
    let objects = Arc::new(
        FsObjectStore::new(dir.path().join("objects"), "http://vouch.test")
            .await
            .unwrap(),
    );
    let state = AppStateInner::new(
        db,
        objects,
        Arc::new(MemoryScratch::new()),
        "test-secret".into(),
        Some(ADMIN.into()),
    );
    TestApp {
        app: router(state.clone()),
        state,
        _dir: dir,
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, headers, body)
    }

    async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let (status, _, body) = self.send(req.body(Body::from(body.to_string())).unwrap()).await;
        (status, body)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut req = Request::builder().uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let (status, _, body) = self.send(req.body(Body::empty()).unwrap()).await;
        (status, body)
    }

    /// Register and return (user_id, token).
    async fn register(&self, email: &str, account_type: &str) -> (Uuid, String) {
        let (status, body) = self
            .json(
                "POST",
                "/auth/register",
                None,
                json!({ "email": email, "password": "correct horse", "account_type": account_type }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        (
            body["user_id"].as_str().unwrap().parse().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn verify(&self, user_id: Uuid) {
        let req = Request::builder()
            .method("POST")
            .uri(format!("/admin/users/{}/verify", user_id))
            .header("x-admin-token", ADMIN)
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = self.send(req).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    async fn listing(&self) -> (Uuid, String) {
        let (owner, token) = self.register("shop@example.com", "business").await;
        let (status, body) = self
            .json("POST", "/listings", Some(&token), json!({ "name": "Bike Shop" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        (owner, body["id"].as_str().unwrap().to_string())
    }
}

fn png_proof() -> Value {
    serde_json::to_value(ProofPayload::inline("image/png", b"\x89PNG\r\n\x1a\nrest")).unwrap()
}

#[tokio::test]
async fn register_login_session() {
    let t = test_app().await;
    let (user_id, token) = t.register("Ana@Example.com", "customer").await;

    let (status, _) = t
        .json(
            "POST",
            "/auth/register",
            None,
            json!({ "email": "ana@example.com", "password": "another pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = t
        .json("POST", "/auth/register", None, json!({ "email": "b@example.com", "password": "short" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = t
        .json(
            "POST",
            "/auth/login",
            None,
            json!({ "email": "ana@example.com", "password": "correct horse" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], json!(user_id));

    let (status, body) = t.get("/auth/session", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account_type"], "customer");
    assert_eq!(body["verified"], false);

    t.verify(user_id).await;
    let (_, body) = t.get("/auth/session", Some(&token)).await;
    assert_eq!(body["verified"], true);

    let (status, _) = t.get("/auth/session", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn customers_cannot_create_listings() {
    let t = test_app().await;
    let (_, token) = t.register("c@example.com", "customer").await;
    let (status, _) = t
        .json("POST", "/listings", Some(&token), json!({ "name": "Nope" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn draft_then_publish() {
    let t = test_app().await;
    let (owner, listing_id) = t.listing().await;
    let (author, token) = t.register("ana@example.com", "customer").await;
    t.verify(author).await;

    let (status, draft) = t
        .json(
            "PUT",
            "/drafts",
            Some(&token),
            json!({ "listing_id": listing_id, "rating": 4, "body_text": "Good service", "proof": png_proof() }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", draft);
    let proof_url = draft["proof_url"].as_str().unwrap().to_string();
    assert!(proof_url.starts_with(&format!("http://vouch.test/objects/draftReviews/{}/draft_{}_", owner, author)));

    // a second save updates the same row
    let (_, again) = t
        .json(
            "PUT",
            "/drafts",
            Some(&token),
            json!({
                "listing_id": listing_id,
                "rating": 5,
                "body_text": "Great service",
                "experience_date": "2024-01-01",
                "proof": { "kind": "hosted", "url": proof_url, "media_kind": "image" },
                "proof_file_name": draft["proof_file_name"]
            }),
        )
        .await;
    assert_eq!(again["id"], draft["id"]);

    let (status, active) = t
        .get(&format!("/drafts/active?listing_id={}", listing_id), Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["rating"], 5);

    let publish = json!({
        "listing_id": listing_id,
        "rating": 5,
        "body_text": "Great service",
        "experience_date": "2024-01-01",
        "proof": { "kind": "hosted", "url": proof_url, "media_kind": "image" }
    });
    let (status, review) = t.json("POST", "/reviews", Some(&token), publish.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", review);
    assert_eq!(review["owner_id"], json!(owner));

    let (_, active) = t
        .get(&format!("/drafts/active?listing_id={}", listing_id), Some(&token))
        .await;
    assert_eq!(active, Value::Null);

    let (status, err) = t.json("POST", "/reviews", Some(&token), publish).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(err["error"], "already_reviewed");

    let (_, reviews) = t.get(&format!("/listings/{}/reviews", listing_id), None).await;
    assert_eq!(reviews.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn publish_rules_have_distinct_codes() {
    let t = test_app().await;
    let (_, listing_id) = t.listing().await;
    let (_, token) = t.register("new@example.com", "customer").await;

    let complete = json!({
        "listing_id": listing_id,
        "rating": 3,
        "body_text": "ok",
        "experience_date": "2024-01-01",
        "proof": png_proof()
    });
    let (status, err) = t.json("POST", "/reviews", Some(&token), complete).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(err["error"], "not_verified");

    let (status, err) = t
        .json(
            "POST",
            "/reviews",
            Some(&token),
            json!({ "listing_id": listing_id, "rating": 3, "body_text": "ok" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "missing_field");

    let (status, err) = t
        .json(
            "PUT",
            "/drafts",
            Some(&token),
            json!({ "listing_id": "missing", "rating": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(err["error"], "listing_not_found");
}

#[tokio::test]
async fn discard_removes_draft_and_proof() {
    let t = test_app().await;
    let (_, listing_id) = t.listing().await;
    let (_, token) = t.register("ana@example.com", "customer").await;

    let (_, draft) = t
        .json(
            "PUT",
            "/drafts",
            Some(&token),
            json!({ "listing_id": listing_id, "proof": png_proof() }),
        )
        .await;
    let path = draft["proof_file_name"].as_str().unwrap().to_string();
    assert!(t.state.objects.read(&path).await.unwrap().is_some());

    let id = draft["id"].as_str().unwrap();
    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/drafts/{}", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = t.send(req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(t.state.objects.read(&path).await.unwrap().is_none());
    let (status, _) = t.get(&format!("/drafts/{}", id), Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn draft_proofs_are_replaced_and_vetted() {
    let t = test_app().await;
    let (owner, listing_id) = t.listing().await;
    let (author, token) = t.register("ana@example.com", "customer").await;
    t.verify(author).await;
    let (other, _) = t.register("bo@example.com", "customer").await;

    let (_, first) = t
        .json("PUT", "/drafts", Some(&token), json!({ "listing_id": listing_id, "proof": png_proof() }))
        .await;
    let first_path = first["proof_file_name"].as_str().unwrap().to_string();

    // keep the second upload off the first one's millisecond
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (status, second) = t
        .json("PUT", "/drafts", Some(&token), json!({ "listing_id": listing_id, "proof": png_proof() }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", second);
    let second_path = second["proof_file_name"].as_str().unwrap().to_string();
    assert_ne!(first_path, second_path);
    assert!(t.state.objects.read(&first_path).await.unwrap().is_none());
    assert!(t.state.objects.read(&second_path).await.unwrap().is_some());

    // hosted urls must name the caller's own stored proof
    let theirs = format!("draftReviews/{}/draft_{}_1.png", owner, other);
    for (url, file) in [
        ("https://anywhere.example/not-a-proof".to_string(), Value::Null),
        (format!("http://vouch.test/objects/{}", theirs), json!(theirs)),
    ] {
        let (status, err) = t
            .json(
                "PUT",
                "/drafts",
                Some(&token),
                json!({
                    "listing_id": listing_id,
                    "proof": { "kind": "hosted", "url": url, "media_kind": "image" },
                    "proof_file_name": file
                }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["error"], "invalid_proof");
    }

    // the draft's own url is accepted without naming the file again
    let (status, kept) = t
        .json(
            "PUT",
            "/drafts",
            Some(&token),
            json!({
                "listing_id": listing_id,
                "rating": 3,
                "proof": { "kind": "hosted", "url": second["proof_url"], "media_kind": "image" }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", kept);
    assert_eq!(kept["proof_file_name"], json!(second_path));
    assert!(t.state.objects.read(&second_path).await.unwrap().is_some());

    let publish = json!({
        "listing_id": listing_id,
        "rating": 4,
        "body_text": "Fine",
        "experience_date": "2024-01-01",
        "proof": { "kind": "hosted", "url": "https://anywhere.example/not-a-proof", "media_kind": "image" }
    });
    let (status, err) = t.json("POST", "/reviews", Some(&token), publish).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err["error"], "invalid_proof");
}

#[tokio::test]
async fn stale_drafts_are_swept() {
    let t = test_app().await;
    let (_, listing_id) = t.listing().await;
    let (author, token) = t.register("ana@example.com", "customer").await;

    t.state
        .db
        .upsert_draft(&NewDraft {
            listing_id: listing_id.clone(),
            author_id: author,
            rating: Some(2),
            body_text: None,
            experience_date: None,
            proof_url: None,
            proof_kind: None,
            proof_file_name: None,
            updated_at: Utc::now() - Duration::days(31),
        })
        .unwrap();

    let req = Request::builder()
        .method("DELETE")
        .uri("/drafts/stale")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, removed) = t.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed.as_array().unwrap().len(), 1);

    let (_, drafts) = t.get("/drafts", Some(&token)).await;
    assert!(drafts.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn background_cleanup_covers_all_authors() {
    let t = test_app().await;
    let (_, listing_id) = t.listing().await;
    let (a, _) = t.register("a@example.com", "customer").await;
    let (b, _) = t.register("b@example.com", "customer").await;

    for (author, age) in [(a, 40), (b, 10)] {
        t.state
            .db
            .upsert_draft(&NewDraft {
                listing_id: listing_id.clone(),
                author_id: author,
                rating: None,
                body_text: None,
                experience_date: None,
                proof_url: None,
                proof_kind: None,
                proof_file_name: None,
                updated_at: Utc::now() - Duration::days(age),
            })
            .unwrap();
    }

    let (drafts, _) = cleanup::cleanup_once(&t.state, Utc::now()).await.unwrap();
    assert_eq!(drafts, 1);
    assert!(t.state.db.find_active_draft(&listing_id, a).unwrap().is_none());
    assert!(t.state.db.find_active_draft(&listing_id, b).unwrap().is_some());
}

#[tokio::test]
async fn cleanup_continues_past_undeletable_proofs() {
    let t = test_app().await;
    let (_, listing_id) = t.listing().await;
    let (a, _) = t.register("a@example.com", "customer").await;
    let (b, _) = t.register("b@example.com", "customer").await;

    let kept = format!("draftReviews/x/draft_{}_1.png", b);
    t.state.objects.write(&kept, b"png").await.unwrap();

    // the first path can never be resolved inside the store
    for (author, path) in [(a, "../outside.png".to_string()), (b, kept.clone())] {
        t.state
            .db
            .upsert_draft(&NewDraft {
                listing_id: listing_id.clone(),
                author_id: author,
                rating: None,
                body_text: None,
                experience_date: None,
                proof_url: None,
                proof_kind: None,
                proof_file_name: Some(path),
                updated_at: Utc::now() - Duration::days(45),
            })
            .unwrap();
    }

    let (drafts, _) = cleanup::cleanup_once(&t.state, Utc::now()).await.unwrap();
    assert_eq!(drafts, 2);
    assert!(t.state.objects.read(&kept).await.unwrap().is_none());
}

#[tokio::test]
async fn cookie_channel_round_trip() {
    let t = test_app().await;
    let value = json!({ "listing_id": "L1", "rating": 4 });

    let req = Request::builder()
        .method("POST")
        .uri("/api/cookies")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "name": "draft_review_L1", "value": value, "expiresDays": 7 }).to_string(),
        ))
        .unwrap();
    let (status, headers, body) = t.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let set_cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.contains("Max-Age=604800"));
    assert!(set_cookie.contains("Path=/"));
    let pair = set_cookie.split(';').next().unwrap().to_string();

    let req = Request::builder()
        .uri("/api/cookies?name=draft_review_L1")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = t.send(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], value);

    let (status, body) = t.get("/api/cookies?name=draft_review_L2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], Value::Null);

    let (status, _) = t.get("/api/cookies", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .json(
            "POST",
            "/api/cookies",
            None,
            json!({ "name": "big", "value": "x".repeat(5000) }),
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn temp_storage_round_trip() {
    let t = test_app().await;
    let (status, body) = t
        .json("POST", "/api/temp-storage", None, json!({ "data": { "step": 3 } }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["storage_id"].as_str().unwrap().to_string();

    let (status, body) = t.get(&format!("/api/temp-storage?id={}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "step": 3 }));

    let (status, _) = t.get("/api/temp-storage?id=unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.get("/api/temp-storage", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn object_writes_are_owner_scoped() {
    let t = test_app().await;
    let (user, token) = t.register("ana@example.com", "customer").await;
    let own = format!("reviews/o/review_{}_1.png", user);
    let other = format!("reviews/o/review_{}_1.png", Uuid::new_v4());

    let put = |path: &str, token: Option<&str>| {
        let mut req = Request::builder().method("PUT").uri(format!("/objects/{}", path));
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        req.body(Body::from(vec![1u8, 2, 3])).unwrap()
    };

    let (status, _, _) = t.send(put(&own, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = t.send(put(&other, Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _, body) = t.send(put(&own, Some(&token))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["url"], format!("http://vouch.test/objects/{}", own));

    let resp = t
        .app
        .clone()
        .oneshot(Request::builder().uri(format!("/objects/{}", own)).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/png");
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], &[1, 2, 3]);
}
