use std::convert::Infallible;

use serde::Deserialize;
use serde_json::json;
use warp::{http::StatusCode, path, Filter, Rejection, Reply};

use crate::{
    auth::Auth,
    bearer::bearer_token,
    error::AuthError,
    session::VerifyResponse,
    types::{Claims, UserID},
    users::{CreateUserRequest, UpdateUserRequest},
};

pub fn build_api_route_filter(
    auth: &Auth,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let login = path!("login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_auth_state(auth.clone()))
        .and_then(user_login);

    let refresh = path!("refresh")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_auth_state(auth.clone()))
        .and_then(refresh_session);

    let verify = path!("verify")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_auth_state(auth.clone()))
        .and_then(verify_token);

    let health = path!("health").and(warp::get()).map(|| {
        warp::reply::json(&json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        }))
    });

    let metrics = path!("metrics")
        .and(warp::get())
        .and(with_auth_state(auth.clone()))
        .and_then(render_metrics);

    let session_routes = login.or(refresh).or(verify).or(health).or(metrics);

    let list_users_route = path!("users")
        .and(warp::get())
        .and(with_caller(auth))
        .and(warp::query::<ListUsersQuery>())
        .and(with_auth_state(auth.clone()))
        .and_then(list_users);

    let create_user_route = path!("users")
        .and(warp::post())
        .and(with_caller(auth))
        .and(warp::body::json())
        .and(with_auth_state(auth.clone()))
        .and_then(create_user);

    let current_user_route = path!("users" / "me")
        .and(warp::get())
        .and(with_caller(auth))
        .and(with_auth_state(auth.clone()))
        .and_then(current_user);

    let get_user_route = path!("users" / i64)
        .and(warp::get())
        .and(with_caller(auth))
        .and(with_auth_state(auth.clone()))
        .and_then(get_user);

    let update_user_route = path!("users" / i64)
        .and(warp::put())
        .and(with_caller(auth))
        .and(warp::body::json())
        .and(with_auth_state(auth.clone()))
        .and_then(update_user);

    let delete_user_route = path!("users" / i64)
        .and(warp::delete())
        .and(with_caller(auth))
        .and(with_auth_state(auth.clone()))
        .and_then(delete_user);

    let user_routes = list_users_route
        .or(create_user_route)
        .or(current_user_route)
        .or(get_user_route)
        .or(update_user_route)
        .or(delete_user_route);

    session_routes.or(user_routes)
}

/// Resolve the optional bearer token into the caller's claims.
///
/// A request without an `Authorization` header yields `None`; a header that is
/// present but malformed, forged or expired rejects the request.
pub fn with_caller(
    auth: &Auth,
) -> impl Filter<Extract = (Option<Claims>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_auth_state(auth.clone()))
        .and_then(caller_from_header)
}

/// Like [`with_caller`], but anonymous requests are rejected.
pub fn with_auth(auth: &Auth) -> impl Filter<Extract = (Claims,), Error = Rejection> + Clone {
    with_caller(auth).and_then(|caller: Option<Claims>| async move {
        caller.ok_or_else(|| warp::reject::custom(AuthError::Unauthorized))
    })
}

pub async fn handle_auth_errors(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(auth_error) = err.find::<AuthError>() {
        let status = match auth_error {
            AuthError::InvalidCredentials
            | AuthError::TokenExpired
            | AuthError::RefreshExpired
            | AuthError::TokenInvalid
            | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::UsernameAlreadyTaken => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?auth_error, "request failed");
            "an unknown error has occurred".to_string()
        } else {
            auth_error.to_string()
        };

        return Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "error": message })),
            status,
        ));
    }

    Err(err)
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<String>,
}

async fn user_login(input: LoginRequest, auth: Auth) -> Result<impl Reply, Rejection> {
    let session = auth
        .sessions()
        .login(&input.username, &input.password)
        .await?;

    Ok(warp::reply::json(&session))
}

async fn refresh_session(input: RefreshRequest, auth: Auth) -> Result<impl Reply, Rejection> {
    let session = auth.sessions().refresh_token(&input.refresh_token).await?;

    Ok(warp::reply::json(&session))
}

async fn verify_token(input: VerifyRequest, auth: Auth) -> Result<impl Reply, Rejection> {
    let claims = auth.sessions().verify_token(&input.token)?;

    Ok(warp::reply::json(&VerifyResponse::from(&claims)))
}

async fn render_metrics(auth: Auth) -> Result<impl Reply, Rejection> {
    let body = auth.metrics().render()?;

    Ok(warp::reply::with_header(
        body,
        "content-type",
        "text/plain; version=0.0.4",
    ))
}

async fn list_users(
    caller: Option<Claims>,
    query: ListUsersQuery,
    auth: Auth,
) -> Result<impl Reply, Rejection> {
    let users = auth
        .users()
        .list_users(caller.as_ref(), query.role.as_deref())
        .await?;

    Ok(warp::reply::json(&users))
}

async fn create_user(
    caller: Option<Claims>,
    input: CreateUserRequest,
    auth: Auth,
) -> Result<impl Reply, Rejection> {
    let user = auth.users().create_user(caller.as_ref(), input).await?;

    Ok(warp::reply::with_status(
        warp::reply::json(&user),
        StatusCode::CREATED,
    ))
}

async fn current_user(caller: Option<Claims>, auth: Auth) -> Result<impl Reply, Rejection> {
    let user = auth.users().current_user(caller.as_ref()).await?;

    Ok(warp::reply::json(&user))
}

async fn get_user(id: i64, caller: Option<Claims>, auth: Auth) -> Result<impl Reply, Rejection> {
    let user = auth.users().get_user(caller.as_ref(), UserID(id)).await?;

    Ok(warp::reply::json(&user))
}

async fn update_user(
    id: i64,
    caller: Option<Claims>,
    input: UpdateUserRequest,
    auth: Auth,
) -> Result<impl Reply, Rejection> {
    let user = auth
        .users()
        .update_user(caller.as_ref(), UserID(id), input)
        .await?;

    Ok(warp::reply::json(&user))
}

async fn delete_user(id: i64, caller: Option<Claims>, auth: Auth) -> Result<impl Reply, Rejection> {
    auth.users().delete_user(caller.as_ref(), UserID(id)).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn caller_from_header(
    header: Option<String>,
    auth: Auth,
) -> Result<Option<Claims>, Rejection> {
    let header = match header {
        Some(header) => header,
        None => return Ok(None),
    };

    let token = bearer_token(&header)?;
    let claims = auth.sessions().verify_token(token)?;

    Ok(Some(claims))
}

// functor that adds a handle to the auth services into the filter chain
fn with_auth_state(auth: Auth) -> impl Filter<Extract = (Auth,), Error = Infallible> + Clone {
    warp::any().map(move || auth.clone())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::{
        config::AuthConfig,
        directory::InMemoryDirectory,
        metrics::track_requests,
        token::{TokenCodec, TokenKind},
    };

    const SECRET: &str = "route test secret";

    async fn setup() -> Auth {
        let mut config = AuthConfig::new(SECRET);
        config.password_hash_cost = 1;
        let auth = Auth::new(config, Arc::new(InMemoryDirectory::new())).unwrap();
        auth.ensure_admin("root", "root@example.com", "toor")
            .await
            .unwrap();
        auth
    }

    async fn admin_token(auth: &Auth) -> String {
        auth.sessions().login("root", "toor").await.unwrap().token
    }

    #[tokio::test]
    async fn login_response_has_the_documented_shape() {
        let auth = setup().await;
        let api = build_api_route_filter(&auth).recover(handle_auth_errors);

        let response = warp::test::request()
            .method("POST")
            .path("/login")
            .json(&json!({"username": "root", "password": "toor"}))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body["token"].is_string());
        assert!(body["refresh_token"].is_string());
        assert_eq!(body["user"]["username"], "root");
        assert_eq!(body["user"]["role"], "admin");
        assert!(body["user"]["created_at"].is_string());
        assert!(body["user"].get("password_hash").is_none());
        assert!(body["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn error_kinds_map_to_status_codes() {
        let auth = setup().await;
        let api = build_api_route_filter(&auth).recover(handle_auth_errors);
        let token = admin_token(&auth).await;

        let bad_login = warp::test::request()
            .method("POST")
            .path("/login")
            .json(&json!({"username": "root", "password": "nope"}))
            .reply(&api)
            .await;
        assert_eq!(bad_login.status(), StatusCode::UNAUTHORIZED);

        let anonymous = warp::test::request()
            .method("GET")
            .path("/users")
            .reply(&api)
            .await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let bad_role = warp::test::request()
            .method("POST")
            .path("/users")
            .header("authorization", format!("Bearer {token}"))
            .json(&json!({
                "username": "x",
                "email": "x@example.com",
                "password": "pw",
                "role": "bouncer",
            }))
            .reply(&api)
            .await;
        assert_eq!(bad_role.status(), StatusCode::BAD_REQUEST);

        let missing = warp::test::request()
            .method("GET")
            .path("/users/999")
            .header("authorization", format!("Bearer {token}"))
            .reply(&api)
            .await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let self_delete = warp::test::request()
            .method("DELETE")
            .path("/users/1")
            .header("authorization", format!("Bearer {token}"))
            .reply(&api)
            .await;
        assert_eq!(self_delete.status(), StatusCode::FORBIDDEN);

        let garbage = warp::test::request()
            .method("GET")
            .path("/users/me")
            .header("authorization", "Bearer garbage")
            .reply(&api)
            .await;
        assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn verify_reports_identity_and_expiry() {
        let auth = setup().await;
        let api = build_api_route_filter(&auth).recover(handle_auth_errors);
        let token = admin_token(&auth).await;

        let response = warp::test::request()
            .method("POST")
            .path("/verify")
            .json(&json!({ "token": token }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["valid"], true);
        assert_eq!(body["user_id"], 1);
        assert_eq!(body["username"], "root");
        assert_eq!(body["role"], "admin");
        assert!(body["expires_at"].is_string());
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let auth = setup().await;
        let api = build_api_route_filter(&auth).recover(handle_auth_errors);

        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn expired_refresh_token_asks_for_a_new_login() {
        let auth = setup().await;
        let api = build_api_route_filter(&auth).recover(handle_auth_errors);

        let root = auth.sessions().login("root", "toor").await.unwrap().user;
        let codec = TokenCodec::new(&AuthConfig::new(SECRET)).unwrap();
        let stale = codec
            .issue_at(&root, TokenKind::Refresh, Utc::now() - ChronoDuration::days(8))
            .unwrap();

        let response = warp::test::request()
            .method("POST")
            .path("/refresh")
            .json(&json!({ "refresh_token": stale }))
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["error"], AuthError::RefreshExpired.to_string());
        assert_ne!(body["error"], AuthError::TokenExpired.to_string());
    }

    #[tokio::test]
    async fn metrics_count_requests_by_route_and_status() {
        let auth = setup().await;
        let api = build_api_route_filter(&auth)
            .recover(handle_auth_errors)
            .with(track_requests(&auth));
        let token = admin_token(&auth).await;

        for path in ["/users/1", "/users/999"] {
            warp::test::request()
                .method("GET")
                .path(path)
                .header("authorization", format!("Bearer {token}"))
                .reply(&api)
                .await;
        }
        warp::test::request()
            .method("POST")
            .path("/login")
            .json(&json!({"username": "root", "password": "nope"}))
            .reply(&api)
            .await;

        let metrics = auth.metrics();
        assert_eq!(metrics.request_count("GET", "/users/1", 200), 1);
        assert_eq!(metrics.request_count("GET", "/users/1", 404), 1);
        assert_eq!(metrics.request_count("POST", "/login", 401), 1);

        let response = warp::test::request()
            .method("GET")
            .path("/metrics")
            .reply(&api)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = String::from_utf8(response.body().to_vec()).unwrap();
        assert!(body.contains("auth_http_requests_total"));
        assert!(body.contains(r#"route="/login""#));
        assert!(body.contains(r#"status="401""#));
    }
}
