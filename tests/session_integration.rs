mod common;

use std::time::Duration;

use authgate::client::ApiError;
use authgate::config::SessionConfig;
use authgate::forms::{SignInForm, SignUpForm};
use authgate::models::{AuthProvider, User};
use authgate::session::{LogoutReason, QueryKey, SessionError, SessionEvent};
use common::{
    auth_response_json, build_session, mint_subject_only_token, mint_token, session_config,
    user_json, SharedStorage, USER_EMAIL, USER_ID, USER_NAME,
};
use tokio::sync::broadcast;
use tokio::time::timeout;

fn sign_in_form() -> SignInForm {
    SignInForm {
        email: USER_EMAIL.to_string(),
        password: "Secret123".to_string(),
        callback_url: None,
    }
}

async fn next_event(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("no session event within two seconds")
        .expect("event channel closed")
}

#[tokio::test]
async fn login_seeds_identity_without_fetching_it() {
    let mut server = mockito::Server::new_async().await;
    let token = mint_token(3600);
    let login = server
        .mock("POST", "/auth/login")
        .match_body(mockito::Matcher::PartialJsonString(format!(
            r#"{{"email":"{}"}}"#,
            USER_EMAIL
        )))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(auth_response_json(&token))
        .expect(1)
        .create_async()
        .await;
    let me = server.mock("GET", "/auth/me").expect(0).create_async().await;

    let storage = SharedStorage::new();
    let session = build_session(&server.url(), &storage, &session_config());
    let mut events = session.events().subscribe();

    let user = session.login(&sign_in_form()).await.expect("login failed");
    assert_eq!(user.id, USER_ID);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::LoggedIn {
            user_id: USER_ID.to_string()
        }
    );

    let current = session.current_user().await.expect("query failed");
    assert_eq!(current.map(|u| u.email), Some(USER_EMAIL.to_string()));
    assert_eq!(session.tokens().get().await, Some(token));

    login.assert_async().await;
    me.assert_async().await;
}

#[tokio::test]
async fn invalid_forms_never_reach_the_network() {
    let mut server = mockito::Server::new_async().await;
    let login = server.mock("POST", "/auth/login").expect(0).create_async().await;
    let register = server
        .mock("POST", "/auth/register")
        .expect(0)
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let session = build_session(&server.url(), &storage, &session_config());

    let bad_login = SignInForm {
        email: "not-an-email".to_string(),
        password: String::new(),
        callback_url: None,
    };
    match session.login(&bad_login).await {
        Err(SessionError::Api(ApiError::Validation(errors))) => {
            assert!(errors.get("email").is_some());
            assert!(errors.get("password").is_some());
        }
        other => panic!("expected validation error, got {:?}", other.map(|u| u.id)),
    }

    let bad_signup = SignUpForm {
        name: "J".to_string(),
        email: USER_EMAIL.to_string(),
        password: "weakpass".to_string(),
        confirm_password: "different".to_string(),
    };
    match session.register(&bad_signup).await {
        Err(SessionError::Api(ApiError::Validation(errors))) => {
            assert_eq!(errors.len(), 3);
        }
        other => panic!("expected validation error, got {:?}", other.map(|u| u.id)),
    }

    let empty_code = session
        .exchange_oauth_code(AuthProvider::Google, "  ", None)
        .await;
    assert!(matches!(
        empty_code,
        Err(SessionError::Api(ApiError::Validation(_)))
    ));

    login.assert_async().await;
    register.assert_async().await;
}

#[tokio::test]
async fn register_signs_in_the_new_account() {
    let mut server = mockito::Server::new_async().await;
    let token = mint_token(3600);
    let register = server
        .mock("POST", "/auth/register")
        .match_body(mockito::Matcher::PartialJsonString(format!(
            r#"{{"name":"{}","email":"{}"}}"#,
            USER_NAME, USER_EMAIL
        )))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(auth_response_json(&token))
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let session = build_session(&server.url(), &storage, &session_config());
    let form = SignUpForm {
        name: USER_NAME.to_string(),
        email: USER_EMAIL.to_string(),
        password: "Secret123".to_string(),
        confirm_password: "Secret123".to_string(),
    };

    let user = session.register(&form).await.expect("register failed");
    assert_eq!(user.name, USER_NAME);
    assert_eq!(session.tokens().get().await, Some(token));
    register.assert_async().await;
}

#[tokio::test]
async fn failed_login_drops_any_previous_credential() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/auth/login")
        .with_status(401)
        .with_body(r#"{"message":"Invalid credentials"}"#)
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let config = session_config();
    storage.seed(&config.storage_key, &mint_token(3600)).await;
    let session = build_session(&server.url(), &storage, &config);

    let err = session.login(&sign_in_form()).await.unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(session.tokens().get().await, None);
}

#[tokio::test]
async fn logout_clears_local_state_when_remote_fails() {
    let mut server = mockito::Server::new_async().await;
    let logout = server
        .mock("POST", "/auth/logout")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let me = server.mock("GET", "/auth/me").expect(0).create_async().await;

    let storage = SharedStorage::new();
    let config = session_config();
    let token = mint_token(3600);
    storage.seed(&config.storage_key, &token).await;
    let session = build_session(&server.url(), &storage, &config);
    session
        .cache()
        .set(QueryKey::current_user(), &Some(serde_json::from_str::<User>(&user_json()).unwrap()));
    let mut events = session.events().subscribe();

    let outcome = session.logout().await;
    assert!(!outcome.remote_acknowledged);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::LoggedOut {
            reason: LogoutReason::UserInitiated
        }
    );
    assert_eq!(session.tokens().get().await, None);
    assert_eq!(session.current_user().await.unwrap(), None);

    logout.assert_async().await;
    me.assert_async().await;
}

#[tokio::test]
async fn expired_credential_means_signed_out_without_a_request() {
    let mut server = mockito::Server::new_async().await;
    let me = server.mock("GET", "/auth/me").expect(0).create_async().await;

    let storage = SharedStorage::new();
    let config = session_config();
    storage.seed(&config.storage_key, &mint_token(-30)).await;
    let session = build_session(&server.url(), &storage, &config);

    assert_eq!(session.current_user().await.unwrap(), None);
    assert_eq!(session.tokens().get().await, None);
    let cached = session
        .cache()
        .get::<Option<User>>(&QueryKey::current_user())
        .expect("null identity cached");
    assert_eq!(cached.value, None);
    me.assert_async().await;
}

#[tokio::test]
async fn rejected_credential_logs_out_and_notifies() {
    let mut server = mockito::Server::new_async().await;
    let me = server
        .mock("GET", "/auth/me")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let config = session_config();
    storage.seed(&config.storage_key, &mint_token(3600)).await;
    let session = build_session(&server.url(), &storage, &config);
    let mut events = session.events().subscribe();

    assert_eq!(session.current_user().await.unwrap(), None);
    assert_eq!(session.tokens().get().await, None);
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::LoggedOut {
            reason: LogoutReason::Unauthorized
        }
    );
    me.assert_async().await;
}

#[tokio::test]
async fn server_failure_falls_back_to_credential_claims() {
    let mut server = mockito::Server::new_async().await;
    let me = server
        .mock("GET", "/auth/me")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let config = session_config();
    storage.seed(&config.storage_key, &mint_token(3600)).await;
    let session = build_session(&server.url(), &storage, &config);

    let user = session
        .current_user()
        .await
        .unwrap()
        .expect("claims identity expected");
    assert_eq!(user.id, USER_ID);
    assert_eq!(user.email, USER_EMAIL);
    assert_eq!(user.name, USER_NAME);
    assert!(!user.is_verified);
    me.assert_async().await;
}

#[tokio::test]
async fn transient_failures_are_retried_then_surfaced() {
    let mut server = mockito::Server::new_async().await;
    let me = server
        .mock("GET", "/auth/me")
        .with_status(503)
        .with_body(r#"{"message":"maintenance"}"#)
        .expect(3)
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let config = session_config();
    storage
        .seed(&config.storage_key, &mint_subject_only_token(3600))
        .await;
    let session = build_session(&server.url(), &storage, &config);

    match session.current_user().await {
        Err(SessionError::Api(ApiError::Server { status, message })) => {
            assert_eq!(status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected server error, got {:?}", other.map(|u| u.is_some())),
    }
    assert!(session.tokens().get().await.is_some());
    me.assert_async().await;
}

#[tokio::test]
async fn unauthorized_is_recovered_by_refresh_when_enabled() {
    let mut server = mockito::Server::new_async().await;
    let old = mint_token(3600);
    let new = mint_token(7200);
    let rejected = server
        .mock("GET", "/auth/me")
        .match_header("authorization", format!("Bearer {}", old).as_str())
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", "/auth/refresh")
        .match_header("authorization", format!("Bearer {}", old).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(r#"{{"token":"{}"}}"#, new))
        .expect(1)
        .create_async()
        .await;
    let accepted = server
        .mock("GET", "/auth/me")
        .match_header("authorization", format!("Bearer {}", new).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(user_json())
        .expect(1)
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let config = SessionConfig {
        refresh_on_unauthorized: true,
        ..session_config()
    };
    storage.seed(&config.storage_key, &old).await;
    let session = build_session(&server.url(), &storage, &config);
    let mut events = session.events().subscribe();

    let user = session.current_user().await.unwrap().expect("user expected");
    assert_eq!(user.id, USER_ID);
    assert!(user.is_verified);
    assert_eq!(session.tokens().get().await, Some(new));
    assert_eq!(next_event(&mut events).await, SessionEvent::TokenRefreshed);

    rejected.assert_async().await;
    refresh.assert_async().await;
    accepted.assert_async().await;
}

#[tokio::test]
async fn removal_elsewhere_logs_out_watching_sessions() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/auth/me")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(user_json())
        .create_async()
        .await;
    server
        .mock("POST", "/auth/logout")
        .with_status(204)
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let config = session_config();
    storage.seed(&config.storage_key, &mint_token(3600)).await;
    let first = build_session(&server.url(), &storage, &config);
    let second = build_session(&server.url(), &storage, &config);

    assert!(second.current_user().await.unwrap().is_some());
    let watch = second.watch_storage();
    let mut events = second.events().subscribe();

    assert!(first.logout().await.remote_acknowledged);

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::LoggedOut {
            reason: LogoutReason::ExternalRemoval
        }
    );
    let cached = second
        .cache()
        .get::<Option<User>>(&QueryKey::current_user())
        .expect("null identity cached");
    assert_eq!(cached.value, None);
    assert_eq!(second.current_user().await.unwrap(), None);
    watch.stop().await;
}

#[tokio::test]
async fn stale_identity_is_served_while_refetching() {
    let mut server = mockito::Server::new_async().await;
    let me = server
        .mock("GET", "/auth/me")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(user_json())
        .expect(2)
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let config = SessionConfig {
        stale_after_secs: 0,
        ..session_config()
    };
    storage.seed(&config.storage_key, &mint_token(3600)).await;
    let session = build_session(&server.url(), &storage, &config);

    let first = session.current_user().await.unwrap();
    let second = session.current_user().await.unwrap();
    assert_eq!(first, second);

    for _ in 0..100 {
        if me.matched_async().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    me.assert_async().await;
}

#[tokio::test]
async fn oauth_round_trip_signs_in() {
    let mut server = mockito::Server::new_async().await;
    let token = mint_token(3600);
    server
        .mock("GET", "/auth/oauth/google/url")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"url":"https://accounts.example.com/auth?state=s1"}"#)
        .create_async()
        .await;
    let exchange = server
        .mock("POST", "/auth/oauth/google/callback")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"code":"c0de","state":"s1"}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(auth_response_json(&token))
        .expect(1)
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let session = build_session(&server.url(), &storage, &session_config());

    let url = session
        .oauth_authorization_url(AuthProvider::Google)
        .await
        .unwrap();
    assert_eq!(url, "https://accounts.example.com/auth?state=s1");

    let user = session
        .exchange_oauth_code(AuthProvider::Google, "c0de", Some("s1"))
        .await
        .unwrap();
    assert_eq!(user.id, USER_ID);
    assert_eq!(session.tokens().get().await, Some(token));
    exchange.assert_async().await;
}

#[tokio::test]
async fn rejected_credential_logs_out_watching_siblings() {
    let mut server = mockito::Server::new_async().await;
    let me = server
        .mock("GET", "/auth/me")
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let storage = SharedStorage::new();
    let config = session_config();
    storage.seed(&config.storage_key, &mint_token(3600)).await;
    let rejected = build_session(&server.url(), &storage, &config);
    let sibling = build_session(&server.url(), &storage, &config);
    sibling.cache().set(
        QueryKey::current_user(),
        &Some(serde_json::from_str::<User>(&user_json()).unwrap()),
    );
    let watch = sibling.watch_storage();
    let mut sibling_events = sibling.events().subscribe();

    assert_eq!(rejected.current_user().await.unwrap(), None);

    assert_eq!(
        next_event(&mut sibling_events).await,
        SessionEvent::LoggedOut {
            reason: LogoutReason::ExternalRemoval
        }
    );
    let cached = sibling
        .cache()
        .get::<Option<User>>(&QueryKey::current_user())
        .expect("null identity cached");
    assert_eq!(cached.value, None);
    assert_eq!(sibling.current_user().await.unwrap(), None);
    watch.stop().await;
    me.assert_async().await;
}
