//! `BankClient` against wiremock endpoints.
//!
//! Covers the login contract (Basic auth, ticket header, status handling)
//! and the card-accounts fetch (ticket header, body parsing, failures).

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use saldo_watch::bank::client::{BankClient, TICKET_HEADER};
use saldo_watch::bank::BankApi;
use saldo_watch::types::{Credentials, SaldoError, SessionTicket};

fn client() -> BankClient {
    BankClient::new(Duration::from_secs(5)).expect("client build")
}

fn credentials(server: &MockServer) -> Credentials {
    Credentials::new("user", "pass", server.uri())
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_returns_ticket_header_value() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        // base64("user:pass")
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).insert_header(TICKET_HEADER, "tkt-123"))
        .expect(1)
        .mount(&server)
        .await;

    let ticket = client().login(&credentials(&server)).await.expect("login");
    assert_eq!(ticket.expose(), "tkt-123");
}

#[tokio::test]
async fn login_header_lookup_is_case_insensitive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("authenticationticket", "lower"))
        .mount(&server)
        .await;

    let ticket = client().login(&credentials(&server)).await.expect("login");
    assert_eq!(ticket.expose(), "lower");
}

#[tokio::test]
async fn login_without_ticket_header_is_missing_ticket() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = client().login(&credentials(&server)).await.unwrap_err();
    assert_eq!(err, SaldoError::MissingTicket);
}

#[tokio::test]
async fn login_401_is_auth_failure_with_status_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client().login(&credentials(&server)).await.unwrap_err();
    assert_eq!(err, SaldoError::AuthFailure("Unauthorized".into()));
}

#[tokio::test]
async fn login_non_200_success_is_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(204).insert_header(TICKET_HEADER, "tkt"))
        .mount(&server)
        .await;

    let err = client().login(&credentials(&server)).await.unwrap_err();
    assert_eq!(err, SaldoError::AuthFailure("No Content".into()));
}

// ---------------------------------------------------------------------------
// Card accounts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn card_accounts_sends_ticket_and_parses_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/cardaccounts"))
        .and(header(TICKET_HEADER, "tkt-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Cards": [
                {"Accounts": [{"Available": 123.7}, {"Available": -4.2}]},
                {"Accounts": [{"Available": 10}]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = client()
        .card_accounts(&server.uri(), &SessionTicket::new("tkt-123"))
        .await
        .expect("fetch");
    assert_eq!(snapshot.account_count(), 3);
}

#[tokio::test]
async fn card_accounts_500_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/cardaccounts"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client()
        .card_accounts(&server.uri(), &SessionTicket::new("t"))
        .await
        .unwrap_err();
    assert_eq!(err, SaldoError::FetchFailure("Internal Server Error".into()));
}

#[tokio::test]
async fn card_accounts_invalid_json_is_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/cardaccounts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client()
        .card_accounts(&server.uri(), &SessionTicket::new("t"))
        .await
        .unwrap_err();
    assert!(matches!(err, SaldoError::FetchFailure(_)));
}
