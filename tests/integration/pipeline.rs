//! End-to-end poll cycles: real `BankClient` against wiremock, real
//! exporter writing to a temp file, notifications captured from the bridge.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use saldo_watch::bank::client::{BankClient, TICKET_HEADER};
use saldo_watch::bridge::notifier::Notifier;
use saldo_watch::engine::exporter::BalanceExporter;
use saldo_watch::engine::poller::{CycleOutcome, Poller, SkipReason, Trigger};
use saldo_watch::types::{Credentials, Notification, SaldoError, SessionContext};

fn fixed_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

struct Setup {
    server: MockServer,
    poller: Poller,
    notifier: Notifier,
    dir: tempfile::TempDir,
}

async fn setup(logged_in: bool) -> Setup {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let notifier = Notifier::new();
    let session = Arc::new(SessionContext::new());
    if logged_in {
        session
            .set_credentials(Credentials::new("user", "pass", server.uri()))
            .await;
    }
    let poller = Poller::new(
        Arc::new(BankClient::new(Duration::from_secs(5)).unwrap()),
        BalanceExporter::new(dir.path().join("saldo_data.csv")),
        notifier.clone(),
        session,
    )
    .with_clock(fixed_day);

    Setup { server, poller, notifier, dir }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header(TICKET_HEADER, "tkt-9"))
        .mount(server)
        .await;
}

async fn mount_accounts(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/user/cardaccounts"))
        .and(header(TICKET_HEADER, "tkt-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn cycle_appends_one_line_per_account() {
    let s = setup(true).await;
    mount_login(&s.server).await;
    mount_accounts(
        &s.server,
        json!({"Cards": [
            {"Accounts": [{"Available": 123.7}, {"Available": -4.2}]},
            {"Accounts": [{"Available": 5000}]}
        ]}),
    )
    .await;

    let outcome = s.poller.run_cycle(Trigger::Begin).await;
    assert_eq!(outcome, CycleOutcome::Exported(3));

    let contents = std::fs::read_to_string(s.dir.path().join("saldo_data.csv")).unwrap();
    assert_eq!(contents, "2026-10-18,123\n2026-10-18,-5\n2026-10-18,5000\n");

    let recent = s.notifier.recent().await;
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].notification.name(), "CARD_ACCOUNTS_RESULT");
}

#[tokio::test]
async fn repeated_cycles_append_without_dedup() {
    let s = setup(true).await;
    mount_login(&s.server).await;
    mount_accounts(&s.server, json!({"Cards": [{"Accounts": [{"Available": 42.5}]}]})).await;

    s.poller.run_cycle(Trigger::Begin).await;
    s.poller.run_cycle(Trigger::Poll).await;

    let contents = std::fs::read_to_string(s.dir.path().join("saldo_data.csv")).unwrap();
    assert_eq!(contents, "2026-10-18,42\n2026-10-18,42\n");
}

#[tokio::test]
async fn login_401_never_fetches_accounts() {
    let s = setup(true).await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&s.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/cardaccounts"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&s.server)
        .await;

    let outcome = s.poller.run_cycle(Trigger::Begin).await;
    assert_eq!(outcome, CycleOutcome::Failed(SaldoError::AuthFailure("Unauthorized".into())));

    let recent = s.notifier.recent().await;
    assert_eq!(
        recent[0].notification,
        Notification::auth_error(&SaldoError::AuthFailure("Unauthorized".into()))
    );
    assert!(!s.dir.path().join("saldo_data.csv").exists());
}

#[tokio::test]
async fn missing_ticket_never_fetches_accounts() {
    let s = setup(true).await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&s.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/cardaccounts"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&s.server)
        .await;

    let outcome = s.poller.run_cycle(Trigger::Begin).await;
    assert_eq!(outcome, CycleOutcome::Failed(SaldoError::MissingTicket));
    let payload = serde_json::to_value(&s.notifier.recent().await[0].notification).unwrap();
    assert_eq!(payload["payload"]["error"], "Unable to retrieve authentication ticket.");
}

#[tokio::test]
async fn snapshot_without_accounts_writes_nothing() {
    let s = setup(true).await;
    mount_login(&s.server).await;
    mount_accounts(&s.server, json!({"Cards": [{"Accounts": []}]})).await;

    let outcome = s.poller.run_cycle(Trigger::Poll).await;
    assert!(matches!(outcome, CycleOutcome::Failed(SaldoError::NoData(_))));
    assert!(!s.dir.path().join("saldo_data.csv").exists());
}

#[tokio::test]
async fn poll_before_login_makes_no_requests() {
    let s = setup(false).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&s.server)
        .await;

    let outcome = s.poller.run_cycle(Trigger::Poll).await;
    assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::NoSession));
}

#[tokio::test]
async fn undecodable_accounts_body_is_relayed_as_fetch_error() {
    let s = setup(true).await;
    mount_login(&s.server).await;
    Mock::given(method("GET"))
        .and(path("/user/cardaccounts"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&s.server)
        .await;

    let outcome = s.poller.run_cycle(Trigger::Poll).await;
    assert!(matches!(outcome, CycleOutcome::Failed(SaldoError::FetchFailure(_))));

    let recent = s.notifier.recent().await;
    assert_eq!(recent.len(), 1);
    let payload = serde_json::to_value(&recent[0].notification).unwrap();
    assert_eq!(payload["notification"], "CARD_ACCOUNTS_RESULT");
    assert!(payload["payload"]["error"].is_string());
    assert!(!s.dir.path().join("saldo_data.csv").exists());
}
