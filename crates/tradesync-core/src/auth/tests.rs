use super::*;
use crate::db;
use crate::error::Error;
use chrono::{Duration, TimeZone};
use tempfile::TempDir;

const KEY: &str = "ABCD-EFGH-JKLM-NPQR";
const SECRET: &str = "0c1f-test-signing-secret";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap()
}

fn license(status: LicenseStatus) -> LicenseRecord {
    LicenseRecord {
        key: KEY.to_string(),
        status,
        label: None,
        created_at: now() - Duration::days(30),
        activated_at: None,
    }
}

fn store_returning(status: LicenseStatus) -> Arc<MockLicenseStore> {
    let mut store = MockLicenseStore::new();
    store
        .expect_find()
        .returning(move |_| Ok(Some(license(status))));
    Arc::new(store)
}

fn store_never_called() -> Arc<MockLicenseStore> {
    let mut store = MockLicenseStore::new();
    store.expect_find().never();
    Arc::new(store)
}

fn request<'a>(timestamp: &'a str, signature: Option<&'a str>, body: &'a [u8]) -> AuthRequest<'a> {
    AuthRequest {
        identity: Some(KEY),
        timestamp: Some(timestamp),
        signature,
        raw_body: body,
    }
}

fn rejected(outcome: &AuthOutcome) -> Option<RejectReason> {
    match outcome {
        AuthOutcome::Rejected(reason) => Some(*reason),
        AuthOutcome::Accepted { .. } => None,
    }
}

#[test]
fn test_license_key_parse() {
    assert!(LicenseKey::parse(KEY).is_some());
    assert_eq!(
        LicenseKey::parse("  abcd-efgh-jkLM-npqr ").unwrap().as_str(),
        KEY
    );
    // Ambiguous characters are excluded from the alphabet
    assert!(LicenseKey::parse("ABCD-EFGH-JKLM-NPQ0").is_none());
    assert!(LicenseKey::parse("ABCD-EFGH-JKLM-NPQO").is_none());
    assert!(LicenseKey::parse("ABCD-EFGH-JKLM-NPQ1").is_none());
    assert!(LicenseKey::parse("ABCD-EFGH-JKLM-NPQI").is_none());
    // Wrong grouping
    assert!(LicenseKey::parse("ABCDE-FGH-JKLM-NPQR").is_none());
    assert!(LicenseKey::parse("ABCDEFGHJKLMNPQRST").is_none());
    assert!(LicenseKey::parse("ABCD-EFGH-JKLM").is_none());
    assert!(LicenseKey::parse("").is_none());
}

#[test]
fn test_generated_keys_are_valid_and_distinct() {
    let a = LicenseKey::generate();
    let b = LicenseKey::generate();
    assert!(LicenseKey::parse(a.as_str()).is_some());
    assert_ne!(a, b);
}

#[test]
fn test_mask_key() {
    assert_eq!(mask_key(KEY), "ABCD...NPQR");
    assert_eq!(mask_key("short"), "****");
}

#[test]
fn test_settings_debug_hides_secret() {
    let settings = AuthSettings::default().with_signing_secret(SECRET);
    let debug = format!("{:?}", settings);
    assert!(!debug.contains(SECRET));
    assert!(debug.contains("****"));
}

#[tokio::test]
async fn test_accepts_valid_request() {
    let auth = Authenticator::new(store_returning(LicenseStatus::Active), AuthSettings::default());
    let ts = now().timestamp_millis().to_string();

    match auth.authenticate_at(request(&ts, None, b"{}"), now()).await {
        AuthOutcome::Accepted { identity, license } => {
            assert_eq!(identity.as_str(), KEY);
            assert_eq!(license.unwrap().status, LicenseStatus::Active);
        }
        other => panic!("expected acceptance, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unused_license_is_accepted() {
    let auth = Authenticator::new(store_returning(LicenseStatus::Unused), AuthSettings::default());
    let ts = now().timestamp_millis().to_string();

    let outcome = auth.authenticate_at(request(&ts, None, b""), now()).await;
    assert_eq!(rejected(&outcome), None);
}

#[tokio::test]
async fn test_identity_checks_skip_store() {
    let auth = Authenticator::new(store_never_called(), AuthSettings::default());
    let ts = now().timestamp_millis().to_string();

    let missing = AuthRequest {
        identity: None,
        timestamp: Some(&ts),
        ..Default::default()
    };
    assert_eq!(
        rejected(&auth.authenticate_at(missing, now()).await),
        Some(RejectReason::MissingIdentity)
    );

    let blank = AuthRequest {
        identity: Some("   "),
        timestamp: Some(&ts),
        ..Default::default()
    };
    assert_eq!(
        rejected(&auth.authenticate_at(blank, now()).await),
        Some(RejectReason::MissingIdentity)
    );

    let malformed = AuthRequest {
        identity: Some("not-a-key"),
        timestamp: Some(&ts),
        ..Default::default()
    };
    assert_eq!(
        rejected(&auth.authenticate_at(malformed, now()).await),
        Some(RejectReason::InvalidIdentityFormat)
    );
}

#[tokio::test]
async fn test_timestamp_checks() {
    let auth = Authenticator::new(store_never_called(), AuthSettings::default());

    let missing = AuthRequest {
        identity: Some(KEY),
        ..Default::default()
    };
    assert_eq!(
        rejected(&auth.authenticate_at(missing, now()).await),
        Some(RejectReason::MissingTimestamp)
    );

    assert_eq!(
        rejected(&auth.authenticate_at(request("yesterday", None, b""), now()).await),
        Some(RejectReason::MissingTimestamp)
    );

    let stale = (now() - Duration::seconds(301)).timestamp_millis().to_string();
    assert_eq!(
        rejected(&auth.authenticate_at(request(&stale, None, b""), now()).await),
        Some(RejectReason::RequestExpired)
    );

    let future = (now() + Duration::seconds(301)).timestamp_millis().to_string();
    assert_eq!(
        rejected(&auth.authenticate_at(request(&future, None, b""), now()).await),
        Some(RejectReason::RequestExpired)
    );
}

#[tokio::test]
async fn test_timestamp_at_tolerance_edge_is_fresh() {
    let auth = Authenticator::new(store_returning(LicenseStatus::Active), AuthSettings::default());

    let edge = (now() - Duration::seconds(300)).timestamp_millis().to_string();
    let outcome = auth.authenticate_at(request(&edge, None, b""), now()).await;
    assert_eq!(rejected(&outcome), None);
}

#[tokio::test]
async fn test_license_status_checks() {
    let ts = now().timestamp_millis().to_string();

    let auth = Authenticator::new(store_returning(LicenseStatus::Revoked), AuthSettings::default());
    assert_eq!(
        rejected(&auth.authenticate_at(request(&ts, None, b""), now()).await),
        Some(RejectReason::IdentityRevoked)
    );

    let mut unknown = MockLicenseStore::new();
    unknown.expect_find().returning(|_| Ok(None));
    let auth = Authenticator::new(Arc::new(unknown), AuthSettings::default());
    assert_eq!(
        rejected(&auth.authenticate_at(request(&ts, None, b""), now()).await),
        Some(RejectReason::IdentityNotFound)
    );
}

#[tokio::test]
async fn test_store_failure_fails_open() {
    let mut store = MockLicenseStore::new();
    store
        .expect_find()
        .returning(|_| Err(Error::Database(sqlx::Error::PoolTimedOut)));
    let auth = Authenticator::new(Arc::new(store), AuthSettings::default());
    let ts = now().timestamp_millis().to_string();

    match auth.authenticate_at(request(&ts, None, b""), now()).await {
        AuthOutcome::Accepted { license, .. } => assert!(license.is_none()),
        other => panic!("expected fail-open acceptance, got {:?}", other),
    }
}

#[tokio::test]
async fn test_signature_checked_even_when_store_fails_open() {
    let mut store = MockLicenseStore::new();
    store
        .expect_find()
        .returning(|_| Err(Error::Database(sqlx::Error::PoolTimedOut)));
    let auth = Authenticator::new(
        Arc::new(store),
        AuthSettings::default().with_signing_secret(SECRET),
    );
    let ts = now().timestamp_millis().to_string();

    assert_eq!(
        rejected(&auth.authenticate_at(request(&ts, Some("00"), b"x"), now()).await),
        Some(RejectReason::InvalidSignature)
    );
}

#[tokio::test]
async fn test_valid_signature_accepted() {
    let auth = Authenticator::new(
        store_returning(LicenseStatus::Active),
        AuthSettings::default().with_signing_secret(SECRET),
    );
    let ts = now().timestamp_millis().to_string();
    let body = br#"{"text":"Bought 100 TSLA @ 242.10"}"#;
    let sig = signature::sign(SECRET.as_bytes(), &ts, body).unwrap();

    let outcome = auth.authenticate_at(request(&ts, Some(&sig), body), now()).await;
    assert_eq!(rejected(&outcome), None);
}

#[tokio::test]
async fn test_single_bit_mutations_rejected() {
    let auth = Authenticator::new(
        store_returning(LicenseStatus::Active),
        AuthSettings::default().with_signing_secret(SECRET),
    );
    let ts = now().timestamp_millis().to_string();
    let body = br#"{"text":"Sold 5 NVDA @ 131.00"}"#.to_vec();
    let sig = signature::sign(SECRET.as_bytes(), &ts, &body).unwrap();

    // Signature: flip one bit in every position
    for i in 0..sig.len() {
        let mut bytes = sig.clone().into_bytes();
        bytes[i] ^= 0x01;
        let mutated = String::from_utf8(bytes).unwrap();
        let outcome = auth
            .authenticate_at(request(&ts, Some(&mutated), &body), now())
            .await;
        assert!(rejected(&outcome).is_some(), "signature bit at {} accepted", i);
    }

    // Body
    for i in 0..body.len() {
        let mut mutated = body.clone();
        mutated[i] ^= 0x01;
        let outcome = auth
            .authenticate_at(request(&ts, Some(&sig), &mutated), now())
            .await;
        assert_eq!(rejected(&outcome), Some(RejectReason::InvalidSignature));
    }

    // Timestamp: low bit of the last digit keeps it numeric and fresh
    let mut ts_bytes = ts.clone().into_bytes();
    let last = ts_bytes.len() - 1;
    ts_bytes[last] ^= 0x01;
    let mutated_ts = String::from_utf8(ts_bytes).unwrap();
    let outcome = auth
        .authenticate_at(request(&mutated_ts, Some(&sig), &body), now())
        .await;
    assert_eq!(rejected(&outcome), Some(RejectReason::InvalidSignature));
}

#[tokio::test]
async fn test_signature_optional() {
    let ts = now().timestamp_millis().to_string();

    // Secret configured, no signature supplied
    let auth = Authenticator::new(
        store_returning(LicenseStatus::Active),
        AuthSettings::default().with_signing_secret(SECRET),
    );
    assert_eq!(
        rejected(&auth.authenticate_at(request(&ts, None, b"{}"), now()).await),
        None
    );

    // Signature supplied, no secret configured
    let auth = Authenticator::new(store_returning(LicenseStatus::Active), AuthSettings::default());
    assert_eq!(
        rejected(&auth.authenticate_at(request(&ts, Some("abc"), b"{}"), now()).await),
        None
    );
}

#[tokio::test]
async fn test_blank_secret_is_unset() {
    let ts = now().timestamp_millis().to_string();
    let body = b"{}";
    let empty_key_sig = signature::sign(b"", &ts, body).unwrap();

    for blank in ["", "   "] {
        let settings = AuthSettings::default().with_signing_secret(blank);
        assert!(settings.signing_key().is_none());

        let auth = Authenticator::new(store_returning(LicenseStatus::Active), settings);
        let unset = Authenticator::new(store_returning(LicenseStatus::Active), AuthSettings::default());

        for sig in [Some(empty_key_sig.as_str()), Some("abc"), None] {
            assert_eq!(
                auth.authenticate_at(request(&ts, sig, body), now()).await,
                unset.authenticate_at(request(&ts, sig, body), now()).await,
            );
        }
    }
}

#[tokio::test]
async fn test_sqlite_license_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::connect(temp_dir.path().join("licenses.db")).await.unwrap();
    let store = SqliteLicenseStore::new(pool);

    let issued = store.issue(Some("order-1042")).await.unwrap();
    assert_eq!(issued.status, LicenseStatus::Unused);
    assert!(LicenseKey::parse(&issued.key).is_some());

    let found = store.find(&issued.key).await.unwrap().unwrap();
    assert_eq!(found.label.as_deref(), Some("order-1042"));

    assert!(store.activate(&issued.key).await.unwrap());
    assert!(!store.activate(&issued.key).await.unwrap());
    let active = store.find(&issued.key).await.unwrap().unwrap();
    assert_eq!(active.status, LicenseStatus::Active);
    assert!(active.activated_at.is_some());

    assert!(store.revoke(&issued.key).await.unwrap());
    let revoked = store.find(&issued.key).await.unwrap().unwrap();
    assert_eq!(revoked.status, LicenseStatus::Revoked);

    assert!(!store.revoke(KEY).await.unwrap());
    assert!(store.find(KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_authenticator_with_sqlite_store() {
    let temp_dir = TempDir::new().unwrap();
    let pool = db::connect(temp_dir.path().join("licenses.db")).await.unwrap();
    let store = Arc::new(SqliteLicenseStore::new(pool));
    let issued = store.issue(None).await.unwrap();

    let auth = Authenticator::new(store.clone(), AuthSettings::default());
    let ts = Utc::now().timestamp_millis().to_string();
    let req = AuthRequest {
        identity: Some(issued.key.as_str()),
        timestamp: Some(&ts),
        signature: None,
        raw_body: b"",
    };

    assert!(matches!(
        auth.authenticate(req).await,
        AuthOutcome::Accepted { .. }
    ));

    store.revoke(&issued.key).await.unwrap();
    assert_eq!(
        auth.authenticate(req).await,
        AuthOutcome::Rejected(RejectReason::IdentityRevoked)
    );
}
