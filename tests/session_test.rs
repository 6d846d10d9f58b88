mod common;

use common::*;
use elements_ct::utils::logging::LogLevel;
use elements_ct::{
    get_supported_function, init, CtError, EngineConfig, ErrorCode, NetworkType,
    SUPPORTED_BITCOIN, SUPPORTED_ELEMENTS,
};
use std::thread;
use tempfile::TempDir;

#[test]
fn test_get_last_error() {
    let engine = engine();
    let mut session = session(&engine);

    assert_eq!(session.last_error_code(), ErrorCode::Success);
    assert_eq!(session.last_error_message(), "");

    let err = session.create_address(200, "", "", 200).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalArgument);
    assert_eq!(session.last_error_code(), ErrorCode::IllegalArgument);
    assert_eq!(session.last_error_code().as_i32(), 1);
    assert_eq!(session.last_error_message(), "Illegal network type.");
}

#[test]
fn test_success_clears_last_error() {
    let engine = engine();
    let mut session = session(&engine);

    session.get_tx_in_count("").unwrap_err();
    assert_ne!(session.last_error_code(), ErrorCode::Success);

    assert_eq!(
        session.initialize_tx(2, 0).unwrap(),
        "0200000000000000000000"
    );
    assert_eq!(session.last_error_code(), ErrorCode::Success);
    assert_eq!(session.last_error_message(), "");
}

#[test]
fn test_sessions_do_not_share_errors() {
    let engine = engine();
    let mut failing = session(&engine);
    let clean = session(&engine);

    failing.create_address(200, "", "", 200).unwrap_err();
    assert_eq!(clean.last_error_code(), ErrorCode::Success);
    assert_ne!(failing.id(), clean.id());
}

#[test]
fn test_supported_function() {
    let flags = get_supported_function();
    assert_eq!(flags & SUPPORTED_BITCOIN, 1);
    assert_eq!(flags & SUPPORTED_ELEMENTS, SUPPORTED_ELEMENTS);
}

#[test]
fn test_shutdown_waits_for_sessions() {
    let engine = engine();
    let session = session(&engine);
    assert_eq!(engine.open_sessions(), 1);

    let err = engine.shutdown().unwrap_err();
    assert!(matches!(err, CtError::IllegalState(_)));

    session.close();
    assert_eq!(engine.open_sessions(), 0);
    engine.shutdown().unwrap();

    let err = engine.create_session().unwrap_err();
    assert!(matches!(err, CtError::IllegalState(_)));
}

#[test]
fn test_sessions_run_on_separate_threads() {
    let engine = engine();
    let workers: Vec<_> = (0..4)
        .map(|version| {
            let mut session = session(&engine);
            thread::spawn(move || session.initialize_tx(version, 0).unwrap())
        })
        .collect();
    let txs: Vec<String> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(txs[2], "0200000000000000000000");
    assert_eq!(engine.open_sessions(), 0);
}

#[test]
fn test_init_creates_data_dir_and_uses_config() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("engine");
    let config = EngineConfig {
        data_dir: Some(data_dir.clone()),
        log_level: Some(LogLevel::Debug),
        default_network: NetworkType::ElementsRegtest,
        ..EngineConfig::default()
    };

    let engine = init(&config).unwrap();
    assert!(data_dir.exists());
    let session = engine.create_session().unwrap();
    assert_eq!(session.default_network(), NetworkType::ElementsRegtest);
}

#[test]
fn test_init_rejects_invalid_config() {
    let config = EngineConfig {
        max_descriptor_depth: 0,
        ..EngineConfig::default()
    };
    assert!(matches!(init(&config), Err(CtError::InvalidArgument(_))));
}

#[test]
fn test_descriptor_depth_limit_from_config() {
    let config = EngineConfig {
        max_descriptor_depth: 2,
        ..EngineConfig::default()
    };
    let engine = init(&config).unwrap();
    let mut session = engine.create_session().unwrap();

    let nested = "sh(wsh(pkh(02e493dbf1c10d80f3581e4904930b1404cc6c13900ee0758474fa94abe8c4cd13)))";
    let err = session
        .parse_descriptor(nested, NetworkType::Liquidv1.as_i32(), "")
        .unwrap_err();
    assert!(matches!(err, CtError::InvalidDescriptor(_)));
    assert!(session
        .parse_descriptor(
            "wsh(pkh(02e493dbf1c10d80f3581e4904930b1404cc6c13900ee0758474fa94abe8c4cd13))",
            NetworkType::Liquidv1.as_i32(),
            "",
        )
        .is_ok());
}
