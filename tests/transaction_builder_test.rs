mod common;

use common::*;
use elements_ct::{CtError, ErrorCode};

const TX_ONE_INPUT: &str = "020000000001bdebed9413554bb95fffbdf436112c923c334a6850509ae7794d410524b061740000000000ffffffff0000000000";
const TX_TWO_INPUTS: &str = "020000000002bdebed9413554bb95fffbdf436112c923c334a6850509ae7794d410524b061740000000000ffffffffc16d35d26589dfd54634181aa4a290cb9e06a716ea68620be05fbc46f1e197140100000000ffffffff0000000000";
const TX_ONE_OUTPUT: &str = "020000000002bdebed9413554bb95fffbdf436112c923c334a6850509ae7794d410524b061740000000000ffffffffc16d35d26589dfd54634181aa4a290cb9e06a716ea68620be05fbc46f1e197140100000000ffffffff010151f799a22a9375b31c2f20edce025f0df5231306e81222a0061bde342dc447ef010000000005f5e10003a630456ab6d50b57981e085abced70e2816289ae2b49a44c2f471b205134c12b1976a914d08f5ba8874d36cf97d19379b370f1f23ba36d5888ac00000000";
const TX_TWO_OUTPUTS: &str = "020000000002bdebed9413554bb95fffbdf436112c923c334a6850509ae7794d410524b061740000000000ffffffffc16d35d26589dfd54634181aa4a290cb9e06a716ea68620be05fbc46f1e197140100000000ffffffff020151f799a22a9375b31c2f20edce025f0df5231306e81222a0061bde342dc447ef010000000005f5e10003a630456ab6d50b57981e085abced70e2816289ae2b49a44c2f471b205134c12b1976a914d08f5ba8874d36cf97d19379b370f1f23ba36d5888ac01f38611eb688e6fcd06f25e2faf52b9f98364dc14c379ab085f1b57d56b4b1a6f010000000071475420001976a914fdd725970db682de970e7669646ed7afb8348ea188ac00000000";
const TX_WITH_FEE: &str = "020000000002bdebed9413554bb95fffbdf436112c923c334a6850509ae7794d410524b061740000000000ffffffffc16d35d26589dfd54634181aa4a290cb9e06a716ea68620be05fbc46f1e197140100000000ffffffff030151f799a22a9375b31c2f20edce025f0df5231306e81222a0061bde342dc447ef010000000005f5e10003a630456ab6d50b57981e085abced70e2816289ae2b49a44c2f471b205134c12b1976a914d08f5ba8874d36cf97d19379b370f1f23ba36d5888ac01f38611eb688e6fcd06f25e2faf52b9f98364dc14c379ab085f1b57d56b4b1a6f010000000071475420001976a914fdd725970db682de970e7669646ed7afb8348ea188ac01f38611eb688e6fcd06f25e2faf52b9f98364dc14c379ab085f1b57d56b4b1a6f01000000000007a120000000000000";

const BITCOIN_ASSET: &str = "6f1a4b6bd5571b5f08ab79c314dc6483f9b952af2f5ef206cd6f8e68eb1186f3";

#[test]
fn test_create_raw_transaction() {
    let engine = engine();
    let mut session = session(&engine);

    let tx = session.initialize_tx(2, 0).unwrap();
    assert_eq!(tx, "0200000000000000000000");

    let tx = session
        .add_tx_in(
            &tx,
            "7461b02405414d79e79a5050684a333c922c1136f4bdff5fb94b551394edebbd",
            0,
            u32::MAX,
        )
        .unwrap();
    assert_eq!(tx, TX_ONE_INPUT);

    let tx = session
        .add_tx_in(
            &tx,
            "1497e1f146bc5fe00b6268ea16a7069ecb90a2a41a183446d5df8965d2356dc1",
            1,
            u32::MAX,
        )
        .unwrap();
    assert_eq!(tx, TX_TWO_INPUTS);

    let tx = session
        .add_tx_out(
            &tx,
            "ef47c42d34de1b06a02212e8061323f50d5f02ceed202f1cb375932aa299f751",
            100_000_000,
            "",
            "CTEw7oSCUWDfmfhCEdsB3gsG7D9b4xLCZEq71H8JxRFeBu7yQN3CbSF6qT6J4F7qji4bq1jVSdVcqvRJ",
            "",
            "",
        )
        .unwrap();
    assert_eq!(tx, TX_ONE_OUTPUT);

    let tx = session
        .add_tx_out(
            &tx,
            BITCOIN_ASSET,
            1_900_500_000,
            "",
            "2dxZw5iVZ6Pmqoc5Vn8gkUWDGB5dXuMBCmM",
            "",
            "",
        )
        .unwrap();
    assert_eq!(tx, TX_TWO_OUTPUTS);

    let tx = session
        .add_tx_out(&tx, BITCOIN_ASSET, 500_000, "", "", "", "")
        .unwrap();
    assert_eq!(tx, TX_WITH_FEE);
    assert_eq!(session.last_error_code(), ErrorCode::Success);
}

#[test]
fn test_adding_same_input_twice_fails_without_changing_tx() {
    let engine = engine();
    let mut session = session(&engine);

    let err = session
        .add_tx_in(
            TX_ONE_INPUT,
            "7461b02405414d79e79a5050684a333c922c1136f4bdff5fb94b551394edebbd",
            0,
            u32::MAX,
        )
        .unwrap_err();
    assert!(matches!(err, CtError::DuplicateEntry(_)));
    assert_eq!(session.last_error_code(), ErrorCode::IllegalState);
    assert_eq!(session.get_tx_in_count(TX_ONE_INPUT).unwrap(), 1);
}

#[test]
fn test_get_transaction_fields() {
    let engine = engine();
    let mut session = session(&engine);

    assert_eq!(session.get_tx_in_count(REISSUE_TX).unwrap(), 2);
    assert_eq!(session.get_tx_out_count(REISSUE_TX).unwrap(), 4);

    let txin = session.get_tx_in(REISSUE_TX, 1).unwrap();
    assert_eq!(txin.txid, PREV_TXID);
    assert_eq!(txin.vout, 1);
    assert_eq!(txin.sequence, 4294967295);
    assert_eq!(txin.script_sig, "");

    let issuance = session.get_tx_in_issuance_info(REISSUE_TX, 1).unwrap();
    assert_eq!(issuance.entropy, REISSUE_ENTROPY);
    assert_eq!(issuance.nonce, REISSUE_NONCE);
    assert_eq!(issuance.asset_value, "010000000023c34600");
    assert_eq!(issuance.token_value, "");
    assert_eq!(issuance.asset_rangeproof, "");
    assert_eq!(issuance.token_rangeproof, "");

    let txout = session.get_tx_out(REISSUE_TX, 3).unwrap();
    assert_eq!(txout.asset, REISSUED_ASSET);
    assert_eq!(txout.amount, 600_000_000);
    assert_eq!(txout.value_commitment, "010000000023c34600");
    assert_eq!(
        txout.nonce,
        "03ce4c4eac09fe317f365e45c00ffcf2e9639bc0fd792c10f72cdc173c4e5ed879"
    );
    assert_eq!(
        txout.locking_script,
        "76a9149bdcb18911fa9faad6632ca43b81739082b0a19588ac"
    );
    assert_eq!(txout.surjection_proof, "");
    assert_eq!(txout.rangeproof, "");
}

#[test]
fn test_getters_reject_out_of_range_indices() {
    let engine = engine();
    let mut session = session(&engine);

    assert!(session.get_tx_in(REISSUE_TX, 2).is_err());
    assert!(session.get_tx_out(REISSUE_TX, 4).is_err());
    assert_eq!(session.last_error_code(), ErrorCode::IllegalArgument);
    // Input 0 carries no issuance.
    assert!(session.get_tx_in_issuance_info(REISSUE_TX, 0).is_err());
}

#[test]
fn test_set_reissue_asset() {
    let engine = engine();
    let mut session = session(&engine);

    let result = session
        .set_reissue_asset(
            REISSUE_BASE_TX,
            PREV_TXID,
            1,
            600_000_000,
            REISSUE_NONCE,
            REISSUE_ENTROPY,
            "CTExCoUri8VzkxbbhqzgsruWJ5zYtmoFXxCWtjiSLAzcMbpEWhHmDrZ66bAb41VsmSKnvJWrq2cfjUw9",
            "",
        )
        .unwrap();
    assert_eq!(result.asset, REISSUED_ASSET);
    assert_eq!(result.tx_hex, REISSUE_TX);

    // The input now carries an issuance, so a second reissue is refused.
    let err = session
        .set_reissue_asset(
            &result.tx_hex,
            PREV_TXID,
            1,
            600_000_000,
            REISSUE_NONCE,
            REISSUE_ENTROPY,
            "",
            "76a9149bdcb18911fa9faad6632ca43b81739082b0a19588ac",
        )
        .unwrap_err();
    assert!(matches!(err, CtError::DuplicateEntry(_)));
}

#[test]
fn test_set_issue_asset_adds_asset_and_token_outputs() {
    let engine = engine();
    let mut session = session(&engine);

    let issued = session
        .set_issue_asset(
            REISSUE_BASE_TX,
            PREV_TXID,
            0,
            "",
            1_000,
            "2dxZw5iVZ6Pmqoc5Vn8gkUWDGB5dXuMBCmM",
            1,
            "2dxZw5iVZ6Pmqoc5Vn8gkUWDGB5dXuMBCmM",
            false,
        )
        .unwrap();
    assert_ne!(issued.asset, issued.token);
    assert_eq!(session.get_tx_out_count(&issued.tx_hex).unwrap(), 5);

    let asset_out = session.get_tx_out(&issued.tx_hex, 3).unwrap();
    assert_eq!(asset_out.asset, issued.asset);
    assert_eq!(asset_out.amount, 1_000);
    let token_out = session.get_tx_out(&issued.tx_hex, 4).unwrap();
    assert_eq!(token_out.asset, issued.token);
    assert_eq!(token_out.amount, 1);

    let info = session.get_tx_in_issuance_info(&issued.tx_hex, 0).unwrap();
    assert_eq!(info.entropy, ZERO_HEX32);
    assert_eq!(info.nonce, ZERO_HEX32);
}

#[test]
fn test_txid_ignores_witness() {
    let engine = engine();
    let mut session = session(&engine);

    let txid = session.get_txid(REISSUE_TX).unwrap();
    let wtxid = session.get_wtxid(REISSUE_TX).unwrap();
    assert_eq!(txid.len(), 64);
    // No witness data: both hashes agree.
    assert_eq!(txid, wtxid);
}

#[test]
fn test_malformed_hex_sets_error() {
    let engine = engine();
    let mut session = session(&engine);

    assert!(session.get_tx_in_count("02000000").is_err());
    assert_eq!(session.last_error_code(), ErrorCode::IllegalArgument);
    assert!(!session.last_error_message().is_empty());

    assert!(session.get_tx_in_count("zz").is_err());
    assert_eq!(session.last_error_code(), ErrorCode::IllegalArgument);
}
