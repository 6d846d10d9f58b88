#![allow(dead_code)]

use elements_ct::{init, Engine, EngineConfig, Session};

/// Two inputs (the second reissuing `REISSUED_ASSET`) and four explicit
/// outputs, one of them the fee.
pub const REISSUE_TX: &str = "0200000000020f231181a6d8fa2c5f7020948464110fbcc925f94d673d5752ce66d00250a1570000000000ffffffff0f231181a6d8fa2c5f7020948464110fbcc925f94d673d5752ce66d00250a1570100008000ffffffffd8bbe31bc590cbb6a47d2e53a956ec25d8890aefd60dcfc93efd34727554890b0683fe0819a4f9770c8a7cd5824e82975c825e017aff8ba0d6a5eb4959cf9c6f010000000023c346000004017981c1f171d7973a1fd922652f559f47d6d1506a4be2394b27a54951957f6c1801000000003b947f6002200d8510dfcf8e2330c0795c771d1e6064daab2f274ac32a6e2708df9bfa893d17a914ef3e40882e17d6e477082fcafeb0f09dc32d377b87010bad521bafdac767421d45b71b29a349c7b2ca2a06b5d8e3b5898c91df2769ed010000000029b9270002cc645552109331726c0ffadccab21620dd7a5a33260c6ac7bd1c78b98cb1e35a1976a9146c22e209d36612e0d9d2a20b814d7d8648cc7a7788ac017981c1f171d7973a1fd922652f559f47d6d1506a4be2394b27a54951957f6c1801000000000000c350000001cdb0ed311810e61036ac9255674101497850f5eee5e4320be07479c05473cbac010000000023c3460003ce4c4eac09fe317f365e45c00ffcf2e9639bc0fd792c10f72cdc173c4e5ed8791976a9149bdcb18911fa9faad6632ca43b81739082b0a19588ac00000000";

/// `REISSUE_TX` before the reissuance was attached.
pub const REISSUE_BASE_TX: &str = "0200000000020f231181a6d8fa2c5f7020948464110fbcc925f94d673d5752ce66d00250a1570000000000ffffffff0f231181a6d8fa2c5f7020948464110fbcc925f94d673d5752ce66d00250a1570100000000ffffffff03017981c1f171d7973a1fd922652f559f47d6d1506a4be2394b27a54951957f6c1801000000003b947f6002200d8510dfcf8e2330c0795c771d1e6064daab2f274ac32a6e2708df9bfa893d17a914ef3e40882e17d6e477082fcafeb0f09dc32d377b87010bad521bafdac767421d45b71b29a349c7b2ca2a06b5d8e3b5898c91df2769ed010000000029b9270002cc645552109331726c0ffadccab21620dd7a5a33260c6ac7bd1c78b98cb1e35a1976a9146c22e209d36612e0d9d2a20b814d7d8648cc7a7788ac017981c1f171d7973a1fd922652f559f47d6d1506a4be2394b27a54951957f6c1801000000000000c350000000000000";

pub const PREV_TXID: &str = "57a15002d066ce52573d674df925c9bc0f1164849420705f2cfad8a68111230f";
pub const REISSUED_ASSET: &str = "accb7354c07974e00b32e4e5eef55078490141675592ac3610e6101831edb0cd";
pub const REISSUE_ENTROPY: &str = "6f9ccf5949eba5d6a08bff7a015e825c97824e82d57c8a0c77f9a41908fe8306";
pub const REISSUE_NONCE: &str = "0b8954757234fd3ec9cf0dd6ef0a89d825ec56a9532e7da4b6cb90c51be3bbd8";
pub const ISSUANCE_BLINDING_KEY: &str =
    "7d65c7970d836a878a1080399a3c11de39a8e82493e12b1ad154e383661fb77f";

pub const ZERO_HEX32: &str = "0000000000000000000000000000000000000000000000000000000000000000";

pub const SIGHASH_ALL: i32 = 1;

pub fn engine() -> Engine {
    init(&EngineConfig::default()).expect("engine init")
}

pub fn session(engine: &Engine) -> Session {
    engine.create_session().expect("session")
}
