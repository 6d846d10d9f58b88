mod common;

use common::*;
use elements_ct::descriptor::{DescriptorKeyType, DescriptorScriptType};
use elements_ct::{CtError, ErrorCode, HashType, NetworkType};

#[test]
fn test_create_address() {
    let engine = engine();
    let mut session = session(&engine);
    let liquid = NetworkType::Liquidv1.as_i32();

    let p2pkh = session
        .create_address(
            HashType::P2pkh.as_i32(),
            "0279BE667EF9DCBBAC55A06295CE870B07029BFCDB2DCE28D959F2815B16F81798",
            "",
            liquid,
        )
        .unwrap();
    assert_eq!(p2pkh.address, "Q7wegLt2qMGhm28vch6VTzvpzs8KXvs4X7");
    assert_eq!(
        p2pkh.locking_script,
        "76a914751e76e8199196d454941c45d1b3a323f1433bd688ac"
    );
    assert_eq!(p2pkh.p2sh_segwit_locking_script, "");

    let p2sh = session
        .create_address(
            HashType::P2sh.as_i32(),
            "",
            "210279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798ac",
            liquid,
        )
        .unwrap();
    assert_eq!(p2sh.address, "GkSEheszYzEBMgX9G9ueaAyLVg8gfZwiDY");
    assert_eq!(
        p2sh.locking_script,
        "a91423b0ad3477f2178bc0b3eed26e4e6316f4e83aa187"
    );

    let wrapped = session
        .create_address(
            HashType::P2shP2wpkh.as_i32(),
            "0205ffcdde75f262d66ada3dd877c7471f8f8ee9ee24d917c3e18d01cee458bafe",
            "",
            liquid,
        )
        .unwrap();
    assert_eq!(wrapped.address, "GsaK3GXnFAjdfZDBPPo9PD6UNyAJ53nS9Z");
    assert_eq!(
        wrapped.locking_script,
        "a9147200818f884ee12b964442b059c11d0712b6abe787"
    );
    assert_eq!(
        wrapped.p2sh_segwit_locking_script,
        "0014ef692e4bf0cd5ed05235a4fc582ec4a4ff9695b4"
    );

    let p2wpkh = session
        .create_address(
            HashType::P2wpkh.as_i32(),
            "02bedf98a38247c1718fdff7e07561b4dc15f10323ebb0accab581778e72c2e995",
            "",
            NetworkType::ElementsRegtest.as_i32(),
        )
        .unwrap();
    assert_eq!(p2wpkh.address, "ert1qs58jzsgjsteydejyhy32p2v2vm8llh9uns6d93");
    assert_eq!(
        p2wpkh.locking_script,
        "0014850f21411282f246e644b922a0a98a66cfffdcbc"
    );
}

#[test]
fn test_create_address_requires_material() {
    let engine = engine();
    let mut session = session(&engine);

    let err = session
        .create_address(HashType::P2wpkh.as_i32(), "", "", NetworkType::Liquidv1.as_i32())
        .unwrap_err();
    assert!(matches!(err, CtError::InvalidArgument(_)));
    assert_eq!(session.last_error_code(), ErrorCode::IllegalArgument);
}

#[test]
fn test_create_multisig_script() {
    let engine = engine();
    let mut session = session(&engine);

    let multisig = session
        .create_multisig_script(
            NetworkType::Liquidv1.as_i32(),
            HashType::P2shP2wsh.as_i32(),
            &[
                "0205ffcdde75f262d66ada3dd877c7471f8f8ee9ee24d917c3e18d01cee458bafe",
                "02be61f4350b4ae7544f99649a917f48ba16cf48c983ac1599774958d88ad17ec5",
            ],
            2,
        )
        .unwrap();
    assert_eq!(multisig.address, "H4PB6YPgiTmQLiMU7b772LMFY9vA4gSUC1");
    assert_eq!(
        multisig.redeem_script,
        "0020f39f6272ba6b57918eb047c5dc44fb475356b0f24c12fca39b19284e80008a42"
    );
    assert_eq!(
        multisig.witness_script,
        "52210205ffcdde75f262d66ada3dd877c7471f8f8ee9ee24d917c3e18d01cee458bafe2102be61f4350b4ae7544f99649a917f48ba16cf48c983ac1599774958d88ad17ec552ae"
    );
}

#[test]
fn test_get_addresses_from_multisig() {
    let engine = engine();
    let mut session = session(&engine);

    let entries = session
        .get_addresses_from_multisig(
            "52210205ffcdde75f262d66ada3dd877c7471f8f8ee9ee24d917c3e18d01cee458bafe2102be61f4350b4ae7544f99649a917f48ba16cf48c983ac1599774958d88ad17ec552ae",
            NetworkType::Liquidv1.as_i32(),
            HashType::P2shP2wpkh.as_i32(),
        )
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].address, "GsaK3GXnFAjdfZDBPPo9PD6UNyAJ53nS9Z");
    assert_eq!(
        entries[0].pubkey,
        "0205ffcdde75f262d66ada3dd877c7471f8f8ee9ee24d917c3e18d01cee458bafe"
    );
    assert_eq!(entries[1].address, "GzGfkxAuJGSE7TL8KgMYmBRftjHPEFTSzS");
    assert_eq!(
        entries[1].pubkey,
        "02be61f4350b4ae7544f99649a917f48ba16cf48c983ac1599774958d88ad17ec5"
    );
}

#[test]
fn test_parse_nested_descriptor() {
    let engine = engine();
    let mut session = session(&engine);

    let parsed = session
        .parse_descriptor(
            "sh(wsh(pkh(02e493dbf1c10d80f3581e4904930b1404cc6c13900ee0758474fa94abe8c4cd13)))",
            NetworkType::Liquidv1.as_i32(),
            "",
        )
        .unwrap();
    assert_eq!(parsed.nodes.len(), 3);
    assert!(parsed.multisig_keys.is_empty());

    let sh = &parsed.nodes[0];
    assert_eq!(sh.depth, 0);
    assert_eq!(sh.script_type, DescriptorScriptType::Sh);
    assert_eq!(
        sh.locking_script.to_hex(),
        "a91455e8d5e8ee4f3604aba23c71c2684fa0a56a3a1287"
    );
    assert_eq!(sh.address, "Gq1mmExLuSEwfzzk6YtUxJ769grv6T5Tak");
    assert_eq!(sh.hash_type, Some(HashType::P2shP2wsh));
    assert_eq!(
        sh.redeem_script.as_ref().map(|s| s.to_hex()).as_deref(),
        Some("0020fc5acc302aab97f821f9a61e1cc572e7968a603551e95d4ba12b51df6581482f")
    );
    assert_eq!(sh.key_type(), DescriptorKeyType::Null);

    let wsh = &parsed.nodes[1];
    assert_eq!(wsh.depth, 1);
    assert_eq!(wsh.script_type, DescriptorScriptType::Wsh);
    assert_eq!(
        wsh.address,
        "ex1ql3dvcvp24wtlsg0e5c0pe3tju7tg5cp428546jap9dga7evpfqhs0htdlf"
    );
    assert_eq!(wsh.hash_type, Some(HashType::P2wsh));
    assert_eq!(
        wsh.redeem_script.as_ref().map(|s| s.to_hex()).as_deref(),
        Some("76a914c42e7ef92fdb603af844d064faad95db9bcdfd3d88ac")
    );

    let pkh = &parsed.nodes[2];
    assert_eq!(pkh.depth, 2);
    assert_eq!(pkh.script_type, DescriptorScriptType::Pkh);
    assert_eq!(pkh.address, "QF9hGPQMVAPc8RxTHALgSvNPWEjGbL9bse");
    assert_eq!(pkh.key_type(), DescriptorKeyType::Public);
    assert_eq!(
        pkh.key.as_ref().map(|k| k.pubkey_hex()).as_deref(),
        Some("02e493dbf1c10d80f3581e4904930b1404cc6c13900ee0758474fa94abe8c4cd13")
    );
    assert!(pkh.redeem_script.is_none());
}

#[test]
fn test_parse_multisig_descriptor_with_derive_path() {
    let engine = engine();
    let mut session = session(&engine);

    let parsed = session
        .parse_descriptor(
            "wsh(multi(1,xpub661MyMwAqRbcFW31YEwpkMuc5THy2PSt5bDMsktWQcFF8syAmRUapSCGu8ED9W6oDMSgv6Zz8idoc4a6mr8BDzTJY47LJhkJ8UB7WEGuduB/1/0/*,xpub69H7F5d8KSRgmmdJg2KhpAK8SR3DjMwAdkxj3ZuxV27CprR9LgpeyGmXUbC6wb7ERfvrnKZjXoUmmDznezpbZb7ap6r1D3tgFxHmwMkQTPH/0/0/*))",
            NetworkType::Mainnet.as_i32(),
            "0",
        )
        .unwrap();
    assert_eq!(parsed.nodes.len(), 1);
    let node = &parsed.nodes[0];
    assert!(node.is_multisig);
    assert_eq!(
        node.address,
        "bc1qvjtfmrxu524qhdevl6yyyasjs7xmnzjlqlu60mrwepact60eyz9s9xjw0c"
    );
    assert_eq!(
        node.locking_script.to_hex(),
        "002064969d8cdca2aa0bb72cfe88427612878db98a5f07f9a7ec6ec87b85e9f9208b"
    );

    assert_eq!(parsed.multisig_keys.len(), 2);
    assert_eq!(parsed.multisig_keys[0].key_type, DescriptorKeyType::Bip32);
    assert_eq!(
        parsed.multisig_keys[0].pubkey_hex(),
        "0205f8f73d8a553ad3287a506dbd53ed176cadeb200c8e4f7d68a001b1aed87106"
    );
    assert_eq!(
        parsed.multisig_keys[0].ext_pubkey.as_deref(),
        Some("xpub6BgWskLoyHmAUeKWgUXCGfDdCMRXseEjRCMEMvjkedmHpnvWtpXMaCRm8qcADw9einPR8o2c49ZpeHRZP4uYwGeMU2T63G7uf2Y1qJavrWQ")
    );
    assert_eq!(
        parsed.multisig_keys[1].pubkey_hex(),
        "02c04c4e03921809fcbef9a26da2d62b19b2b4eb383b3e6cfaaef6370e75144774"
    );
    assert!(parsed.multisig_keys[1].ext_privkey.is_none());
}

#[test]
fn test_invalid_descriptor_sets_error() {
    let engine = engine();
    let mut session = session(&engine);

    let err = session
        .parse_descriptor("wsh(pkh(", NetworkType::Liquidv1.as_i32(), "")
        .unwrap_err();
    assert!(matches!(err, CtError::InvalidDescriptor(_)));
    assert_eq!(session.last_error_code(), ErrorCode::IllegalArgument);
}
