//! Performance benchmarks for cryptographic operations

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use elements_ct::confidential::{ConfidentialEngine, TxOutSecrets};
use elements_ct::primitives::hash::{hash160, hmac_sha256, sha256, sha256d};
use elements_ct::primitives::liquid::{AssetId, ConfidentialNonce};
use elements_ct::primitives::script::Script;
use elements_ct::primitives::transaction::TxOut;
use elements_ct::transaction_signer::TransactionSigner;
use rand::thread_rng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

fn bench_hash_functions(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_functions");

    // Test data of various sizes
    let data_sizes = [32, 256, 1024, 4096, 16384];

    for size in data_sizes.iter() {
        let data = vec![0x42u8; *size];

        group.bench_with_input(BenchmarkId::new("sha256", size), &data, |b, data| {
            b.iter(|| sha256(black_box(data)))
        });

        group.bench_with_input(BenchmarkId::new("sha256d", size), &data, |b, data| {
            b.iter(|| sha256d(black_box(data)))
        });

        group.bench_with_input(BenchmarkId::new("hash160", size), &data, |b, data| {
            b.iter(|| hash160(black_box(data)))
        });
    }

    group.finish();
}

fn bench_hmac_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("hmac_operations");

    let key = b"test_key_for_hmac_benchmarking";
    for size in [32, 256, 1024, 4096].iter() {
        let data = vec![0x42u8; *size];
        group.bench_with_input(BenchmarkId::new("hmac_sha256", size), &data, |b, data| {
            b.iter(|| hmac_sha256(black_box(key), black_box(data)).unwrap())
        });
    }

    group.finish();
}

fn bench_ecdsa_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("ecdsa_operations");

    let secp = Secp256k1::new();
    let signer = TransactionSigner::new();
    let private_key = SecretKey::from_slice(&[1u8; 32]).unwrap();
    let public_key = PublicKey::from_secret_key(&secp, &private_key);
    let digest = sha256d(b"test message for signing benchmarks");

    group.bench_function("sign_deterministic", |b| {
        b.iter(|| {
            signer
                .sign_hash(black_box(&digest), black_box(&private_key), true, false, true)
                .unwrap()
        })
    });

    group.bench_function("sign_grind_r", |b| {
        b.iter(|| {
            signer
                .sign_hash(black_box(&digest), black_box(&private_key), true, true, true)
                .unwrap()
        })
    });

    let signature = signer.sign_hash(&digest, &private_key, true, true, true).unwrap();
    group.bench_function("verify", |b| {
        b.iter(|| {
            signer
                .verify_signature(
                    black_box(&digest),
                    black_box(&signature),
                    black_box(&public_key),
                )
                .unwrap()
        })
    });

    group.finish();
}

fn bench_confidential_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("confidential_operations");
    group.sample_size(20);

    let secp = Secp256k1::new();
    let engine = ConfidentialEngine::new();
    let mut rng = thread_rng();

    let asset = AssetId::new([0x6f; 32]);
    let input = TxOutSecrets::new(
        asset,
        engine.random_blinding_factor(&mut rng),
        100_000,
        engine.random_blinding_factor(&mut rng),
    );
    let domain = vec![engine.surjection_input(&input).unwrap()];
    let output = TxOutSecrets::new(
        asset,
        engine.random_blinding_factor(&mut rng),
        100_000,
        engine.random_blinding_factor(&mut rng),
    );

    let blinding_key = SecretKey::from_slice(&[7u8; 32]).unwrap();
    let receiver = PublicKey::from_secret_key(&secp, &blinding_key);
    let explicit = TxOut::new_explicit(
        asset,
        100_000,
        Script::new_p2wpkh(&[0x11; 20]),
        ConfidentialNonce::Null,
    );

    group.bench_function("commit", |b| {
        b.iter(|| engine.commit(black_box(&output)).unwrap())
    });

    group.bench_function("blind_output", |b| {
        b.iter(|| {
            let mut txout = explicit.clone();
            engine
                .blind_output(&mut rng, &mut txout, &output, &receiver, &domain)
                .unwrap()
        })
    });

    let mut blinded = explicit.clone();
    engine
        .blind_output(&mut rng, &mut blinded, &output, &receiver, &domain)
        .unwrap();
    group.bench_function("unblind_output", |b| {
        b.iter(|| {
            engine
                .unblind_output(black_box(&blinded), black_box(&blinding_key))
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(
    crypto_benches,
    bench_hash_functions,
    bench_hmac_operations,
    bench_ecdsa_operations,
    bench_confidential_operations
);
criterion_main!(crypto_benches);
