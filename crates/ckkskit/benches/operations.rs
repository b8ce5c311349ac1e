use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use ckkskit::{Channel, Evaluator, ParameterSet, SchemeContext};

fn contexts() -> Vec<SchemeContext> {
    [4096, 8192]
        .into_iter()
        .map(|n| {
            let set = ParameterSet::default_for(n).unwrap();
            SchemeContext::builder(set).seed(1).build().unwrap()
        })
        .collect()
}

fn encrypt(c: &mut Criterion) {
    let mut b = c.benchmark_group("encode_encrypt");
    for ctx in contexts() {
        let mut channel = Channel::with_seed(&ctx, 2);
        let id = BenchmarkId::new("scalar", ctx.params().poly_degree);
        b.bench_with_input(id, &(), |b, _| {
            b.iter(|| channel.encode_encrypt(3.5, ctx.initial_scale()).unwrap())
        });
    }
}

fn add(c: &mut Criterion) {
    let mut b = c.benchmark_group("add_inplace");
    for ctx in contexts() {
        let mut channel = Channel::with_seed(&ctx, 3);
        let eval = Evaluator::new(&ctx);
        let x = channel.encode_encrypt(1.0, ctx.initial_scale()).unwrap();
        let mut acc = channel.encode_encrypt(0.0, ctx.initial_scale()).unwrap();
        let id = BenchmarkId::new("ct+ct", ctx.params().poly_degree);
        b.bench_with_input(id, &(), |b, _| b.iter(|| eval.add_inplace(&mut acc, &x).unwrap()));
    }
}

fn multiply_relin_rescale(c: &mut Criterion) {
    let mut b = c.benchmark_group("multiply_relin_rescale");
    b.sample_size(10);
    let ctx = SchemeContext::builder(ParameterSet::heavy()).seed(4).build().unwrap();
    let mut channel = Channel::with_seed(&ctx, 5);
    let eval = Evaluator::new(&ctx);
    let x = channel.encode_encrypt(1.5, ctx.initial_scale()).unwrap();
    let y = channel.encode_encrypt(2.0, ctx.initial_scale()).unwrap();
    let id = BenchmarkId::new("heavy", ctx.params().poly_degree);
    b.bench_with_input(id, &(), |b, _| b.iter(|| eval.multiply_rescale(&x, &y).unwrap()));
}

fn decrypt(c: &mut Criterion) {
    let mut b = c.benchmark_group("decrypt_decode");
    for ctx in contexts() {
        let mut channel = Channel::with_seed(&ctx, 6);
        let ct = channel.encode_encrypt(7.25, ctx.initial_scale()).unwrap();
        let id = BenchmarkId::new("scalar", ctx.params().poly_degree);
        b.bench_with_input(id, &(), |b, _| b.iter(|| channel.decrypt_decode(&ct).unwrap()));
    }
}

criterion_group!(benches, encrypt, add, multiply_relin_rescale, decrypt);
criterion_main!(benches);
