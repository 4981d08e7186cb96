use pstore_crypto::{decrypt, encrypt, sniff_mime, LinkKey};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt(bencher: divan::Bencher, size: usize) {
    let key = LinkKey::generate();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt(divan::black_box(key.as_bytes()), divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt(bencher: divan::Bencher, size: usize) {
    let key = LinkKey::generate();
    let data = make_data(size);
    let blob = encrypt(key.as_bytes(), &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| decrypt(divan::black_box(key.as_bytes()), divan::black_box(&blob)).unwrap());
}

#[divan::bench]
fn bench_sniff_mime(bencher: divan::Bencher) {
    let data = make_data(512);
    bencher.bench(|| sniff_mime(divan::black_box(&data)));
}

fn main() {
    divan::main();
}
