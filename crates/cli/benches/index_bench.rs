use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use indexfile::IndexFile;
use tempfile::tempdir;

const N: usize = 10_000;

fn index_add_and_close(c: &mut Criterion) {
    c.bench_function("index_add_close_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let index = IndexFile::open(dir.path().join("bench.idx")).unwrap();
                (dir, index)
            },
            |(_dir, index)| {
                let mut position = 8u64;
                for i in 0..N {
                    index.add_id(&format!("id-{:06}", i), position);
                    position += 120;
                }
                index.close().unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

fn index_open_scan(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.idx");
    {
        let index = IndexFile::open(&path).unwrap();
        for i in 0..N {
            index.add_id(&format!("id-{:06}", i), 8 + i as u64 * 120);
        }
        index.close().unwrap();
    }

    c.bench_function("index_open_scan_10k", |b| {
        b.iter(|| criterion::black_box(IndexFile::open(&path).unwrap().len()));
    });
}

fn index_lookup(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let index = IndexFile::open(dir.path().join("bench.idx")).unwrap();
    for i in 0..N {
        index.add_id(&format!("id-{:06}", i), 8 + i as u64 * 120);
    }

    c.bench_function("index_lookup_10k", |b| {
        b.iter(|| {
            for i in 0..N {
                let id = format!("id-{:06}", i);
                criterion::black_box(index.position_for_id(&id));
            }
        });
    });
}

criterion_group!(benches, index_add_and_close, index_open_scan, index_lookup);

criterion_main!(benches);
