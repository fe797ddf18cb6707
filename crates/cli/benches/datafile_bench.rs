use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use datafile::{DataFile, HEADER_BYTES};
use model::{Billboard, BillboardSerializer, Record};
use std::path::Path;
use tempfile::tempdir;

const N: usize = 5_000;

fn tree(i: usize) -> Record<Billboard> {
    let x = i as f32;
    Record::new(
        format!("tree-{:06}", i),
        i as i64,
        Billboard::new([x, x * 0.5, 0.0], 4.0, 12.0, "textures/oak.png"),
    )
}

fn populated(path: &Path) -> Vec<u64> {
    let data = DataFile::open(path, BillboardSerializer).unwrap();
    let offsets = (0..N).map(|i| data.add(tree(i)).unwrap()).collect();
    data.close().unwrap();
    offsets
}

fn datafile_add_and_close(c: &mut Criterion) {
    c.bench_function("datafile_add_close_5k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let data = DataFile::open(dir.path().join("bench.bin"), BillboardSerializer).unwrap();
                (dir, data)
            },
            |(_dir, data)| {
                for i in 0..N {
                    data.add(tree(i)).unwrap();
                }
                data.close().unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

fn datafile_get_cold(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.bin");
    let offsets = populated(&path);

    c.bench_function("datafile_get_cold_5k", |b| {
        b.iter_batched(
            || DataFile::open(&path, BillboardSerializer).unwrap(),
            |data| {
                for offset in &offsets {
                    criterion::black_box(data.get(*offset).unwrap());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn datafile_read_range(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.bin");
    let offsets = populated(&path);
    let data = DataFile::open(&path, BillboardSerializer).unwrap();
    let end = data.size();

    c.bench_function("datafile_read_all_5k", |b| {
        b.iter(|| {
            let (env, records) = data
                .read_all_from_file(HEADER_BYTES..end, &offsets, None, None)
                .unwrap();
            criterion::black_box((env, records.len()))
        });
    });
}

criterion_group!(
    benches,
    datafile_add_and_close,
    datafile_get_cold,
    datafile_read_range,
);

criterion_main!(benches);
