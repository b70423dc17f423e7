use criterion::{black_box, criterion_group, criterion_main, Criterion};
use davsync::core::build_plan;
use davsync::FsEntry;

fn tree(dirs: usize, files_per_dir: usize, size: u64) -> Vec<FsEntry> {
    let mut entries = Vec::with_capacity(dirs * (files_per_dir + 1));
    for d in 0..dirs {
        let dir = format!("d{:04}/sub{}", d, d % 7);
        entries.push(FsEntry::dir(format!("d{:04}", d), 0));
        entries.push(FsEntry::dir(&dir, 0));
        for f in 0..files_per_dir {
            entries.push(FsEntry::file(format!("{}/f{:04}.dat", dir, f), 0, size + f as u64));
        }
    }
    // 反转，让排序有事可做
    entries.reverse();
    entries
}

fn bench_build_plan(c: &mut Criterion) {
    let origin = tree(200, 50, 1024);
    let target = tree(180, 50, 1000);

    c.bench_function("build_plan 10k entries", |b| {
        b.iter(|| build_plan(black_box(origin.clone()), black_box(target.clone())).unwrap())
    });

    c.bench_function("build_plan in sync", |b| {
        b.iter(|| build_plan(black_box(origin.clone()), black_box(origin.clone())).unwrap())
    });
}

criterion_group!(benches, bench_build_plan);
criterion_main!(benches);
