//! Benchmarks for the worker pool and tarball extraction.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ddc::threading::{Job, WorkerPool};
use ddc::utils::archive::{create_tar_gz, extract_tar_gz};
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Pool overhead for many small jobs at different worker counts
fn bench_pool_small_jobs(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_pool_small_jobs");
    let job_count = 1_000u64;
    group.throughput(Throughput::Elements(job_count));

    for workers in [1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.iter(|| {
                let sum = Arc::new(AtomicU64::new(0));
                let mut pool = WorkerPool::new(workers, usize::MAX).unwrap();
                for i in 0..job_count {
                    let sum = Arc::clone(&sum);
                    pool.add_job(Job::new(format!("job-{}", i), move || {
                        sum.fetch_add(black_box(i), Ordering::Relaxed);
                        Ok(())
                    }))
                    .unwrap();
                }
                pool.process_and_wait().unwrap();
                sum.load(Ordering::Relaxed)
            });
        });
    }

    group.finish();
}

/// Extracting node-sized tarballs through the pool
fn bench_parallel_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_extraction");
    group.sample_size(10);

    let source = TempDir::new().unwrap();
    let tarballs = TempDir::new().unwrap();
    let mut paths = Vec::new();
    for node in 0..8 {
        let payload = source.path().join(format!("node-{}", node));
        fs::create_dir_all(payload.join("logs")).unwrap();
        for f in 0..20 {
            fs::write(payload.join(format!("logs/server-{}.log", f)), "INFO request served\n".repeat(500)).unwrap();
        }
        let path = tarballs.path().join(format!("node-{}.tar.gz", node));
        create_tar_gz(&payload, fs::File::create(&path).unwrap()).unwrap();
        paths.push(path);
    }

    for workers in [1usize, 4] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &workers| {
            b.iter(|| {
                let staging = TempDir::new().unwrap();
                let mut pool = WorkerPool::new(workers, usize::MAX).unwrap();
                for path in &paths {
                    let path = path.clone();
                    let dest = staging.path().to_path_buf();
                    pool.add_job(Job::new(path.display().to_string(), move || {
                        extract_tar_gz(&path, &dest).map(|_| ())
                    }))
                    .unwrap();
                }
                pool.process_and_wait().unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pool_small_jobs, bench_parallel_extraction);
criterion_main!(benches);
