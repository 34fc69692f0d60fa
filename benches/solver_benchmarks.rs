use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use famg_solver::matrix::Coo;
use famg_solver::params::ItsParam;
use famg_solver::solver::{self, IdentityPreconditioner};
use famg_solver::types::Precision;

/// A 1D Dirichlet Laplacian, the standard SPD test problem for the
/// Krylov family and AMG alike.
fn laplacian(n: usize) -> famg_solver::matrix::Csr {
    let mut triplets = Vec::with_capacity(3 * n);
    for i in 0..n {
        triplets.push((i, i, 2.0));
        if i > 0 {
            triplets.push((i, i - 1, -1.0));
        }
        if i + 1 < n {
            triplets.push((i, i + 1, -1.0));
        }
    }
    Coo::from_triplets(n, n, triplets).to_csr().unwrap()
}

fn rhs(n: usize) -> Vec<Precision> {
    (0..n).map(|i| 1.0 + i as Precision * 0.1).collect()
}

/// A mildly nonsymmetric tridiagonal matrix, BiCGStab's actual target:
/// seeding its shadow residual from `r0` makes a symmetric matrix prone to
/// an exact Lanczos-like breakdown partway through.
fn nonsymmetric(n: usize) -> famg_solver::matrix::Csr {
    let mut triplets = Vec::with_capacity(3 * n);
    for i in 0..n {
        triplets.push((i, i, 2.05));
        if i > 0 {
            triplets.push((i, i - 1, -1.0));
        }
        if i + 1 < n {
            triplets.push((i, i + 1, -0.9));
        }
    }
    Coo::from_triplets(n, n, triplets).to_csr().unwrap()
}

fn benchmark_cg(c: &mut Criterion) {
    let mut group = c.benchmark_group("cg_laplacian");
    for size in [50usize, 200, 800] {
        let a = laplacian(size);
        let b = rhs(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| {
                let mut x = vec![0.0; size];
                let mut m = IdentityPreconditioner;
                let param = ItsParam::cg(1e-8, 2000);
                let stats = solver::solve(black_box(&a), black_box(&b), &mut x, &mut m, &param).unwrap();
                black_box(stats);
            });
        });
    }
    group.finish();
}

fn benchmark_bicgstab(c: &mut Criterion) {
    let mut group = c.benchmark_group("bicgstab_nonsymmetric");
    for size in [50usize, 200, 800] {
        let a = nonsymmetric(size);
        let b = rhs(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| {
                let mut x = vec![0.0; size];
                let mut m = IdentityPreconditioner;
                let param = ItsParam::bicgstab(1e-8, 2000);
                let stats = solver::solve(black_box(&a), black_box(&b), &mut x, &mut m, &param).unwrap();
                black_box(stats);
            });
        });
    }
    group.finish();
}

fn benchmark_amg_preconditioned_cg(c: &mut Criterion) {
    use famg_solver::amg::{AmgHierarchy, AmgPreconditioner};
    use famg_solver::params::AmgParam;

    let mut group = c.benchmark_group("amg_preconditioned_cg");
    for size in [200usize, 800, 3200] {
        let a = laplacian(size);
        let b = rhs(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bencher, _| {
            bencher.iter(|| {
                let mut x = vec![0.0; size];
                let hierarchy = AmgHierarchy::setup(&a, &AmgParam::default()).unwrap();
                let mut m = AmgPreconditioner::new(hierarchy);
                let param = ItsParam::cg(1e-8, 200);
                let stats = solver::solve(black_box(&a), black_box(&b), &mut x, &mut m, &param).unwrap();
                black_box(stats);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_cg, benchmark_bicgstab, benchmark_amg_preconditioned_cg);
criterion_main!(benches);
