use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use flowmat::{
    BlockMatrix, BlockVector, DenseKernels, FaerKernels, NativeKernels, SerialExchange,
    SparsityPattern,
};

fn bench_block_invert(c: &mut Criterion) {
    let n = 5;
    let a: Vec<f64> = (0..n * n)
        .map(|i| if i % (n + 1) == 0 { 10.0 } else { (i as f64).sin() })
        .collect();
    let mut inv = vec![0.0; n * n];

    c.bench_function("native 5x5 invert", |ben| {
        let k = NativeKernels::new();
        ben.iter(|| k.invert(n, black_box(&a), black_box(&mut inv)))
    });

    c.bench_function("faer 5x5 invert", |ben| {
        let k = FaerKernels::new();
        ben.iter(|| k.invert(n, black_box(&a), black_box(&mut inv)))
    });
}

fn bench_spmv(c: &mut Criterion) {
    let n = 10_000;
    let nvar = 5;
    let neighbors: Vec<Vec<usize>> = (0..n)
        .map(|i| {
            let mut nb = Vec::new();
            if i > 0 {
                nb.push(i - 1);
            }
            if i + 1 < n {
                nb.push(i + 1);
            }
            nb
        })
        .collect();
    let pattern = SparsityPattern::from_adjacency(n, &neighbors).unwrap();
    let mut a = BlockMatrix::<f64>::new();
    a.initialize(Arc::clone(&pattern), nvar, nvar).unwrap();
    let block: Vec<f64> =
        (0..nvar * nvar).map(|i| if i % (nvar + 1) == 0 { 4.0 } else { -0.1 }).collect();
    for i in 0..n {
        for &j in pattern.cols(i) {
            a.set_block(i, j, &block);
        }
    }

    let x = BlockVector::from_slice(n, n, nvar, &vec![1.0; n * nvar]).unwrap();
    let mut y = BlockVector::new(n, n, nvar);
    let mut ex = SerialExchange::new();

    c.bench_function("bcsr matvec 10k x 5", |ben| {
        ben.iter(|| a.mat_vec_product(black_box(&x), black_box(&mut y), &mut ex).unwrap())
    });

    #[cfg(feature = "rayon")]
    flowmat::init_thread_pool();
    #[cfg(feature = "rayon")]
    c.bench_function("bcsr matvec 10k x 5 rayon", |ben| {
        ben.iter(|| {
            a.mat_vec_product_parallel(black_box(&x), black_box(&mut y), &mut ex).unwrap()
        })
    });

    let mut row_out = vec![0.0; nvar];
    c.bench_function("block row product", |ben| {
        ben.iter(|| a.row_product(black_box(&x), black_box(n / 2), &mut row_out))
    });
}

criterion_group!(benches, bench_block_invert, bench_spmv);
criterion_main!(benches);
