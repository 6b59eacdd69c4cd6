use criterion::{black_box, criterion_group, criterion_main, Criterion};
use qt_dense::DenseTensor;
use qt_groups::AnyQuantity;
use qt_tensor::{BTensor, BTensorShape};

fn two_leg_shape(sections: usize, section_size: usize) -> BTensorShape {
    let dim = (0..sections).map(|k| (section_size, AnyQuantity::z(k as i16))).collect();
    BTensorShape::new(vec![dim; 2], AnyQuantity::z(0))
}

fn dense_matrix(sections: usize, section_size: usize) -> BTensor {
    let shape = two_leg_shape(sections, section_size);
    let mut t = BTensor::new(shape);
    for k in 0..sections {
        *t.block(&vec![k, k]).unwrap() = DenseTensor::rand(&[section_size, section_size]);
    }
    t
}

fn bench_tensordot(c: &mut Criterion) {
    let a = dense_matrix(6, 8);
    let b = dense_matrix(6, 8);
    c.bench_function("tensordot_block_diagonal", |bencher| {
        bencher.iter(|| a.tensordot(black_box(&b), &[1], &[0]).unwrap());
    });
}

fn bench_reshape(c: &mut Criterion) {
    let a = dense_matrix(6, 8);
    c.bench_function("reshape_merge_both_legs", |bencher| {
        bencher.iter(|| a.reshape(black_box(&[vec![0, 1]])).unwrap());
    });
}

fn bench_scale_add(c: &mut Criterion) {
    let a = dense_matrix(6, 8);
    let b = dense_matrix(6, 8);
    c.bench_function("scale_add_block_diagonal", |bencher| {
        bencher.iter(|| a.scale_add(0.5, black_box(&b), -0.5).unwrap());
    });
}

criterion_group!(benches, bench_tensordot, bench_reshape, bench_scale_add);
criterion_main!(benches);
