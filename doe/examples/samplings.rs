use ndarray::{arr2, array};
use ndarray_rand::rand::SeedableRng;
use podrom_doe::{lhs_sample, Lhs, LhsKind, SamplingMethod};
use rand_xoshiro::Xoshiro256Plus;

fn main() {
    let xlimits = arr2(&[[0., 1.], [-10., 10.], [5., 15.]]);
    let n = 10;

    println!("Take {} samples in", n);
    println!("{}\n", xlimits);

    println!("*** using centered latin hypercube sampling");
    let samples = Lhs::new(&xlimits).kind(LhsKind::Centered).sample(n);
    println!("{}\n", samples);

    println!("*** using classic latin hypercube sampling with a seeded generator");
    let samples = Lhs::new(&xlimits)
        .kind(LhsKind::Classic)
        .with_rng(Xoshiro256Plus::seed_from_u64(42))
        .sample(n);
    println!("{}\n", samples);

    println!("*** using bounds vectors");
    let samples = lhs_sample(n, &array![0., 100.], &array![1., 200.], 1111).expect("valid bounds");
    println!("{}\n", samples);
}
