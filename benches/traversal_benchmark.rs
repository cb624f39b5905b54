use boxtree::tools::make_normal_particle_array;
use boxtree::{TraversalBuilder, TreeBuilder, TreeBuilderOptions};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

pub fn build_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    group.sample_size(20);

    for npoints in [10000, 100000] {
        let sources = make_normal_particle_array::<f64, 3>(npoints, 0);
        let mut options = TreeBuilderOptions::default();
        options.set_max_particles_in_box(30);
        let tree_builder = TreeBuilder::new(options);

        group.bench_function(format!("Tree of {} points", npoints), |b| {
            b.iter(|| black_box(tree_builder.build(&sources, None).unwrap()))
        });

        let (tree, _) = tree_builder.build(&sources, None).unwrap();
        let traversal_builder = TraversalBuilder::default();

        group.bench_function(
            format!("Traversal of {} boxes ({} points)", tree.nboxes(), npoints),
            |b| b.iter(|| black_box(traversal_builder.build(&tree).unwrap())),
        );
    }
    group.finish();
}

criterion_group!(benches, build_benchmark);
criterion_main!(benches);
