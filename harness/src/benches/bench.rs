use criterion::criterion_main;


criterion_main!(run_path::benches, weighted_choice::benches);
