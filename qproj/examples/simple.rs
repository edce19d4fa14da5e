use qproj::{DriverConfig, ProjectionDriver, Qdimacs};

/// Projects a small hard-coded instance and prints what the refinement
/// loop did. Run with `RUST_LOG=info cargo run --example simple` to watch
/// the feedback between the enumerator and the merge engine.
fn main() {
    env_logger::init();

    // ∃{1,2}. (1 ∨ 3) ∧ (¬1 ∨ 4) ∧ (2 ∨ ¬3) ∧ (¬2 ∨ ¬4)
    let instance = "p cnf 4 4\n\
                    e 1 2 0\n\
                    1 3 0\n\
                    -1 4 0\n\
                    2 -3 0\n\
                    -2 -4 0\n";
    let qdimacs = Qdimacs::parse(instance.as_bytes()).unwrap();

    let config = DriverConfig {
        largest_support_set: 4,
        ..Default::default()
    };
    let mut driver = ProjectionDriver::new(qdimacs, config).unwrap();

    let mut master = driver.build_master();
    master.enumerate(&mut driver);

    let candidate = driver.candidate();
    let exact = driver.exact_result();
    println!("refinements: {}", driver.refinements());
    println!("exact:       {}", candidate == exact);
}
