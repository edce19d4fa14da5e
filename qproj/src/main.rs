use std::process::exit;
use std::time::Instant;

use clap::Parser;
use log::info;

use qproj::{DriverConfig, ProjectionDriver, Qdimacs};

/// Approximate existential projection of a qdimacs instance
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Params {
    /// the input qdimacs file, with exactly one existential quantifier block
    #[arg(short, long)]
    input_file: String,
    /// largest allowed support set size while clumping cnf factors
    #[arg(short, long, default_value_t = 50)]
    largest_support_set: usize,
    /// max clauses allowed in a reported counterexample certificate
    #[arg(short = 'm', long, default_value_t = 10)]
    max_muc_size: usize,
    /// weight given to pairs implicated by a counterexample
    #[arg(short = 'w', long, default_value_t = 0.5)]
    muc_merge_weight: f64,
    /// also compute the exact projection and compare
    #[arg(short, long)]
    compute_exact: bool,
}

fn main() {
    env_logger::init();
    let Params {
        input_file,
        largest_support_set,
        max_muc_size,
        muc_merge_weight,
        compute_exact,
    } = Params::parse();

    let start = Instant::now();
    let qdimacs = match Qdimacs::read_file(&input_file) {
        Ok(qdimacs) => qdimacs,
        Err(e) => {
            eprintln!("cannot read {input_file}: {e}");
            exit(1);
        }
    };
    info!(
        "parsed {} with {} variables and {} clauses",
        input_file,
        qdimacs.num_variables,
        qdimacs.clauses.len()
    );

    let config = DriverConfig {
        largest_support_set,
        muc_merge_weight,
        max_muc_size,
    };
    let mut driver = match ProjectionDriver::new(qdimacs, config) {
        Ok(driver) => driver,
        Err(e) => {
            eprintln!("cannot project {input_file}: {e}");
            exit(1);
        }
    };
    info!(
        "initial candidate over {} factors and {} variables in {:.3} seconds",
        driver.num_factors(),
        driver.num_variables(),
        start.elapsed().as_secs_f32()
    );

    if compute_exact {
        let exact = driver.exact_result();
        let exactness = if driver.candidate() == exact {
            "exact"
        } else {
            "strictly over-approximate"
        };
        info!("initial candidate is {exactness}");
    }

    let mut master = driver.build_master();
    master.enumerate(&mut driver);

    let duration = start.elapsed();
    println!("Duration:    {:.3} seconds", duration.as_secs_f32());
    println!("Refinements: {}", driver.refinements());
    if compute_exact {
        let exact = driver.exact_result();
        println!("Exact:       {}", driver.candidate() == exact);
    }
    println!("Done");
}
