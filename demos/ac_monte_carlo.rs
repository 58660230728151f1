//! Monte Carlo AC sweep of a non-inverting amplifier with a feedback pole.
//!
//! R1, R2 and C2 are drawn around their nominal values with a 5% standard
//! deviation. Every run's gain curve is written to stdout as CSV (one column
//! per sample) and the DC gain spread is summarised on stderr. The engine is
//! reset every ten runs to bound ngspice's per-run memory growth.
//!
//! ```text
//! cargo run --example ac_monte_carlo -- 100 > gains.csv
//! ```

use std::io::{self, Write};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use ohmlink::Engine;

const R1: f64 = 100e3;
const R2: f64 = 100e3;
const C2: f64 = 1e-12;
const RESET_EVERY: usize = 10;

fn netlist(r1: f64, r2: f64, c2: f64) -> Vec<String> {
    vec![
        "Non-inverting amplifier with single pole".into(),
        "vin in 0 dc 0 ac 1".into(),
        format!("r2 out 1 {:e}", r2),
        format!("c2 out 1 {:e}", c2),
        format!("r1 1 0 {:e}", r1),
        // Single-pole op-amp: 100 dB open-loop gain, 10 Hz corner.
        "eamp 2 0 in 1 1e5".into(),
        "ramp 2 out 1k".into(),
        "camp out 0 15.9u".into(),
        ".ac dec 10 1k 10meg".into(),
        ".end".into(),
    ]
}

fn db(re: f64, im: f64) -> f64 {
    20.0 * re.hypot(im).log10()
}

fn main() -> ohmlink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let runs: usize = std::env::args()
        .nth(1)
        .and_then(|a| a.parse().ok())
        .unwrap_or(50);

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let tolerance = Normal::new(1.0, 0.05).map_err(|e| ohmlink::OhmlinkError::Config(e.to_string()))?;

    let mut engine = Engine::new()?;
    let mut frequency = Vec::new();
    let mut curves: Vec<Vec<f64>> = Vec::with_capacity(runs);

    for n in 0..runs {
        if n > 0 && n % RESET_EVERY == 0 {
            engine.reset()?;
            eprintln!("{:>5.1}%", 100.0 * n as f64 / runs as f64);
        }

        let (r1, r2, c2) = (
            R1 * tolerance.sample(&mut rng),
            R2 * tolerance.sample(&mut rng),
            C2 * tolerance.sample(&mut rng),
        );
        let results = engine.simulate(netlist(r1, r2, c2))?;
        let Some(plot) = engine.current_plot() else {
            continue;
        };
        let ac = &results.data[plot.as_str()];

        if frequency.is_empty() {
            frequency = ac.real("frequency").map(<[f64]>::to_vec).unwrap_or_default();
        }
        if let Some(out) = ac.complex("out") {
            curves.push(out.iter().map(|c| db(c.re, c.im)).collect());
        }
    }

    let dc: Vec<f64> = curves.iter().filter_map(|c| c.first().copied()).collect();
    if !dc.is_empty() {
        let mean = dc.iter().sum::<f64>() / dc.len() as f64;
        let var = dc.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / dc.len() as f64;
        eprintln!(
            "DC gain over {} samples: mean {:.3} dB, std dev {:.3} dB",
            dc.len(),
            mean,
            var.sqrt()
        );
    }

    let mut out = io::stdout().lock();
    write!(out, "frequency")?;
    for i in 0..curves.len() {
        write!(out, ",gain_db_{}", i)?;
    }
    writeln!(out)?;
    for (row, f) in frequency.iter().enumerate() {
        write!(out, "{}", f)?;
        for curve in &curves {
            match curve.get(row) {
                Some(g) => write!(out, ",{}", g)?,
                None => write!(out, ",")?,
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
