//! 4-bit R-2R DAC whose bit inputs are external voltage sources.
//!
//! Each `vaN` source is a Rust closure producing the N-th bit of a quantized
//! 100 kHz cosine. The ladder output and the bit inputs are written to stdout
//! as CSV.
//!
//! ```text
//! cargo run --example dac_external_sources > dac.csv
//! ```

use std::f64::consts::PI;
use std::io;

use ohmlink::{output, Engine};

const BITS: u32 = 4;
const R: f64 = 50.0;
const TONE_HZ: f64 = 100e3;
const V_HIGH: f64 = 1.0;

/// Square wave in [0, `V_HIGH`]: bit `n` of the `BITS`-bit quantized cosine.
fn bit_source(n: u32) -> impl Fn(f64) -> f64 + Send + Sync + 'static {
    move |t| {
        let levels = f64::from((1u32 << BITS) - 1);
        let x = (2.0 * PI * TONE_HZ * t).cos();
        let code = ((x + 1.0) * levels / 2.0).round() as u32;
        f64::from((code >> n) & 1) * V_HIGH
    }
}

fn netlist() -> Vec<String> {
    let mut lines = vec!["R-2R network with external sources".to_string()];
    for n in 0..BITS {
        let rail = if n == 0 { 2.0 * R } else { R };
        lines.push(format!("r{n}_0 {} {n} {rail}", n + 1));
        lines.push(format!("r{n}_1 a{n} {} {}", n + 1, 2.0 * R));
        lines.push(format!("va{n} a{n} 0 dc 0 external"));
    }
    lines.push(".tran 10n 20u".into());
    lines.push(".end".into());
    lines
}

fn main() -> ohmlink::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let engine = Engine::new()?;
    for n in 0..BITS {
        engine.add_external_source(&format!("va{n}"), bit_source(n))?;
    }

    let results = engine.simulate(netlist())?;
    let Some(plot) = engine.current_plot() else {
        eprintln!("simulation produced no plot");
        return Ok(());
    };
    let tran = &results.data[plot.as_str()];

    if let (Some(time), Some(out)) = (tran.real("time"), tran.real(&BITS.to_string())) {
        let peak = out.iter().cloned().fold(f64::MIN, f64::max);
        eprintln!(
            "{} points over {:.1} us, output peak {:.3} V",
            time.len(),
            time.last().copied().unwrap_or(0.0) * 1e6,
            peak
        );
    }

    output::write_plot_csv(tran, &mut io::stdout())?;
    Ok(())
}
