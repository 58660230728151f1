//! Results output formatting (CSV).

use std::io::Write;

use crate::error::Result;
use crate::results::{Plot, Results, VectorData};
use crate::units::VectorType;

/// Write one plot as CSV, one column per real vector.
///
/// Complex vectors get a magnitude and a phase column. Vectors shorter than
/// the longest one (e.g. scalars next to a sweep) leave their cells empty.
///
/// Format:
/// ```csv
/// frequency,V(out)_mag,V(out)_phase_deg
/// 1000,0.995,-5.7
/// 10000,0.707,-45.0
/// ```
pub fn write_plot_csv<W: Write>(plot: &Plot<VectorData>, writer: &mut W) -> Result<()> {
    // Header row
    let mut first = true;
    for (name, data) in plot.iter() {
        if !first {
            write!(writer, ",")?;
        }
        first = false;
        match data {
            VectorData::Real(_) => write!(writer, "{}", name)?,
            VectorData::Complex(_) => write!(writer, "{}_mag,{}_phase_deg", name, name)?,
        }
    }
    writeln!(writer)?;

    // Data rows
    let rows = plot.iter().map(|(_, d)| d.len()).max().unwrap_or(0);
    for row in 0..rows {
        let mut first = true;
        for (_, data) in plot.iter() {
            if !first {
                write!(writer, ",")?;
            }
            first = false;
            match data {
                VectorData::Real(v) => {
                    if let Some(x) = v.get(row) {
                        write!(writer, "{}", x)?;
                    }
                }
                VectorData::Complex(v) => match v.get(row) {
                    Some(c) => write!(writer, "{},{}", c.norm(), c.arg().to_degrees())?,
                    None => write!(writer, ",")?,
                },
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Write the `name,unit,type` table of one plot.
pub fn write_units_csv<W: Write>(plot: &Plot<VectorType>, writer: &mut W) -> Result<()> {
    writeln!(writer, "Vector,Unit,Type")?;
    for (name, ty) in plot.iter() {
        writeln!(writer, "{},{},{}", name, ty.unit(), ty.name())?;
    }
    Ok(())
}

/// Write every plot, each preceded by a `# plot <name>` line.
pub fn write_results_csv<W: Write>(results: &Results, writer: &mut W) -> Result<()> {
    for (name, plot) in results.data.iter() {
        writeln!(writer, "# plot {}", name)?;
        write_plot_csv(plot, writer)?;
        writeln!(writer)?;
    }
    for skipped in &results.skipped {
        writeln!(
            writer,
            "# skipped {}.{}: {}",
            skipped.plot, skipped.vector, skipped.reason
        )?;
    }
    Ok(())
}

/// Write every plot's unit table, each preceded by a `# units <name>` line.
pub fn write_results_units_csv<W: Write>(results: &Results, writer: &mut W) -> Result<()> {
    for (name, plot) in results.units.iter() {
        writeln!(writer, "# units {}", name)?;
        write_units_csv(plot, writer)?;
        writeln!(writer)?;
    }
    Ok(())
}
