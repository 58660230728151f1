//! Engine version banner parsing.
//!
//! `version -f` prints a banner such as:
//!
//! ```text
//! ******
//! ** ngspice-42 : Circuit level simulation program
//! ** Compiled with KLU Direct Linear Solver
//! ** The U. C. Berkeley CIDER Simulator
//! ** CIDER 1.b1 (CODECS simulator) included
//! ** XSPICE extensions included
//! ** Compiled with OpenMP support
//! ******
//! ```

use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::space0;
use nom::sequence::preceded;
use nom::IResult;
use nom::Parser;

/// What the loaded engine reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineVersion {
    /// e.g. `"42"` for ngspice-42.
    pub engine: String,
    /// CIDER device simulator version, when built in.
    pub cider: Option<String>,
    pub xspice: bool,
    pub openmp: bool,
}

/// Scan banner lines. Lines that are not part of the banner are ignored.
/// Returns `None` if no `ngspice-<version>` line was seen.
pub fn parse_banner<'a>(lines: impl IntoIterator<Item = &'a str>) -> Option<EngineVersion> {
    let mut version = EngineVersion::default();
    let mut seen = false;

    for line in lines {
        let line = line.trim();
        if let Ok((_, v)) = engine_line(line) {
            version.engine = v.to_string();
            seen = true;
        } else if let Ok((_, v)) = cider_line(line) {
            version.cider = Some(v.to_string());
        } else if let Ok((rest, _)) = banner_prefix(line) {
            if rest.starts_with("XSPICE") {
                version.xspice = true;
            } else if rest.contains("OpenMP") {
                version.openmp = true;
            }
        }
    }

    seen.then_some(version)
}

fn banner_prefix(input: &str) -> IResult<&str, &str> {
    (tag("**"), space0).map(|(t, _)| t).parse(input)
}

fn version_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace() && c != ':').parse(input)
}

/// `** ngspice-42 : Circuit level simulation program`
fn engine_line(input: &str) -> IResult<&str, &str> {
    preceded((banner_prefix, tag("ngspice-")), version_token).parse(input)
}

/// `** CIDER 1.b1 (CODECS simulator) included`
fn cider_line(input: &str) -> IResult<&str, &str> {
    preceded((banner_prefix, tag("CIDER"), space0), version_token).parse(input)
}
