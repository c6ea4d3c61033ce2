//! # TermsIo — Input/Output Terms File Header Parsing
//!
//! The three header shapes spec §6.1 names: `ABC <template> // Sieved to
//! <pmin>`, `ABCD <template> [<start>] // Sieved to <pmin>`, and the
//! NewPGen numeric prefix `<pmin>:<flag>:<mode>:<base>:<code>`. Parsing the
//! header is generic; the per-family body line shape (`$a*%u^$b+$c` vs.
//! `(%u^$a$b)^2-2` vs. a bare `k` per line) is not — each family's
//! `write_terms`/`apply_prefactored` owns its own body format and calls
//! into this module only for the common header.
//!
//! Grounded in the source's header `sscanf`s, e.g.
//! `carol_kynea/CarolKyneaApp.cpp`'s
//! `"ABC (%u^$a$b)^2-2"` / `"... // Sieved to %llu"` and
//! `cunningham_chain/CunninghamChainApp.cpp`'s NewPGen
//! `"%llu:1:%u:%u:1066"` family of numeric prefixes.

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderShape {
    /// `ABC <template> // Sieved to <pmin>`
    Abc { template: String },
    /// `ABCD <template> [<start>] // Sieved to <pmin>`
    Abcd { template: String, start: i64 },
    /// `<pmin>:<flag>:<mode>:<base>:<code>` (NewPGen numeric prefix).
    NewPGen {
        flag: char,
        mode: u32,
        base: u32,
        code: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    pub shape: HeaderShape,
    pub pmin: u64,
}

/// Parse the first line of an input terms file (spec §6.1).
pub fn parse_header(first_line: &str) -> Result<ParsedHeader, CoreError> {
    let line = first_line.trim_end();

    if let Some(rest) = line.strip_prefix("ABCD ") {
        let (template_and_start, pmin) = split_sieved_to(rest)?;
        let (template, start) = split_bracketed_start(template_and_start)?;
        return Ok(ParsedHeader {
            shape: HeaderShape::Abcd {
                template: template.trim().to_string(),
                start,
            },
            pmin,
        });
    }

    if let Some(rest) = line.strip_prefix("ABC ") {
        let (template, pmin) = split_sieved_to(rest)?;
        return Ok(ParsedHeader {
            shape: HeaderShape::Abc {
                template: template.trim().to_string(),
            },
            pmin,
        });
    }

    parse_newpgen_prefix(line)
}

fn split_sieved_to(rest: &str) -> Result<(&str, u64), CoreError> {
    let marker = "// Sieved to ";
    let pos = rest.find(marker).ok_or_else(|| {
        CoreError::ParseError(format!("missing '// Sieved to' marker in header: {}", rest))
    })?;
    let template = &rest[..pos];
    let pmin_str = rest[pos + marker.len()..].trim();
    let pmin = pmin_str
        .parse::<u64>()
        .map_err(|_| CoreError::ParseError(format!("invalid pmin in header: {}", pmin_str)))?;
    Ok((template, pmin))
}

fn split_bracketed_start(template_and_start: &str) -> Result<(&str, i64), CoreError> {
    let open = template_and_start
        .find('[')
        .ok_or_else(|| CoreError::ParseError("ABCD header missing [start]".to_string()))?;
    let close = template_and_start[open..]
        .find(']')
        .map(|i| i + open)
        .ok_or_else(|| CoreError::ParseError("ABCD header missing closing ]".to_string()))?;
    let start = template_and_start[open + 1..close]
        .trim()
        .parse::<i64>()
        .map_err(|_| CoreError::ParseError("ABCD start is not an integer".to_string()))?;
    Ok((&template_and_start[..open], start))
}

fn parse_newpgen_prefix(line: &str) -> Result<ParsedHeader, CoreError> {
    let parts: Vec<&str> = line.split(':').collect();
    if parts.len() != 5 {
        return Err(CoreError::ParseError(format!(
            "header is neither ABC, ABCD, nor a 5-field NewPGen prefix: {}",
            line
        )));
    }
    let pmin = parts[0]
        .parse::<u64>()
        .map_err(|_| CoreError::ParseError("invalid NewPGen pmin".to_string()))?;
    let flag = parts[1]
        .chars()
        .next()
        .ok_or_else(|| CoreError::ParseError("empty NewPGen flag field".to_string()))?;
    let mode = parts[2]
        .parse::<u32>()
        .map_err(|_| CoreError::ParseError("invalid NewPGen mode".to_string()))?;
    let base = parts[3]
        .parse::<u32>()
        .map_err(|_| CoreError::ParseError("invalid NewPGen base".to_string()))?;
    let code = parts[4]
        .parse::<u32>()
        .map_err(|_| CoreError::ParseError("invalid NewPGen code".to_string()))?;
    Ok(ParsedHeader {
        shape: HeaderShape::NewPGen {
            flag,
            mode,
            base,
            code,
        },
        pmin,
    })
}

/// Render an `ABC <template> // Sieved to <pmin>` header line, the
/// counterpart to `parse_header`'s `HeaderShape::Abc` branch.
pub fn format_abc_header(template: &str, largest_prime: u64) -> String {
    format!("ABC {} // Sieved to {}\n", template, largest_prime)
}

/// Render an `ABCD <template> [<start>] // Sieved to <pmin>` header line.
pub fn format_abcd_header(template: &str, start: i64, largest_prime: u64) -> String {
    format!(
        "ABCD {} [{}] // Sieved to {}\n",
        template, start, largest_prime
    )
}
