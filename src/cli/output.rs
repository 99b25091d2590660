//! Output formatting for the `components` listing
//!
//! JSON for scripts, an aligned table for people.

use anyhow::{Context, Result};
use std::fmt::Write as _;

use crate::cli::commands::OutputFormatArg;
use crate::component::Components;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Human,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Human => OutputFormat::Human,
        }
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self, components: &Components) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(components)
                .context("Failed to serialize components to JSON"),
            OutputFormat::Human => Ok(format_human(components)),
        }
    }
}

fn format_human(components: &Components) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "PACKAGERS ({})", components.packagers.len());
    for p in &components.packagers {
        let _ = writeln!(out, "  {}", p.key());
    }

    let _ = writeln!(out, "\nDETECTIVES ({})", components.detectives.len());
    for d in &components.detectives {
        let _ = writeln!(
            out,
            "  {:<40} {:<12} -> {}",
            d.key(),
            d.category.as_str(),
            d.related
        );
    }

    let _ = writeln!(out, "\nPROVISIONERS ({})", components.provisioners.len());
    for p in &components.provisioners {
        let _ = writeln!(out, "  {:<40} {}", p.key(), p.category.as_str());
    }

    if components.is_empty() {
        out.push_str("\nNo v2c components are installed.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Detective, Packager, Provisioner};

    fn sample() -> Components {
        Components {
            packagers: vec![Packager::new("v2c/packager", "1")],
            detectives: vec![Detective::new("v2c/ubuntu-detective", "1", "os", "v2c/ubuntu-provisioner:1")],
            provisioners: vec![Provisioner::new("v2c/ubuntu-provisioner", "1", "os")],
        }
    }

    #[test]
    fn test_format_json() {
        let output = OutputFormatter::new(OutputFormat::Json)
            .format(&sample())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["detectives"][0]["category"], "os");
        assert_eq!(value["detectives"][0]["related"], "v2c/ubuntu-provisioner:1");
        assert_eq!(value["packagers"][0]["repository"], "v2c/packager");
    }

    #[test]
    fn test_format_human() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format(&sample())
            .unwrap();
        assert!(output.contains("PACKAGERS (1)"));
        assert!(output.contains("v2c/ubuntu-detective:1"));
        assert!(output.contains("-> v2c/ubuntu-provisioner:1"));
        assert!(!output.contains("No v2c components"));
    }

    #[test]
    fn test_format_human_empty() {
        let output = OutputFormatter::new(OutputFormat::Human)
            .format(&Components::default())
            .unwrap();
        assert!(output.contains("No v2c components are installed."));
    }

    #[test]
    fn test_format_from_arg() {
        assert_eq!(OutputFormat::from(OutputFormatArg::Json), OutputFormat::Json);
        assert_eq!(OutputFormat::from(OutputFormatArg::Human), OutputFormat::Human);
    }
}
