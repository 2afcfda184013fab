use super::core::ChunkpipeConfig;
use anyhow::Result;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    Json,
    Toml,
    Yaml,
}

impl ConfigFormat {
    fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
        }
    }
}

impl ChunkpipeConfig {
    /// Export the merged configuration in the given format
    pub fn export_config(&self, format: ConfigFormat) -> Result<String> {
        let config: serde_json::Value = self.get_full_config()?;

        let output = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(&config)?,
            ConfigFormat::Toml => toml::to_string_pretty(&config)?,
            ConfigFormat::Yaml => serde_yml::to_string(&config)?,
        };

        Ok(output)
    }

    /// Export with syntax highlighting when stdout is a terminal
    pub fn export_config_highlighted(&self, format: ConfigFormat) -> Result<String> {
        use syntect::easy::HighlightLines;
        use syntect::highlighting::Style;
        use syntect::util::{LinesWithEndings, as_24_bit_terminal_escaped};
        use two_face::theme::EmbeddedThemeName;
        use two_face::{syntax, theme};

        let output = self.export_config(format)?;

        if !std::io::stdout().is_terminal() {
            return Ok(output);
        }

        let ps = syntax::extra_newlines();
        let ts = theme::extra();
        let syntax = ps
            .find_syntax_by_extension(format.extension())
            .unwrap_or_else(|| ps.find_syntax_plain_text());

        let mut h = HighlightLines::new(syntax, ts.get(EmbeddedThemeName::Base16OceanDark));
        let mut highlighted = String::new();

        for line in LinesWithEndings::from(&output) {
            let ranges: Vec<(Style, &str)> = h.highlight_line(line, &ps)?;
            highlighted.push_str(&as_24_bit_terminal_escaped(&ranges[..], false));
        }

        Ok(highlighted)
    }
}
