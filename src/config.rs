use crate::engine::EngineOptions;
use crate::error::OcrError;
use crate::preprocessing::Preset;
use crate::Args;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub engine: Option<String>,
    pub language: String,
    pub page_seg_mode: u32,
    pub preserve_interword_spaces: bool,
    pub preprocess: Preset,
    pub warm_up: bool,
    pub tessdata_path: Option<String>,
}

impl Config {
    /// Engine pass-through options derived from this configuration
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            language: self.language.clone(),
            page_seg_mode: self.page_seg_mode,
            preserve_interword_spaces: self.preserve_interword_spaces,
            tessdata_path: self.tessdata_path.clone(),
        }
    }
}

impl TryFrom<Args> for Config {
    type Error = OcrError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let preprocess = Preset::from_str(&args.preprocess).ok_or_else(|| {
            OcrError::Configuration(format!("Unknown preprocessing preset: {}", args.preprocess))
        })?;

        Ok(Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            engine: args.engine,
            language: args.language,
            page_seg_mode: args.page_seg_mode,
            preserve_interword_spaces: args.preserve_interword_spaces,
            preprocess,
            warm_up: args.warm_up,
            tessdata_path: args.tessdata_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults_match_upload_contract() {
        let args = Args::try_parse_from(["image-to-text-server"]).unwrap();
        let config = Config::try_from(args).unwrap();

        assert_eq!(config.max_file_size, 5 * 1024 * 1024);
        assert_eq!(config.page_seg_mode, 3);
        assert!(config.preserve_interword_spaces);
        assert_eq!(config.preprocess, Preset::Default);
        assert!(!config.warm_up);
    }

    #[test]
    fn test_rejects_unknown_preset() {
        let args =
            Args::try_parse_from(["image-to-text-server", "--preprocess", "extreme"]).unwrap();
        assert!(matches!(
            Config::try_from(args),
            Err(OcrError::Configuration(_))
        ));
    }

    #[test]
    fn test_whitespace_preservation_can_be_disabled() {
        let args = Args::try_parse_from([
            "image-to-text-server",
            "--preserve-interword-spaces",
            "false",
        ])
        .unwrap();
        let config = Config::try_from(args).unwrap();
        assert!(!config.engine_options().preserve_interword_spaces);
    }
}
