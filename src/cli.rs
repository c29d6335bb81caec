use crate::replay::SettingsPatch;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "caption-relay",
    version,
    about = "Caption Relay - live caption translation and meeting minutes"
)]
pub(crate) struct CliArgs {
    /// Enable debug mode with verbose logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Replay a JSON-lines caption script through the translation pipeline
    Replay {
        /// Path to the script
        script: PathBuf,
    },
    /// Show the stored settings
    Status,
    /// Change stored settings
    Set(SetArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct SetArgs {
    /// OpenAI API key
    #[arg(long)]
    pub api_key: Option<String>,

    /// Target language code (e.g. ja, en)
    #[arg(long)]
    pub target_lang: Option<String>,

    /// Chat-completion model
    #[arg(long)]
    pub model: Option<String>,

    /// Accumulate translations for meeting minutes
    #[arg(long)]
    pub minutes: Option<bool>,

    /// Recipient of the minutes email draft
    #[arg(long)]
    pub recipient: Option<String>,

    /// Overlay text color
    #[arg(long)]
    pub color: Option<String>,

    /// Translate captions
    #[arg(long)]
    pub translate: Option<bool>,
}

impl From<SetArgs> for SettingsPatch {
    fn from(args: SetArgs) -> Self {
        SettingsPatch {
            api_key: args.api_key,
            target_lang: args.target_lang,
            model: args.model,
            minutes_enabled: args.minutes,
            minutes_recipient: args.recipient,
            overlay_color: args.color,
            translate_enabled: args.translate,
        }
    }
}
