use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "linksort",
    version,
    about = "Extract, categorize, and merge hyperlinks into a Markdown index"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
    Normalize(WorkArgs),
    Categorize(ConfigArgs),
    Snippets(ConfigArgs),
    DryRun(MergeArgs),
    Merge(MergeArgs),
    Qa(ConfigArgs),
    Pipeline(PipelineArgs),
}

#[derive(Args, Debug, Clone)]
pub struct WorkArgs {
    #[arg(long, default_value = "temp")]
    pub work_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long, default_value = ".source.html")]
    pub source: PathBuf,

    #[arg(long, default_value = "temp")]
    pub work_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(long, default_value = "temp")]
    pub work_dir: PathBuf,

    #[arg(long, default_value = "config/categories.yml")]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    #[arg(long, default_value = "temp")]
    pub work_dir: PathBuf,

    #[arg(long, default_value = "config/categories.yml")]
    pub config: PathBuf,

    #[arg(long, default_value = "index.md")]
    pub target: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    #[arg(long, default_value = ".source.html")]
    pub source: PathBuf,

    #[arg(long, default_value = "temp")]
    pub work_dir: PathBuf,

    #[arg(long, default_value = "config/categories.yml")]
    pub config: PathBuf,

    #[arg(long, default_value = "index.md")]
    pub target: PathBuf,
}

impl PipelineArgs {
    pub fn extract(&self) -> ExtractArgs {
        ExtractArgs {
            source: self.source.clone(),
            work_dir: self.work_dir.clone(),
        }
    }

    pub fn work(&self) -> WorkArgs {
        WorkArgs {
            work_dir: self.work_dir.clone(),
        }
    }

    pub fn config_args(&self) -> ConfigArgs {
        ConfigArgs {
            work_dir: self.work_dir.clone(),
            config: self.config.clone(),
        }
    }

    pub fn merge(&self) -> MergeArgs {
        MergeArgs {
            work_dir: self.work_dir.clone(),
            config: self.config.clone(),
            target: self.target.clone(),
        }
    }
}
