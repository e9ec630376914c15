//! The `imagetale run` command: run the pipeline over image files.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use imagetale_core::config::StoryFailurePolicy;
use imagetale_core::output::OutputFormat as CoreOutputFormat;
use imagetale_core::{Config, ImageInput, OutputWriter, Pipeline, ProgressReporter, RunReport, Stage};
use indicatif::{ProgressBar, ProgressStyle};

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image files to process, one run each
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Report format written to stdout
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Directory for saved images and audio
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Store every run in its own subdirectory
    #[arg(long)]
    pub per_run_dirs: bool,

    /// Do not keep a copy of the input image
    #[arg(long)]
    pub no_save_image: bool,

    /// Stop a run when story generation fails instead of speaking the fallback text
    #[arg(long)]
    pub abort_on_story_failure: bool,

    /// Write the speech service response without checking it is audio
    #[arg(long)]
    pub unvalidated_speech: bool,
}

/// Report formats.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Pretty JSON per run
    Json,
    /// One JSON object per line
    Jsonl,
}

impl RunArgs {
    /// Fold command-line overrides into the loaded config.
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.output_dir {
            config.output.dir = dir.clone();
        }
        if self.per_run_dirs {
            config.output.per_run_dirs = true;
        }
        if self.no_save_image {
            config.output.save_image = false;
        }
        if self.abort_on_story_failure {
            config.story.on_failure = StoryFailurePolicy::Abort;
        }
        if self.unvalidated_speech {
            config.speech.validate_response = false;
        }
    }
}

/// Execute the run command.
pub async fn execute(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    let pipeline = Pipeline::from_config(&config)?;

    let total = args.images.len();
    let progress = StageProgress::new(total);

    let stdout = io::stdout();
    let mut writer = match args.format {
        OutputFormat::Text => None,
        OutputFormat::Json => Some(OutputWriter::new(stdout.lock(), CoreOutputFormat::Json)),
        OutputFormat::Jsonl => Some(OutputWriter::new(
            stdout.lock(),
            CoreOutputFormat::JsonLines,
        )),
    };

    let mut failed = 0usize;
    for (index, path) in args.images.iter().enumerate() {
        progress.set_image(path);

        let image = match ImageInput::from_path(path).await {
            Ok(image) => image,
            Err(e) => {
                progress.bar.suspend(|| tracing::error!("Cannot read {}: {e}", path.display()));
                progress.finish_image(index);
                failed += 1;
                continue;
            }
        };

        match pipeline.run(image, &progress).await {
            Ok(report) => progress.bar.suspend(|| -> io::Result<()> {
                match writer.as_mut() {
                    Some(writer) => {
                        writer.write(&report)?;
                        writer.flush()
                    }
                    None => {
                        let mut out = io::stdout().lock();
                        write!(out, "{}", render_text(&report))?;
                        out.flush()
                    }
                }
            })?,
            Err(e) => {
                failed += 1;
                progress.bar.suspend(|| {
                    eprintln!("{}: {e}", path.display());
                    if let Some(caption) = &e.partial.caption {
                        eprintln!("  caption was: {caption}");
                    }
                });
            }
        }
        progress.finish_image(index);
    }

    progress.bar.finish_and_clear();

    if failed > 0 {
        anyhow::bail!("{failed} of {total} run(s) failed");
    }
    Ok(())
}

/// Human-readable report.
fn render_text(report: &RunReport) -> String {
    let mut out = format!("{}\n", report.image_file);
    out.push_str(&format!("  Caption: {}\n", report.caption));
    out.push_str(&format!("  Story:   {}\n", report.narrative.text()));
    if let Some(reason) = report.narrative.fallback_reason() {
        out.push_str(&format!("  (story generation failed: {reason})\n"));
    }
    out.push_str(&format!(
        "  Audio:   {} ({} bytes)\n",
        report.audio_path.display(),
        report.audio_size
    ));
    out.push_str(&format!("  Time:    {}ms\n", report.timings.total_ms()));
    out
}

/// Progress bar advancing one tick per finished stage.
struct StageProgress {
    bar: ProgressBar,
}

impl StageProgress {
    fn new(images: usize) -> Self {
        let bar = ProgressBar::new((images * Stage::ALL.len()) as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:30.cyan/blue}] {msg}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    fn set_image(&self, path: &std::path::Path) {
        self.bar.set_prefix(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
    }

    /// Move to the end of image `index`, covering stages a failed run never reached.
    fn finish_image(&self, index: usize) {
        let end = ((index + 1) * Stage::ALL.len()) as u64;
        if self.bar.position() < end {
            self.bar.set_position(end);
        }
    }
}

impl ProgressReporter for StageProgress {
    fn stage_started(&self, stage: Stage) {
        self.bar
            .set_message(format!("{}: {}", self.bar.prefix(), stage_label(stage)));
    }

    fn stage_finished(&self, _stage: Stage, _elapsed: Duration) {
        self.bar.inc(1);
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Input => "checking image",
        Stage::Caption => "captioning",
        Stage::Story => "writing story",
        Stage::Speech => "synthesizing speech",
    }
}
