//! Reads `{"image": "<base64>"}` from stdin and prints the ranked fonts as a
//! single JSON object on stdout. Logs go to stderr.

use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser;
use font_classify::config::Settings;
use font_classify::{
    predict, prepare, FontPrediction, OnnxClassifier, Request, Response, Result,
    TransformationPipeline,
};
use tracing::{error, info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML settings file (default: ./font-classify.toml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn init_tracing(level: Level) {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
}

fn run(settings: &Settings) -> Result<Vec<FontPrediction>> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    let request = Request::from_json(&input)?;
    info!(?request, "read request");

    let tensor = prepare(&request.image, &TransformationPipeline::default())?;
    let classifier = OnnxClassifier::load(&settings.model_source())?;
    let mapping = settings.font_mapping()?;
    predict(tensor, &classifier, &mapping, settings.top_k)
}

fn main() {
    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref());
    let level = match &settings {
        Ok(settings) => settings.log_level,
        Err(_) => Level::WARN,
    };
    init_tracing(level);

    let result = settings.and_then(|settings| run(&settings));
    if let Err(err) = &result {
        error!(kind = ?err.kind(), "{err}");
    }
    let response: Response = result.into();
    println!("{}", response.to_json());
}
