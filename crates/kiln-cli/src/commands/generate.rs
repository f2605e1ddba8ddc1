//! 3D model generation command

use anyhow::{Context, Result};
use kiln_gen::config::env_help;
use kiln_gen::materialize::ArtifactKind;
use kiln_gen::{
    timestamped_output_dir, GenerationRequest, Generator, KilnConfig, ProviderKind, RawInputs,
    RunOutcome, ViewKind,
};
use std::path::PathBuf;

pub struct GenerateArgs {
    pub prompt: Option<String>,
    pub image: Option<PathBuf>,
    pub image_url: Option<String>,
    pub left: Option<PathBuf>,
    pub right: Option<PathBuf>,
    pub back: Option<PathBuf>,
    pub output: PathBuf,
    pub poll_interval: Option<u64>,
    pub timeout: Option<u64>,
    pub provider: Option<String>,
    pub no_timestamp: bool,
}

pub fn run(args: GenerateArgs) -> Result<()> {
    // Validate before touching config or the network
    let request = build_request(&args)?;

    let mut config = KilnConfig::load().context("Failed to load .kiln/config.toml")?;
    apply_overrides(&mut config, &args)?;

    if config.credential_pair().is_none() {
        eprintln!("{}", env_help());
        anyhow::bail!("Tencent Cloud credentials not configured");
    }

    let output_dir = if args.no_timestamp {
        args.output.clone()
    } else {
        timestamped_output_dir(&args.output)
    };

    let generator = Generator::from_config(config.clone())?;

    let input = request.input();
    println!("Generating 3D model via {}...", generator.provider_name());
    println!("  Input: {} = {}", input.input_type(), input.input_value());
    for view in request.views() {
        println!("  View: {} = {}", view.view, view.path.display());
    }
    println!(
        "  Polling every {}s (backoff up to {}s), timeout {}s",
        config.generation.poll_interval_secs,
        config.generation.max_poll_interval_secs,
        config.generation.timeout_secs
    );
    println!("  Output: {}", output_dir.display());

    let outcome = generator.generate(&request, &output_dir)?;
    print_outcome(&outcome);

    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn build_request(args: &GenerateArgs) -> Result<GenerationRequest> {
    let input = RawInputs {
        prompt: args.prompt.clone(),
        image: args.image.clone(),
        image_url: args.image_url.clone(),
    }
    .validate()?;

    let mut request = GenerationRequest::new(input);
    let views = [
        (ViewKind::Left, &args.left),
        (ViewKind::Right, &args.right),
        (ViewKind::Back, &args.back),
    ];
    for (view, path) in views {
        if let Some(path) = path {
            request = request.with_view(view, path)?;
        }
    }
    Ok(request)
}

fn apply_overrides(config: &mut KilnConfig, args: &GenerateArgs) -> Result<()> {
    if let Some(provider) = &args.provider {
        config.generation.provider = provider.parse::<ProviderKind>()?;
    }
    if let Some(secs) = args.poll_interval {
        if secs == 0 {
            anyhow::bail!("--poll-interval must be at least 1 second");
        }
        config.generation.poll_interval_secs = secs;
    }
    if let Some(secs) = args.timeout {
        config.generation.timeout_secs = secs;
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    println!();
    println!("Job {}: {}", outcome.job_id, outcome.status);

    if !outcome.is_success() {
        eprintln!(
            "Generation failed: {}",
            outcome.error_message.as_deref().unwrap_or("Unknown error")
        );
        println!("  Record: {}", outcome.record_path.display());
        return;
    }

    println!(
        "  Downloaded {} file(s) in {:.1}s",
        outcome.files.len(),
        outcome.elapsed.as_secs_f64()
    );
    for file in &outcome.files {
        let label = match file.kind() {
            ArtifactKind::Mesh => "mesh",
            ArtifactKind::Material => "material",
            ArtifactKind::Texture => "texture",
            ArtifactKind::Other => "other",
        };
        println!("    [{}] {} ({} bytes)", label, file.name, file.size);
    }
    match &outcome.canonical {
        Some(path) => println!("  Model: {}", path.display()),
        None => println!("  Model: no .obj file in result"),
    }
    println!("  Record: {}", outcome.record_path.display());
}
