use anyhow::{bail, Context, Result};
use clap::Parser;
use grabcut::input::{FileSource, ImageSource};
use grabcut::output::{CutoutFile, MaskFile, MatteFile, OutputSink};
use grabcut::{GrabCutConfig, GrabCutSession, PixelClass, Rect};
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input image path
    input: String,

    /// Bounding rectangle of the object as x,y,width,height
    #[arg(short, long, value_parser = parse_rect)]
    rect: Rect,

    /// Number of iterations to run
    #[arg(short = 'c', long, default_value_t = 1)]
    iterations: usize,

    /// Mixture components per class model
    #[arg(short = 'k', long, default_value_t = 5)]
    clusters: usize,

    /// Smoothness strength of the pairwise term
    #[arg(long, default_value_t = 50.0)]
    gamma: f64,

    /// Foreground seed as x,y (repeatable)
    #[arg(long = "fg-seed", value_parser = parse_point)]
    fg_seeds: Vec<(u32, u32)>,

    /// Background seed as x,y (repeatable)
    #[arg(long = "bg-seed", value_parser = parse_point)]
    bg_seeds: Vec<(u32, u32)>,

    /// Radius of the brush painted around each seed
    #[arg(long, default_value_t = 3)]
    brush_radius: u32,

    /// Output path for the foreground cutout
    #[arg(short, long, default_value = "result.png")]
    output: String,

    /// Optional output path for the binary mask
    #[arg(long)]
    mask_output: Option<String>,

    /// Optional output path for a grayscale view of all four matte labels
    #[arg(long)]
    matte_output: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn parse_numbers<const N: usize>(value: &str) -> std::result::Result<[u32; N], String> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {} comma-separated values, got '{}'", N, value));
    }
    let mut out = [0u32; N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part
            .parse()
            .map_err(|e| format!("invalid number '{}': {}", part, e))?;
    }
    Ok(out)
}

fn parse_rect(value: &str) -> std::result::Result<Rect, String> {
    let [x, y, width, height] = parse_numbers::<4>(value)?;
    Ok(Rect::new(x, y, width, height))
}

fn parse_point(value: &str) -> std::result::Result<(u32, u32), String> {
    let [x, y] = parse_numbers::<2>(value)?;
    Ok((x, y))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    if args.iterations == 0 {
        bail!("--iterations must be at least 1");
    }

    tracing::info!("GrabCut starting");
    tracing::info!(
        "Rect: {},{} {}x{}",
        args.rect.x,
        args.rect.y,
        args.rect.width,
        args.rect.height
    );
    tracing::info!("Iterations: {}, clusters: {}", args.iterations, args.clusters);

    let mut source = FileSource::new(&args.input);
    let image = source
        .load()
        .with_context(|| format!("Failed to load {}", source.describe()))?;

    let config = GrabCutConfig {
        components: args.clusters,
        gamma: args.gamma,
        ..Default::default()
    };
    let mut session = GrabCutSession::initialize(image, args.rect, config)
        .context("Failed to initialize segmentation")?;

    let seeds = args
        .fg_seeds
        .iter()
        .map(|&p| (p, PixelClass::Foreground))
        .chain(args.bg_seeds.iter().map(|&p| (p, PixelClass::Background)));
    for ((x, y), class) in seeds {
        session
            .add_stroke(x, y, args.brush_radius, class)
            .with_context(|| format!("Failed to add {} seed at {},{}", class, x, y))?;
    }

    let start = Instant::now();
    for _ in 0..args.iterations {
        let iteration_start = Instant::now();
        let report = session
            .run_iteration()
            .context("Segmentation iteration failed")?;
        tracing::debug!(
            "Iteration {} took {:.1}ms",
            report.iteration,
            iteration_start.elapsed().as_secs_f64() * 1000.0
        );
    }
    tracing::info!(
        "Finished {} iterations in {:.1}ms",
        args.iterations,
        start.elapsed().as_secs_f64() * 1000.0
    );

    let mut sinks: Vec<Box<dyn OutputSink>> = vec![Box::new(CutoutFile::new(&args.output))];
    if let Some(mask_path) = &args.mask_output {
        sinks.push(Box::new(MaskFile::new(mask_path)));
    }
    if let Some(matte_path) = &args.matte_output {
        sinks.push(Box::new(MatteFile::new(matte_path)));
    }
    for sink in &mut sinks {
        sink.write(session.image(), session.current_matte())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_argument_parses() {
        assert_eq!(parse_rect("1, 2,30,40").unwrap(), Rect::new(1, 2, 30, 40));
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("a,2,3,4").is_err());
    }

    #[test]
    fn point_argument_parses() {
        assert_eq!(parse_point("7,9").unwrap(), (7, 9));
        assert!(parse_point("7").is_err());
    }
}
