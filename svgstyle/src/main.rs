use clap::{Parser, ValueEnum};
use log::{error, info};
use std::fs;
use std::path::Path;
use svgstyle_lib::svgstyle_generate::svg_style;
use svgstyle_lib::{Document, Environment, StyleContext};
use url::Url;

const SVGSTYLE_INTRO: &str = r#"
                           _         _
     _____   ____ _ ___| |_ _   _| | ___
    / __\ \ / / _` / __| __| | | | |/ _ \
    \__ \\ V / (_| \__ \ |_| |_| | |  __/
    |___/ \_/ \__, |___/\__|\__, |_|\___|
              |___/         |___/

    svgstyle - computed CSS styles for SVG documents
"#;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Media {
    Screen,
    Print,
}

#[derive(Parser)]
#[command(name = "svgstyle")]
#[command(about = "Print the computed CSS style of SVG elements")]
struct Args {
    /// Input SVG file.
    input: String,

    /// Only resolve the element with this id.
    #[arg(short, long)]
    element: Option<String>,

    /// Viewport width in CSS pixels.
    #[arg(long, default_value_t = 800.0)]
    width: f32,

    /// Viewport height in CSS pixels.
    #[arg(long, default_value_t = 600.0)]
    height: f32,

    #[arg(long, value_enum, default_value_t = Media::Screen)]
    media: Media,

    /// Skip the banner.
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    env_logger::init();

    // parse the args given in terminal
    let args: Args = Args::parse();
    if !args.quiet {
        println!("{}", SVGSTYLE_INTRO);
    }

    let svg_content = match fs::read_to_string(&args.input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading SVG file: {}", e);
            std::process::exit(1);
        }
    };

    // relative stylesheet links resolve against the input file
    let document_url = fs::canonicalize(Path::new(&args.input))
        .ok()
        .and_then(|path| Url::from_file_path(path).ok());
    let document = match Document::parse_str(&svg_content, document_url) {
        Ok(document) => document,
        Err(e) => {
            error!("cannot parse {}: {}", args.input, e);
            std::process::exit(1);
        }
    };

    let env = match args.media {
        Media::Screen => Environment::screen(args.width, args.height),
        Media::Print => Environment::print(args.width, args.height),
    };
    info!("resolving against {:?}", env);
    let ctx = StyleContext::new(env);

    match svg_style::generate_for_document(&document, &ctx, args.element.as_deref()) {
        Ok(styles) if styles.is_empty() => {
            eprintln!("No matching element found.");
            std::process::exit(1);
        }
        Ok(styles) => print!("{}", svg_style::render(&styles)),
        Err(e) => {
            eprintln!("Error resolving styles: {}", e);
            std::process::exit(1);
        }
    }
}
