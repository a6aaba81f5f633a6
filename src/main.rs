use mathpractice::composer::{self, ComposeOptions, NewContentCriteria, SessionCompositionConfig, SessionCompositionResult, WeakAreaCriteria};
use mathpractice::rng::Xorshift64Rng;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: mathpractice <command> [args...]");
        eprintln!("Commands:");
        eprintln!("  plan [-n COUNT] [-s SEED]   Compose a demo session and print it as JSON");
        eprintln!("  serve [-p PORT]             Start the demonstration JSON API (default port 3000)");
        std::process::exit(1);
    }

    match args[1].as_str() {
        "plan" => {
            let (count, seed) = parse_plan_args(&args[2..]);
            plan(count, seed);
        }
        "serve" => {
            let port = parse_port_arg(&args[2..]);
            tokio::runtime::Runtime::new()
                .unwrap()
                .block_on(mathpractice::web::serve(port));
        }
        _ => {
            eprintln!("Unknown command: {}", args[1]);
            eprintln!("Commands: plan, serve");
            std::process::exit(1);
        }
    }
}

fn parse_plan_args(args: &[String]) -> (u32, u64) {
    let mut count = 20u32;
    let mut seed = 42u64;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-n" if i + 1 < args.len() => {
                count = parse_u32_arg(&args[i + 1]);
                i += 2;
            }
            "-s" if i + 1 < args.len() => {
                seed = parse_u64_arg(&args[i + 1]);
                i += 2;
            }
            other => {
                eprintln!("Unrecognized argument: {other}");
                std::process::exit(1);
            }
        }
    }
    (count, seed)
}

fn parse_port_arg(args: &[String]) -> u16 {
    let mut port = 3000u16;
    let mut i = 0;
    while i < args.len() {
        if args[i] == "-p" && i + 1 < args.len() {
            port = args[i + 1].parse().unwrap_or_else(|_| {
                eprintln!("Invalid port: {}", args[i + 1]);
                std::process::exit(1);
            });
            i += 2;
        } else {
            eprintln!("Unrecognized argument: {}", args[i]);
            std::process::exit(1);
        }
    }
    port
}

fn parse_u32_arg(s: &str) -> u32 {
    s.parse().unwrap_or_else(|_| {
        eprintln!("Invalid number: {s}");
        std::process::exit(1);
    })
}

fn parse_u64_arg(s: &str) -> u64 {
    s.parse().unwrap_or_else(|_| {
        eprintln!("Invalid number: {s}");
        std::process::exit(1);
    })
}

/// Composes one session against the in-memory demo catalog and prints the
/// resulting plan (or error) as pretty JSON. A stand-in for the real CLI an
/// embedding app would build against the library (no persistence here).
fn plan(count: u32, seed: u64) {
    let (registry, skills) = mathpractice::demo::build_demo_catalog();
    let mut rng = Xorshift64Rng::new(seed);

    let config = SessionCompositionConfig {
        new_content_percent: 40,
        review_content_percent: 30,
        weak_area_percent: 20,
        random_percent: 10,
        total_exercises: count,
    };

    let result = composer::compose_session(ComposeOptions {
        user_id: "cli-demo-user".to_string(),
        grade_range: mathpractice::curriculum::GradeRange::Middle,
        competency_area_id: None,
        config,
        new_content_criteria: NewContentCriteria {
            max_attempts: 3,
            min_days_since_last_practice: 14.0,
        },
        weak_area_criteria: WeakAreaCriteria {
            max_mastery_level: 40.0,
            min_attempts: 3,
        },
        skills: &skills,
        registry: &registry,
        now: chrono::Utc::now(),
        rng: &mut rng,
    });

    match result {
        SessionCompositionResult::Success { plan } => {
            println!("{}", serde_json::to_string_pretty(&plan).unwrap());
        }
        SessionCompositionResult::InsufficientData { message, .. } => {
            eprintln!("Insufficient data: {message}");
            std::process::exit(1);
        }
        SessionCompositionResult::Error { message } => {
            eprintln!("Error: {message}");
            std::process::exit(1);
        }
    }
}
