use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rollcall_core::{OnnxFaceEncoder, ARCFACE_MODEL_FILE, SCRFD_MODEL_FILE};
use rollcall_hw::Camera;
use rollcall_store::{ExportOutcome, ReportExporter, SqliteStore};
use std::path::PathBuf;

mod dataset;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance tooling")]
struct Cli {
    /// SQLite attendance database
    #[arg(long, global = true, env = "ROLLCALL_DB_PATH", default_value = "attendance.db")]
    db: PathBuf,

    /// Gallery artifact (face encodings and names)
    #[arg(long, global = true, env = "ROLLCALL_GALLERY_PATH", default_value = "encodings.json")]
    gallery: PathBuf,

    /// Directory holding the ONNX face models
    #[arg(long, global = true, env = "ROLLCALL_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Manage registered students
    Student {
        #[command(subcommand)]
        action: StudentAction,
    },
    /// Build the face gallery
    Gallery {
        #[command(subcommand)]
        action: GalleryAction,
    },
    /// Export the attendance report for a day
    Report {
        /// Day to export, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// List V4L2 capture devices
    Devices,
}

#[derive(Subcommand)]
enum DbAction {
    /// Create the students and attendance tables
    Init,
}

#[derive(Subcommand)]
enum StudentAction {
    /// Register a student
    Add {
        /// Name as it appears in the gallery
        #[arg(short, long)]
        name: String,
        /// Unique enrollment number
        #[arg(short, long)]
        enrollment: String,
    },
    /// List registered students
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum GalleryAction {
    /// Encode one face per image in a dataset directory
    Build {
        /// Directory of `<name>.<ext>` photos
        #[arg(short, long)]
        dataset: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Db {
            action: DbAction::Init,
        } => {
            open_store(&cli.db)?;
            println!("Initialized {}", cli.db.display());
        }
        Commands::Student { action } => match action {
            StudentAction::Add { name, enrollment } => {
                let mut store = open_store(&cli.db)?;
                let id = store
                    .add_student(&name, &enrollment)
                    .with_context(|| format!("could not register {name}"))?;
                println!("Registered {name} ({enrollment}) as #{id}");
            }
            StudentAction::List { json } => {
                let store = open_store(&cli.db)?;
                let students = store.list_students()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&students)?);
                } else if students.is_empty() {
                    println!("No students registered");
                } else {
                    println!("{:<6} {:<16} NAME", "ID", "ENROLLMENT");
                    for s in students {
                        println!("{:<6} {:<16} {}", s.id, s.enrollment_number, s.name);
                    }
                }
            }
        },
        Commands::Gallery {
            action: GalleryAction::Build { dataset },
        } => {
            let model_dir = cli
                .model_dir
                .clone()
                .unwrap_or_else(rollcall_core::default_model_dir);
            let mut encoder = OnnxFaceEncoder::load(
                &model_dir.join(SCRFD_MODEL_FILE).to_string_lossy(),
                &model_dir.join(ARCFACE_MODEL_FILE).to_string_lossy(),
            )
            .with_context(|| format!("failed to load models from {}", model_dir.display()))?;

            let samples = dataset::collect_samples(&dataset)?;
            println!("Encoding {} images from {}", samples.len(), dataset.display());
            let (gallery, stats) = dataset::build_gallery(&mut encoder, &samples)?;
            gallery
                .save(&cli.gallery)
                .with_context(|| format!("could not write {}", cli.gallery.display()))?;

            println!(
                "Saved {} encodings for {} identities to {} ({} without a face, {} unreadable)",
                stats.encoded,
                gallery.identity_count(),
                cli.gallery.display(),
                stats.no_face,
                stats.unreadable
            );
        }
        Commands::Report { date, out_dir } => {
            let day = date.unwrap_or_else(|| chrono::Local::now().date_naive());
            let store = open_store(&cli.db)?;
            match ReportExporter::new(out_dir).export(&store, day)? {
                ExportOutcome::Written { path, rows } => {
                    println!("Wrote {rows} records to {}", path.display());
                }
                ExportOutcome::NoRecords => println!("No attendance recorded on {day}"),
            }
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No V4L2 capture devices found");
            }
            for d in devices {
                println!("{}  {} [{}] {}", d.path, d.name, d.driver, d.bus);
            }
        }
    }

    Ok(())
}

fn open_store(path: &std::path::Path) -> Result<SqliteStore> {
    let store = SqliteStore::open(path)
        .with_context(|| format!("could not open database {}", path.display()))?;
    store.init_schema()?;
    Ok(store)
}
