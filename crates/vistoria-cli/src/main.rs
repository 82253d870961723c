use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use vistoria_contracts::events::EventWriter;
use vistoria_contracts::inspection::{report_txt_key, CombinedAnalysis, SessionState};
use vistoria_engine::report::digest_body;
use vistoria_engine::{
    AnalysisProvider, BlobStore, GeminiProvider, InspectionPipeline, LocalStore, OfflineProvider,
};

#[derive(Debug, Parser)]
#[command(name = "vistoria", version, about = "Assistente de vistoria veicular")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analisa as imagens, gera o laudo e grava os relatórios
    Run(RunArgs),
    /// Pergunta sobre uma vistoria já concluída
    Ask(AskArgs),
}

#[derive(Debug, Parser)]
struct RunArgs {
    /// Imagens do veículo, na ordem de envio
    #[arg(required = true)]
    images: Vec<PathBuf>,
    /// Diretório raiz do armazenamento de objetos
    #[arg(long, default_value = "storage")]
    storage: PathBuf,
    /// Caminho do log de eventos (padrão: junto aos relatórios)
    #[arg(long)]
    events: Option<PathBuf>,
    /// Modelo remoto a usar
    #[arg(long)]
    model: Option<String>,
    /// Ignora o serviço remoto e usa apenas o analisador local
    #[arg(long)]
    offline: bool,
    /// Abre um chat de perguntas após a análise
    #[arg(long)]
    interactive: bool,
}

#[derive(Debug, Parser)]
struct AskArgs {
    /// ID da vistoria concluída
    inspection_id: String,
    /// Pergunta para o vistoriador
    question: String,
    #[arg(long, default_value = "storage")]
    storage: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    offline: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("vistoria error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_inspection(args),
        Command::Ask(args) => run_ask(args),
    }
}

fn build_pipeline(storage: &Path, model: Option<String>, offline: bool) -> InspectionPipeline {
    let primary: Box<dyn AnalysisProvider> = if offline {
        Box::new(OfflineProvider::new())
    } else {
        match model {
            Some(model) => Box::new(GeminiProvider::with_model(model)),
            None => Box::new(GeminiProvider::new()),
        }
    };
    InspectionPipeline::new(
        primary,
        Box::new(OfflineProvider::new()),
        Box::new(LocalStore::new(storage)),
    )
}

fn events_path(explicit: Option<PathBuf>, storage: &Path, inspection_id: &str) -> PathBuf {
    explicit.unwrap_or_else(|| {
        storage
            .join("reports")
            .join(inspection_id)
            .join("events.jsonl")
    })
}

fn run_inspection(args: RunArgs) -> Result<i32> {
    let mut session = SessionState::new();
    for path in &args.images {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .with_context(|| format!("invalid image path {}", path.display()))?
            .to_string();
        let bytes =
            fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
        session.add_image(filename, bytes);
    }

    let pipeline = build_pipeline(&args.storage, args.model, args.offline);
    let events = EventWriter::new(
        events_path(args.events, &args.storage, &session.inspection_id),
        session.inspection_id.clone(),
    );

    println!("Vistoria {}", session.inspection_id);
    let outcome = pipeline.run(&mut session, &events)?;

    for note in &outcome.degradations {
        eprintln!("aviso: serviço remoto indisponível ({note}); usado analisador local");
    }
    println!();
    println!("{}", outcome.combined.text);
    println!();
    if let Some(pdf) = &outcome.locators.pdf {
        println!("Relatório PDF: {pdf}");
    }
    if let Some(txt) = &outcome.locators.txt {
        println!("Relatório TXT: {txt}");
    }

    if args.interactive {
        chat_loop(&pipeline, &mut session, &events)?;
    }
    Ok(0)
}

fn run_ask(args: AskArgs) -> Result<i32> {
    let store = LocalStore::new(&args.storage);
    let digest_bytes = store
        .get(&report_txt_key(&args.inspection_id))
        .with_context(|| format!("no stored report for inspection {}", args.inspection_id))?;
    let digest = String::from_utf8(digest_bytes).context("stored digest is not valid UTF-8")?;
    let Some(analysis_text) = digest_body(&digest) else {
        bail!(
            "stored digest for inspection {} has an unexpected layout",
            args.inspection_id
        );
    };

    let mut session = SessionState::with_id(args.inspection_id.clone());
    session.combined = Some(CombinedAnalysis {
        text: analysis_text,
        tier: None,
    });

    let pipeline = build_pipeline(&args.storage, args.model, args.offline);
    let events = EventWriter::new(
        events_path(args.events, &args.storage, &args.inspection_id),
        args.inspection_id,
    );
    let answer = pipeline.answer(&mut session, &events, &args.question)?;
    println!("{answer}");
    Ok(0)
}

fn chat_loop(
    pipeline: &InspectionPipeline,
    session: &mut SessionState,
    events: &EventWriter,
) -> Result<()> {
    println!();
    println!("Faça perguntas sobre a vistoria (linha vazia ou 'sair' encerra).");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() || question.eq_ignore_ascii_case("sair") {
            break;
        }
        let answer = pipeline.answer(session, events, question)?;
        println!("{answer}");
    }
    Ok(())
}
