//! Interface de linha de comando do revloop baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (review, refine, debug)
//! e flags globais (--max-attempts, --export-traces, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// revloop — revisão, pontuação e correção de código com agentes LLM.
#[derive(Debug, Parser)]
#[command(name = "revloop", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Número total de tentativas por chamada de agente.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Exporta spans e métricas para o diretório de traces ao final.
    #[arg(long, global = true, default_value_t = false)]
    pub export_traces: bool,

    /// Habilita logs de debug.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Revisa um arquivo uma vez, depurando e corrigindo o problema mais grave.
    Review {
        file: PathBuf,

        /// Linguagem informada aos agentes.
        #[arg(long)]
        language: Option<String>,

        /// Anexa a execução a esta sessão.
        #[arg(long)]
        session: Option<String>,
    },

    /// Refina um arquivo até atingir o limiar de qualidade.
    Refine {
        file: PathBuf,

        #[arg(long)]
        max_iterations: Option<usize>,

        /// Qualidade alvo em [0, 1].
        #[arg(long)]
        threshold: Option<f64>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        session: Option<String>,

        /// Grava o código refinado aqui em vez de imprimi-lo.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Testa, depura e testa de novo até o comando de teste passar.
    Debug {
        file: PathBuf,

        /// Comando de teste executado via `sh -c`; `{file}` vira o caminho
        /// do candidato, que também chega pelo stdin.
        #[arg(long)]
        test_cmd: String,

        #[arg(long)]
        max_iterations: Option<usize>,

        #[arg(long)]
        language: Option<String>,

        #[arg(long)]
        session: Option<String>,

        /// Grava o código final aqui em vez de imprimi-lo.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

impl Command {
    pub fn file(&self) -> &PathBuf {
        match self {
            Command::Review { file, .. }
            | Command::Refine { file, .. }
            | Command::Debug { file, .. } => file,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            Command::Review { language, .. }
            | Command::Refine { language, .. }
            | Command::Debug { language, .. } => language.as_deref(),
        }
    }

    pub fn session(&self) -> Option<&str> {
        match self {
            Command::Review { session, .. }
            | Command::Refine { session, .. }
            | Command::Debug { session, .. } => session.as_deref(),
        }
    }
}

/// Deduz o nome da linguagem pela extensão do arquivo.
pub fn language_from_path(path: &std::path::Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    let language = match ext.to_ascii_lowercase().as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" => "javascript",
        "ts" => "typescript",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "rb" => "ruby",
        _ => return None,
    };
    Some(language)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::path::Path;

    #[test]
    fn cli_parses_review_subcommand() {
        let cli = Cli::parse_from(["revloop", "review", "src/lib.rs", "--session", "s1"]);
        match &cli.command {
            Command::Review { file, language, session } => {
                assert_eq!(file, &PathBuf::from("src/lib.rs"));
                assert!(language.is_none());
                assert_eq!(session.as_deref(), Some("s1"));
            }
            _ => panic!("expected Review command"),
        }
        assert_eq!(cli.command.session(), Some("s1"));
    }

    #[test]
    fn cli_parses_refine_options() {
        let cli = Cli::parse_from([
            "revloop",
            "refine",
            "main.py",
            "--max-iterations",
            "5",
            "--threshold",
            "0.9",
        ]);
        match cli.command {
            Command::Refine {
                max_iterations,
                threshold,
                ..
            } => {
                assert_eq!(max_iterations, Some(5));
                assert_eq!(threshold, Some(0.9));
            }
            _ => panic!("expected Refine command"),
        }
    }

    #[test]
    fn cli_parses_debug_subcommand() {
        let cli = Cli::parse_from([
            "revloop",
            "debug",
            "calc.py",
            "--test-cmd",
            "python -m pytest {file}",
            "--max-iterations",
            "4",
            "-o",
            "fixed.py",
        ]);
        match &cli.command {
            Command::Debug {
                test_cmd,
                max_iterations,
                output,
                ..
            } => {
                assert_eq!(test_cmd, "python -m pytest {file}");
                assert_eq!(*max_iterations, Some(4));
                assert_eq!(output.as_deref(), Some(Path::new("fixed.py")));
            }
            _ => panic!("expected Debug command"),
        }
        assert_eq!(cli.command.file(), &PathBuf::from("calc.py"));
        assert!(Cli::try_parse_from(["revloop", "debug", "calc.py"]).is_err());
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "revloop",
            "--max-attempts",
            "5",
            "--verbose",
            "--export-traces",
            "review",
            "a.rs",
        ]);
        assert!(cli.verbose);
        assert!(cli.export_traces);
        assert_eq!(cli.max_attempts, Some(5));
    }

    #[test]
    fn language_is_guessed_from_extension() {
        assert_eq!(language_from_path(Path::new("x/main.RS")), Some("rust"));
        assert_eq!(language_from_path(Path::new("app.py")), Some("python"));
        assert_eq!(language_from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
