//! Command-line interface for execlog.
//!
//! Uses lexopt for minimal binary size overhead.

use std::ffi::OsString;
use std::path::PathBuf;

/// What to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subcommand {
    /// Run a command line and keep its transcript.
    Run {
        /// The command words, as typed after the options.
        words: Vec<String>,
    },
    /// Copy an executable into the binaries directory.
    Import {
        /// File to import.
        file: PathBuf,
    },
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Selected subcommand.
    pub command: Option<Subcommand>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Execution timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Transcript directory.
    pub log_dir: Option<PathBuf>,
    /// Executable prepended to the command line.
    pub binary: Option<PathBuf>,
    /// Working directory for the child process.
    pub cwd: Option<PathBuf>,
    /// Record lines in arrival order instead of stdout first.
    pub arrival_order: bool,
    /// Prepend the command line to the transcript file.
    pub with_command: bool,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

impl Args {
    /// The command line to run, if the `run` subcommand was given.
    pub fn command_line(&self) -> Option<String> {
        match &self.command {
            Some(Subcommand::Run { words }) => Some(words.join(" ")),
            _ => None,
        }
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);
    let mut subcommand: Option<String> = None;

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout_secs = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("timeout", value))?,
                );
            }
            Short('o') | Long("log-dir") => {
                result.log_dir = Some(parser.value()?.parse()?);
            }
            Short('b') | Long("binary") => {
                result.binary = Some(parser.value()?.parse()?);
            }
            Short('C') | Long("cwd") => {
                result.cwd = Some(parser.value()?.parse()?);
            }
            Long("arrival-order") => {
                result.arrival_order = true;
            }
            Long("with-command") => {
                result.with_command = true;
            }
            Value(val) if subcommand.is_none() => {
                let name = val.string()?;
                if name != "run" && name != "import" {
                    return Err(ArgsError::UnknownSubcommand(name));
                }
                subcommand = Some(name);
            }
            Value(val) if subcommand.as_deref() == Some("run") => {
                // Everything from the first command word on belongs to the child.
                let mut words = vec![val.string()?];
                for raw in parser.raw_args()? {
                    words.push(raw.string()?);
                }
                result.command = Some(Subcommand::Run { words });
            }
            Value(val) if subcommand.as_deref() == Some("import") && result.command.is_none() => {
                result.command = Some(Subcommand::Import {
                    file: PathBuf::from(val),
                });
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    if result.command.is_none() && !result.help && !result.version {
        return Err(match subcommand.as_deref() {
            Some("run") => ArgsError::MissingArgument("COMMAND"),
            Some(_) => ArgsError::MissingArgument("FILE"),
            None => ArgsError::MissingSubcommand,
        });
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"execlog {version}
Run a command with live output, a time limit, and a saved transcript

USAGE:
    execlog [OPTIONS] run [RUN OPTIONS] <COMMAND>...
    execlog [OPTIONS] import <FILE>

OPTIONS:
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

RUN OPTIONS:
    -t, --timeout <SECS>    Kill the command after SECS seconds [default: 30]
    -o, --log-dir <DIR>     Directory for transcript files
    -b, --binary <FILE>     Executable to run the command line with
    -C, --cwd <DIR>         Working directory for the command
        --arrival-order     Record stdout and stderr lines as they arrive
        --with-command      Write the command line at the top of the transcript

ENVIRONMENT VARIABLES:
    EXECLOG_TIMEOUT         Timeout in seconds (overrides config)
    EXECLOG_LOG_DIR         Transcript directory (overrides config)
    EXECLOG_LOG_LEVEL       Log level (overrides config)
    RUST_LOG                Alternative log level setting

EXAMPLES:
    # Run with the default 30 second limit
    execlog run ls -la /tmp

    # Short limit, transcripts next to the project
    execlog run -t 5 -o ./logs ping -c 10 localhost

    # Run a script through an imported interpreter
    execlog import /usr/local/bin/node
    execlog run -b ~/.local/share/execlog/binaries/node script.js
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("execlog {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
    /// Neither `run` nor `import` was given.
    MissingSubcommand,
    /// Unknown subcommand name.
    UnknownSubcommand(String),
    /// A subcommand is missing its operand.
    MissingArgument(&'static str),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
            Self::MissingSubcommand => write!(f, "missing subcommand (run or import)"),
            Self::UnknownSubcommand(name) => write!(f, "unknown subcommand: '{}'", name),
            Self::MissingArgument(name) => write!(f, "missing <{}>", name),
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(args: &[&str]) -> Vec<OsString> {
        std::iter::once("execlog")
            .chain(args.iter().copied())
            .map(OsString::from)
            .collect()
    }

    fn words(result: &Args) -> Vec<String> {
        match &result.command {
            Some(Subcommand::Run { words }) => words.clone(),
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_run_simple() {
        let result = parse_args_from(args(&["run", "ls", "-la", "/tmp"])).unwrap();
        assert_eq!(words(&result), vec!["ls", "-la", "/tmp"]);
        assert_eq!(result.command_line().unwrap(), "ls -la /tmp");
        assert!(result.timeout_secs.is_none());
    }

    #[test]
    fn test_run_options_before_command() {
        let result = parse_args_from(args(&[
            "run",
            "-t",
            "5",
            "-o",
            "/tmp/logs",
            "--arrival-order",
            "--with-command",
            "ping",
            "-c",
            "3",
            "localhost",
        ]))
        .unwrap();

        assert_eq!(result.timeout_secs, Some(5));
        assert_eq!(result.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert!(result.arrival_order);
        assert!(result.with_command);
        // -c after the command word belongs to ping, not to --config.
        assert!(result.config.is_none());
        assert_eq!(result.command_line().unwrap(), "ping -c 3 localhost");
    }

    #[test]
    fn test_global_options_before_subcommand() {
        let result =
            parse_args_from(args(&["-c", "/etc/execlog.json", "-l", "debug", "run", "true"]))
                .unwrap();
        assert_eq!(result.config, Some(PathBuf::from("/etc/execlog.json")));
        assert_eq!(result.log_level, Some("debug".to_string()));
        assert_eq!(result.command_line().unwrap(), "true");
    }

    #[test]
    fn test_double_dash() {
        let result = parse_args_from(args(&["run", "--", "-weird", "--flag"])).unwrap();
        assert_eq!(words(&result), vec!["-weird", "--flag"]);
    }

    #[test]
    fn test_quoted_command_line() {
        let result = parse_args_from(args(&["run", "echo hello world"])).unwrap();
        assert_eq!(result.command_line().unwrap(), "echo hello world");
    }

    #[test]
    fn test_binary_and_cwd() {
        let result =
            parse_args_from(args(&["run", "-b", "/opt/node", "-C", "/srv", "app.js"])).unwrap();
        assert_eq!(result.binary, Some(PathBuf::from("/opt/node")));
        assert_eq!(result.cwd, Some(PathBuf::from("/srv")));
        assert_eq!(result.command_line().unwrap(), "app.js");
    }

    #[test]
    fn test_import() {
        let result = parse_args_from(args(&["import", "/usr/bin/node"])).unwrap();
        assert_eq!(
            result.command,
            Some(Subcommand::Import {
                file: PathBuf::from("/usr/bin/node")
            })
        );
        assert!(result.command_line().is_none());
    }

    #[test]
    fn test_import_extra_argument() {
        let result = parse_args_from(args(&["import", "a", "b"]));
        assert!(matches!(result, Err(ArgsError::UnexpectedArgument(_))));
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(matches!(
            parse_args_from(args(&[])),
            Err(ArgsError::MissingSubcommand)
        ));
    }

    #[test]
    fn test_unknown_subcommand() {
        assert!(matches!(
            parse_args_from(args(&["serve"])),
            Err(ArgsError::UnknownSubcommand(_))
        ));
    }

    #[test]
    fn test_run_without_command() {
        assert!(matches!(
            parse_args_from(args(&["run", "-t", "5"])),
            Err(ArgsError::MissingArgument("COMMAND"))
        ));
    }

    #[test]
    fn test_invalid_timeout() {
        let result = parse_args_from(args(&["run", "-t", "soon", "ls"]));
        assert!(matches!(result, Err(ArgsError::InvalidValue("timeout", _))));
    }

    #[test]
    fn test_help_flag() {
        let result = parse_args_from(args(&["-h"])).unwrap();
        assert!(result.help);

        let result = parse_args_from(args(&["--help"])).unwrap();
        assert!(result.help);
    }

    #[test]
    fn test_version_flag() {
        let result = parse_args_from(args(&["-V"])).unwrap();
        assert!(result.version);

        let result = parse_args_from(args(&["--version"])).unwrap();
        assert!(result.version);
    }
}
