use clap::Parser;
use std::io::{IsTerminal, Read};

use minsh::shell::{Shell, ShellContext};

#[derive(Parser)]
#[command(name = "minsh")]
#[command(about = "An interactive POSIX-style command shell")]
#[command(version)]
struct Cli {
    /// Execute the given command instead of reading input
    #[arg(short = 'c', value_name = "COMMAND")]
    command: Option<String>,

    /// Debug-input mode: print the code of each raw input byte until ^D
    #[arg(short = 'D')]
    debug_input: bool,
}

/// Basename of argv[0], used to prefix diagnostics.
fn program_name() -> String {
    std::env::args()
        .next()
        .and_then(|path| path.rsplit('/').next().map(str::to_string))
        .unwrap_or_else(|| "minsh".to_string())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    let name = program_name();

    if cli.debug_input {
        let shell = Shell::new(ShellContext::non_interactive(&name));
        std::process::exit(shell.run_debug_input());
    }

    if let Some(command) = cli.command {
        let mut shell = Shell::new(ShellContext::non_interactive(&name));
        std::process::exit(shell.run_non_interactive(&command));
    }

    if std::io::stdin().is_terminal() {
        let context = match ShellContext::interactive(&name) {
            Ok(context) => context,
            Err(err) => {
                eprintln!("{}: tcgetattr: {}", name, err);
                std::process::exit(1);
            }
        };
        let mut shell = Shell::new(context);
        std::process::exit(shell.run_interactive());
    }

    // Not a terminal: consume stdin to EOF and run it as one input.
    let mut input = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut input) {
        eprintln!("{}: read: {}", name, err);
        std::process::exit(1);
    }
    let mut shell = Shell::new(ShellContext::non_interactive(&name));
    std::process::exit(shell.run_non_interactive(&input));
}
