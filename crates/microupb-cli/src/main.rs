mod cli;
mod commands;

use cli::{Cli, Command};

fn main() {
    let cli = <Cli as clap::Parser>::parse();

    let result = match cli.command {
        Command::Gen {
            descriptor_set,
            out_dir,
            param,
            file,
        } => commands::gen::run(commands::gen::GenArgs {
            descriptor_set,
            out_dir,
            params: param,
            files: file,
        }),
    };

    if let Err(err) = result {
        eprintln!("microupb: {err}");
        std::process::exit(1);
    }
}
