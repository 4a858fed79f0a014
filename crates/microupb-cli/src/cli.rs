use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "microupb", bin_name = "microupb")]
#[command(about = "Code generator for the microupb protobuf runtime")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate .upb.h/.upb.c pairs from a descriptor-set JSON file
    #[command(after_help = r#"EXAMPLES:
  microupb gen descriptors.json -o gen/
  microupb gen descriptors.json --param fasttable
  microupb gen descriptors.json --file addressbook.proto"#)]
    Gen {
        /// Descriptor-set JSON file produced by the schema compiler
        #[arg(value_name = "DESCRIPTORS")]
        descriptor_set: PathBuf,

        /// Directory to write generated files into
        #[arg(short = 'o', long, value_name = "DIR", default_value = ".")]
        out_dir: PathBuf,

        /// Generator parameter (repeatable, key[=value])
        #[arg(short = 'p', long = "param", value_name = "PARAM")]
        param: Vec<String>,

        /// Only generate for the named schema files (default: all)
        #[arg(short = 'f', long = "file", value_name = "NAME")]
        file: Vec<String>,
    },
}
