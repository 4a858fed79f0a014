//! The `gen` command: descriptor-set JSON in, .upb.h/.upb.c pairs out.

use std::fs;
use std::path::{Path, PathBuf};

use microupb_core::{FileId, Pool, PoolError};
use microupb_gen::{generate, GenError, Params};

pub struct GenArgs {
    pub descriptor_set: PathBuf,
    pub out_dir: PathBuf,
    pub params: Vec<String>,
    pub files: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Gen(#[from] GenError),
    #[error("no such file in descriptor set: {0}")]
    UnknownFile(String),
}

pub fn run(args: GenArgs) -> Result<(), Error> {
    let json = fs::read_to_string(&args.descriptor_set)?;
    let pool = Pool::from_json(&json)?;
    let params = Params::parse(&args.params.join(","))?;

    let targets: Vec<FileId> = if args.files.is_empty() {
        (0..pool.files.len() as u32).map(FileId).collect()
    } else {
        args.files
            .iter()
            .map(|name| {
                pool.find_file(name)
                    .ok_or_else(|| Error::UnknownFile(name.clone()))
            })
            .collect::<Result<_, _>>()?
    };

    fs::create_dir_all(&args.out_dir)?;
    for file in targets {
        let generated = generate(&pool, file, &params);
        write_output(&args.out_dir, &generated.header_name, &generated.header)?;
        write_output(&args.out_dir, &generated.source_name, &generated.source)?;
    }
    Ok(())
}

fn write_output(out_dir: &Path, name: &str, content: &str) -> Result<(), Error> {
    let path = out_dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content)?;
    println!("wrote {}", path.display());
    Ok(())
}
