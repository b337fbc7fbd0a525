// CLI entry point: generate a chord accompaniment for a MIDI file and
// write the merged result into a per-run workspace directory

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use chordweave::pipeline::{self, ChordRequest, Workspace};
use chordweave::score::TimeSignature;
use chordweave::theory::parse_progression;

fn print_usage() {
    eprintln!("Usage: chordweave <input.mid> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --key <letter>          Fallback key letter (default C)");
    eprintln!("  --mode <major|minor>    Mode (default Major)");
    eprintln!("  --progression <list>    Comma-separated degrees, 0 = rest (default 2,5,1,6)");
    eprintln!("  --time-sig <n,d>        Time signature (default 4,4)");
    eprintln!("  --tempo <bpm>           Fallback tempo (default 90)");
    eprintln!("  --transpose <semitones> Chord transposition (default -24)");
    eprintln!("  --params <file.json>    Read the request from a JSON file");
    eprintln!("  --out-dir <dir>         Workspace base directory (default system temp)");
}

fn parse_args() -> Result<(PathBuf, ChordRequest, PathBuf), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        return Err("missing input file".to_string());
    }

    let mut input: Option<PathBuf> = None;
    let mut request = ChordRequest::default();
    let mut out_dir = env::temp_dir();

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        let mut value = |name: &str| -> Result<String, String> {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("{} requires a value", name))
        };

        match arg.as_str() {
            "--params" => {
                let path = value("--params")?;
                let contents = fs::read_to_string(&path)
                    .map_err(|e| format!("cannot read {}: {}", path, e))?;
                request = serde_json::from_str(&contents)
                    .map_err(|e| format!("invalid params file {}: {}", path, e))?;
            }
            "--key" => request.key = value("--key")?,
            "--mode" => request.mode = value("--mode")?,
            "--progression" => {
                request.progression =
                    parse_progression(&value("--progression")?).map_err(|e| e.to_string())?;
            }
            "--time-sig" => {
                request.time_signature =
                    TimeSignature::parse(&value("--time-sig")?).map_err(|e| e.to_string())?;
            }
            "--tempo" => {
                request.tempo = value("--tempo")?
                    .parse()
                    .map_err(|_| "tempo must be a positive integer".to_string())?;
            }
            "--transpose" => {
                request.transpose = value("--transpose")?
                    .parse()
                    .map_err(|_| "transpose must be an integer".to_string())?;
            }
            "--out-dir" => out_dir = PathBuf::from(value("--out-dir")?),
            other if other.starts_with("--") => {
                return Err(format!("unknown option: {}", other));
            }
            _ => {
                if input.is_some() {
                    return Err(format!("unexpected argument: {}", arg));
                }
                input = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    let input = input.ok_or_else(|| "missing input file".to_string())?;
    Ok((input, request, out_dir))
}

fn main() {
    let (input, request, out_dir) = match parse_args() {
        Ok(parsed) => parsed,
        Err(message) => {
            eprintln!("Error: {}", message);
            print_usage();
            process::exit(1);
        }
    };

    let source_bytes = match fs::read(&input) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading '{}': {}", input.display(), e);
            process::exit(1);
        }
    };

    let merged = match pipeline::run(&source_bytes, &request) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let workspace = match Workspace::create(&out_dir) {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("Error creating workspace under '{}': {}", out_dir.display(), e);
            process::exit(1);
        }
    };

    let output = workspace.output_path();
    if let Err(e) = fs::write(&output, &merged) {
        eprintln!("Error writing '{}': {}", output.display(), e);
        process::exit(1);
    }
    println!("{}", output.display());
}
