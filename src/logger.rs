use std::io::Write;
use std::path::Path;

use env_logger::{Builder, Env, Target};

use crate::error::Result;

/// Install the global logger, `info` unless `RUST_LOG` says otherwise.
///
/// Lines go to stderr so stdout stays free for results, or are appended to
/// `log_file` when one is given.
pub fn init_logger(log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{:<5}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });
    match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            builder.target(Target::Pipe(Box::new(file)));
        }
        None => {
            builder.target(Target::Stderr);
        }
    }
    // A logger installed earlier wins.
    let _ = builder.try_init();
    Ok(())
}
