use env_logger::Builder;
use log::LevelFilter;
use needletail::parse_fastx_file;
use std::{ffi::OsStr, fs::OpenOptions, io::Write, path::{Path, PathBuf}};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::error::CleanseqError;


/// Extension trait for inferring compression format from file extension.
pub trait CompressionExt {
    fn from_path<S: AsRef<OsStr> + ?Sized>(p: &S) -> Self;
}

impl CompressionExt for niffler::compression::Format {
    /// Attempts to infer the compression type from the file extension.
    /// If the extension is not known, `No` is returned.
    ///
    /// # Example
    ///
    /// ```
    /// use cleanseq::utils::CompressionExt;
    /// let format = <niffler::compression::Format as CompressionExt>::from_path("reads.fastq.gz");
    /// assert_eq!(format, niffler::compression::Format::Gzip);
    /// ```
    fn from_path<S: AsRef<OsStr> + ?Sized>(p: &S) -> Self {
        let path = Path::new(p);
        match path.extension().map(|s| s.to_str()) {
            Some(Some("gz")) => Self::Gzip,
            Some(Some("bz") | Some("bz2")) => Self::Bzip,
            Some(Some("lzma") | Some("xz")) => Self::Lzma,
            _ => Self::No,
        }
    }
}

/// Counts the records of a (compressed) FASTQ file.
///
/// Empty files have zero reads, the parser refuses them so they are checked
/// before it is invoked.
pub fn count_reads(path: &Path) -> Result<u64, CleanseqError> {
    if std::fs::metadata(path)?.len() == 0 {
        return Ok(0)
    }
    let mut reader = parse_fastx_file(path)?;
    let mut count = 0;
    while let Some(record) = reader.next() {
        record?;
        count += 1;
    }
    Ok(count)
}

/// Full command line of the current process, recorded in summaries.
pub fn command_line() -> String {
    std::env::args().collect::<Vec<String>>().join(" ")
}

pub fn init_logger(log_file: Option<PathBuf>) {
    // Create a buffer for writing log messages with colors
    let mut builder = Builder::new();

    builder.format(|buf, record| {
        let mut stdout = StandardStream::stdout(ColorChoice::Always);
        let mut stderr = StandardStream::stderr(ColorChoice::Always);

        let mut style = ColorSpec::new();
        match record.level() {
            log::Level::Trace => style.set_fg(Some(Color::White)).set_bold(true),
            log::Level::Debug => style.set_fg(Some(Color::Rgb(255, 195, 0))).set_bold(true),
            log::Level::Info => style.set_fg(Some(Color::Green)).set_bold(true),
            log::Level::Warn => style.set_fg(Some(Color::Rgb(255, 102, 0))).set_bold(true),
            log::Level::Error => style.set_fg(Some(Color::Red)).set_bold(true),
        };

        let mut default_style = ColorSpec::new();
        default_style.set_fg(Some(Color::White));

        let timestamp = buf.timestamp();

        let stream = if record.level() == log::Level::Error || record.level() == log::Level::Warn {
            &mut stderr
        } else {
            &mut stdout
        };

        stream.set_color(&default_style)?;
        write!(stream, "{} [", timestamp)?;

        stream.set_color(&style)?;
        write!(stream, "{}", record.level())?;

        stream.set_color(&default_style)?;
        writeln!(stream, "] - {}", record.args())?;

        stream.reset()?;

        Ok(())
    });

    builder.filter(None, LevelFilter::Info);

    if let Some(log_path) = log_file {
        match OpenOptions::new().append(true).create(true).open(&log_path) {
            Ok(file) => {
                // Plain format for files, colors would end up as escape codes
                builder.format(|buf, record| {
                    writeln!(buf, "{} [{}] - {}", buf.timestamp(), record.level(), record.args())
                });
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(err) => eprintln!("Failed to open log file {}: {}", log_path.display(), err),
        }
    }

    builder.init();
}
