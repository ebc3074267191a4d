use anyhow::Context;
use chunkfetch::{Controller, DownloadStatus, Engine};
use clap::{Arg, ArgMatches, Command};
use indicatif::{ProgressBar, ProgressStyle};
use sanitize_filename::sanitize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

fn build_cli() -> Command {
    let download = Command::new("download")
        .about("Download one file, splitting large ones into parallel ranges")
        .arg(
            Arg::new("url")
                .help("http(s) URL to fetch")
                .required(true)
                .num_args(1),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Destination file (defaults to the URL's file name inside --out-dir)")
                .num_args(1),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Output directory")
                .default_value(".")
                .num_args(1),
        )
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .help("Log filter used when RUST_LOG is unset")
                .default_value("info")
                .num_args(1),
        );

    Command::new("chunkfetch")
        .about("Parallel ranged HTTP downloader")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(download)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn default_file_name(raw: &str) -> anyhow::Result<String> {
    let url = Url::parse(raw).with_context(|| format!("invalid url: {}", raw))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("unsupported scheme: {}", url.scheme());
    }
    Ok(url
        .path_segments()
        .and_then(|s| s.last())
        .filter(|s| !s.is_empty())
        .map(|s| sanitize(s))
        .unwrap_or_else(|| "download.bin".to_string()))
}

fn destination(m: &ArgMatches, raw: &str) -> anyhow::Result<PathBuf> {
    if let Some(p) = m.get_one::<String>("output") {
        return Ok(PathBuf::from(p));
    }
    let out_dir: PathBuf = m.get_one::<String>("out_dir").context("missing --out-dir")?.into();
    Ok(out_dir.join(default_file_name(raw)?))
}

fn render(pb: &ProgressBar, controller: &Controller) {
    let total = controller.total_size();
    let downloaded = controller.downloaded_size();
    if total > 0 && pb.length() != Some(total) {
        pb.set_length(total);
    }
    pb.set_position(downloaded.min(total));
    let pct = match controller.progress() {
        p if p < 0.0 => "?".to_string(),
        p => format!("{:.1}%", p),
    };
    pb.set_message(format!("{} {}", controller.status(), pct));
}

async fn run_download(m: &ArgMatches) -> anyhow::Result<()> {
    let raw = m.get_one::<String>("url").context("missing url")?.clone();
    let dest = destination(m, &raw)?;

    let engine = Engine::http()?;
    let controller = Controller::new();

    let task = {
        let (controller, url, dest) = (controller.clone(), raw.clone(), dest.clone());
        tokio::spawn(async move { engine.download(&url, &dest, &controller).await })
    };

    let pb = ProgressBar::new(0);
    pb.set_style(ProgressStyle::with_template(
        "{bar:40.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, eta {eta}) {wide_msg}",
    )?);

    while !task.is_finished() {
        render(&pb, &controller);
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    render(&pb, &controller);

    match task.await.context("download task")? {
        Ok(report) => {
            pb.finish_with_message(DownloadStatus::Done.to_string());
            println!(
                "Downloaded {} ({}) in {:.2}s",
                dest.display(),
                fmt_bytes(report.total_size),
                report.elapsed_secs()
            );
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message(controller.status().to_string());
            Err(e.context(format!("download {}", raw)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("download", m)) => {
            let level = m.get_one::<String>("log_level").map(String::as_str).unwrap_or("info");
            init_tracing(level);
            run_download(m).await
        }
        _ => Ok(()),
    }
}

fn fmt_bytes(n: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    let f = n as f64;
    if f >= GB {
        format!("{:.2}GiB", f / GB)
    } else if f >= MB {
        format!("{:.2}MiB", f / MB)
    } else if f >= KB {
        format!("{:.2}KiB", f / KB)
    } else {
        format!("{}B", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_from_url() {
        assert_eq!(default_file_name("https://host/a/b/tool.tar.gz").unwrap(), "tool.tar.gz");
        assert_eq!(default_file_name("https://host/").unwrap(), "download.bin");
        assert!(default_file_name("ftp://host/file").is_err());
        assert!(default_file_name("not a url").is_err());
    }

    #[test]
    fn cli_parses_download() {
        let m = build_cli()
            .try_get_matches_from(["chunkfetch", "download", "https://host/x.iso", "-o", "/tmp/y.iso"])
            .unwrap();
        let (name, sub) = m.subcommand().unwrap();
        assert_eq!(name, "download");
        assert_eq!(destination(sub, "https://host/x.iso").unwrap(), PathBuf::from("/tmp/y.iso"));
    }

    #[test]
    fn default_destination_uses_out_dir() {
        let m = build_cli()
            .try_get_matches_from(["chunkfetch", "download", "https://host/x.iso", "--out-dir", "dl"])
            .unwrap();
        let (_, sub) = m.subcommand().unwrap();
        assert_eq!(destination(sub, "https://host/x.iso").unwrap(), PathBuf::from("dl").join("x.iso"));
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(fmt_bytes(512), "512B");
        assert_eq!(fmt_bytes(10 * 1024 * 1024), "10.00MiB");
    }
}
