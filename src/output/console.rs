//! Console output utilities.

use console::style;

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", style("INFO").cyan().bold(), message);
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", style("WARN").yellow().bold(), message);
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", style("ERROR").red().bold(), message);
}

/// Print the application banner.
pub fn print_banner() {
    let banner = r#"
╔═══════════════════════════════════════════════════════╗
║     vidfetch                                          ║
║     Media download service powered by yt-dlp          ║
╚═══════════════════════════════════════════════════════╝
"#;
    println!("{}", style(banner).cyan());
}

/// Print configuration summary.
pub fn print_config_summary(
    listen_addr: &str,
    max_concurrent: usize,
    download_dir: &str,
) {
    println!();
    println!("{}", style("Configuration:").bold());
    println!("  Listening on: {}", listen_addr);
    println!("  Concurrent downloads: {}", max_concurrent);
    println!("  Download directory: {}", download_dir);
    println!();
}
