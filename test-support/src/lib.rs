pub mod fake_recaptcha;
pub mod fake_smtp;

use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode};

/// Routes `log` output to the terminal. Safe to call from every test.
pub fn setup_logging() {
    let _ = CombinedLogger::init(vec![TermLogger::new(
        LevelFilter::Debug,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
